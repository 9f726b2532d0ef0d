//! Shared fixtures: a deterministic in-process featurizer and PDB text
//! construction helpers.
#![allow(dead_code)]

use std::sync::Arc;

use pocketfeature_compare::featurize::Featurizer;
use pocketfeature_core::{PdbPoint, Result};
use pocketfeature_io::featurefile::{FeatureFile, FeatureVector};
use pocketfeature_io::metadata::{FeatureMetadata, MetaValue};

/// Four-property, one-shell metadata used by the mock featurizer
pub fn mock_metadata() -> Arc<FeatureMetadata> {
    let mut md = FeatureMetadata::default();
    md.set(
        "PROPERTIES",
        MetaValue::List(vec!["P0".into(), "P1".into(), "P2".into(), "P3".into()]),
    );
    md.set("SHELLS", MetaValue::Int(1));
    Arc::new(md)
}

/// Deterministic featurizer: features are a fixed function of the point
/// coordinates, so identical points always featurize identically.
pub struct CoordinateFeaturizer {
    pub metadata: Arc<FeatureMetadata>,
}

impl Default for CoordinateFeaturizer {
    fn default() -> Self {
        Self {
            metadata: mock_metadata(),
        }
    }
}

impl CoordinateFeaturizer {
    fn features_for(&self, point: &PdbPoint) -> Vec<f64> {
        let [x, y, z] = point.point.coords();
        vec![x + 10.0, y + 10.0, z + 10.0, x + y + z + 10.0]
    }
}

impl Featurizer for CoordinateFeaturizer {
    fn featurize(&self, points: &[PdbPoint]) -> Result<FeatureFile> {
        let mut file = FeatureFile::new(self.metadata.clone());
        for point in points {
            // DESCRIPTION mirrors the pointfile comment: signature
            // first, center code last
            let description = point
                .comment
                .split_whitespace()
                .filter(|t| *t != "#")
                .collect::<Vec<_>>()
                .join(" ");
            let name = description
                .split_whitespace()
                .next()
                .unwrap_or("POINT")
                .to_string();
            let vector = FeatureVector::new(
                self.metadata.clone(),
                name,
                self.features_for(point),
                Some(point.point),
                vec![description],
            )?;
            file.append(vector)?;
        }
        Ok(file)
    }
}

/// Featurizer that emits all-zero vectors
pub struct ZeroFeaturizer {
    pub metadata: Arc<FeatureMetadata>,
}

impl Default for ZeroFeaturizer {
    fn default() -> Self {
        Self {
            metadata: mock_metadata(),
        }
    }
}

impl Featurizer for ZeroFeaturizer {
    fn featurize(&self, points: &[PdbPoint]) -> Result<FeatureFile> {
        let mut file = FeatureFile::new(self.metadata.clone());
        for point in points {
            let description = point
                .comment
                .split_whitespace()
                .filter(|t| *t != "#")
                .collect::<Vec<_>>()
                .join(" ");
            let name = description
                .split_whitespace()
                .next()
                .unwrap_or("POINT")
                .to_string();
            let vector = FeatureVector::new(
                self.metadata.clone(),
                name,
                vec![0.0; self.metadata.num_features()],
                Some(point.point),
                vec![description],
            )?;
            file.append(vector)?;
        }
        Ok(file)
    }
}

/// Format a fixed-column PDB ATOM/HETATM line
pub fn pdb_line(
    record: &str,
    serial: u32,
    name: &str,
    res_name: &str,
    chain: char,
    seq: i32,
    coords: (f64, f64, f64),
    element: &str,
) -> String {
    format!(
        "{:<6}{:>5} {:<4}{:1}{:<3} {:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}           {:>2}",
        record, serial, name, ' ', res_name, chain, seq, "", coords.0, coords.1, coords.2,
        1.00, 20.00, element
    )
}

/// A five-GLY pocket around a LIG residue at the origin.
///
/// The CA positions are chosen so any two points disagree on at least
/// half the mock features, keeping cross-point similarities low.
pub fn five_residue_pocket_pdb(pdbid: &str) -> String {
    let mut lines = vec![format!(
        "HEADER    SYNTHETIC POCKET                                     01-JAN-00   {pdbid}              "
    )];
    lines.push(pdb_line("HETATM", 1, "C1", "LIG", 'A', 900, (0.0, 0.0, 0.0), "C"));
    let cas = [
        (2.0, 0.0, 0.0),
        (0.0, 2.5, 0.0),
        (0.0, 0.0, 3.0),
        (-2.0, -2.0, 0.0),
        (0.0, -3.0, 1.5),
    ];
    for (i, coords) in cas.iter().enumerate() {
        lines.push(pdb_line(
            "ATOM",
            (i + 2) as u32,
            "CA",
            "GLY",
            'A',
            (i + 1) as i32 * 10,
            *coords,
            "C",
        ));
    }
    lines.push("END".to_string());
    lines.join("\n")
}

/// A one-GLY pocket around a LIG residue.
pub fn single_residue_pocket_pdb(pdbid: &str) -> String {
    let mut lines = vec![format!(
        "HEADER    SYNTHETIC POCKET                                     01-JAN-00   {pdbid}              "
    )];
    lines.push(pdb_line("HETATM", 1, "C1", "LIG", 'A', 900, (0.0, 0.0, 0.0), "C"));
    lines.push(pdb_line("ATOM", 2, "CA", "GLY", 'A', 10, (3.0, 0.0, 0.0), "C"));
    lines.push("END".to_string());
    lines.join("\n")
}
