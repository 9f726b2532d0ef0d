//! The "compare two pockets" driver.
//!
//! Wires the stages in a deterministic order:
//! structure -> ligand -> pocket -> featurize -> score -> align -> RMSD.

use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use pocketfeature_core::{PdbPoint, PocketError, Result};

use crate::align::{align, AlignmentMethod};
use crate::background::{AlignmentSizes, BackgroundEnvironment, NORMALIZED_SCORE};
use crate::featurize::Featurizer;
use crate::pocket::{build_pocket, PocketBuilderOptions};
use crate::residues::CenterCatalogue;
use crate::rmsd::alignment_rmsd;
use crate::structure::{PdbParseOptions, ProteinStructure};

/// Which center pairs are comparable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedPairs {
    /// Every center against every center
    All,
    /// Only pairs within the same chemical class
    Classes,
}

impl AllowedPairs {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "all" => Ok(Self::All),
            "classes" => Ok(Self::Classes),
            other => Err(PocketError::input(format!(
                "unknown allowed-pairs set: {other}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Classes => "classes",
        }
    }
}

/// Options for one comparison run
#[derive(Debug, Clone)]
pub struct CompareOptions {
    /// PDB model to use from each structure (0 = first)
    pub model_a: usize,
    pub model_b: usize,
    /// Chain to restrict each pocket to (None = any)
    pub chain_a: Option<char>,
    pub chain_b: Option<char>,
    /// Ligand names to build each pocket around (None = largest het)
    pub ligand_a: Option<Vec<String>>,
    pub ligand_b: Option<Vec<String>>,
    /// Alignment strategy
    pub alignment: AlignmentMethod,
    /// Ligand-to-center distance cutoff in Angstroms
    pub distance: f64,
    /// Normalized-score cutoff for the alignment (entries <= cutoff)
    pub cutoff: f64,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            model_a: 0,
            model_b: 0,
            chain_a: None,
            chain_b: None,
            ligand_a: None,
            ligand_b: None,
            alignment: AlignmentMethod::OnlyBest,
            distance: 6.0,
            cutoff: -0.15,
        }
    }
}

/// The result row of a comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareReport {
    pub pocket_a: String,
    pub pocket_b: String,
    pub num_a: usize,
    pub num_b: usize,
    pub num_scored: usize,
    pub num_aligned: usize,
    pub alignment_score: f64,
    pub scaled_score: f64,
    pub alignment_rmsd: f64,
}

impl CompareReport {
    /// Column names of the TSV output row
    pub const TSV_HEADER: &'static str = "pocketA\tpocketB\tnumA\tnumB\tnum_scored\tnum_aligned\talignment_score\tscaled_score\talignment_rmsd";

    /// Render the TSV data row (scores to three decimals)
    pub fn to_tsv_row(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{:.3}\t{:.3}\t{:.3}",
            self.pocket_a,
            self.pocket_b,
            self.num_a,
            self.num_b,
            self.num_scored,
            self.num_aligned,
            self.alignment_score,
            self.scaled_score,
            self.alignment_rmsd
        )
    }
}

/// Extract one pocket's points from a PDB file.
///
/// Returns the pocket signature and its microenvironment points. A
/// missing ligand is a `NoPocket` error; a pocket with no residues
/// within cutoff is `EmptyData`.
pub fn extract_pocket_points(
    path: &Path,
    model: usize,
    chain: Option<char>,
    ligands: Option<&[String]>,
    catalogue: &CenterCatalogue,
    distance: f64,
) -> Result<(String, Vec<PdbPoint>)> {
    debug!("loading structure {}", path.display());
    let options = PdbParseOptions {
        keep_alternate_locations: true,
        include_all_models: model != 0,
        ..Default::default()
    };
    let structure = ProteinStructure::from_pdb_file_with_options(path, options)?;
    let structure = structure.focus(model, chain)?;

    let ligand = match ligands {
        Some(names) => structure.find_ligand(names).ok_or_else(|| {
            PocketError::no_pocket(format!(
                "ligand {} not found in {}",
                names.join(","),
                path.display()
            ))
        })?,
        None => structure.pick_best_ligand().ok_or_else(|| {
            PocketError::no_pocket(format!("no ligand in {}", path.display()))
        })?,
    };

    let pocket = build_pocket(
        &structure,
        ligand,
        catalogue,
        &PocketBuilderOptions {
            cutoff: distance,
            ..Default::default()
        },
    )?;
    if pocket.is_empty() {
        return Err(PocketError::empty(format!(
            "no residues within {distance} A of ligand for {}",
            pocket.signature_string()
        )));
    }
    Ok((pocket.signature_string(), pocket.points()))
}

/// Compare two pockets end to end.
pub fn compare_pockets(
    path_a: &Path,
    path_b: &Path,
    background: &BackgroundEnvironment,
    catalogue: &CenterCatalogue,
    featurizer: &dyn Featurizer,
    options: &CompareOptions,
) -> Result<CompareReport> {
    info!("identifying pocket points");
    let (signature_a, points_a) = extract_pocket_points(
        path_a,
        options.model_a,
        options.chain_a,
        options.ligand_a.as_deref(),
        catalogue,
        options.distance,
    )?;
    let (signature_b, points_b) = extract_pocket_points(
        path_b,
        options.model_b,
        options.chain_b,
        options.ligand_b.as_deref(),
        catalogue,
        options.distance,
    )?;

    info!("generating FEATURE vectors");
    let features_a = featurizer.featurize(&points_a)?;
    let features_b = featurizer.featurize(&points_b)?;
    let num_a = features_a.len();
    let num_b = features_b.len();

    info!("comparing vectors");
    let scores = background.comparison_matrix(&features_a, &features_b);
    let num_scored = scores.len();
    debug!(
        "scored {num_scored} pairs (out of {}x{} = {} total)",
        num_a,
        num_b,
        num_a * num_b
    );
    if scores.is_empty() {
        return Err(PocketError::empty(
            "no scoreable vector pairs between pockets".to_string(),
        ));
    }

    info!("aligning pockets");
    let normalized = scores.slice_values(NORMALIZED_SCORE)?;
    let alignment = align(&normalized, options.cutoff, options.alignment)?;
    let num_aligned = alignment.len();
    let total_score = alignment.total();
    debug!("aligned {num_aligned} points, total {total_score:.3}");

    let sizes = AlignmentSizes {
        num_a,
        num_b,
        num_scored,
        num_aligned,
    };
    let scaled_score = background.scale_alignment_score(&sizes, total_score);

    let rmsd = alignment_rmsd(&alignment.matrix, &points_a, &points_b)?;

    Ok(CompareReport {
        pocket_a: signature_a,
        pocket_b: signature_b,
        num_a,
        num_b,
        num_scored,
        num_aligned,
        alignment_score: total_score,
        scaled_score,
        alignment_rmsd: rmsd,
    })
}
