//! End-to-end comparison pipeline scenarios.

mod common;

use std::fs;
use std::path::PathBuf;

use common::{
    five_residue_pocket_pdb, single_residue_pocket_pdb, CoordinateFeaturizer, ZeroFeaturizer,
};
use tempfile::TempDir;

use pocketfeature_compare::background::{
    BackgroundEnvironment, ScaleMethod, SimilarityMethod,
};
use pocketfeature_compare::featurize::Featurizer;
use pocketfeature_compare::pipeline::{compare_pockets, CompareOptions};
use pocketfeature_compare::residues::CenterCatalogue;
use pocketfeature_compare::CompareReport;
use pocketfeature_core::PocketError;
use pocketfeature_io::featurefile::FeatureVector;
use pocketfeature_io::matrixvalues::MatrixValues;

fn write_pdb(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Background with unit std-dev and a single (G, G) normalization of
/// mode 0.5.
fn unit_background() -> BackgroundEnvironment {
    let metadata = common::mock_metadata();
    let std_dev = FeatureVector::new(
        metadata.clone(),
        "STD",
        vec![1.0; metadata.num_features()],
        None,
        vec!["4".to_string()],
    )
    .unwrap();
    let norms = MatrixValues::from_entries(
        vec![(
            vec!["G".to_string(), "G".to_string()],
            vec![0.5, 0.1],
        )],
        &["mode", "std_dev"],
    );
    BackgroundEnvironment::from_parts(
        std_dev,
        None,
        norms,
        None,
        SimilarityMethod::Tanimoto,
        ScaleMethod::None,
        Vec::new(),
        1.0,
    )
}

fn run_compare(
    path_a: &PathBuf,
    path_b: &PathBuf,
    featurizer: &dyn Featurizer,
) -> pocketfeature_core::Result<CompareReport> {
    let background = unit_background();
    let catalogue = CenterCatalogue::standard();
    compare_pockets(
        path_a,
        path_b,
        &background,
        &catalogue,
        featurizer,
        &CompareOptions::default(),
    )
}

#[test]
fn identical_pockets_align_on_self_pairs() {
    let dir = TempDir::new().unwrap();
    let path_a = write_pdb(&dir, "a.pdb", &five_residue_pocket_pdb("1TSA"));
    let path_b = write_pdb(&dir, "b.pdb", &five_residue_pocket_pdb("1TSA"));
    let featurizer = CoordinateFeaturizer::default();

    let report = run_compare(&path_a, &path_b, &featurizer).unwrap();
    assert_eq!(report.num_a, 5);
    assert_eq!(report.num_b, 5);
    assert_eq!(report.num_scored, 25);
    // the five self-pairs are mutually best with raw similarity 1.0,
    // normalized 2/(1+4)-1 = -0.6 each
    assert_eq!(report.num_aligned, 5);
    assert!((report.alignment_score - (-3.0)).abs() < 1e-9);
    assert!((report.scaled_score - (-3.0)).abs() < 1e-9);
    assert!(report.alignment_rmsd.abs() < 1e-9);
}

#[test]
fn zero_vectors_score_above_cutoff() {
    let dir = TempDir::new().unwrap();
    let path_a = write_pdb(&dir, "a.pdb", &single_residue_pocket_pdb("1TSA"));
    let path_b = write_pdb(&dir, "b.pdb", &single_residue_pocket_pdb("1TSB"));
    let featurizer = ZeroFeaturizer::default();

    let report = run_compare(&path_a, &path_b, &featurizer).unwrap();
    // empty union: raw 0, normalized +1, filtered by the -0.15 cutoff
    assert_eq!(report.num_scored, 1);
    assert_eq!(report.num_aligned, 0);
    assert_eq!(report.alignment_score, 0.0);
    assert_eq!(report.alignment_rmsd, 0.0);
}

#[test]
fn comparison_is_symmetric_under_transposition() {
    let dir = TempDir::new().unwrap();
    let path_a = write_pdb(&dir, "a.pdb", &five_residue_pocket_pdb("1TSA"));
    let path_b = write_pdb(&dir, "b.pdb", &five_residue_pocket_pdb("2TSB"));
    let featurizer = CoordinateFeaturizer::default();

    let forward = run_compare(&path_a, &path_b, &featurizer).unwrap();
    let reverse = run_compare(&path_b, &path_a, &featurizer).unwrap();
    assert!((forward.alignment_score - reverse.alignment_score).abs() < 1e-9);
    assert!((forward.alignment_rmsd - reverse.alignment_rmsd).abs() < 1e-9);
    assert_eq!(forward.num_aligned, reverse.num_aligned);
    assert_eq!(forward.pocket_a, reverse.pocket_b);
    assert_eq!(forward.pocket_b, reverse.pocket_a);
}

#[test]
fn empty_pocket_reports_empty_data() {
    let dir = TempDir::new().unwrap();
    // ligand with no protein residues anywhere near it
    let mut lines = vec![common::pdb_line(
        "HETATM",
        1,
        "C1",
        "LIG",
        'A',
        900,
        (0.0, 0.0, 0.0),
        "C",
    )];
    lines.push(common::pdb_line(
        "ATOM",
        2,
        "CA",
        "GLY",
        'A',
        1,
        (50.0, 0.0, 0.0),
        "C",
    ));
    let path_a = write_pdb(&dir, "a.pdb", &lines.join("\n"));
    let path_b = write_pdb(&dir, "b.pdb", &five_residue_pocket_pdb("1TSB"));
    let featurizer = CoordinateFeaturizer::default();

    let err = run_compare(&path_a, &path_b, &featurizer).unwrap_err();
    assert!(matches!(err, PocketError::EmptyData(_)));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn missing_ligand_reports_no_pocket() {
    let dir = TempDir::new().unwrap();
    let lines = vec![common::pdb_line(
        "ATOM",
        1,
        "CA",
        "GLY",
        'A',
        1,
        (0.0, 0.0, 0.0),
        "C",
    )];
    let path_a = write_pdb(&dir, "a.pdb", &lines.join("\n"));
    let path_b = write_pdb(&dir, "b.pdb", &five_residue_pocket_pdb("1TSB"));
    let featurizer = CoordinateFeaturizer::default();

    let err = run_compare(&path_a, &path_b, &featurizer).unwrap_err();
    assert!(matches!(err, PocketError::NoPocket(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn requesting_a_named_ligand_that_is_absent_fails() {
    let dir = TempDir::new().unwrap();
    let path_a = write_pdb(&dir, "a.pdb", &five_residue_pocket_pdb("1TSA"));
    let path_b = write_pdb(&dir, "b.pdb", &five_residue_pocket_pdb("1TSB"));
    let featurizer = CoordinateFeaturizer::default();

    let background = unit_background();
    let catalogue = CenterCatalogue::standard();
    let options = CompareOptions {
        ligand_a: Some(vec!["ATP".to_string()]),
        ..Default::default()
    };
    let err = compare_pockets(
        &path_a,
        &path_b,
        &background,
        &catalogue,
        &featurizer,
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, PocketError::NoPocket(_)));
}
