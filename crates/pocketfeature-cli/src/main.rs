//! PocketFEATURE command line driver.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info};

use pocketfeature_compare::background::{BackgroundEnvironment, ScaleMethod, SimilarityMethod};
use pocketfeature_compare::builder::{BackgroundBuilder, BackgroundBuilderOptions};
use pocketfeature_compare::featurize::ExternalFeaturizer;
use pocketfeature_compare::pipeline::{compare_pockets, AllowedPairs, CompareOptions};
use pocketfeature_compare::align::AlignmentMethod;
use pocketfeature_compare::residues::CenterCatalogue;
use pocketfeature_core::{PocketError, Result};
use pocketfeature_io::backgroundfile;
use pocketfeature_io::centersfile;

const BACKGROUND_FF_DEFAULT: &str = "background.ff";
const BACKGROUND_COEFF_DEFAULT: &str = "background.coeffs";

#[derive(Parser)]
#[command(name = "pocketfeature")]
#[command(about = "Compare protein binding pockets with FEATURE microenvironments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the binding pockets of two PDB files
    Compare(CompareArgs),
    /// Build background statistics from a corpus of PDB files
    BuildBackground(BuildArgs),
}

#[derive(clap::Args)]
struct CompareArgs {
    /// Path to first PDB file
    pdb_a: PathBuf,

    /// Path to second PDB file
    pdb_b: PathBuf,

    /// PDB model to use from PDB A (0 = first)
    #[arg(long = "modelA", default_value_t = 0)]
    model_a: usize,

    /// PDB model to use from PDB B (0 = first)
    #[arg(long = "modelB", default_value_t = 0)]
    model_b: usize,

    /// Chain to restrict the first pocket to (default: any)
    #[arg(long = "chainA")]
    chain_a: Option<char>,

    /// Chain to restrict the second pocket to (default: any)
    #[arg(long = "chainB")]
    chain_b: Option<char>,

    /// Comma-separated ligand names for the first pocket (default: largest het residue)
    #[arg(long = "ligandA")]
    ligand_a: Option<String>,

    /// Comma-separated ligand names for the second pocket (default: largest het residue)
    #[arg(long = "ligandB")]
    ligand_b: Option<String>,

    /// FEATURE file containing background standard deviations
    #[arg(short = 'b', long)]
    background: Option<PathBuf>,

    /// Normalization coefficients for center-pair types
    #[arg(short = 'n', long)]
    normalization: Option<PathBuf>,

    /// Score scale parameter file
    #[arg(long)]
    scale_params: Option<PathBuf>,

    /// Centers definition file (default: the standard catalogue)
    #[arg(long)]
    centers: Option<PathBuf>,

    /// Which center pairs to score
    #[arg(short = 'p', long, default_value = "classes")]
    allowed_pairs: String,

    /// Similarity method
    #[arg(short = 'C', long, default_value = "tversky22")]
    comparison_method: String,

    /// Alignment method
    #[arg(short = 'A', long, default_value = "onlybest")]
    alignment_method: String,

    /// Score scaling method
    #[arg(short = 'S', long, default_value = "none")]
    scale_method: String,

    /// Standard deviations between features counted as similar
    #[arg(short = 't', long, default_value_t = 1.0)]
    std_threshold: f64,

    /// Ligand-to-center distance cutoff in Angstroms
    #[arg(short = 'd', long, default_value_t = 6.0)]
    distance: f64,

    /// Normalized-score cutoff for the alignment
    #[arg(short = 'c', long, default_value_t = -0.15, allow_hyphen_values = true)]
    cutoff: f64,

    /// Featurize timeout in seconds
    #[arg(long, default_value_t = 300)]
    featurize_timeout: u64,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// PDB files to extract pockets from
    #[arg(required = true)]
    pdbs: Vec<PathBuf>,

    /// Directory for temporary per-type FEATURE buckets
    #[arg(short = 'f', long, default_value = "ff")]
    ff_dir: PathBuf,

    /// Output stats FEATURE file
    #[arg(short = 'b', long, default_value = BACKGROUND_FF_DEFAULT)]
    background: PathBuf,

    /// Output normalization coefficients
    #[arg(short = 'n', long, default_value = BACKGROUND_COEFF_DEFAULT)]
    normalization: PathBuf,

    /// Which center pairs to compute normalizations for
    #[arg(short = 'p', long, default_value = "classes")]
    allowed_pairs: String,

    /// Similarity method for the score statistics
    #[arg(short = 'C', long, default_value = "tanimoto")]
    compare_method: String,

    /// Standard deviations between features counted as similar
    #[arg(short = 't', long, default_value_t = 1.0)]
    std_threshold: f64,

    /// Ligand-to-center distance cutoff in Angstroms
    #[arg(short = 'd', long, default_value_t = 6.0)]
    distance: f64,

    /// Resume with existing buckets and completed pairs
    #[arg(short = 'r', long, default_value_t = false)]
    resume: bool,

    /// Featurize timeout in seconds
    #[arg(long, default_value_t = 300)]
    featurize_timeout: u64,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Compare(args) => run_compare(args),
        Commands::BuildBackground(args) => run_build(args),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

/// Search for a background file: explicit path, working directory,
/// then POCKETFEATURE_DIR and FEATURE_DIR.
fn resolve_data_file(explicit: Option<&Path>, name: &str) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(PocketError::setup(format!(
            "{} does not exist",
            path.display()
        )));
    }
    let local = PathBuf::from(name);
    if local.exists() {
        return Ok(local);
    }
    for var in ["POCKETFEATURE_DIR", "FEATURE_DIR"] {
        if let Some(dir) = std::env::var_os(var) {
            let candidate = PathBuf::from(dir).join(name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }
    Err(PocketError::setup(format!(
        "{name} not found in working directory, POCKETFEATURE_DIR, or FEATURE_DIR"
    )))
}

fn load_catalogue(centers: Option<&Path>) -> Result<CenterCatalogue> {
    match centers {
        Some(path) => {
            let file = std::fs::File::open(path)
                .map_err(|e| PocketError::setup(format!("cannot open {}: {e}", path.display())))?;
            let rows = centersfile::load(std::io::BufReader::new(file))?;
            CenterCatalogue::from_rows(&rows)
        }
        None => Ok(CenterCatalogue::standard()),
    }
}

fn split_ligands(spec: Option<&str>) -> Option<Vec<String>> {
    spec.map(|s| {
        s.split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    })
}

fn run_compare(args: CompareArgs) -> Result<()> {
    let background_path = resolve_data_file(args.background.as_deref(), BACKGROUND_FF_DEFAULT)?;
    let normalization_path =
        resolve_data_file(args.normalization.as_deref(), BACKGROUND_COEFF_DEFAULT)?;

    let catalogue = load_catalogue(args.centers.as_deref())?;
    info!("loading background");
    let bundle = backgroundfile::load(
        &background_path,
        &normalization_path,
        args.scale_params.as_deref(),
    )?;
    let background = BackgroundEnvironment::from_bundle(
        &bundle,
        &catalogue,
        AllowedPairs::from_name(&args.allowed_pairs)?,
        SimilarityMethod::from_name(&args.comparison_method)?,
        ScaleMethod::from_name(&args.scale_method)?,
        args.std_threshold,
    )?;

    let featurizer = ExternalFeaturizer {
        timeout: Duration::from_secs(args.featurize_timeout),
        ..Default::default()
    };

    let options = CompareOptions {
        model_a: args.model_a,
        model_b: args.model_b,
        chain_a: args.chain_a,
        chain_b: args.chain_b,
        ligand_a: split_ligands(args.ligand_a.as_deref()),
        ligand_b: split_ligands(args.ligand_b.as_deref()),
        alignment: AlignmentMethod::from_name(&args.alignment_method)?,
        distance: args.distance,
        cutoff: args.cutoff,
    };

    let report = compare_pockets(
        &args.pdb_a,
        &args.pdb_b,
        &background,
        &catalogue,
        &featurizer,
        &options,
    )?;
    println!("{}", pocketfeature_compare::CompareReport::TSV_HEADER);
    println!("{}", report.to_tsv_row());
    Ok(())
}

fn run_build(args: BuildArgs) -> Result<()> {
    let catalogue = CenterCatalogue::standard();
    let options = BackgroundBuilderOptions {
        ff_dir: args.ff_dir,
        background_path: args.background,
        normalization_path: args.normalization,
        distance: args.distance,
        std_threshold: args.std_threshold,
        similarity: SimilarityMethod::from_name(&args.compare_method)?,
        allowed_pairs: AllowedPairs::from_name(&args.allowed_pairs)?,
        resume: args.resume,
    };
    let featurizer = ExternalFeaturizer {
        timeout: Duration::from_secs(args.featurize_timeout),
        ..Default::default()
    };
    let builder = BackgroundBuilder::new(options, catalogue);
    let (stats, norms) = builder.build(&args.pdbs, &featurizer)?;
    info!(
        "background complete: {} stats vectors, {} normalization entries",
        stats.len(),
        norms.len()
    );
    Ok(())
}
