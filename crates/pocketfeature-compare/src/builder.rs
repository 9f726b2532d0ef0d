//! Background construction over a reference corpus.
//!
//! Two passes: (1) extract and featurize every pocket, sorting vectors
//! into per-center-code bucket files while accumulating global feature
//! statistics; (2) stream bucket pairs to estimate the similarity-score
//! distribution of every allowed center-pair class.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;

use pocketfeature_core::{GaussianStats, PocketError, Result};
use pocketfeature_io::backgroundfile::{MEAN_VECTOR, NORM_COLUMNS, STD_DEV_VECTOR, VAR_VECTOR};
use pocketfeature_io::featurefile::{self, FeatureFile, FeatureVector};
use pocketfeature_io::matrixvalues::{self, MatrixValues};
use pocketfeature_io::metadata::{FeatureMetadata, MetaValue};

use crate::background::{cutoff_similarity, vector_type, SimilarityMethod};
use crate::featurize::Featurizer;
use crate::pipeline::AllowedPairs;
use crate::pocket::{build_pocket, PocketBuilderOptions};
use crate::residues::CenterCatalogue;
use crate::structure::ProteinStructure;

/// Options for a background build run
#[derive(Debug, Clone)]
pub struct BackgroundBuilderOptions {
    /// Working directory for per-type bucket files
    pub ff_dir: PathBuf,
    /// Output path for the stats FEATURE file
    pub background_path: PathBuf,
    /// Output path for the normalization coefficients
    pub normalization_path: PathBuf,
    /// Ligand-to-center distance cutoff
    pub distance: f64,
    /// Threshold scale applied to the corpus std-dev
    pub std_threshold: f64,
    /// Similarity used for the score statistics
    pub similarity: SimilarityMethod,
    /// Pair classes to compute normalizations for
    pub allowed_pairs: AllowedPairs,
    /// Pick up a previous run's buckets and completed pairs
    pub resume: bool,
}

impl Default for BackgroundBuilderOptions {
    fn default() -> Self {
        Self {
            ff_dir: PathBuf::from("ff"),
            background_path: PathBuf::from("background.ff"),
            normalization_path: PathBuf::from("background.coeffs"),
            distance: 6.0,
            std_threshold: 1.0,
            similarity: SimilarityMethod::Tanimoto,
            allowed_pairs: AllowedPairs::Classes,
            resume: false,
        }
    }
}

/// Builds background statistics from a corpus of PDB files.
pub struct BackgroundBuilder {
    options: BackgroundBuilderOptions,
    catalogue: CenterCatalogue,
    stop: Arc<AtomicBool>,
}

impl BackgroundBuilder {
    pub fn new(options: BackgroundBuilderOptions, catalogue: CenterCatalogue) -> Self {
        Self {
            options,
            catalogue,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cooperative stop flag, checked between units of work. A stopped
    /// run leaves bucket files intact for a later `resume = true` run.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Run the full build: bucket vectors, write the stats FEATURE file,
    /// then the per-pair normalization coefficients.
    pub fn build(
        &self,
        pdbs: &[PathBuf],
        featurizer: &dyn Featurizer,
    ) -> Result<(FeatureFile, MatrixValues)> {
        self.prepare_ff_dir()?;
        self.bucket_corpus(pdbs, featurizer)?;
        let stats_file = self.write_vector_stats()?;
        let norms = self.write_score_stats(&stats_file)?;
        Ok((stats_file, norms))
    }

    fn prepare_ff_dir(&self) -> Result<()> {
        let dir = &self.options.ff_dir;
        if dir.exists() {
            let populated = fs::read_dir(dir)?.next().is_some();
            if populated && !self.options.resume {
                return Err(PocketError::setup(format!(
                    "{} is not empty; pass resume to reuse existing buckets",
                    dir.display()
                )));
            }
            if populated {
                info!("resuming with existing buckets in {}", dir.display());
            }
        } else {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    fn bucket_path(&self, type_code: &str) -> PathBuf {
        self.options.ff_dir.join(format!("{type_code}.ff"))
    }

    /// Per-PDB: extract the pocket, featurize it, and append each vector
    /// to its type's bucket file. Failures skip the PDB with a warning.
    fn bucket_corpus(&self, pdbs: &[PathBuf], featurizer: &dyn Featurizer) -> Result<()> {
        let mut writers: BTreeMap<String, BufWriter<File>> = BTreeMap::new();
        let mut num_pockets = 0usize;
        let mut num_vectors = 0usize;
        for path in pdbs {
            if self.stopped() {
                warn!("stop requested; leaving buckets on disk");
                break;
            }
            match self.bucket_one(path, featurizer, &mut writers) {
                Ok(count) => {
                    num_pockets += 1;
                    num_vectors += count;
                }
                Err(err) => warn!("skipping {}: {err}", path.display()),
            }
        }
        for writer in writers.values_mut() {
            writer.flush()?;
        }
        info!("bucketed {num_vectors} vectors from {num_pockets} pockets");
        Ok(())
    }

    fn bucket_one(
        &self,
        path: &Path,
        featurizer: &dyn Featurizer,
        writers: &mut BTreeMap<String, BufWriter<File>>,
    ) -> Result<usize> {
        let structure = ProteinStructure::from_pdb_file(path)?;
        let ligand = structure
            .pick_best_ligand()
            .ok_or_else(|| PocketError::no_pocket(format!("no ligand in {}", path.display())))?;
        let pocket = build_pocket(
            &structure,
            ligand,
            &self.catalogue,
            &PocketBuilderOptions {
                cutoff: self.options.distance,
                ..Default::default()
            },
        )?;
        if pocket.is_empty() {
            return Err(PocketError::empty(format!(
                "no residues within cutoff for {}",
                pocket.signature_string()
            )));
        }
        let features = featurizer.featurize(&pocket.points())?;
        let mut written = 0usize;
        for vector in features.iter() {
            let Some(type_code) = vector_type(vector) else {
                warn!("vector {} has no type code", vector.name);
                continue;
            };
            let bucket = self.bucket_path(&type_code);
            if !writers.contains_key(&type_code) {
                let fresh = !bucket.exists();
                let file = OpenOptions::new().create(true).append(true).open(&bucket)?;
                let mut writer = BufWriter::new(file);
                if fresh {
                    write!(writer, "{}", vector.metadata().dump())?;
                }
                writers.insert(type_code.clone(), writer);
            }
            let writer = writers.get_mut(&type_code).expect("writer just inserted");
            writeln!(writer, "{}", featurefile::format_vector(vector))?;
            written += 1;
        }
        Ok(written)
    }

    fn bucket_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut buckets = Vec::new();
        for entry in fs::read_dir(&self.options.ff_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("ff") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    buckets.push((stem.to_string(), path.clone()));
                }
            }
        }
        buckets.sort();
        Ok(buckets)
    }

    /// Merge per-bucket Gaussian statistics into the global MEAN/VAR/STD
    /// FEATURE file. Buckets are processed in parallel and merged with
    /// the associative formulation.
    fn write_vector_stats(&self) -> Result<FeatureFile> {
        if self.options.resume && self.options.background_path.exists() {
            info!(
                "reusing vector stats from {}",
                self.options.background_path.display()
            );
            let file = File::open(&self.options.background_path)?;
            return featurefile::load(BufReader::new(file), None);
        }

        let buckets = self.bucket_files()?;
        if buckets.is_empty() {
            return Err(PocketError::empty(
                "no bucket files; corpus produced no vectors".to_string(),
            ));
        }
        let partials: Vec<Result<(GaussianStats, Option<Arc<FeatureMetadata>>)>> = buckets
            .par_iter()
            .map(|(_, path)| {
                let file = File::open(path)?;
                let vectors = featurefile::load(BufReader::new(file), None)?;
                let mut stats = GaussianStats::new();
                for vector in vectors.iter() {
                    stats.record(&vector.features)?;
                }
                Ok((stats, Some(vectors.metadata().clone())))
            })
            .collect();

        let mut stats = GaussianStats::new();
        let mut metadata: Option<Arc<FeatureMetadata>> = None;
        for partial in partials {
            let (partial_stats, partial_metadata) = partial?;
            stats = stats.merge(&partial_stats);
            metadata = metadata.or(partial_metadata);
        }
        let metadata = metadata
            .ok_or_else(|| PocketError::empty("bucket files contained no vectors".to_string()))?;

        let stats_file = stats_feature_file(&stats, &metadata)?;
        let mut out = BufWriter::new(File::create(&self.options.background_path)?);
        featurefile::dump(&stats_file, &mut out)?;
        out.flush()?;
        info!(
            "wrote vector stats over {} vectors to {}",
            stats.len(),
            self.options.background_path.display()
        );
        Ok(stats_file)
    }

    /// Per allowed center-pair class, stream bucket x bucket similarity
    /// scores into a scalar accumulator and emit `(mode, std_dev)`.
    fn write_score_stats(&self, stats_file: &FeatureFile) -> Result<MatrixValues> {
        let std_dev = stats_file
            .get(STD_DEV_VECTOR)
            .ok_or_else(|| PocketError::internal("stats file lost its STD vector".to_string()))?;
        let thresholds: Vec<f64> = std_dev
            .features
            .iter()
            .map(|s| s * self.options.std_threshold)
            .collect();

        let allowed = match self.options.allowed_pairs {
            AllowedPairs::All => self.catalogue.all_pairs(),
            AllowedPairs::Classes => self.catalogue.class_pairs(),
        };

        let completed: MatrixValues =
            if self.options.resume && self.options.normalization_path.exists() {
                let file = File::open(&self.options.normalization_path)?;
                pocketfeature_io::backgroundfile::load_normalizations(BufReader::new(file))
                    .unwrap_or_default()
            } else {
                MatrixValues::with_value_names(&NORM_COLUMNS)
            };
        let finished: HashSet<(String, String)> = completed
            .iter()
            .filter(|(k, _)| k.len() == 2)
            .map(|(k, _)| (k[0].clone(), k[1].clone()))
            .collect();

        let buckets = self.bucket_files()?;
        let mut tasks: Vec<((String, String), (PathBuf, PathBuf))> = Vec::new();
        for (i, (type_a, path_a)) in buckets.iter().enumerate() {
            for (type_b, path_b) in &buckets[i..] {
                let key = CenterCatalogue::pair_key(type_a, type_b);
                if allowed.contains(&key) && !finished.contains(&key) {
                    tasks.push((key, (path_a.clone(), path_b.clone())));
                }
            }
        }
        info!(
            "computing score statistics for {} center pairs ({} already done)",
            tasks.len(),
            finished.len()
        );

        let similarity = self.options.similarity;
        let stop = self.stop.clone();
        let computed: Vec<Result<((String, String), (f64, f64))>> = tasks
            .par_iter()
            .map(|(key, (path_a, path_b))| {
                if stop.load(Ordering::Relaxed) {
                    return Err(PocketError::timeout("build cancelled".to_string()));
                }
                let stats = score_pair_stats(path_a, path_b, similarity, &thresholds)?;
                let (mode, std) = if stats.is_empty() {
                    (0.0, 0.0)
                } else {
                    (stats.mean()[0], stats.std_dev()[0])
                };
                Ok((key.clone(), (mode, std)))
            })
            .collect();

        // Aggregate in sorted key order so output is deterministic
        // regardless of task completion order
        let mut entries: BTreeMap<(String, String), (f64, f64)> = BTreeMap::new();
        for (key, values) in completed.iter() {
            if key.len() == 2 {
                entries.insert(
                    (key[0].clone(), key[1].clone()),
                    (
                        values.first().copied().unwrap_or(0.0),
                        values.get(1).copied().unwrap_or(0.0),
                    ),
                );
            }
        }
        for result in computed {
            let (key, values) = result?;
            entries.insert(key, values);
        }

        let norms = MatrixValues::from_entries(
            entries
                .into_iter()
                .map(|((a, b), (mode, std))| (vec![a, b], vec![mode, std])),
            &NORM_COLUMNS,
        );
        let mut out = BufWriter::new(File::create(&self.options.normalization_path)?);
        matrixvalues::dump(&norms, &mut out, true)?;
        out.flush()?;
        info!(
            "wrote {} normalization entries to {}",
            norms.len(),
            self.options.normalization_path.display()
        );
        Ok(norms)
    }
}

/// Scalar similarity statistics over the cartesian product of two
/// bucket files.
fn score_pair_stats(
    path_a: &Path,
    path_b: &Path,
    similarity: SimilarityMethod,
    thresholds: &[f64],
) -> Result<GaussianStats> {
    let file_a = featurefile::load(BufReader::new(File::open(path_a)?), None)?;
    let file_b = featurefile::load(BufReader::new(File::open(path_b)?), None)?;
    let mut stats = GaussianStats::new();
    for a in file_a.iter() {
        for b in file_b.iter() {
            let score = cutoff_similarity(similarity, thresholds, &a.features, &b.features, false);
            stats.record_scalar(score)?;
        }
    }
    Ok(stats)
}

/// Assemble the MEAN/VAR/STD FEATURE file from accumulated statistics.
fn stats_feature_file(stats: &GaussianStats, metadata: &Arc<FeatureMetadata>) -> Result<FeatureFile> {
    let mut background_metadata = FeatureMetadata::default();
    background_metadata.set(
        "PROPERTIES",
        MetaValue::List(metadata.properties().to_vec()),
    );
    background_metadata.set("SHELLS", MetaValue::Int(metadata.num_shells() as i64));
    background_metadata.set("SHELL_WIDTH", MetaValue::Float(metadata.shell_width()));
    background_metadata.set(
        "COMMENTS",
        MetaValue::List(vec!["N".to_string()]),
    );
    let background_metadata = Arc::new(background_metadata);

    let count_comment = vec![stats.len().to_string()];
    let mut file = FeatureFile::new(background_metadata.clone());
    for (name, features) in [
        (MEAN_VECTOR, stats.mean().to_vec()),
        (VAR_VECTOR, stats.variance()),
        (STD_DEV_VECTOR, stats.std_dev()),
    ] {
        file.append(FeatureVector::new(
            background_metadata.clone(),
            name,
            features,
            None,
            count_comment.clone(),
        )?)?;
    }
    Ok(file)
}
