//! Background model: corpus statistics and the similarity machinery
//! parameterised by them.

use std::collections::HashSet;
use std::sync::OnceLock;

use log::debug;

use pocketfeature_core::{PocketError, Result};
use pocketfeature_io::backgroundfile::BackgroundBundle;
use pocketfeature_io::featurefile::{FeatureFile, FeatureVector};
use pocketfeature_io::matrixvalues::MatrixValues;
use pocketfeature_io::metadata::{DESCRIPTION, RESIDUE_TYPE};

use crate::pipeline::AllowedPairs;
use crate::residues::CenterCatalogue;

/// Raw score column name
pub const RAW_SCORE: &str = "raw";
/// Normalized score column name
pub const NORMALIZED_SCORE: &str = "normalized";

/// Cutoff-based set similarity over feature arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMethod {
    Tanimoto,
    Dice,
    Tversky22,
}

impl SimilarityMethod {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "tanimoto" => Ok(Self::Tanimoto),
            "dice" => Ok(Self::Dice),
            "tversky22" => Ok(Self::Tversky22),
            other => Err(PocketError::input(format!(
                "unknown comparison method: {other}"
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tanimoto => "tanimoto",
            Self::Dice => "dice",
            Self::Tversky22 => "tversky22",
        }
    }
}

/// Alignment-score scaling methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMethod {
    None,
    Tanimoto,
    Evalue,
    FittedZ,
    FittedEvd,
}

impl ScaleMethod {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "none" => Ok(Self::None),
            "tanimoto" => Ok(Self::Tanimoto),
            "evalue" => Ok(Self::Evalue),
            "fitted-z" => Ok(Self::FittedZ),
            "fitted-evd" => Ok(Self::FittedEvd),
            other => Err(PocketError::input(format!("unknown scale method: {other}"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Tanimoto => "tanimoto",
            Self::Evalue => "evalue",
            Self::FittedZ => "fitted-z",
            Self::FittedEvd => "fitted-evd",
        }
    }
}

/// Pocket sizes that parameterise score scaling
#[derive(Debug, Clone, Copy)]
pub struct AlignmentSizes {
    pub num_a: usize,
    pub num_b: usize,
    pub num_scored: usize,
    pub num_aligned: usize,
}

/// Compute a cutoff similarity between two feature arrays.
///
/// The union mask keeps indices where either value is non-zero (and,
/// when `same_sign` is set, the signs agree); the intersection further
/// requires `|a - b| < threshold`.
pub fn cutoff_similarity(
    method: SimilarityMethod,
    thresholds: &[f64],
    a: &[f64],
    b: &[f64],
    same_sign: bool,
) -> f64 {
    let mut union = 0usize;
    let mut intersection = 0usize;
    let mut a_present = 0usize;
    let mut b_present = 0usize;
    let mut only_a = 0usize;
    let mut only_b = 0usize;
    for i in 0..a.len().min(b.len()) {
        let (ai, bi) = (a[i], b[i]);
        if ai == 0.0 && bi == 0.0 {
            continue;
        }
        if same_sign && ai != 0.0 && bi != 0.0 && (ai > 0.0) != (bi > 0.0) {
            continue;
        }
        union += 1;
        if ai != 0.0 {
            a_present += 1;
        }
        if bi != 0.0 {
            b_present += 1;
        }
        if ai != 0.0 && bi == 0.0 {
            only_a += 1;
        }
        if bi != 0.0 && ai == 0.0 {
            only_b += 1;
        }
        if (ai - bi).abs() < thresholds.get(i).copied().unwrap_or(0.0) {
            intersection += 1;
        }
    }
    if union == 0 {
        return 0.0;
    }
    match method {
        SimilarityMethod::Tanimoto => intersection as f64 / union as f64,
        SimilarityMethod::Dice => {
            let denom = (a_present + b_present) as f64;
            if denom == 0.0 {
                0.0
            } else {
                2.0 * intersection as f64 / denom
            }
        }
        SimilarityMethod::Tversky22 => {
            const ALPHA: f64 = 0.2;
            const BETA: f64 = 0.2;
            const GAMMA: f64 = 1.0;
            let denom = intersection as f64 + ALPHA * only_a as f64 + BETA * only_b as f64;
            if denom == 0.0 {
                0.0
            } else {
                GAMMA * intersection as f64 / denom
            }
        }
    }
}

/// Map a raw similarity against its background mode:
/// `2 / (1 + (score/mode)^2) - 1`.
///
/// The background mean maps to 0, high similarities approach -1, and
/// dissimilar pairs approach +1 (negative is better).
pub fn normalize_score(score: f64, mode: f64) -> f64 {
    if mode == 0.0 {
        return if score == 0.0 { 0.0 } else { -1.0 };
    }
    let ratio = score / mode;
    2.0 / (1.0 + ratio * ratio) - 1.0
}

/// The microenvironment type code of a vector.
///
/// The `RESIDUE_TYPE` comment is authoritative when present; otherwise
/// the last whitespace-delimited token of `DESCRIPTION` is used.
pub fn vector_type(vector: &FeatureVector) -> Option<String> {
    if let Some(code) = vector.named_comment(RESIDUE_TYPE) {
        let code = code.trim();
        if !code.is_empty() {
            return Some(code.to_string());
        }
    }
    vector
        .named_comment(DESCRIPTION)
        .and_then(|d| d.split_whitespace().last())
        .map(|s| s.to_string())
}

/// The display name of a vector: the first token of its `DESCRIPTION`
/// comment, falling back to the vector name.
pub fn vector_description(vector: &FeatureVector) -> String {
    vector
        .named_comment(DESCRIPTION)
        .and_then(|d| d.split_whitespace().next())
        .unwrap_or(&vector.name)
        .to_string()
}

/// A calculated background: corpus std-dev (and optionally mean),
/// per-center-pair normalization coefficients, and the similarity,
/// normalization, and scaling functions they parameterise.
#[derive(Debug)]
pub struct BackgroundEnvironment {
    std_dev: FeatureVector,
    mean: Option<FeatureVector>,
    normalizations: MatrixValues,
    allowed_pairs: Option<HashSet<(String, String)>>,
    similarity: SimilarityMethod,
    scale: ScaleMethod,
    scale_params: Vec<f64>,
    std_threshold_scale: f64,
    same_sign: bool,
    thresholds: OnceLock<Vec<f64>>,
}

impl BackgroundEnvironment {
    /// Assemble an environment from a loaded bundle.
    ///
    /// The allowed-pair set is derived from the catalogue's class
    /// partition (or all centers as one class) and intersected with the
    /// keys present in the normalization table.
    pub fn from_bundle(
        bundle: &BackgroundBundle,
        catalogue: &CenterCatalogue,
        allowed_pairs: AllowedPairs,
        similarity: SimilarityMethod,
        scale: ScaleMethod,
        std_threshold: f64,
    ) -> Result<Self> {
        let std_dev = bundle.std_dev()?.clone();
        let mean = bundle.mean().cloned();
        let derived = match allowed_pairs {
            AllowedPairs::All => catalogue.all_pairs(),
            AllowedPairs::Classes => catalogue.class_pairs(),
        };
        let available: HashSet<(String, String)> = bundle
            .normalizations
            .iter()
            .filter(|(k, _)| k.len() == 2)
            .map(|(k, _)| (k[0].clone(), k[1].clone()))
            .collect();
        let allowed: HashSet<(String, String)> =
            derived.intersection(&available).cloned().collect();
        debug!(
            "{} allowed center pairs ({} derived, {} in normalization table)",
            allowed.len(),
            derived.len(),
            available.len()
        );

        let scale_params = bundle
            .scale
            .as_ref()
            .filter(|s| s.method == scale.name())
            .map(|s| s.params.clone())
            .unwrap_or_default();

        Ok(Self {
            std_dev,
            mean,
            normalizations: bundle.normalizations.clone(),
            allowed_pairs: Some(allowed),
            similarity,
            scale,
            scale_params,
            std_threshold_scale: std_threshold,
            same_sign: false,
            thresholds: OnceLock::new(),
        })
    }

    /// Build an environment from parts (used by tests and the builder).
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        std_dev: FeatureVector,
        mean: Option<FeatureVector>,
        normalizations: MatrixValues,
        allowed_pairs: Option<HashSet<(String, String)>>,
        similarity: SimilarityMethod,
        scale: ScaleMethod,
        scale_params: Vec<f64>,
        std_threshold: f64,
    ) -> Self {
        Self {
            std_dev,
            mean,
            normalizations,
            allowed_pairs,
            similarity,
            scale,
            scale_params,
            std_threshold_scale: std_threshold,
            same_sign: false,
            thresholds: OnceLock::new(),
        }
    }

    /// Per-feature thresholds: `std_dev * std_threshold_scale`
    pub fn thresholds(&self) -> &[f64] {
        self.thresholds.get_or_init(|| {
            self.std_dev
                .features
                .iter()
                .map(|s| s * self.std_threshold_scale)
                .collect()
        })
    }

    pub fn mean(&self) -> Option<&FeatureVector> {
        self.mean.as_ref()
    }

    pub fn std_dev(&self) -> &FeatureVector {
        &self.std_dev
    }

    pub fn normalizations(&self) -> &MatrixValues {
        &self.normalizations
    }

    /// Raw similarity between two vectors
    pub fn similarity(&self, a: &FeatureVector, b: &FeatureVector) -> f64 {
        cutoff_similarity(
            self.similarity,
            self.thresholds(),
            &a.features,
            &b.features,
            self.same_sign,
        )
    }

    /// Sorted center-pair key for two vectors, when both carry a type
    pub fn pair_key(&self, a: &FeatureVector, b: &FeatureVector) -> Option<(String, String)> {
        let type_a = vector_type(a)?;
        let type_b = vector_type(b)?;
        Some(CenterCatalogue::pair_key(&type_a, &type_b))
    }

    fn normalization_mode(&self, key: &(String, String)) -> Option<f64> {
        let lookup = vec![key.0.clone(), key.1.clone()];
        self.normalizations.get(&lookup).and_then(|v| v.first().copied())
    }

    fn is_allowed(&self, key: &(String, String)) -> bool {
        match &self.allowed_pairs {
            Some(allowed) => allowed.contains(key),
            None => true,
        }
    }

    /// Raw and normalized similarity for a vector pair, when the pair is
    /// allowed and has a normalization entry. Pairs without one are
    /// skipped silently.
    pub fn normalized_similarity(
        &self,
        a: &FeatureVector,
        b: &FeatureVector,
    ) -> Option<(f64, f64)> {
        let key = self.pair_key(a, b)?;
        if !self.is_allowed(&key) {
            return None;
        }
        let mode = self.normalization_mode(&key)?;
        let raw = self.similarity(a, b);
        Some((raw, normalize_score(raw, mode)))
    }

    /// Score every compatible vector pair across two files.
    pub fn compare_files(
        &self,
        file_a: &FeatureFile,
        file_b: &FeatureFile,
    ) -> Vec<((String, String), (f64, f64))> {
        let mut scores = Vec::new();
        for a in file_a.iter() {
            for b in file_b.iter() {
                if let Some((raw, normalized)) = self.normalized_similarity(a, b) {
                    scores.push((
                        (vector_description(a), vector_description(b)),
                        (raw, normalized),
                    ));
                }
            }
        }
        scores
    }

    /// Score matrix with value dims `(raw, normalized)`.
    pub fn comparison_matrix(&self, file_a: &FeatureFile, file_b: &FeatureFile) -> MatrixValues {
        MatrixValues::from_entries(
            self.compare_files(file_a, file_b)
                .into_iter()
                .map(|((a, b), (raw, norm))| (vec![a, b], vec![raw, norm])),
            &[RAW_SCORE, NORMALIZED_SCORE],
        )
    }

    /// Apply the configured scale function to a total alignment score.
    pub fn scale_alignment_score(&self, sizes: &AlignmentSizes, score: f64) -> f64 {
        scale_score(self.scale, &self.scale_params, sizes, score)
    }
}

/// Apply a scale method to a total alignment score.
pub fn scale_score(
    method: ScaleMethod,
    params: &[f64],
    sizes: &AlignmentSizes,
    score: f64,
) -> f64 {
    match method {
        ScaleMethod::None => score,
        ScaleMethod::Tanimoto => {
            let denom = (sizes.num_a + sizes.num_b) as f64 - sizes.num_aligned as f64;
            if denom == 0.0 {
                0.0
            } else {
                (sizes.num_aligned as f64 / denom) * score
            }
        }
        ScaleMethod::Evalue => {
            if sizes.num_aligned == 0 || score == 0.0 {
                return 0.0;
            }
            let (l, k) = if params.len() >= 2 {
                (params[0], params[1])
            } else {
                (5.0, 10.0)
            };
            let aligned = sizes.num_aligned as f64;
            let scale = k * (sizes.num_a as f64 * sizes.num_b as f64) / (aligned * aligned);
            scale * (l * score).exp()
        }
        ScaleMethod::FittedZ => fitted_z(params, score),
        ScaleMethod::FittedEvd => {
            let z = fitted_z(params, score);
            let (loc, scale) = if params.len() >= 8 {
                (params[6], params[7])
            } else {
                (0.0, 1.0)
            };
            gumbel_pdf(z, loc, scale)
        }
    }
}

fn nonlinear_fit(x: f64, m: f64, p: f64, b: f64) -> f64 {
    m * x.powf(p) + b
}

fn fitted_z(params: &[f64], score: f64) -> f64 {
    if params.len() < 6 {
        return score;
    }
    let mu = nonlinear_fit(score, params[0], params[1], params[2]);
    let sigma = nonlinear_fit(score, params[3], params[4], params[5]);
    if sigma == 0.0 {
        0.0
    } else {
        (score - mu) / sigma
    }
}

/// Right-skewed Gumbel probability density
fn gumbel_pdf(x: f64, loc: f64, scale: f64) -> f64 {
    if scale <= 0.0 {
        return 0.0;
    }
    let z = (x - loc) / scale;
    (-(z + (-z).exp())).exp() / scale
}
