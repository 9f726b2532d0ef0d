//! Background bundle loading.
//!
//! A background is a triple `(stats.ff, norms.matrixvalues[, scale.txt])`:
//! a FEATURE file holding the corpus `MEAN`/`VAR`/`STD` vectors, a
//! MatrixValues of per-center-pair normalization coefficients, and an
//! optional score-scaling parameter file.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::debug;

use pocketfeature_core::{PocketError, Result};

use crate::featurefile::{self, FeatureFile};
use crate::matrixvalues::{self, MatrixValues};

/// Name of the corpus mean vector in a background FEATURE file
pub const MEAN_VECTOR: &str = "MEAN";
/// Name of the corpus variance vector
pub const VAR_VECTOR: &str = "VAR";
/// Name of the corpus standard-deviation vector
pub const STD_DEV_VECTOR: &str = "STD";

/// Normalization coefficient column names
pub const NORM_COLUMNS: [&str; 2] = ["mode", "std_dev"];

/// A score-scaling method and its fitted parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleSpec {
    pub method: String,
    pub params: Vec<f64>,
}

impl ScaleSpec {
    /// Parse a scale file: first line is the method name, the remaining
    /// whitespace-delimited tokens are float parameters.
    pub fn load<R: BufRead>(reader: R) -> Result<ScaleSpec> {
        let mut lines = reader.lines();
        let method = lines
            .next()
            .transpose()?
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| PocketError::format("empty scale file".to_string()))?;
        let mut params = Vec::new();
        for line in lines {
            for token in line?.split_whitespace() {
                let value = token.parse::<f64>().map_err(|_| {
                    PocketError::format(format!("bad scale parameter: {token:?}"))
                })?;
                params.push(value);
            }
        }
        Ok(ScaleSpec { method, params })
    }

    pub fn loads(data: &str) -> Result<ScaleSpec> {
        Self::load(data.as_bytes())
    }
}

/// The loaded pieces of a background bundle.
#[derive(Debug, Clone)]
pub struct BackgroundBundle {
    pub stats: FeatureFile,
    pub normalizations: MatrixValues,
    pub scale: Option<ScaleSpec>,
}

impl BackgroundBundle {
    /// The standard-deviation vector; required for any use of the bundle.
    pub fn std_dev(&self) -> Result<&crate::featurefile::FeatureVector> {
        self.stats.get(STD_DEV_VECTOR).ok_or_else(|| {
            PocketError::setup(format!(
                "background stats file has no {STD_DEV_VECTOR} vector"
            ))
        })
    }

    /// The mean vector, when the bundle carries one.
    pub fn mean(&self) -> Option<&crate::featurefile::FeatureVector> {
        self.stats.get(MEAN_VECTOR)
    }
}

/// Load a background bundle from its file paths.
pub fn load(
    stats_path: &Path,
    norms_path: &Path,
    scale_path: Option<&Path>,
) -> Result<BackgroundBundle> {
    debug!("loading background stats from {}", stats_path.display());
    let stats_file = File::open(stats_path).map_err(|e| {
        PocketError::setup(format!("cannot open {}: {e}", stats_path.display()))
    })?;
    let stats = featurefile::load(BufReader::new(stats_file), None)?;

    debug!("loading normalizations from {}", norms_path.display());
    let norms_file = File::open(norms_path).map_err(|e| {
        PocketError::setup(format!("cannot open {}: {e}", norms_path.display()))
    })?;
    let normalizations = load_normalizations(BufReader::new(norms_file))?;

    let scale = match scale_path {
        Some(path) => {
            debug!("loading scale parameters from {}", path.display());
            let file = File::open(path)
                .map_err(|e| PocketError::setup(format!("cannot open {}: {e}", path.display())))?;
            Some(ScaleSpec::load(BufReader::new(file))?)
        }
        None => None,
    };

    let bundle = BackgroundBundle {
        stats,
        normalizations,
        scale,
    };
    bundle.std_dev()?;
    Ok(bundle)
}

/// Parse the normalization coefficients, sniffing the optional header
/// and projecting to the `(mode, std_dev)` columns.
pub fn load_normalizations<R: BufRead>(mut reader: R) -> Result<MatrixValues> {
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    let header = contents.lines().next().is_some_and(|l| l.starts_with("INDEX"));
    let matrix = if header {
        matrixvalues::load_columns(contents.as_bytes(), 2, true, Some(&NORM_COLUMNS[..]))
            .or_else(|_| matrixvalues::loads(&contents, 2, true))?
    } else {
        matrixvalues::loads(&contents, 2, false)?
    };
    if matrix.is_empty() {
        return Err(PocketError::setup(
            "normalization table is empty".to_string(),
        ));
    }
    Ok(matrix)
}
