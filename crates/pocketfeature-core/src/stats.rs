//! Streaming first/second moment statistics.
//!
//! Welford's online formulation for single updates and the Chan/Pebay
//! parallel formulation for merges. Never computes sum-of-squares minus
//! squared-sum, which loses precision catastrophically for large corpora.

use serde::{Deserialize, Serialize};

use crate::errors::{PocketError, Result};

/// Streaming mean/variance accumulator over fixed-dimension samples.
///
/// The first recorded sample fixes the dimension; scalars are dimension 1.
/// Merging is associative to floating-point tolerance, so partial
/// accumulators from parallel workers can be combined in any order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GaussianStats {
    n: u64,
    mean: Vec<f64>,
    m2: Vec<f64>,
    mins: Vec<f64>,
    maxes: Vec<f64>,
}

impl GaussianStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample with a single Welford update.
    pub fn record(&mut self, sample: &[f64]) -> Result<()> {
        if self.n == 0 {
            self.mean = sample.to_vec();
            self.m2 = vec![0.0; sample.len()];
            self.mins = sample.to_vec();
            self.maxes = sample.to_vec();
            self.n = 1;
            return Ok(());
        }
        if sample.len() != self.mean.len() {
            return Err(PocketError::internal(format!(
                "sample dimension {} does not match accumulator dimension {}",
                sample.len(),
                self.mean.len()
            )));
        }
        self.n += 1;
        let n = self.n as f64;
        for i in 0..sample.len() {
            let delta = sample[i] - self.mean[i];
            self.mean[i] += delta / n;
            self.m2[i] += delta * (sample[i] - self.mean[i]);
            self.mins[i] = self.mins[i].min(sample[i]);
            self.maxes[i] = self.maxes[i].max(sample[i]);
        }
        Ok(())
    }

    /// Record a scalar sample (dimension-1 accumulator).
    pub fn record_scalar(&mut self, sample: f64) -> Result<()> {
        self.record(&[sample])
    }

    /// Merge two accumulators (Chan/Pebay parallel formulation).
    pub fn merge(&self, other: &GaussianStats) -> GaussianStats {
        if self.n == 0 {
            return other.clone();
        }
        if other.n == 0 {
            return self.clone();
        }
        let n = self.n + other.n;
        let nf = n as f64;
        let (na, nb) = (self.n as f64, other.n as f64);

        let dim = self.mean.len();
        let mut mean = vec![0.0; dim];
        let mut m2 = vec![0.0; dim];
        let mut mins = vec![0.0; dim];
        let mut maxes = vec![0.0; dim];
        for i in 0..dim {
            let delta = other.mean[i] - self.mean[i];
            mean[i] = (na * self.mean[i] + nb * other.mean[i]) / nf;
            m2[i] = self.m2[i] + other.m2[i] + delta * delta * (na * nb / nf);
            mins[i] = self.mins[i].min(other.mins[i]);
            maxes[i] = self.maxes[i].max(other.maxes[i]);
        }

        GaussianStats {
            n,
            mean,
            m2,
            mins,
            maxes,
        }
    }

    /// Number of recorded samples
    pub fn len(&self) -> u64 {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Sample dimension (0 before the first record)
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Sample variance (n - 1 denominator); zeros when n < 2
    pub fn variance(&self) -> Vec<f64> {
        if self.n < 2 {
            return vec![0.0; self.m2.len()];
        }
        let denom = (self.n - 1) as f64;
        self.m2.iter().map(|m| m / denom).collect()
    }

    /// Sample standard deviation
    pub fn std_dev(&self) -> Vec<f64> {
        self.variance().iter().map(|v| v.sqrt()).collect()
    }

    /// Population variance (n denominator)
    pub fn population_variance(&self) -> Vec<f64> {
        if self.n == 0 {
            return Vec::new();
        }
        let denom = self.n as f64;
        self.m2.iter().map(|m| m / denom).collect()
    }

    pub fn mins(&self) -> &[f64] {
        &self.mins
    }

    pub fn maxes(&self) -> &[f64] {
        &self.maxes
    }
}
