//! The external featurizer boundary.
//!
//! The FEATURE `featurize` program maps a pointfile to a stream of
//! FEATURE vectors. The core only depends on the [`Featurizer`] trait;
//! [`ExternalFeaturizer`] is the subprocess-backed implementation.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use log::{debug, warn};

use pocketfeature_core::{PdbPoint, PocketError, Result};
use pocketfeature_io::featurefile::{self, FeatureFile};
use pocketfeature_io::metadata::DESCRIPTION;
use pocketfeature_io::pointfile;

/// Maps named 3D points to FEATURE vectors.
pub trait Featurizer {
    fn featurize(&self, points: &[PdbPoint]) -> Result<FeatureFile>;
}

/// Runs the external `featurize` binary over a pointfile on stdin.
#[derive(Debug, Clone)]
pub struct ExternalFeaturizer {
    /// Path or name of the featurize binary
    pub binary: PathBuf,
    /// FEATURE parameter directory (FEATURE_DIR)
    pub feature_dir: Option<PathBuf>,
    /// PDB search directory (PDB_DIR)
    pub pdb_dir: Option<PathBuf>,
    /// DSSP search directory (DSSP_DIR)
    pub dssp_dir: Option<PathBuf>,
    /// Shell count override (-n)
    pub shells: Option<usize>,
    /// Shell width override (-w)
    pub shell_width: Option<f64>,
    /// Excluded residues override (-x)
    pub exclude: Vec<String>,
    /// Per-invocation deadline
    pub timeout: Duration,
    /// Process-level retries (spawn/pipe failures only)
    pub retries: u32,
}

impl Default for ExternalFeaturizer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("featurize"),
            feature_dir: std::env::var_os("FEATURE_DIR").map(PathBuf::from),
            pdb_dir: std::env::var_os("PDB_DIR").map(PathBuf::from),
            dssp_dir: std::env::var_os("DSSP_DIR").map(PathBuf::from),
            shells: None,
            shell_width: None,
            exclude: Vec::new(),
            timeout: Duration::from_secs(300),
            retries: 1,
        }
    }
}

impl ExternalFeaturizer {
    fn environment(&self) -> HashMap<&'static str, PathBuf> {
        let mut env = HashMap::new();
        if let Some(dir) = &self.feature_dir {
            env.insert("FEATURE_DIR", dir.clone());
        }
        if let Some(dir) = &self.pdb_dir {
            env.insert("PDB_DIR", dir.clone());
        }
        if let Some(dir) = &self.dssp_dir {
            env.insert("DSSP_DIR", dir.clone());
        }
        env
    }

    fn run_once(&self, input: &str) -> Result<String> {
        let mut command = Command::new(&self.binary);
        command
            .arg("-P")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(shells) = self.shells {
            command.arg("-n").arg(shells.to_string());
        }
        if let Some(width) = self.shell_width {
            command.arg("-w").arg(width.to_string());
        }
        if !self.exclude.is_empty() {
            command.arg("-x").arg(self.exclude.join(","));
        }
        for (key, value) in self.environment() {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|e| {
            PocketError::Io(std::io::Error::new(
                e.kind(),
                format!("cannot spawn {}: {e}", self.binary.display()),
            ))
        })?;

        // Feed the pointfile and close stdin so the process can finish
        let mut stdin = child.stdin.take().expect("stdin is piped");
        stdin.write_all(input.as_bytes())?;
        drop(stdin);

        // Drain stdout on a thread to avoid pipe deadlock on large output
        let mut stdout = child.stdout.take().expect("stdout is piped");
        let reader = std::thread::spawn(move || {
            let mut buf = String::new();
            stdout.read_to_string(&mut buf).map(|_| buf)
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PocketError::timeout(format!(
                        "featurize exceeded {:?}",
                        self.timeout
                    )));
                }
                None => std::thread::sleep(Duration::from_millis(25)),
            }
        };

        let output = reader
            .join()
            .map_err(|_| PocketError::internal("featurize reader thread panicked".to_string()))??;

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            let excerpt: String = stderr.lines().take(5).collect::<Vec<_>>().join("; ");
            return Err(PocketError::input(format!(
                "featurize exited with {status}: {excerpt}"
            )));
        }
        Ok(output)
    }
}

impl Featurizer for ExternalFeaturizer {
    fn featurize(&self, points: &[PdbPoint]) -> Result<FeatureFile> {
        let input = pointfile::dumps(points);
        debug!("featurizing {} points", points.len());

        let mut attempt = 0;
        let output = loop {
            match self.run_once(&input) {
                Ok(output) => break output,
                // Retry only process-level failures, never semantic ones
                Err(err @ PocketError::Io(_)) if attempt < self.retries => {
                    warn!("featurize attempt {} failed: {err}", attempt + 1);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };
        featurefile::loads(&output, Some(DESCRIPTION))
    }
}
