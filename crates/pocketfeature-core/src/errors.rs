//! Error types for PocketFEATURE.
//!
//! Lower layers surface failures as typed values; only the driver
//! translates them into process exit codes.

use thiserror::Error;

/// Unified error type for all PocketFEATURE operations.
#[derive(Error, Debug)]
pub enum PocketError {
    /// No pocket could be derived (missing ligand, no nearby residues)
    #[error("No pocket found: {0}")]
    NoPocket(String),

    /// Required background files missing after all fallbacks
    #[error("Setup error: {0}")]
    Setup(String),

    /// Unreadable input, ligand not found, structure cannot be parsed
    #[error("Input error: {0}")]
    Input(String),

    /// A stage produced no data (empty pocket, empty score matrix)
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Metadata mismatch or unparseable record in a data file
    #[error("Format error: {0}")]
    Format(String),

    /// External featurizer exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// I/O errors (file reading, subprocess pipes)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PocketError {
    /// Creates a no-pocket error.
    pub fn no_pocket(message: impl Into<String>) -> Self {
        PocketError::NoPocket(message.into())
    }

    /// Creates a setup error.
    pub fn setup(message: impl Into<String>) -> Self {
        PocketError::Setup(message.into())
    }

    /// Creates an input error.
    pub fn input(message: impl Into<String>) -> Self {
        PocketError::Input(message.into())
    }

    /// Creates an empty-data error.
    pub fn empty(message: impl Into<String>) -> Self {
        PocketError::EmptyData(message.into())
    }

    /// Creates a format error.
    pub fn format(message: impl Into<String>) -> Self {
        PocketError::Format(message.into())
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        PocketError::Timeout(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        PocketError::Internal(message.into())
    }

    /// Checks if this is a retriable error.
    ///
    /// Only process-level failures at the external featurizer boundary
    /// are retried; semantic failures never are.
    pub fn is_retriable(&self) -> bool {
        matches!(self, PocketError::Timeout(_) | PocketError::Io(_))
    }

    /// Process exit code for this error at the driver level.
    pub fn exit_code(&self) -> u8 {
        match self {
            PocketError::NoPocket(_) => 1,
            PocketError::Setup(_) => 2,
            PocketError::Input(_) | PocketError::Format(_) | PocketError::Io(_) => 3,
            PocketError::EmptyData(_) => 4,
            PocketError::Timeout(_) | PocketError::Internal(_) => 70,
        }
    }
}

/// Result type alias for PocketFEATURE operations.
pub type Result<T> = std::result::Result<T, PocketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = PocketError::input("ligand ATP not found");
        assert!(matches!(err, PocketError::Input(_)));

        let err = PocketError::setup("background.ff missing");
        assert!(matches!(err, PocketError::Setup(_)));

        let err = PocketError::empty("no residues within cutoff");
        assert!(matches!(err, PocketError::EmptyData(_)));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(PocketError::no_pocket("x").exit_code(), 1);
        assert_eq!(PocketError::setup("x").exit_code(), 2);
        assert_eq!(PocketError::input("x").exit_code(), 3);
        assert_eq!(PocketError::empty("x").exit_code(), 4);
        assert_eq!(PocketError::internal("x").exit_code(), 70);
    }

    #[test]
    fn test_retriable_errors() {
        assert!(PocketError::timeout("featurize ran too long").is_retriable());
        assert!(!PocketError::format("bad vector line").is_retriable());
        assert!(!PocketError::input("bad pdb").is_retriable());
    }
}
