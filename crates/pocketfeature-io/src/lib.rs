//! Canonical text formats for PocketFEATURE data.
//!
//! Pointfiles, FEATURE files (with their `# KEY\tVALUE` metadata prelude),
//! sparse MatrixValues files, residue-center definition files, and the
//! background bundle that ties them together.

pub mod backgroundfile;
pub mod centersfile;
pub mod featurefile;
pub mod matrixvalues;
pub mod metadata;
pub mod pointfile;

pub use backgroundfile::{BackgroundBundle, ScaleSpec};
pub use centersfile::CenterRow;
pub use featurefile::{FeatureFile, FeatureVector};
pub use matrixvalues::{Indexer, MatrixValues};
pub use metadata::{FeatureMetadata, MetaValue};
