//! Core types shared across the PocketFEATURE crates.
//!
//! Holds the unified error type, the 3D geometry primitives, and the
//! streaming Gaussian statistics used by the background builder.

pub mod errors;
pub mod geometry;
pub mod stats;

pub use errors::{PocketError, Result};
pub use geometry::{average_coords, PdbPoint, Point3D};
pub use stats::GaussianStats;
