//! PocketFEATURE comparison core.
//!
//! Compares two protein binding sites ("pockets") and reports a score,
//! an alignment between their microenvironments, and the geometric RMSD
//! of the alignment. Pocket points are featurized by the external
//! FEATURE program behind the [`featurize::Featurizer`] trait; everything
//! else lives here.

pub mod align;
pub mod background;
pub mod builder;
pub mod featurize;
pub mod pipeline;
pub mod pocket;
pub mod residues;
pub mod rmsd;
pub mod structure;

pub use align::{align, Alignment, AlignmentMethod};
pub use background::{
    normalize_score, AlignmentSizes, BackgroundEnvironment, ScaleMethod, SimilarityMethod,
};
pub use builder::{BackgroundBuilder, BackgroundBuilderOptions};
pub use featurize::{ExternalFeaturizer, Featurizer};
pub use pipeline::{compare_pockets, AllowedPairs, CompareOptions, CompareReport};
pub use pocket::{build_pocket, Pocket, PocketBuilderOptions};
pub use residues::CenterCatalogue;
pub use structure::{Atom, PdbParseOptions, ProteinStructure, Residue};
