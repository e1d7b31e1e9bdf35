//! Error types for label fusion.
//!
//! Everything here is fatal for the call that raised it. Per-voxel numerical
//! trouble is not an error: the solver falls back to uniform weights and the
//! engine reports it through [`crate::FusionReport`].

use jlf_core::ImageError;
use thiserror::Error;

/// Main error type for fusion operations.
#[derive(Error, Debug)]
pub enum FusionError {
    /// No atlas images were supplied.
    #[error("At least one atlas image is required")]
    EmptyAtlasList,

    /// Label list and atlas list differ in length.
    #[error("Atlas/label count mismatch: {atlases} atlases, {labels} label images")]
    AtlasLabelCountMismatch { atlases: usize, labels: usize },

    /// Wrong dimensionality (image or patch radius).
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Voxel grids differ.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Grids agree but physical placement differs.
    #[error("Geometry mismatch: {0}")]
    GeometryMismatch(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A label id cannot be represented or assigned.
    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    /// Building an input or output image failed.
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// The registration collaborator failed for one atlas.
    #[error("Registration of atlas {atlas} failed: {source}")]
    Registration {
        atlas: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Every atlas failed to register in local fusion.
    #[error("No atlas could be registered to the focus region")]
    NoRegisteredAtlases,

    /// The focus region of local fusion is empty.
    #[error("Empty region: {0}")]
    EmptyRegion(String),
}

/// Result type for fusion operations.
pub type Result<T> = std::result::Result<T, FusionError>;

impl FusionError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    /// Create a geometry mismatch error.
    pub fn geometry_mismatch(msg: impl Into<String>) -> Self {
        Self::GeometryMismatch(msg.into())
    }

    /// Create an invalid label error.
    pub fn invalid_label(msg: impl Into<String>) -> Self {
        Self::InvalidLabel(msg.into())
    }
}
