//! Fusion configuration.
//!
//! One structure replaces the positional flag list of the command-line tool.
//! Defaults follow the usual joint fusion settings: ridge penalty 0.01,
//! weight sharpness 4, patch radius 2, search radius 3, patch correlation.

use serde::{Deserialize, Serialize};

use crate::error::{FusionError, Result};

/// Local similarity measure used to pick the best search offset and to build
/// the patch differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SimilarityMode {
    /// Patches are normalised to zero mean and unit variance before
    /// comparison. Invariant to positive affine intensity changes.
    #[default]
    PatchCorrelation,
    /// Raw intensities are compared. Sensitive to intensity offsets.
    MeanSquares,
}

/// Patch radius, either shared by every axis or given per axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchRadius {
    Isotropic(usize),
    PerAxis(Vec<usize>),
}

impl PatchRadius {
    /// Expand to one radius per axis of a `D`-dimensional image.
    pub fn resolve<const D: usize>(&self) -> Result<[usize; D]> {
        match self {
            Self::Isotropic(radius) => Ok([*radius; D]),
            Self::PerAxis(radii) if radii.len() == 1 => Ok([radii[0]; D]),
            Self::PerAxis(radii) => radii.as_slice().try_into().map_err(|_| {
                FusionError::dimension_mismatch(format!(
                    "patch radius has {} components but the image is {}-dimensional",
                    radii.len(),
                    D
                ))
            }),
        }
    }
}

impl Default for PatchRadius {
    fn default() -> Self {
        Self::Isotropic(2)
    }
}

impl From<usize> for PatchRadius {
    fn from(radius: usize) -> Self {
        Self::Isotropic(radius)
    }
}

impl From<Vec<usize>> for PatchRadius {
    fn from(radii: Vec<usize>) -> Self {
        Self::PerAxis(radii)
    }
}

/// Joint fusion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointFusionConfig {
    /// Ridge penalty, scaled by the mean diagonal of the atlas Gram matrix.
    /// Larger values pull the weights toward the plain average.
    pub rho: f64,
    /// Exponent applied to the pairwise patch error products.
    pub beta: f64,
    /// Neighbourhood compared at each voxel.
    pub patch_radius: PatchRadius,
    /// Radius of the local search for the best-matching atlas patch.
    pub search_radius: usize,
    /// Local similarity measure.
    pub similarity: SimilarityMode,
    /// Constrain atlas weights to be non-negative.
    pub non_negative: bool,
    /// Drop from the mask every voxel where any atlas label is zero.
    pub exclude_zero_labels: bool,
    /// Relabel zero voxels inside the mask as `max label + 1` (on private
    /// copies of the label images).
    pub assign_background_label: bool,
    /// Log progress and a summary.
    pub verbose: bool,
    /// Voxels per parallel batch; progress is reported once per batch.
    pub chunk_size: usize,
}

impl Default for JointFusionConfig {
    fn default() -> Self {
        Self {
            rho: 0.01,
            beta: 4.0,
            patch_radius: PatchRadius::default(),
            search_radius: 3,
            similarity: SimilarityMode::default(),
            non_negative: false,
            exclude_zero_labels: false,
            assign_background_label: false,
            verbose: false,
            chunk_size: 4096,
        }
    }
}

impl JointFusionConfig {
    /// Create a new config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ridge penalty.
    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    /// Set the weight sharpness exponent.
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    /// Set the patch radius.
    pub fn with_patch_radius(mut self, radius: impl Into<PatchRadius>) -> Self {
        self.patch_radius = radius.into();
        self
    }

    /// Set the search radius.
    pub fn with_search_radius(mut self, radius: usize) -> Self {
        self.search_radius = radius;
        self
    }

    /// Set the similarity measure.
    pub fn with_similarity(mut self, similarity: SimilarityMode) -> Self {
        self.similarity = similarity;
        self
    }

    /// Constrain weights to be non-negative.
    pub fn with_non_negative(mut self, enabled: bool) -> Self {
        self.non_negative = enabled;
        self
    }

    /// Exclude voxels where any atlas carries label zero.
    pub fn with_exclude_zero_labels(mut self, enabled: bool) -> Self {
        self.exclude_zero_labels = enabled;
        self
    }

    /// Relabel in-mask background as `max label + 1`.
    pub fn with_assign_background_label(mut self, enabled: bool) -> Self {
        self.assign_background_label = enabled;
        self
    }

    /// Enable progress logging.
    pub fn with_verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Set the number of voxels per parallel batch.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Check scalar parameters.
    pub fn validate(&self) -> Result<()> {
        if !self.rho.is_finite() || self.rho < 0.0 {
            return Err(FusionError::invalid_configuration(format!(
                "rho must be finite and non-negative, got {}",
                self.rho
            )));
        }
        if !self.beta.is_finite() || self.beta <= 0.0 {
            return Err(FusionError::invalid_configuration(format!(
                "beta must be finite and positive, got {}",
                self.beta
            )));
        }
        if self.chunk_size == 0 {
            return Err(FusionError::invalid_configuration("chunk size must be positive"));
        }
        Ok(())
    }
}
