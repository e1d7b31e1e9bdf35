//! Joint label fusion.
//!
//! Multi-atlas segmentation by locally weighted voting: at every voxel the
//! atlases are weighted by how well, and how independently, their patches
//! predict the target patch, and the weights fuse both atlas intensities and
//! atlas labels.
//!
//! ```rust,ignore
//! use jlf_fusion::{JointFusionConfig, JointLabelFusion};
//!
//! let fusion = JointLabelFusion::new(JointFusionConfig::new().with_search_radius(2));
//! let output = fusion.fuse(&target, &mask, &atlases, Some(&labels))?;
//! let segmentation = output.labels.map(|labels| labels.segmentation);
//! ```

pub mod config;
pub mod error;
pub mod fusion;
pub mod labels;
pub mod local;
pub mod progress;
pub mod similarity;
pub mod solver;
pub mod validation;

pub use config::{JointFusionConfig, PatchRadius, SimilarityMode};
pub use error::{FusionError, Result};
pub use fusion::{joint_label_fusion, FusionOutput, JointLabelFusion, LabelFusion};
pub use labels::ClassMap;
pub use local::{
    local_joint_label_fusion, FocusRegistration, LocalFusionConfig, LocalFusionOutput, RegisteredAtlas,
    RegistrationConfig, RegistrationMetric, RegistrationRequest, TransformType,
};
pub use progress::{
    ConsoleProgressCallback, FusionProgress, FusionReport, HistoryCallback, ProgressCallback,
};
pub use solver::{SolveStatus, WeightSolution, WeightSolver};
