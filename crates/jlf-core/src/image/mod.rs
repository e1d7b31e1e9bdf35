//! Image types and operations.
//!
//! This module provides the intensity [`Image`], the integer [`LabelImage`]
//! (also used for binary masks, non-zero meaning inside), their shared
//! [`Geometry`], and the region helpers used to focus fusion on a sub-volume.

pub mod geometry;
pub mod image;
pub mod label;
pub mod morphology;
pub mod region;

pub use geometry::{Geometry, GEOMETRY_TOLERANCE};
pub use image::Image;
pub use label::LabelImage;
pub use morphology::{dilate_ball, threshold_labels};
pub use region::Region;
