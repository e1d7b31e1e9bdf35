//! Volume and mask model for joint label fusion.
//!
//! Intensity images and label images are tensor-backed (burn) and share a
//! [`Geometry`] describing how voxel indices map to physical space. The
//! fusion engine pulls their voxels to the host once per call and hands back
//! new images built on the target's device.

pub mod error;
pub mod image;

pub use error::{ImageError, Result};
pub use image::{Geometry, Image, LabelImage, Region};
