//! Precondition checks run before any voxel is touched.

use burn::tensor::backend::Backend;
use jlf_core::{Geometry, Image, LabelImage};

use crate::error::{FusionError, Result};

/// Only 2D and 3D images are fused.
pub fn validate_dimension<const D: usize>() -> Result<()> {
    if !(2..=3).contains(&D) {
        return Err(FusionError::dimension_mismatch(format!(
            "only 2D and 3D images are supported, got {}D",
            D
        )));
    }
    Ok(())
}

/// Validate that `other` lies on the same grid as `reference`.
pub fn validate_geometry<const D: usize>(
    reference: &Geometry<D>,
    other: &Geometry<D>,
    what: &str,
) -> Result<()> {
    if reference.shape() != other.shape() {
        return Err(FusionError::ShapeMismatch {
            expected: reference.shape().to_vec(),
            actual: other.shape().to_vec(),
        });
    }
    if let Some(difference) = reference.mismatch(other) {
        return Err(FusionError::geometry_mismatch(format!(
            "{} does not match the target: {}",
            what, difference
        )));
    }
    Ok(())
}

/// Validate every input of a fusion call against the target.
pub fn validate_inputs<B: Backend, const D: usize>(
    target: &Image<B, D>,
    mask: &LabelImage<B, D>,
    atlases: &[Image<B, D>],
    labels: Option<&[LabelImage<B, D>]>,
) -> Result<()> {
    validate_dimension::<D>()?;

    if atlases.is_empty() {
        return Err(FusionError::EmptyAtlasList);
    }
    if let Some(labels) = labels {
        if labels.len() != atlases.len() {
            return Err(FusionError::AtlasLabelCountMismatch {
                atlases: atlases.len(),
                labels: labels.len(),
            });
        }
    }

    let reference = target.geometry();
    validate_geometry(reference, mask.geometry(), "mask")?;
    for (i, atlas) in atlases.iter().enumerate() {
        validate_geometry(reference, atlas.geometry(), &format!("atlas {}", i))?;
    }
    for (i, label) in labels.unwrap_or(&[]).iter().enumerate() {
        validate_geometry(reference, label.geometry(), &format!("label image {}", i))?;
    }
    Ok(())
}
