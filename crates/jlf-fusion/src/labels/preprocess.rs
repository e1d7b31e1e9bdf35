//! Label pre-passes.
//!
//! These operate on host copies owned by the fusion call, never on the
//! caller's label images.

use super::class_map::ClassMap;
use crate::error::{FusionError, Result};

/// Remove from `mask` every voxel where any atlas carries label zero.
///
/// Returns the number of voxels removed.
pub fn exclude_zero_labels(mask: &mut [bool], labels: &[Vec<i64>]) -> usize {
    let mut removed = 0;
    for (linear, inside) in mask.iter_mut().enumerate() {
        if *inside && labels.iter().any(|atlas| atlas[linear] == 0) {
            *inside = false;
            removed += 1;
        }
    }
    removed
}

/// Relabel zero voxels inside `mask` as `max + 1`, where `max` is the
/// largest non-zero id observed inside the mask across all atlases. The id
/// is at least 1, so negative ids never produce 0. Voxels outside the mask
/// are untouched.
///
/// Returns the id that was assigned.
pub fn assign_background_label(labels: &mut [Vec<i64>], mask: &[bool]) -> Result<i64> {
    let max_label = labels
        .iter()
        .flat_map(|atlas| {
            atlas
                .iter()
                .zip(mask)
                .filter(|(label, inside)| **inside && **label != 0)
                .map(|(label, _)| *label)
        })
        .max();
    let background = match max_label {
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| FusionError::invalid_label(format!("no background id above {}", max)))?
            .max(1),
        None => 1,
    };

    for atlas in labels.iter_mut() {
        for (label, inside) in atlas.iter_mut().zip(mask) {
            if *inside && *label == 0 {
                *label = background;
            }
        }
    }
    Ok(background)
}

/// Every label id observed inside `mask` across all atlases.
pub fn collect_classes(labels: &[Vec<i64>], mask: &[bool]) -> ClassMap {
    ClassMap::from_labels(labels.iter().flat_map(|atlas| {
        atlas
            .iter()
            .zip(mask)
            .filter(|(_, inside)| **inside)
            .map(|(label, _)| *label)
    }))
}
