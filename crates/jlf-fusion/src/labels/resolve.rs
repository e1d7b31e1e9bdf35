//! Label resolution: arg-max over per-class probability maps.

use burn::tensor::backend::Backend;
use jlf_core::{Image, LabelImage};

use super::class_map::ClassMap;
use crate::error::Result;
use crate::validation::validate_geometry;

/// Pick, at every masked voxel, the class with the highest probability and
/// write its original label id. Ties go to the lowest class index. Voxels
/// outside the mask are 0.
///
/// A probability map count that differs from the class count is logged and
/// the common prefix is used.
pub fn resolve_segmentation(probabilities: &[Vec<f32>], classes: &ClassMap, mask: &[bool]) -> Vec<i64> {
    if probabilities.len() != classes.len() {
        tracing::warn!(
            "Probability map count ({}) differs from the number of label classes ({}); resolving over the first {}",
            probabilities.len(),
            classes.len(),
            probabilities.len().min(classes.len())
        );
    }
    let usable = probabilities.len().min(classes.len());

    let mut segmentation = vec![0i64; mask.len()];
    if usable == 0 {
        return segmentation;
    }

    for (linear, _) in mask.iter().enumerate().filter(|(_, inside)| **inside) {
        let mut best_class = 0usize;
        let mut best_value = probabilities[0][linear];
        for (class, map) in probabilities.iter().enumerate().take(usable).skip(1) {
            if map[linear] > best_value {
                best_value = map[linear];
                best_class = class;
            }
        }
        if let Some(label) = classes.label_of(best_class) {
            segmentation[linear] = label;
        }
    }
    segmentation
}

/// Tensor-level [`resolve_segmentation`]; every map must share the mask's
/// geometry.
pub fn resolve_images<B: Backend, const D: usize>(
    probabilities: &[Image<B, D>],
    classes: &ClassMap,
    mask: &LabelImage<B, D>,
) -> Result<LabelImage<B, D>> {
    for (k, map) in probabilities.iter().enumerate() {
        validate_geometry(mask.geometry(), map.geometry(), &format!("probability map {}", k))?;
    }
    let maps: Vec<Vec<f32>> = probabilities.iter().map(Image::to_voxels).collect();
    let segmentation = resolve_segmentation(&maps, classes, &mask.to_mask());
    Ok(LabelImage::from_labels(
        segmentation,
        mask.geometry().clone(),
        &mask.device(),
    )?)
}
