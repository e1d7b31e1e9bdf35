//! Patch correlation metric.

use super::trait_::PatchMetric;

/// Standard deviation below which a patch counts as flat.
const FLAT_PATCH_EPSILON: f64 = 1e-12;

/// Patch correlation.
///
/// Each patch is shifted to zero mean and scaled to unit standard
/// deviation, so the squared distance between two prepared patches of `n`
/// voxels is `2n(1 - r)` with `r` their Pearson correlation. Flat patches
/// are only centred (they become all zeros).
///
/// Invariant to `a * I + b` for any `a > 0` applied to either patch.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchCorrelation;

impl PatchMetric for PatchCorrelation {
    fn prepare(&self, patch: &mut [f64]) {
        if patch.is_empty() {
            return;
        }
        let n = patch.len() as f64;
        let mean = patch.iter().sum::<f64>() / n;
        let variance = patch.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let std = variance.sqrt();

        if std > FLAT_PATCH_EPSILON {
            patch.iter_mut().for_each(|v| *v = (*v - mean) / std);
        } else {
            patch.iter_mut().for_each(|v| *v -= mean);
        }
    }

    fn name(&self) -> &'static str {
        "PatchCorrelation"
    }
}
