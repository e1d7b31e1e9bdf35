//! Mean squares metric.

use super::trait_::PatchMetric;

/// Mean squared intensity difference on raw patches.
///
/// A common intensity scale leaves the fused weights unchanged because the
/// solver normalises the pairwise error matrix; an intensity offset between
/// target and atlas changes the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquares;

impl PatchMetric for MeanSquares {
    fn prepare(&self, _patch: &mut [f64]) {}

    fn distance(&self, target: &[f64], candidate: &[f64]) -> f64 {
        if target.is_empty() {
            return 0.0;
        }
        let sum: f64 = target
            .iter()
            .zip(candidate)
            .map(|(t, c)| (t - c) * (t - c))
            .sum();
        sum / target.len() as f64
    }

    fn name(&self) -> &'static str {
        "MeanSquares"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_is_identity() {
        let mut patch = vec![1.0, 5.0, -2.0];
        MeanSquares.prepare(&mut patch);
        assert_eq!(patch, vec![1.0, 5.0, -2.0]);
    }

    #[test]
    fn test_distance() {
        assert_eq!(MeanSquares.distance(&[1.0, 2.0], &[1.0, 4.0]), 2.0);
        assert_eq!(MeanSquares.distance(&[], &[]), 0.0);
    }
}
