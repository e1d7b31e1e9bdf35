//! Patch metric trait.

/// Local similarity measure between two patches.
///
/// A metric first prepares each sampled patch in place (for example by
/// normalising it), then compares prepared patches. The element-wise
/// absolute difference of two prepared patches is what the weight solver
/// consumes, so preparation defines the invariances of the whole fusion.
pub trait PatchMetric: Send + Sync {
    /// Prepare a freshly sampled patch for comparison.
    fn prepare(&self, patch: &mut [f64]);

    /// Distance between two prepared patches; lower is more similar.
    fn distance(&self, target: &[f64], candidate: &[f64]) -> f64 {
        target
            .iter()
            .zip(candidate)
            .map(|(t, c)| (t - c) * (t - c))
            .sum()
    }

    /// Name of the metric.
    fn name(&self) -> &'static str;
}
