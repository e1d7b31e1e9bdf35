//! Patch similarity engine.
//!
//! For one voxel, the target patch is compared with the atlas patch at every
//! candidate offset of the search window. The best candidate's prepared
//! patch yields the absolute difference vector consumed by the weight
//! solver.
//!
//! # Boundary policy
//! * Search candidates whose centre falls outside the grid are skipped.
//! * Patch samples outside the grid replicate the nearest edge voxel, so
//!   every difference vector has the full patch length.

pub mod correlation;
pub mod mean_squares;
pub mod neighborhood;
pub mod trait_;

pub use correlation::PatchCorrelation;
pub use mean_squares::MeanSquares;
pub use neighborhood::Neighborhood;
pub use trait_::PatchMetric;

use jlf_core::Geometry;

use crate::config::SimilarityMode;

static PATCH_CORRELATION: PatchCorrelation = PatchCorrelation;
static MEAN_SQUARES: MeanSquares = MeanSquares;

impl SimilarityMode {
    /// Metric implementing this mode.
    pub fn metric(self) -> &'static dyn PatchMetric {
        match self {
            Self::PatchCorrelation => &PATCH_CORRELATION,
            Self::MeanSquares => &MEAN_SQUARES,
        }
    }
}

/// Best candidate found for one atlas at one voxel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchMatch<const D: usize> {
    /// Displacement of the chosen atlas patch centre.
    pub offset: [isize; D],
    /// Metric distance to the target patch.
    pub distance: f64,
}

/// Samples patches on a fixed grid and searches atlases for the best match.
pub struct PatchSearch<'a, const D: usize> {
    geometry: &'a Geometry<D>,
    patch: &'a Neighborhood<D>,
    search: &'a Neighborhood<D>,
    metric: &'a dyn PatchMetric,
}

impl<'a, const D: usize> PatchSearch<'a, D> {
    pub fn new(
        geometry: &'a Geometry<D>,
        patch: &'a Neighborhood<D>,
        search: &'a Neighborhood<D>,
        metric: &'a dyn PatchMetric,
    ) -> Self {
        Self {
            geometry,
            patch,
            search,
            metric,
        }
    }

    /// Number of elements in a patch.
    pub fn patch_len(&self) -> usize {
        self.patch.len()
    }

    pub fn metric(&self) -> &dyn PatchMetric {
        self.metric
    }

    /// Copy the raw patch around `center` into `out`.
    pub fn sample(&self, volume: &[f32], center: &[usize; D], out: &mut [f64]) {
        for (slot, offset) in out.iter_mut().zip(self.patch.offsets()) {
            *slot = volume[self.geometry.clamped_linear_index(center, offset)] as f64;
        }
    }

    /// Sample and prepare the target patch around `center`.
    pub fn target_patch(&self, target: &[f32], center: &[usize; D], out: &mut [f64]) {
        self.sample(target, center, out);
        self.metric.prepare(out);
    }

    /// Search `atlas` around `center` for the patch closest to `target_patch`.
    ///
    /// Candidates are visited in the search window's order and only a strict
    /// improvement replaces the current best, so the first candidate wins
    /// ties. On return `best` holds the prepared winning patch; `scratch` is
    /// overwritten. Returns `None` only if no candidate centre is inside the
    /// grid, which cannot happen for an in-grid `center`.
    pub fn best_match(
        &self,
        atlas: &[f32],
        center: &[usize; D],
        target_patch: &[f64],
        scratch: &mut [f64],
        best: &mut [f64],
    ) -> Option<PatchMatch<D>> {
        let mut found: Option<PatchMatch<D>> = None;

        for offset in self.search.offsets() {
            let Some(candidate) = self.geometry.shifted(center, offset) else {
                continue;
            };
            self.sample(atlas, &candidate, scratch);
            self.metric.prepare(scratch);
            let distance = self.metric.distance(target_patch, scratch);

            let improves = match found {
                None => true,
                Some(current) => distance < current.distance,
            };
            if improves {
                found = Some(PatchMatch {
                    offset: *offset,
                    distance,
                });
                best.copy_from_slice(scratch);
            }
        }

        found
    }
}

/// Element-wise `|target - candidate|`.
pub fn absolute_difference(target: &[f64], candidate: &[f64], out: &mut [f64]) {
    for ((slot, t), c) in out.iter_mut().zip(target).zip(candidate) {
        *slot = (t - c).abs();
    }
}
