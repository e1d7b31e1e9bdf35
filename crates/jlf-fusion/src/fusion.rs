//! Joint label fusion engine.
//!
//! For every voxel of the mask the engine
//! 1. samples the target patch,
//! 2. searches each atlas for its best-matching patch within the search
//!    window and forms the absolute difference vector,
//! 3. solves for the atlas weights, and
//! 4. accumulates the weighted atlas intensity and, when labels are given,
//!    the weighted vote of each atlas label into its class map.
//!
//! Votes and intensities are taken at the voxel itself; the search offset
//! only influences the weights.

use std::sync::Arc;

use burn::tensor::backend::Backend;
use jlf_core::{Geometry, Image, LabelImage};
use rayon::prelude::*;

use crate::config::JointFusionConfig;
use crate::error::Result;
use crate::labels::{
    assign_background_label, collect_classes, exclude_zero_labels, resolve_segmentation, ClassMap,
};
use crate::progress::{ConsoleProgressCallback, FusionReport, ProgressCallback, ProgressTracker};
use crate::similarity::{absolute_difference, Neighborhood, PatchSearch};
use crate::solver::{SolveStatus, WeightSolution, WeightSolver};
use crate::validation::validate_inputs;

/// Label outputs of a fusion call.
#[derive(Debug, Clone)]
pub struct LabelFusion<B: Backend, const D: usize> {
    /// Arg-max segmentation holding original label ids.
    pub segmentation: LabelImage<B, D>,
    /// One vote map per class, in ascending label order.
    pub probabilities: Vec<Image<B, D>>,
    /// Class index to label id mapping of `probabilities`.
    pub class_map: ClassMap,
}

/// Result of [`JointLabelFusion::fuse`].
#[derive(Debug, Clone)]
pub struct FusionOutput<B: Backend, const D: usize> {
    /// Fused intensity, zero outside the mask.
    pub intensity: Image<B, D>,
    /// Present when label images were supplied.
    pub labels: Option<LabelFusion<B, D>>,
    pub report: FusionReport,
}

/// Joint label fusion with a fixed configuration.
#[derive(Clone, Default)]
pub struct JointLabelFusion {
    config: JointFusionConfig,
    callback: Option<Arc<dyn ProgressCallback>>,
}

impl JointLabelFusion {
    pub fn new(config: JointFusionConfig) -> Self {
        Self {
            config,
            callback: None,
        }
    }

    /// Attach a progress callback. Without one, `verbose` logs to the console.
    pub fn with_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn config(&self) -> &JointFusionConfig {
        &self.config
    }

    /// Fuse `atlases` (and their `labels`, if any) onto `target` within `mask`.
    ///
    /// Every input must share the target's geometry. Without labels only the
    /// intensity is fused. Label pre-passes work on private copies; caller
    /// images are never modified.
    pub fn fuse<B: Backend, const D: usize>(
        &self,
        target: &Image<B, D>,
        mask: &LabelImage<B, D>,
        atlases: &[Image<B, D>],
        labels: Option<&[LabelImage<B, D>]>,
    ) -> Result<FusionOutput<B, D>> {
        self.config.validate()?;
        validate_inputs(target, mask, atlases, labels)?;
        let radius = self.config.patch_radius.resolve::<D>()?;

        let geometry = target.geometry().clone();
        let device = target.device();

        let target_voxels = target.to_voxels();
        let atlas_voxels: Vec<Vec<f32>> = atlases.iter().map(Image::to_voxels).collect();
        let mut mask_voxels = mask.to_mask();
        let mut label_voxels: Option<Vec<Vec<i64>>> =
            labels.map(|labels| labels.iter().map(LabelImage::to_labels).collect());

        let classes = label_voxels
            .as_mut()
            .map(|label_voxels| self.prepare_labels(&mut mask_voxels, label_voxels))
            .transpose()?;

        let voxels: Vec<usize> = mask_voxels
            .iter()
            .enumerate()
            .filter_map(|(linear, inside)| inside.then_some(linear))
            .collect();

        if self.config.verbose {
            tracing::info!(
                "Fusing {} atlases over {} of {} voxels ({}, patch radius {:?}, search radius {}, rho {}, beta {})",
                atlases.len(),
                voxels.len(),
                geometry.num_voxels(),
                self.config.similarity.metric().name(),
                radius,
                self.config.search_radius,
                self.config.rho,
                self.config.beta
            );
        }

        let patch = Neighborhood::patch(radius);
        let search = Neighborhood::search(self.config.search_radius);
        let engine = PatchSearch::new(&geometry, &patch, &search, self.config.similarity.metric());
        let solver = WeightSolver::from_config(&self.config);

        let mut tracker = ProgressTracker::new();
        match &self.callback {
            Some(callback) => tracker.add_callback(Arc::clone(callback)),
            None if self.config.verbose => tracker.add_callback(Arc::new(ConsoleProgressCallback::default())),
            None => {}
        }

        let num_voxels = geometry.num_voxels();
        let num_classes = classes.as_ref().map_or(0, ClassMap::len);
        let mut intensity = vec![0.0f64; num_voxels];
        let mut probabilities = vec![vec![0.0f64; num_voxels]; num_classes];
        let mut report = FusionReport::default();

        tracker.start(voxels.len());
        for chunk in voxels.chunks(self.config.chunk_size) {
            let solutions: Vec<WeightSolution> = chunk
                .par_iter()
                .map_init(
                    || Scratch::new(engine.patch_len(), atlas_voxels.len()),
                    |scratch, &linear| {
                        estimate_weights(&engine, &solver, &geometry, &target_voxels, &atlas_voxels, linear, scratch)
                    },
                )
                .collect();

            // Sequential accumulation keeps results independent of scheduling
            for (&linear, solution) in chunk.iter().zip(&solutions) {
                match solution.status {
                    SolveStatus::Solved => {}
                    SolveStatus::Constrained { .. } => report.constrained_voxels += 1,
                    SolveStatus::Fallback => report.fallback_voxels += 1,
                }

                intensity[linear] = atlas_voxels
                    .iter()
                    .zip(&solution.weights)
                    .map(|(atlas, w)| w * atlas[linear] as f64)
                    .sum();

                if let (Some(label_voxels), Some(classes)) = (&label_voxels, &classes) {
                    for (atlas_labels, w) in label_voxels.iter().zip(&solution.weights) {
                        if let Some(class) = classes.index_of(atlas_labels[linear]) {
                            probabilities[class][linear] += w;
                        }
                    }
                }
            }

            report.voxels_processed += chunk.len();
            tracker.update(report.voxels_processed, report.fallback_voxels);
        }
        report.elapsed = tracker.elapsed();

        if report.fallback_voxels > 0 {
            tracing::warn!(
                "Weight system was singular or non-finite at {} of {} voxels; uniform weights were used there",
                report.fallback_voxels,
                report.voxels_processed
            );
        }
        tracker.complete(&report);

        let intensity = Image::from_voxels(to_f32(&intensity), geometry.clone(), &device)?;

        let labels = match classes {
            Some(class_map) => {
                let maps: Vec<Vec<f32>> = probabilities.iter().map(|map| to_f32(map)).collect();
                let segmentation = resolve_segmentation(&maps, &class_map, &mask_voxels);
                let segmentation = LabelImage::from_labels(segmentation, geometry.clone(), &device)?;
                let probabilities = maps
                    .into_iter()
                    .map(|map| Image::from_voxels(map, geometry.clone(), &device))
                    .collect::<jlf_core::Result<Vec<_>>>()?;
                Some(LabelFusion {
                    segmentation,
                    probabilities,
                    class_map,
                })
            }
            None => None,
        };

        Ok(FusionOutput {
            intensity,
            labels,
            report,
        })
    }

    /// Run the enabled pre-passes and collect the classes inside the mask.
    fn prepare_labels(&self, mask: &mut [bool], labels: &mut [Vec<i64>]) -> Result<ClassMap> {
        if self.config.exclude_zero_labels {
            let removed = exclude_zero_labels(mask, labels);
            tracing::debug!("Excluded {} voxels carrying label 0 in at least one atlas", removed);
        }
        if self.config.assign_background_label {
            let background = assign_background_label(labels, mask)?;
            tracing::warn!(
                "Label 0 inside the mask was reassigned to {} on the fusion's copies of the atlas labels",
                background
            );
        }
        let classes = collect_classes(labels, mask);
        tracing::debug!("Fusing {} label classes: {:?}", classes.len(), classes.labels());
        Ok(classes)
    }
}

/// Per-worker buffers reused across voxels.
struct Scratch {
    target: Vec<f64>,
    candidate: Vec<f64>,
    best: Vec<f64>,
    differences: Vec<f64>,
}

impl Scratch {
    fn new(patch_len: usize, num_atlases: usize) -> Self {
        Self {
            target: vec![0.0; patch_len],
            candidate: vec![0.0; patch_len],
            best: vec![0.0; patch_len],
            differences: vec![0.0; patch_len * num_atlases],
        }
    }
}

fn estimate_weights<const D: usize>(
    engine: &PatchSearch<'_, D>,
    solver: &WeightSolver,
    geometry: &Geometry<D>,
    target: &[f32],
    atlases: &[Vec<f32>],
    linear: usize,
    scratch: &mut Scratch,
) -> WeightSolution {
    let center = geometry.coordinates(linear);
    let patch_len = engine.patch_len();
    engine.target_patch(target, &center, &mut scratch.target);

    for (i, atlas) in atlases.iter().enumerate() {
        let row = &mut scratch.differences[i * patch_len..(i + 1) * patch_len];
        match engine.best_match(atlas, &center, &scratch.target, &mut scratch.candidate, &mut scratch.best) {
            Some(_) => absolute_difference(&scratch.target, &scratch.best, row),
            None => row.fill(0.0),
        }
    }

    solver.solve(&scratch.differences, patch_len)
}

fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|v| *v as f32).collect()
}

/// Run [`JointLabelFusion`] once with `config`.
pub fn joint_label_fusion<B: Backend, const D: usize>(
    target: &Image<B, D>,
    mask: &LabelImage<B, D>,
    atlases: &[Image<B, D>],
    labels: Option<&[LabelImage<B, D>]>,
    config: &JointFusionConfig,
) -> Result<FusionOutput<B, D>> {
    JointLabelFusion::new(config.clone()).fuse(target, mask, atlases, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::HistoryCallback;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn device() -> <B as Backend>::Device {
        Default::default()
    }

    #[test]
    fn test_estimate_weights_prefers_matching_atlas() {
        let geometry = Geometry::<2>::from_shape([7, 7]);
        let target: Vec<f32> = (0..49).map(|v| ((v * 7) % 11) as f32).collect();
        let noisy: Vec<f32> = target.iter().enumerate().map(|(i, v)| v + (i % 3) as f32).collect();
        let atlases = vec![target.clone(), noisy];

        let patch = Neighborhood::patch([1, 1]);
        let search = Neighborhood::search(0);
        let config = JointFusionConfig::new().with_beta(1.0);
        let engine = PatchSearch::new(&geometry, &patch, &search, config.similarity.metric());
        let solver = WeightSolver::from_config(&config);

        let mut scratch = Scratch::new(patch.len(), atlases.len());
        let solution = estimate_weights(&engine, &solver, &geometry, &target, &atlases, 24, &mut scratch);
        assert!(solution.weights[0] > solution.weights[1]);
        assert!((solution.weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_callback_sees_every_chunk() {
        let geometry = Geometry::<2>::from_shape([4, 5]);
        let target = Image::<B, 2>::from_voxels(vec![1.0; 20], geometry.clone(), &device()).unwrap();
        let mask = LabelImage::<B, 2>::filled(geometry, 1, &device());

        let history = HistoryCallback::new();
        let fusion = JointLabelFusion::new(JointFusionConfig::new().with_patch_radius(1).with_chunk_size(8))
            .with_callback(Arc::new(history.clone()));
        let output = fusion.fuse(&target, &mask, &[target.clone()], None).unwrap();

        let processed: Vec<usize> = history.get_history().iter().map(|p| p.processed).collect();
        assert_eq!(processed, vec![8, 16, 20]);
        assert_eq!(output.report.voxels_processed, 20);
        assert_eq!(history.report().unwrap().voxels_processed, 20);
        assert!(output.labels.is_none());
    }

    #[test]
    fn test_invalid_config_rejected_before_work() {
        let geometry = Geometry::<2>::from_shape([3, 3]);
        let target = Image::<B, 2>::zeros(geometry.clone(), &device());
        let mask = LabelImage::<B, 2>::filled(geometry, 1, &device());
        let err = JointLabelFusion::new(JointFusionConfig::new().with_rho(-0.1))
            .fuse(&target, &mask, &[target.clone()], None)
            .unwrap_err();
        assert!(matches!(err, crate::FusionError::InvalidConfiguration(_)));
    }
}
