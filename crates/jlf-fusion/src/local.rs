//! Focused joint label fusion.
//!
//! Fusion is restricted to a neighbourhood of a few labels of interest:
//! the target is cropped around a dilated focus region, each atlas is
//! registered to the crop by an external [`FocusRegistration`]
//! collaborator, the warped labels are collapsed to three classes and the
//! cropped problem is fused.
//!
//! Collapsed classes:
//! * `1` background (label < 1)
//! * `2` any other structure
//! * `3` one of the focus labels

use burn::tensor::backend::Backend;
use jlf_core::image::{dilate_ball, threshold_labels};
use jlf_core::{Image, LabelImage, Region};
use serde::{Deserialize, Serialize};

use crate::config::JointFusionConfig;
use crate::error::{FusionError, Result};
use crate::fusion::{FusionOutput, JointLabelFusion};
use crate::validation::{validate_dimension, validate_geometry};

/// Collapsed class of voxels labelled below 1.
pub const BACKGROUND_CLASS: i64 = 1;
/// Collapsed class of labelled voxels outside the focus set.
pub const OTHER_CLASS: i64 = 2;
/// Collapsed class of focus-label voxels.
pub const FOCUS_CLASS: i64 = 3;

/// Transform model requested from the registration collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransformType {
    Rigid,
    Similarity,
    Affine,
    #[default]
    SyN,
}

/// Image metric driving the deformable stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegistrationMetric {
    /// Mattes mutual information.
    #[default]
    Mattes,
    /// Local cross-correlation.
    CrossCorrelation,
    MeanSquares,
    Demons,
}

/// Settings forwarded unchanged to [`FocusRegistration::register`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub transform: TransformType,
    pub metric: RegistrationMetric,
    /// Histogram bins or correlation radius, depending on `metric`.
    pub metric_sampling: usize,
    /// Iterations per resolution level, coarsest first.
    pub iterations: Vec<usize>,
    pub gradient_step: f64,
    /// Smoothing of the update field.
    pub flow_sigma: f64,
    /// Smoothing of the total field.
    pub total_sigma: f64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            transform: TransformType::SyN,
            metric: RegistrationMetric::Mattes,
            metric_sampling: 32,
            iterations: vec![40, 20, 0],
            gradient_step: 0.2,
            flow_sigma: 3.0,
            total_sigma: 0.0,
        }
    }
}

/// Focused fusion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalFusionConfig {
    /// Label ids to focus on.
    pub which_labels: Vec<i64>,
    /// Ball radius, in voxels, grown around the focus region.
    pub submask_dilation: usize,
    pub registration: RegistrationConfig,
    pub fusion: JointFusionConfig,
}

impl Default for LocalFusionConfig {
    fn default() -> Self {
        Self {
            which_labels: Vec::new(),
            submask_dilation: 10,
            registration: RegistrationConfig::default(),
            fusion: JointFusionConfig::default().with_rho(0.1),
        }
    }
}

impl LocalFusionConfig {
    pub fn new(which_labels: Vec<i64>) -> Self {
        Self {
            which_labels,
            ..Self::default()
        }
    }

    pub fn with_submask_dilation(mut self, dilation: usize) -> Self {
        self.submask_dilation = dilation;
        self
    }

    pub fn with_registration(mut self, registration: RegistrationConfig) -> Self {
        self.registration = registration;
        self
    }

    pub fn with_fusion(mut self, fusion: JointFusionConfig) -> Self {
        self.fusion = fusion;
        self
    }
}

/// Everything the collaborator needs to bring one atlas onto the crop.
pub struct RegistrationRequest<'a, B: Backend, const D: usize> {
    /// Position of the atlas in the caller's list.
    pub atlas_index: usize,
    /// Cropped target; warped outputs must lie on its grid.
    pub target: &'a Image<B, D>,
    /// Focus region of the target on the cropped grid.
    pub target_focus: &'a LabelImage<B, D>,
    pub atlas: &'a Image<B, D>,
    pub atlas_labels: &'a LabelImage<B, D>,
    /// Focus region of the atlas on its own grid, for initialisation.
    pub atlas_focus: &'a LabelImage<B, D>,
    pub config: &'a RegistrationConfig,
}

/// Atlas resampled onto the cropped target grid.
#[derive(Debug, Clone)]
pub struct RegisteredAtlas<B: Backend, const D: usize> {
    pub image: Image<B, D>,
    /// Labels warped with nearest-neighbour interpolation.
    pub labels: LabelImage<B, D>,
}

/// Registration collaborator used by [`local_joint_label_fusion`].
pub trait FocusRegistration<B: Backend, const D: usize>: Send + Sync {
    fn register(&self, request: &RegistrationRequest<'_, B, D>) -> anyhow::Result<RegisteredAtlas<B, D>>;
}

/// Output of [`local_joint_label_fusion`]. All images share the crop grid.
#[derive(Debug, Clone)]
pub struct LocalFusionOutput<B: Backend, const D: usize> {
    pub fusion: FusionOutput<B, D>,
    pub cropped_target: Image<B, D>,
    /// Warped atlases that registered successfully.
    pub cropped_atlases: Vec<Image<B, D>>,
    /// Their collapsed labels.
    pub cropped_labels: Vec<LabelImage<B, D>>,
    /// Indices of the atlases that were used.
    pub registered: Vec<usize>,
    /// Crop of the target grid.
    pub region: Region<D>,
}

/// Collapse labels to background, other and focus classes.
pub fn collapse_labels(labels: &[i64], which_labels: &[i64]) -> Vec<i64> {
    labels
        .iter()
        .map(|label| {
            if which_labels.contains(label) {
                FOCUS_CLASS
            } else if *label >= 1 {
                OTHER_CLASS
            } else {
                BACKGROUND_CLASS
            }
        })
        .collect()
}

/// Focus region of `initial_label`: voxels whose id is in `which_labels`,
/// or every labelled voxel (id >= 1) when none match.
pub fn focus_region(initial_label: &[i64], which_labels: &[i64]) -> Result<Vec<bool>> {
    let region = threshold_labels(initial_label, which_labels);
    if region.iter().any(|inside| *inside) {
        return Ok(region);
    }

    tracing::warn!(
        "None of the labels {:?} occur in the initial label image; focusing on every labelled voxel",
        which_labels
    );
    let region: Vec<bool> = initial_label.iter().map(|label| *label >= 1).collect();
    if region.iter().any(|inside| *inside) {
        Ok(region)
    } else {
        Err(FusionError::EmptyRegion(
            "the initial label image has no voxel with a label of 1 or more".to_string(),
        ))
    }
}

/// Joint label fusion restricted to a region around `config.which_labels`.
///
/// `initial_label` (and `target_mask`, when given) must share the target
/// grid. Atlases may live on their own grids, each paired with a label image
/// on the same grid. Atlases whose registration fails are skipped.
pub fn local_joint_label_fusion<B: Backend, const D: usize, R>(
    target: &Image<B, D>,
    target_mask: Option<&LabelImage<B, D>>,
    initial_label: &LabelImage<B, D>,
    atlases: &[Image<B, D>],
    labels: &[LabelImage<B, D>],
    registration: &R,
    config: &LocalFusionConfig,
) -> Result<LocalFusionOutput<B, D>>
where
    R: FocusRegistration<B, D> + ?Sized,
{
    validate_dimension::<D>()?;
    config.fusion.validate()?;
    if atlases.is_empty() {
        return Err(FusionError::EmptyAtlasList);
    }
    if atlases.len() != labels.len() {
        return Err(FusionError::AtlasLabelCountMismatch {
            atlases: atlases.len(),
            labels: labels.len(),
        });
    }
    let geometry = target.geometry();
    validate_geometry(geometry, initial_label.geometry(), "initial label image")?;
    if let Some(mask) = target_mask {
        validate_geometry(geometry, mask.geometry(), "target mask")?;
    }
    for (k, (atlas, atlas_labels)) in atlases.iter().zip(labels).enumerate() {
        validate_geometry(atlas.geometry(), atlas_labels.geometry(), &format!("label image {}", k))
            .map_err(|err| FusionError::geometry_mismatch(format!("atlas {} and its labels differ: {}", k, err)))?;
    }

    let device = target.device();
    let focus = focus_region(&initial_label.to_labels(), &config.which_labels)?;
    let mut around = dilate_ball(&focus, geometry, config.submask_dilation);
    if let Some(mask) = target_mask {
        for (inside, keep) in around.iter_mut().zip(mask.to_mask()) {
            *inside &= keep;
        }
    }
    let region = Region::bounding_box(&around, geometry).ok_or_else(|| {
        FusionError::EmptyRegion("the dilated focus region does not overlap the target mask".to_string())
    })?;
    tracing::debug!(
        "Focus crop starts at {:?} with size {:?} ({} voxels)",
        region.lower(),
        region.size(),
        region.num_voxels()
    );

    let cropped_target = target.crop(&region)?;
    let cropped_geometry = cropped_target.geometry().clone();
    let cropped_mask = LabelImage::from_mask(&region.extract(&around, geometry), cropped_geometry.clone(), &device)?;
    let cropped_focus = LabelImage::from_mask(&region.extract(&focus, geometry), cropped_geometry.clone(), &device)?;

    let mut cropped_atlases = Vec::with_capacity(atlases.len());
    let mut cropped_labels = Vec::with_capacity(atlases.len());
    let mut registered = Vec::with_capacity(atlases.len());

    for (k, (atlas, atlas_labels)) in atlases.iter().zip(labels).enumerate() {
        if config.fusion.verbose {
            tracing::info!("Registering atlas {}/{}", k + 1, atlases.len());
        }
        let atlas_focus = LabelImage::from_mask(
            &threshold_labels(&atlas_labels.to_labels(), &config.which_labels),
            atlas_labels.geometry().clone(),
            &atlas_labels.device(),
        )?;
        let request = RegistrationRequest {
            atlas_index: k,
            target: &cropped_target,
            target_focus: &cropped_focus,
            atlas,
            atlas_labels,
            atlas_focus: &atlas_focus,
            config: &config.registration,
        };

        let warped = match registration.register(&request) {
            Ok(warped) => warped,
            Err(source) => {
                let err = FusionError::Registration { atlas: k, source };
                tracing::warn!("{}; skipping this atlas", err);
                continue;
            }
        };
        if let Err(err) = validate_geometry(&cropped_geometry, warped.image.geometry(), "warped atlas")
            .and_then(|_| validate_geometry(&cropped_geometry, warped.labels.geometry(), "warped labels"))
        {
            tracing::warn!("Atlas {} was not resampled onto the focus crop ({}); skipping it", k, err);
            continue;
        }

        let collapsed = collapse_labels(&warped.labels.to_labels(), &config.which_labels);
        cropped_labels.push(LabelImage::from_labels(collapsed, cropped_geometry.clone(), &device)?);
        cropped_atlases.push(warped.image);
        registered.push(k);
    }

    if registered.is_empty() {
        return Err(FusionError::NoRegisteredAtlases);
    }
    if registered.len() < atlases.len() {
        tracing::warn!("Fusing {} of {} atlases", registered.len(), atlases.len());
    }

    let fusion = JointLabelFusion::new(config.fusion.clone()).fuse(
        &cropped_target,
        &cropped_mask,
        &cropped_atlases,
        Some(&cropped_labels),
    )?;

    Ok(LocalFusionOutput {
        fusion,
        cropped_target,
        cropped_atlases,
        cropped_labels,
        registered,
        region,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_labels() {
        let collapsed = collapse_labels(&[0, -1, 1, 4, 7, 9], &[4, 9]);
        assert_eq!(collapsed, vec![1, 1, 2, 3, 2, 3]);
    }

    #[test]
    fn test_focus_region_falls_back_to_labelled_voxels() {
        let region = focus_region(&[0, 2, 3, 0], &[5]).unwrap();
        assert_eq!(region, vec![false, true, true, false]);

        let region = focus_region(&[0, 2, 5, 0], &[5]).unwrap();
        assert_eq!(region, vec![false, false, true, false]);
    }

    #[test]
    fn test_focus_region_empty() {
        let err = focus_region(&[0, 0, -3], &[5]).unwrap_err();
        assert!(matches!(err, FusionError::EmptyRegion(_)));
    }

    #[test]
    fn test_defaults() {
        let config = LocalFusionConfig::new(vec![3]);
        assert_eq!(config.submask_dilation, 10);
        assert_eq!(config.fusion.rho, 0.1);
        assert_eq!(config.registration.transform, TransformType::SyN);
        assert_eq!(config.registration.metric, RegistrationMetric::Mattes);
        assert_eq!(config.registration.iterations, vec![40, 20, 0]);
    }
}
