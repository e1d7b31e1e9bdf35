//! Integer label images and binary masks.
//!
//! A [`LabelImage`] stores one integer class id per voxel. Masks reuse the
//! same type: any non-zero voxel is inside.

use std::collections::BTreeSet;

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Shape, Tensor, TensorData};

use super::geometry::Geometry;
use super::region::Region;
use crate::error::{ImageError, Result};

/// Integer label image.
#[derive(Debug, Clone)]
pub struct LabelImage<B: Backend, const D: usize> {
    data: Tensor<B, D, Int>,
    geometry: Geometry<D>,
}

impl<B: Backend, const D: usize> LabelImage<B, D> {
    /// Wrap a tensor whose shape must equal `geometry`'s.
    pub fn from_geometry(data: Tensor<B, D, Int>, geometry: Geometry<D>) -> Result<Self> {
        let dims = data.dims();
        if dims != geometry.shape() {
            return Err(ImageError::ShapeMismatch {
                expected: geometry.shape().to_vec(),
                actual: dims.to_vec(),
            });
        }
        Ok(Self { data, geometry })
    }

    /// Build a label image from a row-major buffer of ids.
    pub fn from_labels(values: Vec<i64>, geometry: Geometry<D>, device: &B::Device) -> Result<Self> {
        if values.len() != geometry.num_voxels() {
            return Err(ImageError::VoxelCountMismatch {
                expected: geometry.num_voxels(),
                actual: values.len(),
            });
        }
        let data = Tensor::<B, D, Int>::from_data(
            TensorData::new(values, Shape::new(geometry.shape())),
            device,
        );
        Ok(Self { data, geometry })
    }

    /// Binary mask image: 1 inside, 0 outside.
    pub fn from_mask(mask: &[bool], geometry: Geometry<D>, device: &B::Device) -> Result<Self> {
        let values = mask.iter().map(|&inside| i64::from(inside)).collect();
        Self::from_labels(values, geometry, device)
    }

    /// Mask covering every voxel of `geometry`.
    pub fn filled(geometry: Geometry<D>, value: i64, device: &B::Device) -> Self {
        let data = Tensor::<B, D, Int>::full(geometry.shape(), value, device);
        Self { data, geometry }
    }

    pub fn data(&self) -> &Tensor<B, D, Int> {
        &self.data
    }

    pub fn geometry(&self) -> &Geometry<D> {
        &self.geometry
    }

    pub fn shape(&self) -> [usize; D] {
        self.geometry.shape()
    }

    pub fn device(&self) -> B::Device {
        self.data.device()
    }

    /// Copy the ids to a host buffer in row-major order.
    pub fn to_labels(&self) -> Vec<i64> {
        self.data.to_data().iter::<i64>().collect()
    }

    /// Interpret the image as a mask (non-zero is inside).
    pub fn to_mask(&self) -> Vec<bool> {
        self.data.to_data().iter::<i64>().map(|v| v != 0).collect()
    }

    /// Distinct ids present in the image, ascending.
    pub fn unique_labels(&self) -> Vec<i64> {
        self.to_labels()
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sub-image covered by `region`, keeping world coordinates.
    pub fn crop(&self, region: &Region<D>) -> Result<Self> {
        if !region.fits(&self.geometry) {
            return Err(ImageError::RegionOutOfBounds(format!(
                "region {:?}+{:?} exceeds shape {:?}",
                region.lower(),
                region.size(),
                self.shape()
            )));
        }
        let values = region.extract(&self.to_labels(), &self.geometry);
        Self::from_labels(values, self.geometry.cropped(region), &self.device())
    }
}
