//! Intensity image with physical metadata.
//!
//! This module provides the [`Image`] struct: a floating-point tensor plus
//! the [`Geometry`] that places it in physical space. Targets, atlases, fused
//! intensities and per-label probability maps are all `Image`s.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use super::geometry::{Direction, Geometry, Point, Spacing};
use super::region::Region;
use crate::error::{ImageError, Result};

/// Scalar intensity image.
///
/// # Type Parameters
/// * `B` - The backend holding the voxel tensor
/// * `D` - The dimensionality of the image (2 or 3)
///
/// # Examples
/// ```rust
/// use jlf_core::Image;
/// use jlf_core::image::geometry::{Direction, Point, Spacing};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([10, 10, 10], &device);
/// let image = Image::new(data, Point::origin(), Spacing::from_element(1.0), Direction::identity());
/// assert_eq!(image.shape(), [10, 10, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    /// The voxel data.
    data: Tensor<B, D>,
    /// Grid and physical metadata; its shape always equals the tensor's.
    geometry: Geometry<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a new image with the given data and metadata.
    ///
    /// # Arguments
    /// * `data` - The image data as a tensor
    /// * `origin` - Physical coordinate of the first voxel
    /// * `spacing` - Physical distance between voxels along each axis
    /// * `direction` - Orientation matrix of the image axes
    pub fn new(
        data: Tensor<B, D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Self {
        let geometry = Geometry::new(data.dims(), origin, spacing, direction);
        Self { data, geometry }
    }

    /// Wrap a tensor whose shape must equal `geometry`'s.
    pub fn from_geometry(data: Tensor<B, D>, geometry: Geometry<D>) -> Result<Self> {
        let dims = data.dims();
        if dims != geometry.shape() {
            return Err(ImageError::ShapeMismatch {
                expected: geometry.shape().to_vec(),
                actual: dims.to_vec(),
            });
        }
        Ok(Self { data, geometry })
    }

    /// Build an image from a row-major voxel buffer.
    pub fn from_voxels(values: Vec<f32>, geometry: Geometry<D>, device: &B::Device) -> Result<Self> {
        if values.len() != geometry.num_voxels() {
            return Err(ImageError::VoxelCountMismatch {
                expected: geometry.num_voxels(),
                actual: values.len(),
            });
        }
        let data = Tensor::<B, D>::from_data(
            TensorData::new(values, Shape::new(geometry.shape())),
            device,
        );
        Ok(Self { data, geometry })
    }

    /// Zero-filled image on `geometry`.
    pub fn zeros(geometry: Geometry<D>, device: &B::Device) -> Self {
        let data = Tensor::<B, D>::zeros(geometry.shape(), device);
        Self { data, geometry }
    }

    /// Get the image data tensor.
    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    pub fn geometry(&self) -> &Geometry<D> {
        &self.geometry
    }

    /// Get the image shape as an array.
    pub fn shape(&self) -> [usize; D] {
        self.geometry.shape()
    }

    pub fn origin(&self) -> &Point<D> {
        self.geometry.origin()
    }

    pub fn spacing(&self) -> &Spacing<D> {
        self.geometry.spacing()
    }

    pub fn direction(&self) -> &Direction<D> {
        self.geometry.direction()
    }

    pub fn device(&self) -> B::Device {
        self.data.device()
    }

    /// Copy the voxels to a host buffer in row-major order.
    pub fn to_voxels(&self) -> Vec<f32> {
        self.data.to_data().iter::<f32>().collect()
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
        let values = region.extract(&self.to_voxels(), &self.geometry);
        Self::from_voxels(values, self.geometry.cropped(region), &self.device())
    }
}
