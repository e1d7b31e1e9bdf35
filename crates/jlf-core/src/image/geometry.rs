//! Physical geometry shared by every image taking part in a fusion call.
//!
//! A geometry couples the voxel grid (shape, row-major layout with the last
//! axis fastest, matching the tensor layout) with the physical metadata that
//! maps indices to world coordinates:
//! `point = origin + Direction * (index * spacing)`.

use nalgebra::{SMatrix, SVector};

use super::region::Region;

/// Physical coordinate in D-dimensional space.
pub type Point<const D: usize> = nalgebra::Point<f64, D>;
/// Physical distance between voxels along each axis.
pub type Spacing<const D: usize> = SVector<f64, D>;
/// Orientation of the image axes; column i is the direction of axis i.
pub type Direction<const D: usize> = SMatrix<f64, D, D>;

/// Tolerance used when comparing origin, spacing and direction.
pub const GEOMETRY_TOLERANCE: f64 = 1e-6;

/// Voxel grid plus physical metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry<const D: usize> {
    shape: [usize; D],
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
}

impl<const D: usize> Geometry<D> {
    /// Create a geometry from its shape and physical metadata.
    pub fn new(
        shape: [usize; D],
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Self {
        Self {
            shape,
            origin,
            spacing,
            direction,
        }
    }

    /// Unit spacing, zero origin and identity direction.
    pub fn from_shape(shape: [usize; D]) -> Self {
        Self::new(
            shape,
            Point::origin(),
            Spacing::from_element(1.0),
            Direction::identity(),
        )
    }

    /// Voxel counts per axis.
    pub fn shape(&self) -> [usize; D] {
        self.shape
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Total number of voxels.
    pub fn num_voxels(&self) -> usize {
        self.shape.iter().product()
    }

    /// Row-major strides (last axis contiguous).
    pub fn strides(&self) -> [usize; D] {
        let mut strides = [1usize; D];
        for axis in (0..D.saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.shape[axis + 1];
        }
        strides
    }

    /// Flatten a voxel index into a buffer offset.
    pub fn linear_index(&self, index: &[usize; D]) -> usize {
        let strides = self.strides();
        (0..D).map(|axis| index[axis] * strides[axis]).sum()
    }

    /// Recover the voxel index of a buffer offset.
    pub fn coordinates(&self, mut linear: usize) -> [usize; D] {
        let mut index = [0usize; D];
        for axis in (0..D).rev() {
            index[axis] = linear % self.shape[axis];
            linear /= self.shape[axis];
        }
        index
    }

    /// Shift an index by an offset; `None` when the result leaves the grid.
    pub fn shifted(&self, index: &[usize; D], offset: &[isize; D]) -> Option<[usize; D]> {
        let mut out = [0usize; D];
        for axis in 0..D {
            let moved = index[axis] as isize + offset[axis];
            if moved < 0 || moved >= self.shape[axis] as isize {
                return None;
            }
            out[axis] = moved as usize;
        }
        Some(out)
    }

    /// Buffer offset of `index + offset`, replicating the nearest edge voxel
    /// on every axis that falls outside the grid.
    pub fn clamped_linear_index(&self, index: &[usize; D], offset: &[isize; D]) -> usize {
        let strides = self.strides();
        let mut linear = 0usize;
        for axis in 0..D {
            let last = self.shape[axis] as isize - 1;
            let moved = (index[axis] as isize + offset[axis]).clamp(0, last.max(0));
            linear += moved as usize * strides[axis];
        }
        linear
    }

    /// Map a continuous index to a physical point.
    pub fn index_to_physical(&self, index: &[f64; D]) -> Point<D> {
        let mut scaled = SVector::<f64, D>::zeros();
        for axis in 0..D {
            scaled[axis] = index[axis] * self.spacing[axis];
        }
        self.origin + self.direction * scaled
    }

    /// Map a physical point to a continuous index.
    ///
    /// Returns `None` when the direction matrix is singular.
    pub fn physical_to_index(&self, point: &Point<D>) -> Option<[f64; D]> {
        let inverse = self.direction.try_inverse()?;
        let rotated = inverse * (*point - self.origin);
        let mut index = [0.0; D];
        for axis in 0..D {
            index[axis] = rotated[axis] / self.spacing[axis];
        }
        Some(index)
    }

    /// Describe the first difference to `other`, if any.
    ///
    /// Shapes must match exactly; origin, spacing and direction within
    /// [`GEOMETRY_TOLERANCE`].
    pub fn mismatch(&self, other: &Self) -> Option<String> {
        if self.shape != other.shape {
            return Some(format!("shape {:?} vs {:?}", self.shape, other.shape));
        }
        let close = |a: f64, b: f64| (a - b).abs() <= GEOMETRY_TOLERANCE;
        if (0..D).any(|i| !close(self.origin[i], other.origin[i])) {
            return Some(format!(
                "origin {:?} vs {:?}",
                self.origin.coords.as_slice(),
                other.origin.coords.as_slice()
            ));
        }
        if (0..D).any(|i| !close(self.spacing[i], other.spacing[i])) {
            return Some(format!(
                "spacing {:?} vs {:?}",
                self.spacing.as_slice(),
                other.spacing.as_slice()
            ));
        }
        if self
            .direction
            .iter()
            .zip(other.direction.iter())
            .any(|(a, b)| !close(*a, *b))
        {
            return Some("direction matrices differ".to_string());
        }
        None
    }

    /// True when both geometries describe the same grid in physical space.
    pub fn is_congruent(&self, other: &Self) -> bool {
        self.mismatch(other).is_none()
    }

    /// Geometry of the sub-grid covered by `region`.
    ///
    /// The cropped origin is the physical position of the region's lower
    /// corner, so every voxel keeps its world coordinate.
    pub fn cropped(&self, region: &Region<D>) -> Self {
        let mut lower = [0.0; D];
        for axis in 0..D {
            lower[axis] = region.lower()[axis] as f64;
        }
        Self {
            shape: region.size(),
            origin: self.index_to_physical(&lower),
            spacing: self.spacing,
            direction: self.direction,
        }
    }
}
