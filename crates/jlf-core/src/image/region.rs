//! Axis-aligned voxel regions used for cropping.

use super::geometry::Geometry;

/// Axis-aligned box of voxels given by its lower corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region<const D: usize> {
    lower: [usize; D],
    size: [usize; D],
}

impl<const D: usize> Region<D> {
    pub fn new(lower: [usize; D], size: [usize; D]) -> Self {
        Self { lower, size }
    }

    /// Region covering a whole grid.
    pub fn full(geometry: &Geometry<D>) -> Self {
        Self::new([0; D], geometry.shape())
    }

    pub fn lower(&self) -> [usize; D] {
        self.lower
    }

    pub fn size(&self) -> [usize; D] {
        self.size
    }

    /// Exclusive upper corner.
    pub fn upper(&self) -> [usize; D] {
        let mut upper = [0usize; D];
        for axis in 0..D {
            upper[axis] = self.lower[axis] + self.size[axis];
        }
        upper
    }

    pub fn num_voxels(&self) -> usize {
        self.size.iter().product()
    }

    /// True when the region lies inside `geometry`'s grid.
    pub fn fits(&self, geometry: &Geometry<D>) -> bool {
        let shape = geometry.shape();
        let upper = self.upper();
        (0..D).all(|axis| upper[axis] <= shape[axis])
    }

    /// Tight bounding box of the `true` voxels of a mask, or `None` if the
    /// mask is empty.
    pub fn bounding_box(mask: &[bool], geometry: &Geometry<D>) -> Option<Self> {
        let mut lower = [usize::MAX; D];
        let mut upper = [0usize; D];
        let mut any = false;

        for (linear, _) in mask.iter().enumerate().filter(|(_, inside)| **inside) {
            let index = geometry.coordinates(linear);
            for axis in 0..D {
                lower[axis] = lower[axis].min(index[axis]);
                upper[axis] = upper[axis].max(index[axis]);
            }
            any = true;
        }

        if !any {
            return None;
        }

        let mut size = [0usize; D];
        for axis in 0..D {
            size[axis] = upper[axis] - lower[axis] + 1;
        }
        Some(Self::new(lower, size))
    }

    /// Copy the voxels of `region` out of a row-major buffer laid out on
    /// `geometry`.
    pub fn extract<T: Copy>(&self, values: &[T], geometry: &Geometry<D>) -> Vec<T> {
        let cropped = Geometry::<D>::from_shape(self.size);
        let mut out = Vec::with_capacity(self.num_voxels());
        for linear in 0..cropped.num_voxels() {
            let local = cropped.coordinates(linear);
            let mut index = [0usize; D];
            for axis in 0..D {
                index[axis] = local[axis] + self.lower[axis];
            }
            out.push(values[geometry.linear_index(&index)]);
        }
        out
    }
}
