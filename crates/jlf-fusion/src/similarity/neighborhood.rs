//! Patch and search-window offset sets.
//!
//! Offsets are generated once per call from a radius and reused at every
//! voxel. Their order is part of the contract: patch offsets are
//! lexicographic (first axis slowest) so difference vectors line up between
//! atlases, and search offsets are sorted by squared length and then
//! lexicographically so ties always resolve to the offset closest to the
//! voxel, independent of thread scheduling.

use jlf_core::Geometry;

/// Ordered set of integer offsets around a centre voxel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighborhood<const D: usize> {
    radius: [usize; D],
    offsets: Vec<[isize; D]>,
}

impl<const D: usize> Neighborhood<D> {
    /// Box patch with the given per-axis radius, lexicographic order.
    pub fn patch(radius: [usize; D]) -> Self {
        Self {
            radius,
            offsets: box_offsets(radius),
        }
    }

    /// Cubic search window, ordered by distance from the centre.
    pub fn search(radius: usize) -> Self {
        let mut offsets = box_offsets([radius; D]);
        // Stable sort keeps lexicographic order among equal lengths
        offsets.sort_by_key(|offset| offset.iter().map(|o| o * o).sum::<isize>());
        Self {
            radius: [radius; D],
            offsets,
        }
    }

    pub fn radius(&self) -> [usize; D] {
        self.radius
    }

    pub fn offsets(&self) -> &[[isize; D]] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

fn box_offsets<const D: usize>(radius: [usize; D]) -> Vec<[isize; D]> {
    let mut side = [0usize; D];
    for axis in 0..D {
        side[axis] = 2 * radius[axis] + 1;
    }
    let window = Geometry::<D>::from_shape(side);
    (0..window.num_voxels())
        .map(|linear| {
            let index = window.coordinates(linear);
            let mut offset = [0isize; D];
            for axis in 0..D {
                offset[axis] = index[axis] as isize - radius[axis] as isize;
            }
            offset
        })
        .collect()
}
