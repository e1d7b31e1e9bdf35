//! Binary mask helpers used to build focus regions.

use super::geometry::Geometry;

/// Mask of the voxels whose id is one of `accepted`.
pub fn threshold_labels(labels: &[i64], accepted: &[i64]) -> Vec<bool> {
    labels.iter().map(|label| accepted.contains(label)).collect()
}

/// Binary dilation with a ball of `radius` voxels (index space).
///
/// Every voxel within Euclidean index distance `radius` of a set voxel is
/// set. A zero radius returns the mask unchanged.
pub fn dilate_ball<const D: usize>(mask: &[bool], geometry: &Geometry<D>, radius: usize) -> Vec<bool> {
    if radius == 0 {
        return mask.to_vec();
    }

    let r = radius as isize;
    let limit = r * r;
    let side = 2 * radius + 1;
    let window = Geometry::<D>::from_shape([side; D]);

    // Structuring element offsets relative to the centre
    let offsets: Vec<[isize; D]> = (0..window.num_voxels())
        .filter_map(|linear| {
            let index = window.coordinates(linear);
            let mut offset = [0isize; D];
            for axis in 0..D {
                offset[axis] = index[axis] as isize - r;
            }
            let norm: isize = offset.iter().map(|o| o * o).sum();
            (norm <= limit).then_some(offset)
        })
        .collect();

    let mut out = mask.to_vec();
    for (linear, _) in mask.iter().enumerate().filter(|(_, inside)| **inside) {
        let center = geometry.coordinates(linear);
        for offset in &offsets {
            if let Some(neighbor) = geometry.shifted(&center, offset) {
                out[geometry.linear_index(&neighbor)] = true;
            }
        }
    }
    out
}
