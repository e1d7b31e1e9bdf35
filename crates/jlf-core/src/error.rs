//! Error types for image construction and region operations.

use thiserror::Error;

/// Errors raised while building or slicing images.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    /// Buffer length does not match the geometry.
    #[error("Voxel count mismatch: geometry holds {expected} voxels, got {actual}")]
    VoxelCountMismatch { expected: usize, actual: usize },

    /// Tensor shape does not match the geometry.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A region reaches outside the image it is applied to.
    #[error("Region out of bounds: {0}")]
    RegionOutOfBounds(String),
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ImageError::VoxelCountMismatch { expected: 8, actual: 4 };
        assert_eq!(err.to_string(), "Voxel count mismatch: geometry holds 8 voxels, got 4");
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = ImageError::ShapeMismatch {
            expected: vec![4, 4],
            actual: vec![2, 2],
        };
        let msg = err.to_string();
        assert!(msg.contains("expected"));
        assert!(msg.contains("got"));
    }
}
