use burn::tensor::Tensor;
use burn_ndarray::NdArray;
use jlf_core::image::geometry::{Direction, Point, Spacing};
use jlf_core::{Geometry, Image, LabelImage, Region};
use nalgebra::{Rotation3, Vector3};
use proptest::prelude::*;

type Backend = NdArray<f32>;

fn make_rotation(angle_x: f64, angle_y: f64, angle_z: f64) -> Direction<3> {
    let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), angle_x);
    let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), angle_y);
    let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), angle_z);
    (rx * ry * rz).into_inner()
}

#[test]
fn test_rotated_geometry_mapping() {
    // 90 degrees about Z: axis 0 points along +Y
    let direction = make_rotation(0.0, 0.0, std::f64::consts::FRAC_PI_2);
    let geometry = Geometry::<3>::new([10, 10, 10], Point::origin(), Spacing::from_element(1.0), direction);

    let index = geometry.physical_to_index(&Point::<3>::new(1.0, 0.0, 0.0)).unwrap();
    assert!((index[0] - 0.0).abs() < 1e-9, "index[0] = {}", index[0]);
    assert!((index[1] + 1.0).abs() < 1e-9, "index[1] = {}", index[1]);
    assert!((index[2] - 0.0).abs() < 1e-9, "index[2] = {}", index[2]);
}

#[test]
fn test_image_and_labels_share_geometry() {
    let device = Default::default();
    let geometry = Geometry::<3>::new(
        [3, 4, 5],
        Point::<3>::new(-1.0, 0.5, 2.0),
        Spacing::<3>::new(0.8, 0.8, 1.2),
        Direction::identity(),
    );
    let image = Image::<Backend, 3>::zeros(geometry.clone(), &device);
    let labels = LabelImage::<Backend, 3>::filled(geometry, 7, &device);
    assert!(image.geometry().is_congruent(labels.geometry()));

    let moved = Image::new(
        Tensor::<Backend, 3>::zeros([3, 4, 5], &device),
        Point::<3>::new(-1.0, 0.5, 2.5),
        Spacing::<3>::new(0.8, 0.8, 1.2),
        Direction::identity(),
    );
    assert!(!moved.geometry().is_congruent(labels.geometry()));
}

#[test]
fn test_crop_keeps_physical_position() {
    let device = Default::default();
    let geometry = Geometry::<3>::new(
        [6, 6, 6],
        Point::<3>::new(3.0, 2.0, 1.0),
        Spacing::<3>::new(1.5, 2.0, 0.5),
        make_rotation(0.3, -0.2, 0.1),
    );
    let values: Vec<f32> = (0..216).map(|v| v as f32).collect();
    let image = Image::<Backend, 3>::from_voxels(values, geometry, &device).unwrap();

    let region = Region::new([1, 2, 3], [3, 2, 2]);
    let cropped = image.crop(&region).unwrap();

    let world_a = image.geometry().index_to_physical(&[2.0, 3.0, 4.0]);
    let world_b = cropped.geometry().index_to_physical(&[1.0, 1.0, 1.0]);
    assert!((world_a - world_b).norm() < 1e-9);

    let source = image.to_voxels();
    let voxel = cropped.to_voxels()[cropped.geometry().linear_index(&[1, 1, 1])];
    assert_eq!(voxel, source[image.geometry().linear_index(&[2, 3, 4])]);
}

proptest! {
    #[test]
    fn test_coordinate_roundtrip(
        ox in -100.0f64..100.0, oy in -100.0f64..100.0, oz in -100.0f64..100.0,
        sx in 0.1f64..5.0, sy in 0.1f64..5.0, sz in 0.1f64..5.0,
        ax in -3.14f64..3.14, ay in -3.14f64..3.14, az in -3.14f64..3.14,
        px in -50.0f64..50.0, py in -50.0f64..50.0, pz in -50.0f64..50.0
    ) {
        let geometry = Geometry::<3>::new(
            [2, 2, 2],
            Point::<3>::new(ox, oy, oz),
            Spacing::<3>::new(sx, sy, sz),
            make_rotation(ax, ay, az),
        );
        let point = Point::<3>::new(px, py, pz);

        let index = geometry.physical_to_index(&point).unwrap();
        let recovered = geometry.index_to_physical(&index);

        prop_assert!((point[0] - recovered[0]).abs() < 1e-6, "X mismatch: {} vs {}", point[0], recovered[0]);
        prop_assert!((point[1] - recovered[1]).abs() < 1e-6, "Y mismatch: {} vs {}", point[1], recovered[1]);
        prop_assert!((point[2] - recovered[2]).abs() < 1e-6, "Z mismatch: {} vs {}", point[2], recovered[2]);
    }

    #[test]
    fn test_linear_index_roundtrip(
        nx in 1usize..8, ny in 1usize..8, nz in 1usize..8, seed in 0usize..10_000
    ) {
        let geometry = Geometry::<3>::from_shape([nx, ny, nz]);
        let linear = seed % geometry.num_voxels();
        let index = geometry.coordinates(linear);
        prop_assert_eq!(geometry.linear_index(&index), linear);
    }
}
