use burn_ndarray::NdArray;
use jlf_core::{Geometry, Image, LabelImage};
use jlf_fusion::labels::{
    assign_background_label, collect_classes, exclude_zero_labels, resolve_images, resolve_segmentation,
};
use jlf_fusion::ClassMap;
use proptest::prelude::*;

type Backend = NdArray<f32>;

#[test]
fn test_resolve_images_matches_host_resolution() {
    let device = Default::default();
    let geometry = Geometry::<2>::from_shape([2, 2]);
    let classes = ClassMap::from_labels([0, 5, 9]);
    let maps = vec![
        vec![0.6, 0.1, 0.2, 0.3],
        vec![0.3, 0.8, 0.2, 0.3],
        vec![0.1, 0.1, 0.6, 0.4],
    ];
    let images: Vec<Image<Backend, 2>> = maps
        .iter()
        .map(|m| Image::<Backend, 2>::from_voxels(m.clone(), geometry.clone(), &device).unwrap())
        .collect();
    let mask = LabelImage::<Backend, 2>::from_mask(&[true, true, true, false], geometry, &device).unwrap();

    let segmentation = resolve_images(&images, &classes, &mask).unwrap();
    assert_eq!(segmentation.to_labels(), vec![0, 5, 9, 0]);
    assert_eq!(
        segmentation.to_labels(),
        resolve_segmentation(&maps, &classes, &mask.to_mask())
    );
}

#[test]
fn test_resolve_images_rejects_foreign_grid() {
    let device = Default::default();
    let classes = ClassMap::from_labels([1]);
    let map = Image::<Backend, 2>::zeros(Geometry::from_shape([3, 2]), &device);
    let mask = LabelImage::<Backend, 2>::filled(Geometry::from_shape([2, 3]), 1, &device);
    assert!(resolve_images(&[map], &classes, &mask).is_err());
}

fn label_volume() -> impl Strategy<Value = (Vec<Vec<i64>>, Vec<bool>)> {
    (1usize..4, 1usize..40).prop_flat_map(|(atlases, voxels)| {
        (
            prop::collection::vec(prop::collection::vec(-2i64..12, voxels), atlases),
            prop::collection::vec(any::<bool>(), voxels),
        )
    })
}

proptest! {
    #[test]
    fn prop_class_map_round_trip(ids in prop::collection::vec(-50i64..50, 0..30)) {
        let map = ClassMap::from_labels(ids.iter().copied());
        for id in &ids {
            let index = map.index_of(*id).unwrap();
            prop_assert_eq!(map.label_of(index), Some(*id));
        }
        prop_assert!(map.labels().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn prop_one_hot_votes_resolve_to_original_ids((labels, mask) in label_volume()) {
        let classes = collect_classes(&labels, &mask);
        let atlas = &labels[0];
        let maps: Vec<Vec<f32>> = (0..classes.len())
            .map(|k| {
                atlas
                    .iter()
                    .map(|id| if classes.index_of(*id) == Some(k) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect();

        let segmentation = resolve_segmentation(&maps, &classes, &mask);
        for (v, inside) in mask.iter().enumerate() {
            let expected = if *inside { atlas[v] } else { 0 };
            prop_assert_eq!(segmentation[v], expected);
        }
    }

    #[test]
    fn prop_assign_background_leaves_no_zero_in_mask((mut labels, mask) in label_volume()) {
        let before = labels.clone();
        let background = assign_background_label(&mut labels, &mask).unwrap();
        prop_assert!(background >= 1);
        for (atlas, original) in labels.iter().zip(&before) {
            for v in 0..mask.len() {
                if mask[v] {
                    prop_assert_ne!(atlas[v], 0);
                } else {
                    prop_assert_eq!(atlas[v], original[v]);
                }
            }
        }
    }

    #[test]
    fn prop_exclude_zero_labels_leaves_no_zero_in_mask((labels, mut mask) in label_volume()) {
        let before = mask.clone();
        exclude_zero_labels(&mut mask, &labels);
        for v in 0..mask.len() {
            prop_assert!(!mask[v] || labels.iter().all(|atlas| atlas[v] != 0));
            prop_assert!(!mask[v] || before[v]);
        }
    }
}
