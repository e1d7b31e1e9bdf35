use jlf_fusion::{SolveStatus, WeightSolver};
use proptest::prelude::*;

fn differences() -> impl Strategy<Value = (Vec<f64>, usize)> {
    (1usize..6, 1usize..10).prop_flat_map(|(atlases, patch_len)| {
        (
            prop::collection::vec(0.0f64..5.0, atlases * patch_len),
            Just(patch_len),
        )
    })
}

proptest! {
    #[test]
    fn prop_weights_are_finite_and_sum_to_one(
        (diffs, patch_len) in differences(),
        rho in 1e-3f64..10.0,
        beta in 0.5f64..6.0,
    ) {
        let solution = WeightSolver::new(rho, beta, false).solve(&diffs, patch_len);
        prop_assert!(solution.weights.iter().all(|w| w.is_finite()));
        let total: f64 = solution.weights.iter().sum();
        prop_assert!((total - 1.0).abs() < 1e-6, "sum {}", total);
    }

    #[test]
    fn prop_non_negative_weights(
        (diffs, patch_len) in differences(),
        rho in 1e-3f64..10.0,
    ) {
        let solution = WeightSolver::new(rho, 2.0, true).solve(&diffs, patch_len);
        prop_assert!(solution.weights.iter().all(|w| *w >= 0.0));
        let total: f64 = solution.weights.iter().sum();
        prop_assert!((total - 1.0).abs() < 1e-6, "sum {}", total);
    }

    #[test]
    fn prop_identical_atlases_share_weight(
        row in prop::collection::vec(0.0f64..3.0, 1..8),
        copies in 2usize..5,
    ) {
        let diffs: Vec<f64> = row.iter().copied().cycle().take(row.len() * copies).collect();
        let solution = WeightSolver::new(0.05, 4.0, false).solve(&diffs, row.len());
        prop_assert_ne!(solution.status, SolveStatus::Fallback);
        for w in &solution.weights {
            prop_assert!((w - 1.0 / copies as f64).abs() < 1e-9);
        }
    }
}

#[test]
fn test_ridge_drives_weights_to_uniform() {
    // Three atlases with increasing, partly shared error
    let diffs = vec![
        0.1, 0.2, 0.0, 0.1, //
        0.5, 0.1, 0.4, 0.2, //
        1.0, 0.9, 0.3, 0.8,
    ];
    let spread = |rho: f64| {
        let w = WeightSolver::new(rho, 2.0, false).solve(&diffs, 4).weights;
        w.iter().map(|v| (v - 1.0 / 3.0).abs()).fold(0.0, f64::max)
    };
    let mut previous = f64::INFINITY;
    for rho in [0.01, 0.1, 1.0, 10.0, 100.0] {
        let current = spread(rho);
        assert!(current < previous, "rho {} spread {} >= {}", rho, current, previous);
        previous = current;
    }
    assert!(previous < 0.01);
}
