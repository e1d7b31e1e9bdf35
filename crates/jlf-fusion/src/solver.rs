//! Per-voxel atlas weight solver.
//!
//! Given the absolute patch differences `d_i` of `n` atlases at one voxel,
//! the solver builds
//!
//! ```text
//! M[i][j]  = (<d_i, d_j> / max(p - 1, 1)) ^ beta          (p = patch length)
//! M'       = M / (trace(M) / n) + rho * I
//! w        = M'^-1 1 / (1^T M'^-1 1)
//! ```
//!
//! Multiplying `M` by a positive factor leaves `w` unchanged, so the pairwise
//! errors are divided by their largest value before the power and the
//! result by its mean diagonal before the ridge. Both keep the system near
//! unit scale whatever the intensity range or `beta`, and `M'` is the
//! trace-scaled ridge system `M + rho * (trace(M) / n) * I` up to that factor.
//! When every atlas matches the target exactly `M` is zero and the weights
//! come out uniform. Weights always sum to one.
//!
//! # Failure policy
//! If `M'` cannot be solved (only possible with `rho = 0`) or the solution
//! is not finite, uniform weights `1/n` are returned with
//! [`SolveStatus::Fallback`]. The engine counts these and logs a warning; it
//! never aborts the volume.

use nalgebra::{DMatrix, DVector};

use crate::config::JointFusionConfig;

/// How a weight vector was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Unconstrained solve succeeded.
    Solved,
    /// Non-negativity removed `dropped` atlases from the active set.
    Constrained { dropped: usize },
    /// The system was singular or produced non-finite weights.
    Fallback,
}

/// Weights for one voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSolution {
    pub weights: Vec<f64>,
    pub status: SolveStatus,
}

impl WeightSolution {
    fn uniform(n: usize) -> Self {
        Self {
            weights: vec![1.0 / n as f64; n],
            status: SolveStatus::Fallback,
        }
    }
}

/// Ridge-regularised joint weight solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSolver {
    rho: f64,
    beta: f64,
    non_negative: bool,
}

impl WeightSolver {
    pub fn new(rho: f64, beta: f64, non_negative: bool) -> Self {
        Self {
            rho,
            beta,
            non_negative,
        }
    }

    pub fn from_config(config: &JointFusionConfig) -> Self {
        Self::new(config.rho, config.beta, config.non_negative)
    }

    /// Pairwise error matrix `M` from row-major differences
    /// (`n_atlases` rows of `patch_len`), scaled so its largest entry is one.
    pub fn gram_matrix(&self, differences: &[f64], patch_len: usize) -> DMatrix<f64> {
        let n = if patch_len == 0 { 0 } else { differences.len() / patch_len };
        let denominator = patch_len.saturating_sub(1).max(1) as f64;
        let mut gram = DMatrix::<f64>::zeros(n, n);

        for i in 0..n {
            let di = &differences[i * patch_len..(i + 1) * patch_len];
            for j in 0..=i {
                let dj = &differences[j * patch_len..(j + 1) * patch_len];
                let dot: f64 = di.iter().zip(dj).map(|(a, b)| a * b).sum();
                gram[(i, j)] = dot / denominator;
                gram[(j, i)] = dot / denominator;
            }
        }

        // Entries lie in [0, 1] after this, so the power cannot overflow
        let largest = gram.amax();
        if largest > 0.0 && largest.is_finite() {
            gram.apply(|value| *value = (*value / largest).powf(self.beta));
        }
        gram
    }

    /// Divide by the mean diagonal and add the ridge term.
    pub fn regularize(&self, mut gram: DMatrix<f64>) -> DMatrix<f64> {
        let n = gram.nrows();
        if n == 0 {
            return gram;
        }
        let scale = gram.trace() / n as f64;
        if scale > 0.0 && scale.is_finite() {
            gram /= scale;
        }
        for i in 0..n {
            gram[(i, i)] += self.rho;
        }
        gram
    }

    /// Solve for the weights of one voxel.
    pub fn solve(&self, differences: &[f64], patch_len: usize) -> WeightSolution {
        let system = self.regularize(self.gram_matrix(differences, patch_len));
        self.solve_system(&system)
    }

    /// Solve an already regularised system.
    pub fn solve_system(&self, system: &DMatrix<f64>) -> WeightSolution {
        let n = system.nrows();
        if n == 0 {
            return WeightSolution {
                weights: Vec::new(),
                status: SolveStatus::Fallback,
            };
        }

        let mut active: Vec<usize> = (0..n).collect();
        loop {
            let Some(partial) = solve_subset(system, &active) else {
                return WeightSolution::uniform(n);
            };

            let negative = partial.iter().any(|w| *w < 0.0);
            if !self.non_negative || !negative {
                let mut weights = vec![0.0; n];
                for (slot, w) in active.iter().zip(&partial) {
                    weights[*slot] = *w;
                }
                let dropped = n - active.len();
                let status = if dropped > 0 {
                    SolveStatus::Constrained { dropped }
                } else {
                    SolveStatus::Solved
                };
                return WeightSolution { weights, status };
            }

            // Weights sum to one, so at least one stays positive
            active = active
                .iter()
                .zip(&partial)
                .filter(|(_, w)| **w >= 0.0)
                .map(|(i, _)| *i)
                .collect();
        }
    }
}

/// Solve `M'[S,S] x = 1` and normalise `x` to sum to one.
fn solve_subset(system: &DMatrix<f64>, active: &[usize]) -> Option<Vec<f64>> {
    let k = active.len();
    let sub = DMatrix::<f64>::from_fn(k, k, |r, c| system[(active[r], active[c])]);
    let ones = DVector::<f64>::from_element(k, 1.0);
    let x = sub.lu().solve(&ones)?;

    let total: f64 = x.iter().sum();
    if !total.is_finite() || total.abs() <= f64::EPSILON * x.amax() {
        return None;
    }
    let weights: Vec<f64> = x.iter().map(|v| v / total).collect();
    weights.iter().all(|w| w.is_finite()).then_some(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonal_differences() -> Vec<f64> {
        // Disjoint supports give a diagonal Gram matrix
        vec![
            1.0, 0.0, 0.0, //
            0.0, 2.0, 0.0, //
            0.0, 0.0, 3.0,
        ]
    }

    #[test]
    fn test_gram_matrix() {
        let solver = WeightSolver::new(0.0, 1.0, false);
        let gram = solver.gram_matrix(&[1.0, 1.0, 2.0, 0.0], 2);
        // Raw entries 2, 2, 4 divided by the largest
        assert_eq!(gram[(0, 0)], 0.5);
        assert_eq!(gram[(0, 1)], 0.5);
        assert_eq!(gram[(1, 0)], 0.5);
        assert_eq!(gram[(1, 1)], 1.0);

        let sharp = WeightSolver::new(0.0, 2.0, false).gram_matrix(&[1.0, 1.0, 2.0, 0.0], 2);
        assert_eq!(sharp[(0, 0)], 0.25);
        assert_eq!(sharp[(1, 1)], 1.0);
    }

    #[test]
    fn test_gram_matrix_does_not_overflow() {
        let gram = WeightSolver::new(0.0, 40.0, false).gram_matrix(&[1e3, 1e3, 1e4, 1e4], 2);
        assert!(gram.iter().all(|v| v.is_finite()));
        assert_eq!(gram[(1, 1)], 1.0);
        assert!(gram[(0, 0)] < gram[(1, 1)]);
    }

    #[test]
    fn test_regularize_scales_with_trace() {
        let solver = WeightSolver::new(0.5, 1.0, false);
        let gram = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 4.0]);
        let system = solver.regularize(gram);
        // mean diagonal 3, then ridge 0.5
        assert!((system[(0, 0)] - (2.0 / 3.0 + 0.5)).abs() < 1e-12);
        assert!((system[(1, 1)] - (4.0 / 3.0 + 0.5)).abs() < 1e-12);
        assert_eq!(system[(0, 1)], 0.0);
    }

    #[test]
    fn test_weights_do_not_depend_on_difference_scale() {
        let solver = WeightSolver::new(0.01, 4.0, false);
        let reference = solver.solve(&[0.1, 0.1, 1.0, 1.0], 2);
        assert_eq!(reference.status, SolveStatus::Solved);
        assert!(reference.weights[0] > 0.99);

        for scale in [1e-3, 1e-6, 1e3, 1e6] {
            let scaled: Vec<f64> = [0.1, 0.1, 1.0, 1.0].iter().map(|d| d * scale).collect();
            let solution = solver.solve(&scaled, 2);
            assert_eq!(solution.status, SolveStatus::Solved, "scale {}", scale);
            for (w, r) in solution.weights.iter().zip(&reference.weights) {
                assert!((w - r).abs() < 1e-9, "scale {}: {} vs {}", scale, w, r);
            }
        }
    }

    #[test]
    fn test_large_beta_keeps_better_atlas() {
        let solution = WeightSolver::new(0.01, 40.0, false).solve(&[1e3, 1e3, 1e4, 1e4], 2);
        assert_eq!(solution.status, SolveStatus::Solved);
        assert!(solution.weights[0] > 0.99);
    }

    #[test]
    fn test_weights_sum_to_one_and_favour_better_atlas() {
        let solver = WeightSolver::new(0.01, 1.0, false);
        let solution = solver.solve(&diagonal_differences(), 3);
        assert_eq!(solution.status, SolveStatus::Solved);
        let total: f64 = solution.weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(solution.weights[0] > solution.weights[1]);
        assert!(solution.weights[1] > solution.weights[2]);
    }

    #[test]
    fn test_single_atlas_gets_full_weight() {
        let solver = WeightSolver::new(0.1, 4.0, false);
        let solution = solver.solve(&[0.3, 0.1, 0.7], 3);
        assert_eq!(solution.weights, vec![1.0]);
    }

    #[test]
    fn test_perfect_matches_give_uniform_weights() {
        let solver = WeightSolver::new(0.01, 4.0, false);
        let solution = solver.solve(&[0.0; 8], 4);
        assert_eq!(solution.status, SolveStatus::Solved);
        assert_eq!(solution.weights, vec![0.5, 0.5]);
    }

    #[test]
    fn test_singular_system_falls_back_to_uniform() {
        let solver = WeightSolver::new(0.0, 1.0, false);
        // Identical atlases without ridge: rank one
        let solution = solver.solve(&[1.0, 2.0, 1.0, 2.0], 2);
        assert_eq!(solution.status, SolveStatus::Fallback);
        assert_eq!(solution.weights, vec![0.5, 0.5]);
    }

    #[test]
    fn test_non_negative_drops_negative_weights() {
        // Strongly correlated errors push some weights negative
        let system = DMatrix::from_row_slice(3, 3, &[
            1.0, 0.99, 0.5, //
            0.99, 1.0, 0.9, //
            0.5, 0.9, 1.0,
        ]);
        let unconstrained = WeightSolver::new(0.0, 1.0, false).solve_system(&system);
        assert_eq!(unconstrained.status, SolveStatus::Solved);
        assert!(unconstrained.weights.iter().any(|w| *w < 0.0));

        let constrained = WeightSolver::new(0.0, 1.0, true).solve_system(&system);
        assert!(matches!(constrained.status, SolveStatus::Constrained { .. }));
        assert!(constrained.weights.iter().all(|w| *w >= 0.0));
        let total: f64 = constrained.weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ridge_pulls_toward_uniform() {
        let differences = diagonal_differences();
        let deviation = |rho: f64| {
            let solution = WeightSolver::new(rho, 1.0, false).solve(&differences, 3);
            solution
                .weights
                .iter()
                .map(|w| (w - 1.0 / 3.0).abs())
                .fold(0.0, f64::max)
        };
        let d = [deviation(0.01), deviation(1.0), deviation(100.0), deviation(1e4)];
        assert!(d[0] > d[1]);
        assert!(d[1] > d[2]);
        assert!(d[2] > d[3]);
        assert!(d[3] < 1e-3);
    }
}
