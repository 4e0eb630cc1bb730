//! Sparse linear solve for the augmented normal equations
//!
//! The Levenberg-Marquardt inner step solves `(JᵀJ + λI) δ = −Jᵀr` with a
//! sparse Cholesky factorization. Assembly Jacobians are block-sparse: each
//! residual row touches at most the 12 parameter columns of the two bodies
//! its constraint references.

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Llt, SymbolicLlt};
use faer::sparse::{SparseColMat, Triplet};
use std::ops::Mul;

/// Sparse Cholesky solver for the damped least-squares step.
#[derive(Debug, Clone, Default)]
pub struct SparseCholeskySolver;

impl SparseCholeskySolver {
    pub fn new() -> Self {
        SparseCholeskySolver
    }

    /// Solve `(JᵀJ + λI) δ = −Jᵀr`. Returns `None` if the augmented system
    /// cannot be factorized.
    pub fn solve_augmented(
        &self,
        residuals: &faer::Mat<f64>,
        jacobian: &SparseColMat<usize, f64>,
        lambda: f64,
    ) -> Option<faer::Mat<f64>> {
        let n = jacobian.ncols();

        // H = J^T * J
        let hessian = jacobian
            .as_ref()
            .transpose()
            .to_col_major()
            .ok()?
            .mul(jacobian.as_ref());

        // g = J^T * -r
        let gradient = jacobian.as_ref().transpose().mul(-residuals);

        // H_aug = H + lambda * I
        let mut damping_triplets = Vec::with_capacity(n);
        for i in 0..n {
            damping_triplets.push(Triplet::new(i, i, lambda));
        }
        let damping = SparseColMat::try_new_from_triplets(n, n, &damping_triplets).ok()?;
        let augmented = hessian + damping;

        // The sparsity pattern is constant across iterations, but the cost of
        // re-running the symbolic analysis is negligible at assembly scale.
        let symbolic = SymbolicLlt::try_new(augmented.symbolic(), faer::Side::Lower).ok()?;
        let cholesky =
            Llt::try_new_with_symbolic(symbolic, augmented.as_ref(), faer::Side::Lower).ok()?;
        Some(cholesky.solve(gradient))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_augmented_identity_jacobian() {
        // J = I, r = [1, 2]: undamped step is -r.
        let triplets = vec![Triplet::new(0, 0, 1.0), Triplet::new(1, 1, 1.0)];
        let jacobian = SparseColMat::try_new_from_triplets(2, 2, &triplets).unwrap();
        let residuals = faer::mat![[1.0], [2.0]];

        let step = SparseCholeskySolver::new()
            .solve_augmented(&residuals, &jacobian, 0.0)
            .unwrap();
        assert!((step[(0, 0)] + 1.0).abs() < 1e-12);
        assert!((step[(1, 0)] + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_damping_shrinks_the_step() {
        let triplets = vec![Triplet::new(0, 0, 1.0)];
        let jacobian = SparseColMat::try_new_from_triplets(1, 1, &triplets).unwrap();
        let residuals = faer::mat![[1.0]];

        let solver = SparseCholeskySolver::new();
        let free = solver.solve_augmented(&residuals, &jacobian, 0.0).unwrap();
        let damped = solver.solve_augmented(&residuals, &jacobian, 1.0).unwrap();
        assert!(damped[(0, 0)].abs() < free[(0, 0)].abs());
        // (1 + 1) δ = -1  →  δ = -0.5
        assert!((damped[(0, 0)] + 0.5).abs() < 1e-12);
    }
}
