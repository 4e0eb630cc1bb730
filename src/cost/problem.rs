//! Residual aggregation over all cost terms
//!
//! Owns the bound residual terms with fixed row offsets and evaluates the
//! stacked residual vector and its sparse Jacobian at a parameter vector.
//! Blocks are evaluated in parallel; each touches only the parameter slots of
//! the bodies its constraint references, so the Jacobian stays block-sparse.

use crate::cost::{BoundTerm, CostTerm};
use crate::error::{AssemblyError, AssemblyResult};
use crate::pose::Pose;
use faer::sparse::{SparseColMat, Triplet};
use faer_ext::IntoFaer;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

struct ResidualBlock {
    row_start: usize,
    slots: Vec<usize>,
    term: Box<dyn CostTerm>,
}

/// The assembled least-squares problem: minimize `‖r(x)‖²` over the flat
/// parameter vector.
pub struct Problem {
    blocks: Vec<ResidualBlock>,
    residual_dim: usize,
    dof: usize,
}

impl Problem {
    /// Assemble from bound terms, assigning each a fixed residual row range
    /// in term order.
    pub fn new(terms: Vec<BoundTerm>, dof: usize) -> Self {
        let mut blocks = Vec::with_capacity(terms.len());
        let mut row_start = 0;
        for bound in terms {
            let dim = bound.term.dimension();
            blocks.push(ResidualBlock {
                row_start,
                slots: bound.slots,
                term: bound.term,
            });
            row_start += dim;
        }
        Problem {
            blocks,
            residual_dim: row_start,
            dof,
        }
    }

    /// Total number of residual rows.
    pub fn residual_dim(&self) -> usize {
        self.residual_dim
    }

    /// Total number of parameter columns.
    pub fn dof(&self) -> usize {
        self.dof
    }

    fn block_params(block: &ResidualBlock, x: &DVector<f64>) -> Vec<DVector<f64>> {
        block
            .slots
            .iter()
            .map(|&slot| x.rows(slot * Pose::DOF, Pose::DOF).clone_owned())
            .collect()
    }

    /// Stacked residual vector at `x`.
    pub fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let parts: Vec<(usize, DVector<f64>)> = self
            .blocks
            .par_iter()
            .map(|block| {
                let params = Self::block_params(block, x);
                (block.row_start, block.term.residual(&params))
            })
            .collect();

        let mut residual = DVector::zeros(self.residual_dim);
        for (row_start, r) in parts {
            residual.rows_mut(row_start, r.len()).copy_from(&r);
        }
        residual
    }

    /// Total objective: sum of squared residual norms over all terms.
    pub fn cost(&self, x: &DVector<f64>) -> f64 {
        self.residuals(x).norm_squared()
    }

    /// Residual and sparse Jacobian at `x`, ready for the normal equations.
    pub fn linearize(
        &self,
        x: &DVector<f64>,
    ) -> AssemblyResult<(faer::Mat<f64>, SparseColMat<usize, f64>)> {
        let parts: Vec<(usize, &[usize], DVector<f64>, DMatrix<f64>)> = self
            .blocks
            .par_iter()
            .map(|block| {
                let params = Self::block_params(block, x);
                let (r, jac) = block.term.linearize(&params);
                (block.row_start, block.slots.as_slice(), r, jac)
            })
            .collect();

        let mut residual = DVector::zeros(self.residual_dim);
        let mut triplets: Vec<Triplet<usize, usize, f64>> = Vec::new();
        for (row_start, slots, r, jac) in parts {
            residual.rows_mut(row_start, r.len()).copy_from(&r);
            for (k, &slot) in slots.iter().enumerate() {
                for local_col in 0..Pose::DOF {
                    for local_row in 0..jac.nrows() {
                        let value = jac[(local_row, k * Pose::DOF + local_col)];
                        if value != 0.0 {
                            triplets.push(Triplet::new(
                                row_start + local_row,
                                slot * Pose::DOF + local_col,
                                value,
                            ));
                        }
                    }
                }
            }
        }

        let jacobian =
            SparseColMat::try_new_from_triplets(self.residual_dim, self.dof, &triplets)
                .map_err(|e| AssemblyError::LinearSolver(format!("jacobian assembly: {e:?}")))?;
        let residual_faer = residual.view_range(.., ..).into_faer().to_owned();
        Ok((residual_faer, jacobian))
    }
}
