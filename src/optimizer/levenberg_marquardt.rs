//! Levenberg-Marquardt minimizer
//!
//! Interpolates between Gauss-Newton and gradient descent with an adaptive
//! damping parameter. Each iteration linearizes the residuals, solves the
//! augmented normal equations through the sparse Cholesky solver, and
//! accepts or rejects the step based on the gain ratio between actual and
//! predicted cost reduction.

use crate::cost::Problem;
use crate::error::{AssemblyError, AssemblyResult};
use crate::linalg::SparseCholeskySolver;
use crate::optimizer::{ConvergenceInfo, LmConfig, OptimizationStatus, OptimizerResult};
use nalgebra::DVector;
use std::time::Instant;
use tracing::debug;

/// Levenberg-Marquardt solver for the assembly least-squares problem.
pub struct LevenbergMarquardt {
    config: LmConfig,
    damping: f64,
    damping_min: f64,
    damping_max: f64,
    damping_increase_factor: f64,
    damping_decrease_factor: f64,
    min_step_quality: f64,
    good_step_quality: f64,
}

impl LevenbergMarquardt {
    /// Create a solver with default configuration.
    pub fn new() -> Self {
        Self::with_config(LmConfig::default())
    }

    /// Create a solver with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self {
            config,
            damping: 1e-3,
            damping_min: 1e-12,
            damping_max: 1e12,
            damping_increase_factor: 10.0,
            damping_decrease_factor: 0.3,
            min_step_quality: 0.0,
            good_step_quality: 0.75,
        }
    }

    /// Set the initial damping parameter.
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Set the damping parameter bounds.
    pub fn with_damping_bounds(mut self, min: f64, max: f64) -> Self {
        self.damping_min = min;
        self.damping_max = max;
        self
    }

    /// Set the damping adjustment factors.
    pub fn with_damping_factors(mut self, increase: f64, decrease: f64) -> Self {
        self.damping_increase_factor = increase;
        self.damping_decrease_factor = decrease;
        self
    }

    /// Update damping based on step quality; returns whether to accept.
    fn update_damping(&mut self, rho: f64) -> bool {
        if rho > self.good_step_quality {
            self.damping = (self.damping * self.damping_decrease_factor).max(self.damping_min);
            true
        } else if rho < self.min_step_quality {
            self.damping = (self.damping * self.damping_increase_factor).min(self.damping_max);
            false
        } else {
            true
        }
    }

    /// Step quality ratio: actual vs predicted cost reduction.
    fn step_quality(current_cost: f64, new_cost: f64, predicted_reduction: f64) -> f64 {
        let actual_reduction = current_cost - new_cost;
        if predicted_reduction.abs() < 1e-15 {
            if actual_reduction > 0.0 { 1.0 } else { 0.0 }
        } else {
            actual_reduction / predicted_reduction
        }
    }

    fn check_convergence(
        &self,
        iteration: usize,
        accepted_cost_change: Option<f64>,
        parameter_update_norm: f64,
        gradient_norm: f64,
    ) -> Option<OptimizationStatus> {
        if iteration + 1 >= self.config.max_iterations {
            return Some(OptimizationStatus::MaxIterationsReached);
        }
        if let Some(cost_change) = accepted_cost_change {
            if cost_change.abs() < self.config.cost_tolerance {
                return Some(OptimizationStatus::CostToleranceReached);
            }
            if parameter_update_norm < self.config.parameter_tolerance {
                return Some(OptimizationStatus::ParameterToleranceReached);
            }
        }
        if gradient_norm < self.config.gradient_tolerance {
            return Some(OptimizationStatus::GradientToleranceReached);
        }
        None
    }

    /// Minimize the problem starting from `x0`.
    pub fn minimize(
        &mut self,
        problem: &Problem,
        x0: DVector<f64>,
    ) -> AssemblyResult<OptimizerResult> {
        let start_time = Instant::now();
        let linear_solver = SparseCholeskySolver::new();

        let mut params = x0;
        let initial_cost = problem.cost(&params);
        let mut current_cost = initial_cost;
        let mut cost_evaluations = 1;
        let mut jacobian_evaluations = 0;

        debug!(
            initial_cost,
            damping = self.damping,
            max_iterations = self.config.max_iterations,
            "starting Levenberg-Marquardt"
        );

        let mut iteration = 0;
        let mut final_gradient_norm;
        let mut final_parameter_update_norm = 0.0;

        loop {
            let (residuals, jacobian) = problem.linearize(&params)?;
            jacobian_evaluations += 1;

            let gradient = jacobian.as_ref().transpose() * &residuals;
            let gradient_norm = gradient.norm_l2();
            final_gradient_norm = gradient_norm;

            let step = linear_solver
                .solve_augmented(&residuals, &jacobian, self.damping)
                .ok_or_else(|| {
                    AssemblyError::LinearSolver(
                        "failed to factorize the augmented normal equations".to_string(),
                    )
                })?;
            let step_norm = step.norm_l2();

            // Predicted reduction of ‖r‖² under the linear model:
            // -(2 gᵀδ + δᵀ H δ) with H = JᵀJ and g = Jᵀr.
            let hessian = {
                use std::ops::Mul;
                jacobian
                    .as_ref()
                    .transpose()
                    .to_col_major()
                    .map_err(|e| AssemblyError::LinearSolver(format!("{e:?}")))?
                    .mul(jacobian.as_ref())
            };
            let linear_term = (step.transpose() * &gradient)[(0, 0)];
            let quadratic_term = (step.transpose() * (&hessian * &step))[(0, 0)];
            let predicted_reduction = -(2.0 * linear_term + quadratic_term);

            let mut new_params = params.clone();
            for i in 0..new_params.len() {
                new_params[i] += step[(i, 0)];
            }
            let new_cost = problem.cost(&new_params);
            cost_evaluations += 1;

            let rho = Self::step_quality(current_cost, new_cost, predicted_reduction);
            let accepted = self.update_damping(rho);

            let accepted_cost_change = if accepted {
                let cost_change = current_cost - new_cost;
                params = new_params;
                current_cost = new_cost;
                final_parameter_update_norm = step_norm;
                Some(cost_change)
            } else {
                None
            };

            debug!(
                iteration,
                cost = current_cost,
                damping = self.damping,
                step_norm,
                rho,
                accepted,
                "LM iteration"
            );

            if let Some(status) = self.check_convergence(
                iteration,
                accepted_cost_change,
                step_norm,
                gradient_norm,
            ) {
                debug!(%status, final_cost = current_cost, iterations = iteration + 1, "LM finished");
                return Ok(OptimizerResult {
                    parameters: params,
                    status,
                    initial_cost,
                    final_cost: current_cost,
                    iterations: iteration + 1,
                    elapsed_time: start_time.elapsed(),
                    convergence_info: ConvergenceInfo {
                        final_gradient_norm,
                        final_parameter_update_norm,
                        cost_evaluations,
                        jacobian_evaluations,
                    },
                });
            }
            iteration += 1;
        }
    }
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{BoundTerm, CostTerm};
    use crate::pose::Pose;

    #[test]
    fn test_creation_and_builders() {
        let solver = LevenbergMarquardt::new()
            .with_damping(1e-6)
            .with_damping_bounds(1e-15, 1e15);
        assert_eq!(solver.damping, 1e-6);
        assert_eq!(solver.damping_min, 1e-15);
        assert_eq!(solver.damping_max, 1e15);
    }

    /// r = [x0 - a, x1 - b]: a trivially solvable two-parameter problem.
    struct TargetTerm {
        a: f64,
        b: f64,
    }

    impl CostTerm for TargetTerm {
        fn dimension(&self) -> usize {
            2
        }

        fn residual(&self, params: &[DVector<f64>]) -> DVector<f64> {
            DVector::from_column_slice(&[params[0][0] - self.a, params[0][1] - self.b])
        }
    }

    #[test]
    fn test_minimizes_linear_problem() {
        let problem = Problem::new(
            vec![BoundTerm {
                term: Box::new(TargetTerm { a: 2.0, b: -3.0 }),
                slots: vec![0],
            }],
            Pose::DOF,
        );

        let mut solver = LevenbergMarquardt::new();
        let result = solver.minimize(&problem, DVector::zeros(Pose::DOF)).unwrap();

        assert!(result.status.is_converged(), "status: {}", result.status);
        assert!(result.final_cost < 1e-12, "final cost: {}", result.final_cost);
        assert!((result.parameters[0] - 2.0).abs() < 1e-5);
        assert!((result.parameters[1] + 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_residual_start_stops_immediately() {
        let problem = Problem::new(
            vec![BoundTerm {
                term: Box::new(TargetTerm { a: 0.0, b: 0.0 }),
                slots: vec![0],
            }],
            Pose::DOF,
        );

        let mut solver = LevenbergMarquardt::new();
        let result = solver.minimize(&problem, DVector::zeros(Pose::DOF)).unwrap();

        assert!(result.status.is_converged());
        assert_eq!(result.iterations, 1);
        assert!(result.parameters.norm() < 1e-12);
    }

    #[test]
    fn test_iteration_cap_reported_not_fatal() {
        let problem = Problem::new(
            vec![BoundTerm {
                term: Box::new(TargetTerm { a: 1.0, b: 1.0 }),
                slots: vec![0],
            }],
            Pose::DOF,
        );

        let mut solver = LevenbergMarquardt::with_config(LmConfig::default().with_max_iterations(1));
        let result = solver.minimize(&problem, DVector::zeros(Pose::DOF)).unwrap();
        assert_eq!(result.status, OptimizationStatus::MaxIterationsReached);
        assert!(!result.status.is_converged());
    }
}
