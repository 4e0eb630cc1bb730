//! Nonlinear least-squares optimization over the flat parameter vector
//!
//! The solve driver hands the assembled [`Problem`](crate::cost::Problem) and
//! an initial vector to a Levenberg-Marquardt minimizer. Convergence is
//! declared when the cost improvement, parameter update, or gradient norm
//! falls below its tolerance; hitting the iteration cap is reported as a
//! status, never as an error, because the best-effort parameters are still
//! written back.

use nalgebra::DVector;
use std::fmt;
use std::time::Duration;

pub mod levenberg_marquardt;

pub use levenberg_marquardt::LevenbergMarquardt;

/// Configuration parameters for the minimizer.
#[derive(Debug, Clone)]
pub struct LmConfig {
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Convergence tolerance on the cost decrease between accepted steps
    pub cost_tolerance: f64,
    /// Convergence tolerance on the parameter update norm
    pub parameter_tolerance: f64,
    /// Convergence tolerance on the gradient norm
    pub gradient_tolerance: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            cost_tolerance: 1e-10,
            parameter_tolerance: 1e-10,
            gradient_tolerance: 1e-8,
        }
    }
}

impl LmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the cost tolerance
    pub fn with_cost_tolerance(mut self, cost_tolerance: f64) -> Self {
        self.cost_tolerance = cost_tolerance;
        self
    }

    /// Set the parameter tolerance
    pub fn with_parameter_tolerance(mut self, parameter_tolerance: f64) -> Self {
        self.parameter_tolerance = parameter_tolerance;
        self
    }

    /// Set the gradient tolerance
    pub fn with_gradient_tolerance(mut self, gradient_tolerance: f64) -> Self {
        self.gradient_tolerance = gradient_tolerance;
        self
    }
}

/// Why the minimizer stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// Cost improvement between accepted steps fell below tolerance
    CostToleranceReached,
    /// Parameter update norm fell below tolerance
    ParameterToleranceReached,
    /// Gradient norm fell below tolerance
    GradientToleranceReached,
    /// Iteration cap reached before any tolerance was met
    MaxIterationsReached,
}

impl OptimizationStatus {
    /// Whether this status counts as convergence.
    pub fn is_converged(&self) -> bool {
        !matches!(self, OptimizationStatus::MaxIterationsReached)
    }
}

impl fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationStatus::CostToleranceReached => write!(f, "cost tolerance reached"),
            OptimizationStatus::ParameterToleranceReached => {
                write!(f, "parameter tolerance reached")
            }
            OptimizationStatus::GradientToleranceReached => write!(f, "gradient tolerance reached"),
            OptimizationStatus::MaxIterationsReached => write!(f, "maximum iterations reached"),
        }
    }
}

/// Detailed convergence information.
#[derive(Debug, Clone)]
pub struct ConvergenceInfo {
    /// Final gradient norm
    pub final_gradient_norm: f64,
    /// Final parameter update norm
    pub final_parameter_update_norm: f64,
    /// Cost function evaluation count
    pub cost_evaluations: usize,
    /// Jacobian evaluation count
    pub jacobian_evaluations: usize,
}

/// Result of a minimizer run.
#[derive(Debug, Clone)]
pub struct OptimizerResult {
    /// Final parameter vector
    pub parameters: DVector<f64>,
    /// Final optimization status
    pub status: OptimizationStatus,
    /// Cost at the initial parameters
    pub initial_cost: f64,
    /// Cost at the final parameters
    pub final_cost: f64,
    /// Number of iterations performed
    pub iterations: usize,
    /// Total time elapsed
    pub elapsed_time: Duration,
    /// Convergence statistics
    pub convergence_info: ConvergenceInfo,
}
