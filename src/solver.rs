//! Solve driver: validate, optimize, commit
//!
//! A solve moves through validation, optimization, and commit in order:
//!
//! - *Validating*: every constraint's references are resolved against the
//!   current graph and the cost terms are built and evaluated once at the
//!   initial poses. Any structural error (`NotFound`,
//!   `UnsupportedFeatureKind`) aborts here, before a single pose is touched.
//! - *Optimizing*: Levenberg-Marquardt runs to convergence or the iteration
//!   cap.
//! - *Committed / NotConverged*: in both cases the best poses found are
//!   written back through [`Assembly::set_local_pose`]; only the reported
//!   status differs, since a near-best arrangement is more useful than an
//!   unchanged graph when an assembly is deliberately under-constrained.
//!
//! The driver takes the graph, kernel, and constraint list as explicit
//! arguments and returns a report value; there is no hidden current-assembly
//! state.

use crate::assembly::Assembly;
use crate::constraint::ConstraintSet;
use crate::cost::{CostBuilder, DEFAULT_DIRECTION_WEIGHT, Problem};
use crate::error::{AssemblyError, AssemblyResult};
use crate::geometry::GeometryKernel;
use crate::optimizer::{LevenbergMarquardt, LmConfig};
use crate::params::ParameterLayout;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::info;

/// Outcome class of a solve. Both variants leave committed poses behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The optimizer met a convergence tolerance
    Converged,
    /// The iteration cap was reached; poses hold the best arrangement found
    NotConverged,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Converged => write!(f, "converged"),
            SolveStatus::NotConverged => write!(f, "not converged"),
        }
    }
}

/// Result of one `solve()` invocation.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub status: SolveStatus,
    /// Total cost at the initial poses
    pub initial_cost: f64,
    /// Total cost at the committed poses
    pub final_cost: f64,
    /// Optimizer iterations performed
    pub iterations: usize,
    /// Wall-clock duration of the whole solve
    pub elapsed: Duration,
}

impl SolveReport {
    /// Whether the solve converged.
    pub fn success(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

/// Positions the movable parts of an assembly so its constraints are
/// satisfied as closely as possible.
pub struct AssemblySolver {
    config: LmConfig,
    direction_weight: f64,
}

impl AssemblySolver {
    /// Create a solver with default tolerances.
    pub fn new() -> Self {
        Self::with_config(LmConfig::default())
    }

    /// Create a solver with an explicit optimizer configuration.
    pub fn with_config(config: LmConfig) -> Self {
        AssemblySolver {
            config,
            direction_weight: DEFAULT_DIRECTION_WEIGHT,
        }
    }

    /// Set the convergence tolerance on cost improvement.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.config.cost_tolerance = tolerance;
        self
    }

    /// Set the optimizer iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the weight balancing direction residuals against positional ones.
    pub fn with_direction_weight(mut self, weight: f64) -> Self {
        self.direction_weight = weight;
        self
    }

    /// Run a full solve over `assembly`.
    ///
    /// On a structural error the graph is left exactly as it was. On success
    /// (converged or not) the optimized poses are committed and the report
    /// carries the distinction.
    pub fn solve(
        &self,
        assembly: &mut Assembly,
        kernel: &dyn GeometryKernel,
        constraints: &ConstraintSet,
    ) -> AssemblyResult<SolveReport> {
        let start = Instant::now();

        if constraints.is_empty() {
            info!("no constraints declared, nothing to solve");
            return Ok(SolveReport {
                status: SolveStatus::Converged,
                initial_cost: 0.0,
                final_cost: 0.0,
                iterations: 0,
                elapsed: start.elapsed(),
            });
        }

        // Validating: resolve references, extract feature geometry, and
        // evaluate the objective once at the initial poses. Everything that
        // can fail structurally fails here, with the graph untouched.
        let (layout, x0) = ParameterLayout::collect(assembly, constraints)?;
        let terms = CostBuilder::new()
            .with_direction_weight(self.direction_weight)
            .build(assembly, kernel, constraints, &layout)?;
        let problem = Problem::new(terms, layout.dof());

        let initial_cost = problem.cost(&x0);
        if !initial_cost.is_finite() {
            return Err(AssemblyError::InvalidInput(
                "constraint costs are not finite at the initial poses".to_string(),
            ));
        }

        if layout.is_empty() {
            // Every referenced node is fixed; there is nothing to optimize.
            info!(
                constraints = constraints.len(),
                cost = initial_cost,
                "all referenced nodes are fixed, leaving poses unchanged"
            );
            return Ok(SolveReport {
                status: SolveStatus::Converged,
                initial_cost,
                final_cost: initial_cost,
                iterations: 0,
                elapsed: start.elapsed(),
            });
        }

        info!(
            constraints = constraints.len(),
            free_nodes = layout.len(),
            initial_cost,
            "optimizing assembly"
        );

        // Optimizing.
        let mut optimizer = LevenbergMarquardt::with_config(self.config.clone());
        let result = optimizer.minimize(&problem, x0)?;

        // Commit: poses are written back whether or not we converged.
        layout.scatter(assembly, &result.parameters)?;

        let status = if result.status.is_converged() {
            SolveStatus::Converged
        } else {
            SolveStatus::NotConverged
        };
        info!(
            %status,
            optimizer_status = %result.status,
            final_cost = result.final_cost,
            iterations = result.iterations,
            "solve finished"
        );

        Ok(SolveReport {
            status,
            initial_cost,
            final_cost: result.final_cost,
            iterations: result.iterations,
            elapsed: start.elapsed(),
        })
    }
}

impl Default for AssemblySolver {
    fn default() -> Self {
        Self::new()
    }
}
