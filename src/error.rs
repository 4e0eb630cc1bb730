//! Error types for the mate-solver library
//!
//! Structural errors abort a solve before any pose is mutated. Numerical
//! non-convergence is deliberately *not* represented here: it is a normal
//! [`SolveStatus`](crate::solver::SolveStatus) variant, because a best-effort
//! pose set is still useful to the caller.

use thiserror::Error;

/// Main result type used throughout the mate-solver library
pub type AssemblyResult<T> = Result<T, AssemblyError>;

/// Main error type for the mate-solver library
#[derive(Debug, Clone, Error)]
pub enum AssemblyError {
    /// Duplicate sibling name on `add_part`; rejected before graph mutation
    #[error("name conflict: '{name}' already exists under '{parent}'")]
    NameConflict { parent: String, name: String },

    /// A path, feature, or anchor tag does not resolve against the graph
    #[error("not found: '{path}'")]
    NotFound { path: String },

    /// A direction was requested from a feature kind with no defined direction
    #[error("unsupported feature kind: '{feature}' ({kind}) has no well-defined direction")]
    UnsupportedFeatureKind { feature: String, kind: String },

    /// The augmented normal equations could not be factorized
    #[error("linear solver error: {0}")]
    LinearSolver(String),

    /// Invalid input parameters
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AssemblyError {
    /// Shorthand for a [`AssemblyError::NotFound`] from any path-like string.
    pub fn not_found(path: impl Into<String>) -> Self {
        AssemblyError::NotFound { path: path.into() }
    }
}
