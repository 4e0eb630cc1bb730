//! mate-solver: an assembly constraint solver for CAD part trees
//!
//! Positions a tree of rigid parts so that declared pairwise geometric
//! relationships (point, axis, plane, and point-in-plane mates) between
//! features of those parts are satisfied as closely as possible, by
//! minimizing a sum of squared residuals over the free part poses with a
//! sparse Levenberg-Marquardt optimizer.
//!
//! The crate deliberately stops at the geometry-kernel boundary: it consumes
//! feature centers and directions through the [`GeometryKernel`] trait and
//! never constructs or meshes shapes itself.
//!
//! # Example
//!
//! ```
//! use mate_solver::{
//!     Assembly, AssemblySolver, ConstraintKind, ConstraintSet, FeatureRef, Pose, PrimitiveKernel,
//! };
//!
//! let mut kernel = PrimitiveKernel::new();
//! let base = kernel.add_box(1.0, 1.0, 1.0);
//! let lid = kernel.add_box(1.0, 1.0, 1.0);
//!
//! let mut assembly = Assembly::new();
//! assembly.add_part("", "base", base, Pose::identity()).unwrap();
//! assembly
//!     .add_part("", "lid", lid, Pose::from_translation(3.0, 2.0, 1.0))
//!     .unwrap();
//!
//! let mut constraints = ConstraintSet::new();
//! constraints
//!     .add(
//!         &assembly,
//!         ConstraintKind::Plane,
//!         FeatureRef::new("lid", "bottom"),
//!         FeatureRef::new("base", "top"),
//!     )
//!     .unwrap();
//!
//! let report = AssemblySolver::new()
//!     .solve(&mut assembly, &kernel, &constraints)
//!     .unwrap();
//! assert!(report.success());
//! ```

pub mod assembly;
pub mod constraint;
pub mod cost;
pub mod error;
pub mod geometry;
pub mod linalg;
pub mod logger;
pub mod optimizer;
pub mod params;
pub mod pose;
pub mod solver;

pub use assembly::{Assembly, NodeId};
pub use constraint::{Constraint, ConstraintId, ConstraintKind, ConstraintSet, FeatureRef};
pub use error::{AssemblyError, AssemblyResult};
pub use geometry::{Feature, FeatureKind, GeometryKernel, LocatedShape, PrimitiveKernel, ShapeId};
pub use logger::{init_logger, init_logger_with_level};
pub use optimizer::LmConfig;
pub use pose::Pose;
pub use solver::{AssemblySolver, SolveReport, SolveStatus};
