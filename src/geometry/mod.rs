//! Boundary with the external geometry kernel
//!
//! The solver deliberately knows nothing about boundary representation,
//! booleans, or meshing. All it ever asks of a shape is:
//!
//! - the center point of a named feature, in the shape's local frame,
//! - a unit direction extracted from a named feature, in the shape's local
//!   frame, and
//! - the ability to place the whole shape with a rigid transform at commit
//!   time.
//!
//! Centers and directions are returned in the *shape-local* frame; the cost
//! builder composes them with the owning node's world pose. That indirection
//! is what keeps the optimization objective a pure function of the free pose
//! parameters.
//!
//! Direction-extraction policy, implemented by every kernel:
//! planar face → face normal at its center; circular edge → its axis; any
//! other edge → tangent at its midpoint; anything else is
//! [`AssemblyError::UnsupportedFeatureKind`].

use crate::error::{AssemblyError, AssemblyResult};
use crate::pose::Pose;
use nalgebra::{Point3, Unit, Vector3};
use std::fmt;

pub mod primitives;

pub use primitives::{Feature, PrimitiveKernel};

/// Opaque handle to a shape owned by a geometry kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShapeId(usize);

impl ShapeId {
    /// Wrap a kernel-assigned index as a shape handle.
    pub fn new(index: usize) -> Self {
        ShapeId(index)
    }

    /// The kernel-assigned index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape#{}", self.0)
    }
}

/// Kind of a geometric feature, deciding how a direction is extracted from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureKind {
    /// A flat face; its direction is the outward normal at the face center
    PlanarFace,
    /// A circular or otherwise curved closed edge; its direction is the axis
    CircularEdge,
    /// A straight (or open) edge; its direction is the tangent at the midpoint
    StraightEdge,
    /// A vertex; has a center but no well-defined direction
    Vertex,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureKind::PlanarFace => write!(f, "planar face"),
            FeatureKind::CircularEdge => write!(f, "circular edge"),
            FeatureKind::StraightEdge => write!(f, "straight edge"),
            FeatureKind::Vertex => write!(f, "vertex"),
        }
    }
}

/// A shape placed in world coordinates, produced at commit time for
/// downstream consumers (export, rendering). Never used during optimization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocatedShape {
    pub shape: ShapeId,
    pub pose: Pose,
}

/// The interface the solver consumes from the geometry kernel.
///
/// Implementations must be cheap to query: `center_of` and `direction_of` are
/// called once per constraint per solve during validation.
pub trait GeometryKernel: Send + Sync {
    /// Center point of a named feature, in the shape's local frame.
    fn center_of(&self, shape: ShapeId, feature: &str) -> AssemblyResult<Point3<f64>>;

    /// Unit direction of a named feature, in the shape's local frame, per the
    /// extraction policy in the module docs.
    fn direction_of(&self, shape: ShapeId, feature: &str) -> AssemblyResult<Unit<Vector3<f64>>>;

    /// Place a shape with a rigid transform. Commit-time only.
    fn apply_pose(&self, shape: ShapeId, pose: &Pose) -> LocatedShape {
        LocatedShape { shape, pose: *pose }
    }
}

/// Helper for kernels: the error a feature with no direction must surface.
pub fn unsupported_direction(feature: &str, kind: FeatureKind) -> AssemblyError {
    AssemblyError::UnsupportedFeatureKind {
        feature: feature.to_string(),
        kind: kind.to_string(),
    }
}
