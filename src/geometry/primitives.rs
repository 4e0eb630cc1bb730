//! A minimal feature-tagged primitive kernel
//!
//! Real deployments back the [`GeometryKernel`] trait with a full BREP
//! kernel. This module provides the small stand-in used by the test suite and
//! demos: shapes are bags of named features, each carrying a kind, a local
//! center, and (where defined) a local direction.

use super::{FeatureKind, GeometryKernel, ShapeId, unsupported_direction};
use crate::error::{AssemblyError, AssemblyResult};
use nalgebra::{Point3, Unit, Vector3};
use std::collections::HashMap;

/// A named sub-feature of a primitive shape, in the shape's local frame.
#[derive(Clone, Debug)]
pub struct Feature {
    kind: FeatureKind,
    center: Point3<f64>,
    direction: Option<Unit<Vector3<f64>>>,
}

impl Feature {
    /// A flat face with an outward normal.
    pub fn planar_face(center: Point3<f64>, normal: Vector3<f64>) -> Self {
        Feature {
            kind: FeatureKind::PlanarFace,
            center,
            direction: Some(Unit::new_normalize(normal)),
        }
    }

    /// A circular edge with its axis.
    pub fn circular_edge(center: Point3<f64>, axis: Vector3<f64>) -> Self {
        Feature {
            kind: FeatureKind::CircularEdge,
            center,
            direction: Some(Unit::new_normalize(axis)),
        }
    }

    /// A straight edge with its midpoint tangent.
    pub fn straight_edge(center: Point3<f64>, tangent: Vector3<f64>) -> Self {
        Feature {
            kind: FeatureKind::StraightEdge,
            center,
            direction: Some(Unit::new_normalize(tangent)),
        }
    }

    /// A vertex. Has a center but no direction.
    pub fn vertex(center: Point3<f64>) -> Self {
        Feature {
            kind: FeatureKind::Vertex,
            center,
            direction: None,
        }
    }

    pub fn kind(&self) -> FeatureKind {
        self.kind
    }
}

/// Feature-tagged shape registry implementing [`GeometryKernel`].
#[derive(Default)]
pub struct PrimitiveKernel {
    shapes: Vec<HashMap<String, Feature>>,
}

impl PrimitiveKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shape from an explicit feature list.
    pub fn add_shape<I>(&mut self, features: I) -> ShapeId
    where
        I: IntoIterator<Item = (String, Feature)>,
    {
        self.shapes.push(features.into_iter().collect());
        ShapeId::new(self.shapes.len() - 1)
    }

    /// Register an axis-aligned box of extents `dx × dy × dz` centered at the
    /// origin.
    ///
    /// Features: the six faces (`top`/`bottom` along z, `left`/`right` along
    /// x, `front`/`back` along y), the `top_front_edge`, and one `corner`
    /// vertex at `(+dx/2, +dy/2, +dz/2)`.
    pub fn add_box(&mut self, dx: f64, dy: f64, dz: f64) -> ShapeId {
        let (hx, hy, hz) = (dx / 2.0, dy / 2.0, dz / 2.0);
        self.add_shape([
            (
                "top".to_string(),
                Feature::planar_face(Point3::new(0.0, 0.0, hz), Vector3::z()),
            ),
            (
                "bottom".to_string(),
                Feature::planar_face(Point3::new(0.0, 0.0, -hz), -Vector3::z()),
            ),
            (
                "right".to_string(),
                Feature::planar_face(Point3::new(hx, 0.0, 0.0), Vector3::x()),
            ),
            (
                "left".to_string(),
                Feature::planar_face(Point3::new(-hx, 0.0, 0.0), -Vector3::x()),
            ),
            (
                "back".to_string(),
                Feature::planar_face(Point3::new(0.0, hy, 0.0), Vector3::y()),
            ),
            (
                "front".to_string(),
                Feature::planar_face(Point3::new(0.0, -hy, 0.0), -Vector3::y()),
            ),
            (
                "top_front_edge".to_string(),
                Feature::straight_edge(Point3::new(0.0, -hy, hz), Vector3::x()),
            ),
            (
                "corner".to_string(),
                Feature::vertex(Point3::new(hx, hy, hz)),
            ),
        ])
    }

    /// Register a z-axis cylinder of the given radius and height centered at
    /// the origin.
    ///
    /// Features: planar `top`/`bottom` caps, the `rim` circular edge of the
    /// top cap, and the central `axis` treated as a straight edge.
    pub fn add_cylinder(&mut self, radius: f64, height: f64) -> ShapeId {
        let _ = radius; // the solver only consumes centers and directions
        let hz = height / 2.0;
        self.add_shape([
            (
                "top".to_string(),
                Feature::planar_face(Point3::new(0.0, 0.0, hz), Vector3::z()),
            ),
            (
                "bottom".to_string(),
                Feature::planar_face(Point3::new(0.0, 0.0, -hz), -Vector3::z()),
            ),
            (
                "rim".to_string(),
                Feature::circular_edge(Point3::new(0.0, 0.0, hz), Vector3::z()),
            ),
            (
                "axis".to_string(),
                Feature::straight_edge(Point3::origin(), Vector3::z()),
            ),
        ])
    }

    fn feature(&self, shape: ShapeId, name: &str) -> AssemblyResult<&Feature> {
        self.shapes
            .get(shape.index())
            .and_then(|features| features.get(name))
            .ok_or_else(|| AssemblyError::not_found(format!("{shape}/{name}")))
    }
}

impl GeometryKernel for PrimitiveKernel {
    fn center_of(&self, shape: ShapeId, feature: &str) -> AssemblyResult<Point3<f64>> {
        Ok(self.feature(shape, feature)?.center)
    }

    fn direction_of(&self, shape: ShapeId, feature: &str) -> AssemblyResult<Unit<Vector3<f64>>> {
        let found = self.feature(shape, feature)?;
        found
            .direction
            .ok_or_else(|| unsupported_direction(feature, found.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_face_centers_and_normals() {
        let mut kernel = PrimitiveKernel::new();
        let cube = kernel.add_box(1.0, 1.0, 1.0);

        let top = kernel.center_of(cube, "top").unwrap();
        assert_eq!(top, Point3::new(0.0, 0.0, 0.5));

        let normal = kernel.direction_of(cube, "bottom").unwrap();
        assert_eq!(normal.into_inner(), -Vector3::z());
    }

    #[test]
    fn test_cylinder_axis_direction() {
        let mut kernel = PrimitiveKernel::new();
        let pin = kernel.add_cylinder(0.25, 2.0);
        let axis = kernel.direction_of(pin, "axis").unwrap();
        assert_eq!(axis.into_inner(), Vector3::z());
    }

    #[test]
    fn test_vertex_has_no_direction() {
        let mut kernel = PrimitiveKernel::new();
        let cube = kernel.add_box(1.0, 1.0, 1.0);
        let err = kernel.direction_of(cube, "corner").unwrap_err();
        assert!(matches!(err, AssemblyError::UnsupportedFeatureKind { .. }));
    }

    #[test]
    fn test_unknown_feature_is_not_found() {
        let mut kernel = PrimitiveKernel::new();
        let cube = kernel.add_box(1.0, 1.0, 1.0);
        let err = kernel.center_of(cube, "lid").unwrap_err();
        assert!(matches!(err, AssemblyError::NotFound { .. }));
    }

    #[test]
    fn test_unknown_shape_is_not_found() {
        let kernel = PrimitiveKernel::new();
        let err = kernel.center_of(ShapeId::new(7), "top").unwrap_err();
        assert!(matches!(err, AssemblyError::NotFound { .. }));
    }
}
