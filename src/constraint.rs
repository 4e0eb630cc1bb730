//! Constraint declarations: typed pairwise relationships between features
//!
//! A constraint relates exactly two feature references. Each reference names
//! a node by path and a feature by kernel selector (or anchor tag); it is
//! re-resolved at every solve, never cached, since poses move between solves.
//!
//! Constraints are immutable once declared and are owned by a
//! [`ConstraintSet`] in stable creation order. The order only matters for
//! deterministic cost summation and parameter layout, not correctness.

use crate::assembly::Assembly;
use crate::error::AssemblyResult;
use std::f64::consts::PI;
use std::fmt;

/// A node path plus a feature selector within that node's shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureRef {
    pub path: String,
    pub feature: String,
}

impl FeatureRef {
    pub fn new(path: impl Into<String>, feature: impl Into<String>) -> Self {
        FeatureRef {
            path: path.into(),
            feature: feature.into(),
        }
    }
}

impl fmt::Display for FeatureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.path, self.feature)
    }
}

/// The closed set of constraint types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Drive the distance between the two feature centers to `param`
    /// (default 0: coincident centers).
    Point,
    /// Drive the angle between the two feature directions to `param`
    /// (default π: opposing directions, a face-to-face mate).
    Axis,
    /// Point and Axis combined on the same two references; `param` is
    /// forwarded to both.
    Plane,
    /// Drive the first center onto the plane through the second center,
    /// normal along the second direction, offset by `param` along it.
    PointInPlane,
}

impl ConstraintKind {
    /// The parameter value used when the caller does not supply one.
    pub fn default_param(&self) -> f64 {
        match self {
            ConstraintKind::Point => 0.0,
            ConstraintKind::Axis => PI,
            ConstraintKind::Plane => PI,
            ConstraintKind::PointInPlane => 0.0,
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::Point => write!(f, "Point"),
            ConstraintKind::Axis => write!(f, "Axis"),
            ConstraintKind::Plane => write!(f, "Plane"),
            ConstraintKind::PointInPlane => write!(f, "PointInPlane"),
        }
    }
}

/// One declared constraint. Immutable after creation.
#[derive(Clone, Debug)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub a: FeatureRef,
    pub b: FeatureRef,
    pub param: f64,
}

/// Stable handle to a constraint within its [`ConstraintSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintId(usize);

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constraint#{}", self.0)
    }
}

/// Owns constraints in creation order.
///
/// Slots of removed constraints are retired, not reused, so ids stay stable
/// and iteration order stays deterministic across removals.
#[derive(Default)]
pub struct ConstraintSet {
    constraints: Vec<Option<Constraint>>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a constraint with the kind's default parameter.
    ///
    /// Both references must resolve to nodes of `assembly`; a path from a
    /// different assembly fails with [`NotFound`] and nothing is recorded.
    ///
    /// [`NotFound`]: crate::error::AssemblyError::NotFound
    pub fn add(
        &mut self,
        assembly: &Assembly,
        kind: ConstraintKind,
        a: FeatureRef,
        b: FeatureRef,
    ) -> AssemblyResult<ConstraintId> {
        let param = kind.default_param();
        self.add_with_param(assembly, kind, a, b, param)
    }

    /// Declare a constraint with an explicit parameter.
    pub fn add_with_param(
        &mut self,
        assembly: &Assembly,
        kind: ConstraintKind,
        a: FeatureRef,
        b: FeatureRef,
        param: f64,
    ) -> AssemblyResult<ConstraintId> {
        assembly.resolve(&a.path)?;
        assembly.resolve(&b.path)?;
        self.constraints.push(Some(Constraint { kind, a, b, param }));
        Ok(ConstraintId(self.constraints.len() - 1))
    }

    /// Remove a constraint. Removing twice is a no-op returning `None`.
    pub fn remove(&mut self, id: ConstraintId) -> Option<Constraint> {
        self.constraints.get_mut(id.0).and_then(Option::take)
    }

    pub fn get(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id.0).and_then(Option::as_ref)
    }

    /// Live constraints in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (ConstraintId(i), c)))
    }

    pub fn len(&self) -> usize {
        self.constraints.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ShapeId;
    use crate::pose::Pose;

    fn two_part_assembly() -> Assembly {
        let mut asm = Assembly::new();
        asm.add_part("", "a", ShapeId::new(0), Pose::identity())
            .unwrap();
        asm.add_part("", "b", ShapeId::new(1), Pose::identity())
            .unwrap();
        asm
    }

    #[test]
    fn test_default_params() {
        assert_eq!(ConstraintKind::Point.default_param(), 0.0);
        assert_eq!(ConstraintKind::Axis.default_param(), PI);
        assert_eq!(ConstraintKind::Plane.default_param(), PI);
        assert_eq!(ConstraintKind::PointInPlane.default_param(), 0.0);
    }

    #[test]
    fn test_add_validates_paths() {
        let asm = two_part_assembly();
        let mut set = ConstraintSet::new();

        let id = set
            .add(
                &asm,
                ConstraintKind::Point,
                FeatureRef::new("a", "top"),
                FeatureRef::new("b", "bottom"),
            )
            .unwrap();
        assert_eq!(set.get(id).unwrap().param, 0.0);

        let err = set.add(
            &asm,
            ConstraintKind::Point,
            FeatureRef::new("a", "top"),
            FeatureRef::new("elsewhere", "bottom"),
        );
        assert!(err.is_err());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove_keeps_ids_stable() {
        let asm = two_part_assembly();
        let mut set = ConstraintSet::new();
        let first = set
            .add(
                &asm,
                ConstraintKind::Point,
                FeatureRef::new("a", "top"),
                FeatureRef::new("b", "bottom"),
            )
            .unwrap();
        let second = set
            .add(
                &asm,
                ConstraintKind::Axis,
                FeatureRef::new("a", "top"),
                FeatureRef::new("b", "bottom"),
            )
            .unwrap();

        assert!(set.remove(first).is_some());
        assert!(set.remove(first).is_none());
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(second).unwrap().kind, ConstraintKind::Axis);
        assert_eq!(set.iter().count(), 1);
    }
}
