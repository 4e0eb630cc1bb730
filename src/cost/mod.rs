//! Cost function builder: constraints → differentiable residual terms
//!
//! Each declared constraint becomes one residual term expressed purely in
//! terms of the free pose parameters of the two bodies it references. Feature
//! geometry is extracted from the kernel once per solve, in the body's local
//! frame; during evaluation the term composes it with whatever world pose the
//! optimizer proposes, so the objective never reads the graph.
//!
//! The total objective is the sum of squared residual norms over all terms,
//! in constraint creation order. Rotational residuals are scaled by a single
//! direction weight balancing radians against length units; it is tunable and
//! not load-bearing for correctness.

use crate::assembly::{Assembly, NodeId};
use crate::constraint::{Constraint, ConstraintKind, ConstraintSet, FeatureRef};
use crate::error::{AssemblyError, AssemblyResult};
use crate::geometry::GeometryKernel;
use crate::params::ParameterLayout;
use crate::pose::Pose;
use nalgebra::{DMatrix, DVector, Point3, Vector3};

pub mod problem;

pub use problem::Problem;

/// Default weight applied to direction (angle) residuals relative to
/// positional ones. Angles are in radians, positions in model units; this
/// keeps a face-flip error of ~1 rad comparable to a 1-unit offset.
pub const DEFAULT_DIRECTION_WEIGHT: f64 = 1.0;

/// Central-difference step for the default numerical Jacobian.
const DIFF_STEP: f64 = 1e-6;

/// One scalar- or vector-valued residual term over the parameter blocks of
/// the bodies it references.
///
/// `params` carries one 6-element block per *free* body of this term, in body
/// order; fixed bodies are baked into the term at build time.
pub trait CostTerm: Send + Sync {
    /// Number of residual rows this term contributes.
    fn dimension(&self) -> usize;

    /// Evaluate the residual at the given parameter blocks.
    fn residual(&self, params: &[DVector<f64>]) -> DVector<f64>;

    /// Evaluate residual and Jacobian with respect to the parameter blocks.
    ///
    /// The default implementation uses central differences, which is accurate
    /// enough for the convergence tolerances this solver targets.
    fn linearize(&self, params: &[DVector<f64>]) -> (DVector<f64>, DMatrix<f64>) {
        numeric_linearize(self, params)
    }
}

/// Central-difference residual linearization shared by all terms.
pub fn numeric_linearize<T: CostTerm + ?Sized>(
    term: &T,
    params: &[DVector<f64>],
) -> (DVector<f64>, DMatrix<f64>) {
    let residual = term.residual(params);
    let total_cols: usize = params.iter().map(DVector::len).sum();
    let mut jacobian = DMatrix::zeros(residual.len(), total_cols);

    let mut work: Vec<DVector<f64>> = params.to_vec();
    let mut col = 0;
    for i in 0..params.len() {
        for j in 0..params[i].len() {
            let x = params[i][j];
            let h = DIFF_STEP * x.abs().max(1.0);

            work[i][j] = x + h;
            let plus = term.residual(&work);
            work[i][j] = x - h;
            let minus = term.residual(&work);
            work[i][j] = x;

            jacobian.set_column(col, &((plus - minus) / (2.0 * h)));
            col += 1;
        }
    }
    (residual, jacobian)
}

/// How a term sees one of its two bodies.
#[derive(Clone, Debug)]
enum TermBody {
    /// The body's world pose comes from the optimizer; the index counts this
    /// term's free bodies in order.
    Free,
    /// The body is not a free variable; its world pose is frozen at build
    /// time.
    Fixed(Pose),
}

fn body_poses(bodies: &[TermBody; 2], params: &[DVector<f64>]) -> (Pose, Pose) {
    let mut cursor = 0;
    let mut next = |body: &TermBody| match body {
        TermBody::Free => {
            let pose = Pose::from_slice(params[cursor].as_slice());
            cursor += 1;
            pose
        }
        TermBody::Fixed(pose) => *pose,
    };
    (next(&bodies[0]), next(&bodies[1]))
}

fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    a.cross(b).norm().atan2(a.dot(b))
}

/// Point constraint residual: `param − ‖c1 − c2‖`.
pub struct PointTerm {
    bodies: [TermBody; 2],
    centers: [Point3<f64>; 2],
    offset: f64,
}

impl CostTerm for PointTerm {
    fn dimension(&self) -> usize {
        1
    }

    fn residual(&self, params: &[DVector<f64>]) -> DVector<f64> {
        let (pose_a, pose_b) = body_poses(&self.bodies, params);
        let c1 = pose_a.apply(&self.centers[0]);
        let c2 = pose_b.apply(&self.centers[1]);
        DVector::from_element(1, self.offset - (c1 - c2).norm())
    }
}

/// Axis constraint residual: `√k_dir · (param − ∠(d1, d2))`.
pub struct AxisTerm {
    bodies: [TermBody; 2],
    directions: [Vector3<f64>; 2],
    angle: f64,
    weight: f64,
}

impl CostTerm for AxisTerm {
    fn dimension(&self) -> usize {
        1
    }

    fn residual(&self, params: &[DVector<f64>]) -> DVector<f64> {
        let (pose_a, pose_b) = body_poses(&self.bodies, params);
        let d1 = pose_a.apply_direction(&self.directions[0]);
        let d2 = pose_b.apply_direction(&self.directions[1]);
        DVector::from_element(1, self.weight.sqrt() * (self.angle - angle_between(&d1, &d2)))
    }
}

/// Plane constraint residual: stacked point and axis rows over the same two
/// references.
///
/// The constraint parameter drives the orientation row; the positional row
/// always targets coincident centers, so a default-parameter plane mate means
/// faces touching with opposing normals.
pub struct PlaneTerm {
    bodies: [TermBody; 2],
    centers: [Point3<f64>; 2],
    directions: [Vector3<f64>; 2],
    angle: f64,
    weight: f64,
}

impl CostTerm for PlaneTerm {
    fn dimension(&self) -> usize {
        2
    }

    fn residual(&self, params: &[DVector<f64>]) -> DVector<f64> {
        let (pose_a, pose_b) = body_poses(&self.bodies, params);
        let c1 = pose_a.apply(&self.centers[0]);
        let c2 = pose_b.apply(&self.centers[1]);
        let d1 = pose_a.apply_direction(&self.directions[0]);
        let d2 = pose_b.apply_direction(&self.directions[1]);

        DVector::from_column_slice(&[
            -(c1 - c2).norm(),
            self.weight.sqrt() * (self.angle - angle_between(&d1, &d2)),
        ])
    }
}

/// PointInPlane residual: signed distance from the first center to the plane
/// through the second feature, offset along its normal by `param`.
pub struct PointInPlaneTerm {
    bodies: [TermBody; 2],
    center_a: Point3<f64>,
    center_b: Point3<f64>,
    normal_b: Vector3<f64>,
    offset: f64,
}

impl CostTerm for PointInPlaneTerm {
    fn dimension(&self) -> usize {
        1
    }

    fn residual(&self, params: &[DVector<f64>]) -> DVector<f64> {
        let (pose_a, pose_b) = body_poses(&self.bodies, params);
        let c1 = pose_a.apply(&self.center_a);
        let plane_point = pose_b.apply(&self.center_b) + pose_b.apply_direction(&self.normal_b) * self.offset;
        let normal = pose_b.apply_direction(&self.normal_b);
        DVector::from_element(1, (c1 - plane_point).dot(&normal))
    }
}

/// A built term plus the parameter slots of its free bodies, in body order.
pub struct BoundTerm {
    pub term: Box<dyn CostTerm>,
    pub slots: Vec<usize>,
}

/// Resolved geometry for one side of a constraint.
struct ResolvedBody {
    node: NodeId,
    body: TermBody,
    center: Point3<f64>,
    direction: Option<Vector3<f64>>,
}

/// Builds residual terms from a constraint set against a specific assembly,
/// kernel, and parameter layout.
pub struct CostBuilder {
    direction_weight: f64,
}

impl CostBuilder {
    pub fn new() -> Self {
        CostBuilder {
            direction_weight: DEFAULT_DIRECTION_WEIGHT,
        }
    }

    /// Override the direction weight balancing rotational against positional
    /// residual magnitudes.
    pub fn with_direction_weight(mut self, weight: f64) -> Self {
        self.direction_weight = weight;
        self
    }

    /// Resolve every constraint and produce its residual term.
    ///
    /// Fails with [`NotFound`] if a path or feature does not resolve and with
    /// [`UnsupportedFeatureKind`] if an orientation constraint references a
    /// directionless feature. Nothing is mutated on failure.
    ///
    /// [`NotFound`]: AssemblyError::NotFound
    /// [`UnsupportedFeatureKind`]: AssemblyError::UnsupportedFeatureKind
    pub fn build(
        &self,
        assembly: &Assembly,
        kernel: &dyn GeometryKernel,
        constraints: &ConstraintSet,
        layout: &ParameterLayout,
    ) -> AssemblyResult<Vec<BoundTerm>> {
        let mut terms = Vec::with_capacity(constraints.len());
        for (_, constraint) in constraints.iter() {
            terms.push(self.build_one(assembly, kernel, constraint, layout)?);
        }
        Ok(terms)
    }

    fn build_one(
        &self,
        assembly: &Assembly,
        kernel: &dyn GeometryKernel,
        constraint: &Constraint,
        layout: &ParameterLayout,
    ) -> AssemblyResult<BoundTerm> {
        // PointInPlane takes its point from the first reference and its plane
        // from the second, so only the second side needs a direction there.
        let needs_direction_a = matches!(
            constraint.kind,
            ConstraintKind::Axis | ConstraintKind::Plane
        );
        let needs_direction_b = needs_direction_a
            || matches!(constraint.kind, ConstraintKind::PointInPlane);
        let a = self.resolve_body(assembly, kernel, layout, &constraint.a, needs_direction_a)?;
        let b = self.resolve_body(assembly, kernel, layout, &constraint.b, needs_direction_b)?;

        let bodies = [a.body.clone(), b.body.clone()];
        let mut slots = Vec::new();
        for (resolved, body) in [(&a, &bodies[0]), (&b, &bodies[1])] {
            if matches!(body, TermBody::Free) {
                // Slot is present by construction of the layout.
                slots.push(layout.slot(resolved.node).expect("free body has a slot"));
            }
        }

        let term: Box<dyn CostTerm> = match constraint.kind {
            ConstraintKind::Point => Box::new(PointTerm {
                bodies,
                centers: [a.center, b.center],
                offset: constraint.param,
            }),
            ConstraintKind::Axis => Box::new(AxisTerm {
                bodies,
                directions: [
                    a.direction.expect("axis body has a direction"),
                    b.direction.expect("axis body has a direction"),
                ],
                angle: constraint.param,
                weight: self.direction_weight,
            }),
            ConstraintKind::Plane => Box::new(PlaneTerm {
                bodies,
                centers: [a.center, b.center],
                directions: [
                    a.direction.expect("plane body has a direction"),
                    b.direction.expect("plane body has a direction"),
                ],
                angle: constraint.param,
                weight: self.direction_weight,
            }),
            ConstraintKind::PointInPlane => Box::new(PointInPlaneTerm {
                bodies,
                center_a: a.center,
                center_b: b.center,
                normal_b: b.direction.expect("plane side has a direction"),
                offset: constraint.param,
            }),
        };

        Ok(BoundTerm { term, slots })
    }

    fn resolve_body(
        &self,
        assembly: &Assembly,
        kernel: &dyn GeometryKernel,
        layout: &ParameterLayout,
        reference: &FeatureRef,
        needs_direction: bool,
    ) -> AssemblyResult<ResolvedBody> {
        let node = assembly.resolve(&reference.path)?;
        let shape = assembly
            .shape(node)?
            .ok_or_else(|| AssemblyError::not_found(reference.to_string()))?;
        let selector = assembly.anchor_selector(node, &reference.feature)?;

        let center = kernel.center_of(shape, &selector)?;
        let direction = if needs_direction {
            Some(kernel.direction_of(shape, &selector)?.into_inner())
        } else {
            None
        };

        let body = match layout.slot(node) {
            Some(_) => TermBody::Free,
            None => TermBody::Fixed(assembly.world_pose(node)?),
        };

        Ok(ResolvedBody {
            node,
            body,
            center,
            direction,
        })
    }
}

impl Default for CostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn block(pose: &Pose) -> DVector<f64> {
        DVector::from_column_slice(pose.to_vector().as_slice())
    }

    #[test]
    fn test_point_residual_zero_when_coincident() {
        let term = PointTerm {
            bodies: [TermBody::Free, TermBody::Free],
            centers: [Point3::new(0.0, 0.0, 0.5), Point3::new(0.0, 0.0, -0.5)],
            offset: 0.0,
        };
        // Body b sits one unit above a, so b's bottom touches a's top.
        let params = [
            block(&Pose::identity()),
            block(&Pose::from_translation(0.0, 0.0, 1.0)),
        ];
        let r = term.residual(&params);
        assert!(r[0].abs() < 1e-12, "residual was {}", r[0]);
    }

    #[test]
    fn test_point_residual_measures_distance() {
        let term = PointTerm {
            bodies: [TermBody::Fixed(Pose::identity()), TermBody::Free],
            centers: [Point3::origin(), Point3::origin()],
            offset: 0.0,
        };
        let params = [block(&Pose::from_translation(3.0, 4.0, 0.0))];
        let r = term.residual(&params);
        assert!((r[0] + 5.0).abs() < 1e-12, "residual was {}", r[0]);
    }

    #[test]
    fn test_axis_residual_antiparallel_mate() {
        // Two +z normals, one body flipped by π about x: directions oppose,
        // default mate angle π is satisfied.
        let term = AxisTerm {
            bodies: [TermBody::Free, TermBody::Free],
            directions: [Vector3::z(), Vector3::z()],
            angle: PI,
            weight: 1.0,
        };
        let params = [
            block(&Pose::identity()),
            block(&Pose::from_translation_euler(0.0, 0.0, 0.0, PI, 0.0, 0.0)),
        ];
        let r = term.residual(&params);
        assert!(r[0].abs() < 1e-9, "residual was {}", r[0]);
    }

    #[test]
    fn test_axis_residual_right_angle() {
        let term = AxisTerm {
            bodies: [TermBody::Fixed(Pose::identity()), TermBody::Fixed(Pose::identity())],
            directions: [Vector3::z(), Vector3::x()],
            angle: PI,
            weight: 1.0,
        };
        let r = term.residual(&[]);
        assert!((r[0] - (PI - FRAC_PI_2)).abs() < 1e-12);
    }

    #[test]
    fn test_axis_weight_scales_residual() {
        let make = |weight| AxisTerm {
            bodies: [TermBody::Fixed(Pose::identity()), TermBody::Fixed(Pose::identity())],
            directions: [Vector3::z(), Vector3::z()],
            angle: PI,
            weight,
        };
        let unweighted = make(1.0).residual(&[])[0];
        let weighted = make(4.0).residual(&[])[0];
        assert!((weighted - 2.0 * unweighted).abs() < 1e-12);
    }

    #[test]
    fn test_point_in_plane_residual() {
        // Plane through the origin with +z normal; point at z = 2 has signed
        // distance 2, with offset 0.5 the plane moves up and distance drops.
        let make = |offset| PointInPlaneTerm {
            bodies: [TermBody::Free, TermBody::Fixed(Pose::identity())],
            center_a: Point3::origin(),
            center_b: Point3::origin(),
            normal_b: Vector3::z(),
            offset,
        };
        let params = [block(&Pose::from_translation(0.0, 0.0, 2.0))];
        assert!((make(0.0).residual(&params)[0] - 2.0).abs() < 1e-12);
        assert!((make(0.5).residual(&params)[0] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_plane_residual_stacks_point_and_axis() {
        let term = PlaneTerm {
            bodies: [TermBody::Fixed(Pose::identity()), TermBody::Fixed(Pose::identity())],
            centers: [Point3::new(0.0, 0.0, 1.0), Point3::origin()],
            directions: [Vector3::z(), -Vector3::z()],
            angle: PI,
            weight: 1.0,
        };
        let r = term.residual(&[]);
        assert_eq!(r.len(), 2);
        assert!((r[0] + 1.0).abs() < 1e-12, "point row was {}", r[0]);
        assert!(r[1].abs() < 1e-9, "axis row was {}", r[1]);
    }

    #[test]
    fn test_numeric_linearize_matches_analytic_on_linear_term() {
        // PointInPlane against a fixed z-plane is linear in tz, so its
        // Jacobian column for tz must be 1 and the translation rows exact.
        let term = PointInPlaneTerm {
            bodies: [TermBody::Free, TermBody::Fixed(Pose::identity())],
            center_a: Point3::origin(),
            center_b: Point3::origin(),
            normal_b: Vector3::z(),
            offset: 0.0,
        };
        let params = [block(&Pose::from_translation(0.0, 0.0, 2.0))];
        let (r, jac) = term.linearize(&params);
        assert!((r[0] - 2.0).abs() < 1e-12);
        assert_eq!(jac.shape(), (1, 6));
        assert!((jac[(0, 2)] - 1.0).abs() < 1e-6);
        assert!(jac[(0, 0)].abs() < 1e-6);
        assert!(jac[(0, 1)].abs() < 1e-6);
    }
}
