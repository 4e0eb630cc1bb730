//! Rigid-body pose: rotation + translation in world coordinates
//!
//! A [`Pose`] places a part in 3-D space. The rotation is stored as a unit
//! quaternion so composition never hits a gimbal-lock singularity, and the
//! optimizer-facing parameterization ([`Pose::to_vector`] /
//! [`Pose::from_vector`]) uses a minimal 3-parameter rotation vector
//! (scaled axis), re-normalized through the quaternion exponential on every
//! reconstruction so numerical drift cannot accumulate.

use nalgebra::{
    Isometry3, Matrix4, Point3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3, Vector6,
};
use std::fmt;
use std::ops::Mul;

/// A rigid transform (rotation + translation) describing a body's placement.
///
/// Immutable value type: every operation returns a new `Pose`. Composition is
/// associative and every pose has an inverse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    rotation: UnitQuaternion<f64>,
    translation: Vector3<f64>,
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = self.translation;
        let q = self.rotation.quaternion();
        write!(
            f,
            "Pose(t: [{:.4}, {:.4}, {:.4}], q: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            t.x, t.y, t.z, q.w, q.i, q.j, q.k
        )
    }
}

impl Pose {
    /// Degrees of freedom of one pose in the flat parameter vector.
    pub const DOF: usize = 6;

    /// Create a pose from translation and rotation parts.
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Pose {
            rotation,
            translation,
        }
    }

    /// The identity pose: no rotation, no translation.
    pub fn identity() -> Self {
        Pose {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Create a pose from translation components only.
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Pose::new(Vector3::new(x, y, z), UnitQuaternion::identity())
    }

    /// Create a pose from translation components and Euler angles (roll, pitch, yaw).
    pub fn from_translation_euler(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Pose::new(
            Vector3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    /// Create a pose from translation components and quaternion coefficients.
    ///
    /// The quaternion is normalized before use.
    pub fn from_translation_quaternion(
        x: f64,
        y: f64,
        z: f64,
        qw: f64,
        qx: f64,
        qy: f64,
        qz: f64,
    ) -> Self {
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz).normalize());
        Pose::new(Vector3::new(x, y, z), rotation)
    }

    /// Create a pose from an axis-angle rotation about `axis` by `angle` radians.
    pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64) -> Self {
        let unit_axis = Unit::new_normalize(*axis);
        Pose::new(
            Vector3::zeros(),
            UnitQuaternion::from_axis_angle(&unit_axis, angle),
        )
    }

    /// Create a pose directly from an `Isometry3`.
    pub fn from_isometry(isometry: Isometry3<f64>) -> Self {
        Pose {
            rotation: isometry.rotation,
            translation: isometry.translation.vector,
        }
    }

    /// The translation part.
    pub fn translation(&self) -> Vector3<f64> {
        self.translation
    }

    /// The rotation part as a unit quaternion.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.rotation
    }

    /// Get as an `Isometry3` (convenience for downstream consumers).
    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.translation), self.rotation)
    }

    /// The homogeneous 4x4 transformation matrix.
    pub fn matrix(&self) -> Matrix4<f64> {
        self.isometry().to_homogeneous()
    }

    /// Compose two poses: `self ∘ other` applies `other` in `self`'s frame.
    pub fn compose(&self, other: &Pose) -> Pose {
        Pose {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// The inverse pose, such that `p.compose(&p.inverse())` is identity.
    pub fn inverse(&self) -> Pose {
        let rot_inv = self.rotation.inverse();
        Pose {
            rotation: rot_inv,
            translation: -(rot_inv * self.translation),
        }
    }

    /// Transform a point into the frame this pose maps to.
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * point.coords + self.translation)
    }

    /// Rotate a direction vector; the translation part does not participate.
    pub fn apply_direction(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * vector
    }

    /// Flatten into the 6-element optimizer parameterization.
    ///
    /// Layout is `[tx, ty, tz, wx, wy, wz]` where `w` is the rotation vector
    /// (axis scaled by angle).
    pub fn to_vector(&self) -> Vector6<f64> {
        let w = self.rotation.scaled_axis();
        Vector6::new(
            self.translation.x,
            self.translation.y,
            self.translation.z,
            w.x,
            w.y,
            w.z,
        )
    }

    /// Rebuild a pose from the 6-element parameterization.
    ///
    /// The rotation vector goes through the quaternion exponential, so the
    /// result is a valid unit rotation regardless of drift in the input.
    pub fn from_vector(v: &Vector6<f64>) -> Pose {
        let translation = Vector3::new(v[0], v[1], v[2]);
        let rotation = UnitQuaternion::from_scaled_axis(Vector3::new(v[3], v[4], v[5]));
        Pose::new(translation, rotation)
    }

    /// Rebuild a pose from a 6-element slice of a flat parameter vector.
    ///
    /// # Panics
    /// Panics if `slice.len() != 6`.
    pub fn from_slice(slice: &[f64]) -> Pose {
        assert_eq!(slice.len(), Self::DOF, "pose slice must have 6 elements");
        Pose::from_vector(&Vector6::from_row_slice(slice))
    }

    /// Angular distance to another pose's rotation, in radians.
    pub fn rotation_angle_to(&self, other: &Pose) -> f64 {
        self.rotation.angle_to(&other.rotation)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Pose::identity()
    }
}

impl Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        self.compose(&rhs)
    }
}

impl Mul<&Pose> for &Pose {
    type Output = Pose;

    fn mul(self, rhs: &Pose) -> Pose {
        self.compose(rhs)
    }
}

impl From<Isometry3<f64>> for Pose {
    fn from(isometry: Isometry3<f64>) -> Self {
        Pose::from_isometry(isometry)
    }
}

impl From<Pose> for Isometry3<f64> {
    fn from(pose: Pose) -> Self {
        pose.isometry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const TOL: f64 = 1e-12;

    fn poses_close(a: &Pose, b: &Pose, tol: f64) -> bool {
        (a.translation() - b.translation()).norm() < tol && a.rotation_angle_to(b) < tol
    }

    #[test]
    fn test_identity_applies_nothing() {
        let p = Point3::new(1.0, -2.0, 3.5);
        assert_eq!(Pose::identity().apply(&p), p);
    }

    #[test]
    fn test_compose_inverse_is_identity() {
        let pose = Pose::from_translation_euler(1.0, 2.0, 3.0, 0.3, -0.7, 1.1);
        let round = pose.compose(&pose.inverse());
        assert!(poses_close(&round, &Pose::identity(), TOL));
    }

    #[test]
    fn test_compose_is_associative() {
        let a = Pose::from_translation_euler(1.0, 0.0, 0.0, 0.5, 0.0, 0.0);
        let b = Pose::from_translation_euler(0.0, 2.0, 0.0, 0.0, -0.4, 0.0);
        let c = Pose::from_translation_euler(0.0, 0.0, -1.0, 0.0, 0.0, 1.2);

        let left = a.compose(&b).compose(&c);
        let right = a.compose(&b.compose(&c));
        assert!(poses_close(&left, &right, TOL));
    }

    #[test]
    fn test_vector_round_trip() {
        let pose = Pose::from_translation_euler(0.5, -1.5, 2.0, 0.2, 0.9, -1.3);
        let round = Pose::from_vector(&pose.to_vector());
        assert!(poses_close(&round, &pose, 1e-10));
    }

    #[test]
    fn test_vector_round_trip_identity() {
        let round = Pose::from_vector(&Pose::identity().to_vector());
        assert!(poses_close(&round, &Pose::identity(), TOL));
    }

    #[test]
    fn test_apply_direction_ignores_translation() {
        let pose = Pose::from_translation_euler(10.0, 20.0, 30.0, 0.0, 0.0, FRAC_PI_2);
        let d = pose.apply_direction(&Vector3::x());
        assert!((d - Vector3::y()).norm() < 1e-12, "got {d}");
    }

    #[test]
    fn test_apply_rotates_and_translates() {
        // Quarter turn about z, then shift along x.
        let pose = Pose::from_translation_euler(1.0, 0.0, 0.0, 0.0, 0.0, FRAC_PI_2);
        let p = pose.apply(&Point3::new(1.0, 0.0, 0.0));
        assert!((p - Point3::new(1.0, 1.0, 0.0)).norm() < 1e-12, "got {p}");
    }

    #[test]
    fn test_from_vector_renormalizes_large_rotation() {
        // A rotation vector of magnitude 2π wraps to the identity rotation.
        let v = Vector6::new(0.0, 0.0, 0.0, 0.0, 0.0, 2.0 * PI);
        let pose = Pose::from_vector(&v);
        assert!(pose.rotation_angle_to(&Pose::identity()) < 1e-9);
    }

    #[test]
    fn test_mul_matches_compose() {
        let a = Pose::from_translation_euler(1.0, 2.0, 3.0, 0.1, 0.2, 0.3);
        let b = Pose::from_translation_euler(-1.0, 0.5, 0.0, 0.0, 0.4, 0.0);
        assert!(poses_close(&(a * b), &a.compose(&b), TOL));
    }
}
