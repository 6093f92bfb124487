//! Rigid transformation utilities

use crate::point::{Point3f, Vector3f};
use nalgebra::{Isometry3, Matrix3, Matrix4, Rotation3, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// Axis norms below this are treated as "no axis" and produce the identity rotation.
pub const MIN_AXIS_NORM: f32 = 1e-6;

/// A rotation followed by a translation.
///
/// The rotation is expected to be orthonormal. This is guaranteed by the
/// constructors, not checked; repeated composition accumulates floating point
/// drift which is not corrected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub rotation: Matrix3<f32>,
    pub translation: Vector3f,
}

impl RigidTransform {
    /// Create an identity transformation
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3f::zeros(),
        }
    }

    /// Build a transform directly from its parts
    pub fn from_parts(rotation: Matrix3<f32>, translation: Vector3f) -> Self {
        Self { rotation, translation }
    }

    /// Create a pure translation
    pub fn from_translation(translation: Vector3f) -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation,
        }
    }

    /// Rotation of `angle_degrees` around `axis` (Rodrigues' formula).
    ///
    /// The axis does not need to be normalized. An axis shorter than
    /// [`MIN_AXIS_NORM`] yields the identity rotation.
    pub fn from_axis_angle(angle_degrees: f32, axis: &Vector3f) -> Self {
        Self::from_axis_angle_translation(angle_degrees, axis, Vector3f::zeros())
    }

    /// Same as [`RigidTransform::from_axis_angle`] with an explicit translation
    pub fn from_axis_angle_translation(
        angle_degrees: f32,
        axis: &Vector3f,
        translation: Vector3f,
    ) -> Self {
        let norm = axis.norm();
        if norm < MIN_AXIS_NORM {
            return Self::from_translation(translation);
        }

        let n = axis / norm;
        let (s, c) = angle_degrees.to_radians().sin_cos();
        let rotation = Matrix3::identity() * c + n * n.transpose() * (1.0 - c) + n.cross_matrix() * s;

        Self { rotation, translation }
    }

    /// Rotation from three small angles `(α, β, γ)` in radians plus a translation.
    ///
    /// The rotation is `Rz(γ) · Ry(β) · Rx(α)`; the registration solvers
    /// linearize exactly this parametrization.
    pub fn from_increment(angles: &Vector3f, translation: Vector3f) -> Self {
        let (sa, ca) = angles.x.sin_cos();
        let (sb, cb) = angles.y.sin_cos();
        let (sg, cg) = angles.z.sin_cos();

        #[rustfmt::skip]
        let rotation = Matrix3::new(
            cb * cg,                  -cb * sg,                  sb,
            sa * sb * cg + ca * sg,   -sa * sb * sg + ca * cg,   -sa * cb,
            -ca * sb * cg + sa * sg,  ca * sb * sg + sa * cg,    ca * cb,
        );

        Self { rotation, translation }
    }

    /// Apply the transformation to a point
    pub fn transform_point(&self, point: &Point3f) -> Point3f {
        Point3f::from(self.rotation * point.coords + self.translation)
    }

    /// Apply the transformation to every point, preserving order
    pub fn transform_points(&self, points: &[Point3f]) -> Vec<Point3f> {
        points.iter().map(|p| self.transform_point(p)).collect()
    }

    /// Apply only the rotation (directions, normals)
    pub fn transform_vector(&self, vector: &Vector3f) -> Vector3f {
        self.rotation * vector
    }

    /// `self ∘ other`: applying the result equals applying `other`, then `self`
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Get the inverse transformation
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// 4x4 homogeneous matrix
    pub fn to_homogeneous(&self) -> Matrix4<f32> {
        let mut matrix = Matrix4::identity();
        matrix.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        matrix.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        matrix
    }

    /// Rotation angle in radians, recovered from the trace
    pub fn rotation_angle(&self) -> f32 {
        ((self.rotation.trace() - 1.0) * 0.5).clamp(-1.0, 1.0).acos()
    }

    /// Check if this is approximately the identity transformation
    pub fn is_identity(&self, epsilon: f32) -> bool {
        (self.rotation - Matrix3::identity()).norm() < epsilon && self.translation.norm() < epsilon
    }

    /// Element-wise comparison of rotation and translation
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        (self.rotation - other.rotation).amax() <= epsilon
            && (self.translation - other.translation).amax() <= epsilon
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for RigidTransform {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(&rhs)
    }
}

impl From<RigidTransform> for Matrix4<f32> {
    fn from(transform: RigidTransform) -> Self {
        transform.to_homogeneous()
    }
}

impl From<Isometry3<f32>> for RigidTransform {
    fn from(isometry: Isometry3<f32>) -> Self {
        Self {
            rotation: *isometry.rotation.to_rotation_matrix().matrix(),
            translation: isometry.translation.vector,
        }
    }
}

impl From<RigidTransform> for Isometry3<f32> {
    fn from(transform: RigidTransform) -> Self {
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
            transform.rotation,
        ));
        Isometry3::from_parts(Translation3::from(transform.translation), rotation)
    }
}
