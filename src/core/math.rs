// Math utilities and conversions between glam and the physics backend

use glam::{Mat4, Quat, Vec3};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::{Isometry, Point, Real, Vector};

/// World up axis
pub const WORLD_UP: Vec3 = Vec3::Y;

/// World forward axis
pub const WORLD_FORWARD: Vec3 = Vec3::Z;

/// Linear interpolation
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Check if two f32 values are approximately equal
pub fn approx_equal(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() < epsilon
}

/// Remove the component of `v` along `normal`
pub fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Rotation applied as successive local X, Y then Z rotations
pub fn euler_xyz(angles: Vec3) -> Quat {
    Quat::from_rotation_x(angles.x) * Quat::from_rotation_y(angles.y) * Quat::from_rotation_z(angles.z)
}

/// Interpolate between two rigid transforms.
///
/// Translation and scale are lerped, rotation is slerped.
pub fn interpolate(from: Mat4, to: Mat4, t: f32) -> Mat4 {
    let (from_scale, from_rotation, from_translation) = from.to_scale_rotation_translation();
    let (to_scale, to_rotation, to_translation) = to.to_scale_rotation_translation();
    Mat4::from_scale_rotation_translation(
        from_scale.lerp(to_scale, t),
        from_rotation.slerp(to_rotation, t),
        from_translation.lerp(to_translation, t),
    )
}

/// Convert a glam vector to a physics vector
pub fn to_vector(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

/// Convert a glam vector to a physics point
pub fn to_point(v: Vec3) -> Point<Real> {
    Point::new(v.x, v.y, v.z)
}

/// Convert a physics vector to glam
pub fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

/// Convert a glam quaternion to a physics rotation
pub fn to_rotation(q: Quat) -> UnitQuaternion<Real> {
    UnitQuaternion::new_normalize(Quaternion::new(q.w, q.x, q.y, q.z))
}

/// Convert a physics rotation to glam
pub fn from_rotation(q: &UnitQuaternion<Real>) -> Quat {
    let coords = q.coords;
    Quat::from_xyzw(coords.x, coords.y, coords.z, coords.w)
}

/// Convert a transform matrix to a physics isometry, dropping scale
pub fn to_isometry(m: Mat4) -> Isometry<Real> {
    let (_, rotation, translation) = m.to_scale_rotation_translation();
    Isometry::from_parts(
        Translation3::new(translation.x, translation.y, translation.z),
        to_rotation(rotation),
    )
}

/// Convert a physics isometry to a transform matrix
pub fn from_isometry(iso: &Isometry<Real>) -> Mat4 {
    Mat4::from_rotation_translation(
        from_rotation(&iso.rotation),
        from_vector(&iso.translation.vector),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(0.0, 10.0, 0.0), 0.0);
        assert_eq!(lerp(0.0, 10.0, 1.0), 10.0);
        assert_eq!(lerp(0.0, 10.0, 0.5), 5.0);
    }

    #[test]
    fn test_approx_equal() {
        assert!(approx_equal(1.0, 1.00001, 0.0001));
        assert!(!approx_equal(1.0, 1.1, 0.01));
    }

    #[test]
    fn test_project_on_plane() {
        let projected = project_on_plane(Vec3::new(1.0, 5.0, -2.0), WORLD_UP);
        assert_eq!(projected, Vec3::new(1.0, 0.0, -2.0));
    }

    #[test]
    fn test_isometry_roundtrip() {
        let rotation = Quat::from_rotation_y(0.7);
        let matrix = Mat4::from_rotation_translation(rotation, Vec3::new(1.0, 2.0, 3.0));
        let back = from_isometry(&to_isometry(matrix));

        for (a, b) in matrix.to_cols_array().iter().zip(back.to_cols_array().iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_interpolate_halfway() {
        let from = Mat4::IDENTITY;
        let to = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
        let half = interpolate(from, to, 0.5);
        assert_relative_eq!(half.w_axis.x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_euler_xyz_single_axis() {
        let q = euler_xyz(Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0));
        let forward = q * WORLD_FORWARD;
        assert_relative_eq!(forward.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(forward.z, 0.0, epsilon = 1e-6);
    }
}
