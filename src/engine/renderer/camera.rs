// Perspective camera and screen projections

use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

/// Perspective camera component; the view comes from the entity's transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Vertical field of view in radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a camera from a vertical field of view in degrees
    pub fn perspective(fov_degrees: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y: fov_degrees.to_radians(),
            near,
            far,
        }
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect.max(f32::EPSILON), self.near, self.far)
    }

    /// View matrix looking down the transform's forward axis
    pub fn view(transform: Mat4) -> Mat4 {
        let eye = transform.w_axis.xyz();
        let forward = transform.z_axis.xyz().normalize_or_zero();
        let up = transform.y_axis.xyz().normalize_or_zero();
        if forward == Vec3::ZERO || up == Vec3::ZERO {
            return Mat4::look_to_rh(eye, Vec3::Z, Vec3::Y);
        }
        Mat4::look_to_rh(eye, forward, up)
    }

    /// View with the translation removed, so the skybox stays centered
    pub fn skybox_view(view: Mat4) -> Mat4 {
        let mut view = view;
        view.w_axis = glam::Vec4::W;
        view
    }

    /// Pixel-space projection for interface quads, origin at the top left
    pub fn interface_projection(width: f32, height: f32) -> Mat4 {
        Mat4::orthographic_rh(0.0, width, height, 0.0, -1.0, 1.0)
    }

    /// Project a world point to pixel coordinates, `None` behind the camera
    pub fn world_to_screen(view_projection: Mat4, point: Vec3, screen: Vec2) -> Option<Vec2> {
        let clip = view_projection * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.xy() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * screen.x,
            (1.0 - ndc.y) * 0.5 * screen.y,
        ))
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(60.0, 0.1, 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point_ahead_projects_to_center() {
        let camera = Camera::default();
        let view = Camera::view(Mat4::IDENTITY);
        let vp = camera.projection(1.0) * view;

        let screen = Camera::world_to_screen(vp, Vec3::new(0.0, 0.0, 5.0), Vec2::new(800.0, 600.0))
            .unwrap();
        assert_relative_eq!(screen.x, 400.0, epsilon = 1e-3);
        assert_relative_eq!(screen.y, 300.0, epsilon = 1e-3);
    }

    #[test]
    fn test_point_behind_is_hidden() {
        let vp = Camera::default().projection(1.0) * Camera::view(Mat4::IDENTITY);
        assert!(Camera::world_to_screen(vp, Vec3::new(0.0, 0.0, -5.0), Vec2::ONE).is_none());
    }

    #[test]
    fn test_skybox_view_drops_translation() {
        let view = Camera::view(Mat4::from_translation(Vec3::new(3.0, 4.0, 5.0)));
        let sky = Camera::skybox_view(view);
        assert_eq!(sky.w_axis, glam::Vec4::W);
        assert_eq!(sky.x_axis, view.x_axis);
    }

    #[test]
    fn test_interface_projection_corners() {
        let projection = Camera::interface_projection(200.0, 100.0);
        let top_left = projection * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(top_left.x, -1.0, epsilon = 1e-6);
        assert_relative_eq!(top_left.y, 1.0, epsilon = 1e-6);
    }
}
