//! Per-frame state handed to every pass.

use glam::{Mat4, Vec3};

/// Camera parameters for a frame.
///
/// Projection uses the 0..1 depth range (`Mat4::perspective_rh`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub view: Mat4,
    pub projection: Mat4,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a perspective camera at the origin looking down -Z.
    pub fn perspective(fov_y_radians: f32, aspect_ratio: f32, near: f32, far: f32) -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::perspective_rh(fov_y_radians, aspect_ratio, near, far),
            near,
            far,
        }
    }

    /// Set the view matrix.
    pub fn with_view(mut self, view: Mat4) -> Self {
        self.view = view;
        self
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Device depth of the world point `(0, 0, -distance)`.
    pub fn project_depth(&self, distance: f32) -> f32 {
        self.view_projection()
            .project_point3(Vec3::new(0.0, 0.0, -distance))
            .z
    }

    /// View-space distance in front of the camera of the world point
    /// `(0, 0, -distance)`.
    pub fn view_distance(&self, distance: f32) -> f32 {
        -self.view.transform_point3(Vec3::new(0.0, 0.0, -distance)).z
    }

    /// View-space distance for a device depth value.
    pub fn linearize_depth(&self, depth: f32) -> f32 {
        self.near * self.far / (self.far - depth * (self.far - self.near))
    }
}

/// Opaque per-frame context supplied by the render loop.
///
/// The graph never reads it; it is passed through to every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameContext {
    pub frame_index: u64,
    /// Seconds since the previous frame
    pub delta_time: f32,
    pub width: u32,
    pub height: u32,
    pub camera: Camera,
}

impl FrameContext {
    pub fn new(width: u32, height: u32, camera: Camera) -> Self {
        Self {
            frame_index: 0,
            delta_time: 0.0,
            width,
            height,
            camera,
        }
    }

    /// Advance to the next frame.
    pub fn advance(&mut self, delta_time: f32) {
        self.frame_index += 1;
        self.delta_time = delta_time;
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_depth_range() {
        let camera = Camera::perspective(1.0, 1.0, 0.5, 50.0);
        assert!(camera.project_depth(0.5).abs() < 1e-5);
        assert!((camera.project_depth(50.0) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_linearize_inverts_projection() {
        let camera = Camera::perspective(1.2, 16.0 / 9.0, 0.1, 100.0);
        for distance in [0.1, 1.0, 7.5, 42.0, 100.0] {
            let depth = camera.project_depth(distance);
            let linear = camera.linearize_depth(depth);
            assert!(
                (linear - distance).abs() < distance * 1e-3,
                "{distance} -> {depth} -> {linear}"
            );
        }
    }

    #[test]
    fn test_view_moves_depth() {
        let camera = Camera::perspective(1.0, 1.0, 0.1, 100.0)
            .with_view(Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0)));
        assert!((camera.view_distance(5.0) - 8.0).abs() < 1e-5);

        let linear = camera.linearize_depth(camera.project_depth(5.0));
        assert!((linear - 8.0).abs() < 1e-2);
        assert_eq!(camera.view_projection(), camera.projection * camera.view);
    }

    #[test]
    fn test_advance() {
        let mut frame = FrameContext::new(4, 2, Camera::perspective(1.0, 2.0, 0.1, 10.0));
        frame.advance(0.016);
        frame.advance(0.017);
        assert_eq!(frame.frame_index, 2);
        assert_eq!(frame.delta_time, 0.017);
        assert_eq!(frame.aspect_ratio(), 2.0);
    }
}
