use std::f32::consts::FRAC_PI_4;

use glam::{Mat4, Vec3};

/// Keeps the orbit short of the poles, where `look_at` degenerates.
const MAX_PITCH: f32 = 1.5;

const MIN_DISTANCE: f32 = 1.0;
const MAX_DISTANCE: f32 = 200.0;

/// Perspective camera orbiting a target point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub target: Vec3,
    pub distance: f32,
    /// Rotation about +Y (radians). Zero looks down -Z.
    pub yaw: f32,
    /// Elevation above the XZ plane (radians).
    pub pitch: f32,
    /// Vertical field of view (radians).
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 10.0,
            yaw: 0.0,
            pitch: 0.0,
            fov_y: FRAC_PI_4,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Places the camera at `eye`, looking at `target`.
    pub fn look_at(eye: Vec3, target: Vec3) -> Self {
        let mut cam = Self {
            target,
            ..Self::default()
        };
        let offset = eye - target;
        let distance = offset.length();
        if distance > 0.0 {
            cam.distance = distance;
            cam.yaw = offset.x.atan2(offset.z);
            cam.pitch = (offset.y / distance).clamp(-1.0, 1.0).asin().clamp(-MAX_PITCH, MAX_PITCH);
        }
        cam
    }

    pub fn eye(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        self.target + self.distance * Vec3::new(cp * sy, sp, cp * cy)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    /// wgpu clip space (depth in `0..1`).
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Yaw is unbounded; pitch is clamped short of straight up/down.
    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Moves toward the target by `delta` (negative moves away).
    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance - delta).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Updates the aspect ratio. Zero-sized surfaces are ignored.
    pub fn set_aspect_ratio(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }
}
