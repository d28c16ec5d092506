// camera.rs — camera orientation state and the perspective camera at the sphere centre

use glam::{EulerRot, Mat4, Quat, Vec3};
use std::f32::consts::{FRAC_PI_2, TAU};

/// Orientation and zoom shared between input handling and the frame loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Radians, kept in `[0, 2π)`.
    pub yaw: f32,
    /// Radians, clamped to `[-π/2, π/2]`.
    pub pitch: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
}

impl CameraState {
    pub fn new(fov: f32) -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            fov,
        }
    }

    pub fn add_yaw(&mut self, delta: f32) {
        let yaw = (self.yaw + delta).rem_euclid(TAU);
        // rem_euclid rounds up to TAU for tiny negative inputs
        self.yaw = if yaw >= TAU { 0.0 } else { yaw };
    }

    pub fn add_pitch(&mut self, delta: f32) {
        self.pitch = (self.pitch + delta).clamp(-FRAC_PI_2, FRAC_PI_2);
    }

    pub fn add_fov(&mut self, delta: f32, min: f32, max: f32) {
        self.fov = (self.fov + delta).clamp(min, max);
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

/// Perspective camera fixed at the origin. Yaw 0 / pitch 0 looks down -Z.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    yaw: f32,
    pitch: f32,
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov,
            aspect,
            near,
            far,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Copy orientation and zoom from the shared state.
    pub fn apply(&mut self, state: &CameraState) {
        self.yaw = state.yaw;
        self.pitch = state.pitch;
        self.fov = state.fov;
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation() * Vec3::NEG_Z
    }

    pub fn view_matrix(&self) -> Mat4 {
        // Camera sits at the origin, so the view is the inverse rotation.
        Mat4::from_quat(self.orientation().inverse())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn uniform(&self) -> CameraUniform {
        CameraUniform {
            view_proj: (self.projection_matrix() * self.view_matrix()).to_cols_array_2d(),
        }
    }
}
