use glam::{Mat4, Vec3};
use winit::keyboard::KeyCode;

use crate::input::Controller;
use crate::settings::CameraSettings;

const PITCH_LIMIT: f32 = 89.0;

/// First-person camera. View, projection and their inverses are cached and
/// recomputed whenever an input changes them.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    fov_degrees: f32,
    aspect: f32,
    near: f32,
    far: f32,
    position: Vec3,
    front: Vec3,
    /// Degrees.
    pitch: f32,
    /// Degrees; -90 looks down -Z.
    yaw: f32,
    view: Mat4,
    inv_view: Mat4,
    projection: Mat4,
    inv_projection: Mat4,
}

impl Camera {
    pub fn new(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov_degrees,
            aspect,
            near,
            far,
            position: Vec3::new(0.0, 0.0, 2.0),
            front: Vec3::NEG_Z,
            pitch: 0.0,
            yaw: -90.0,
            view: Mat4::IDENTITY,
            inv_view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            inv_projection: Mat4::IDENTITY,
        };
        camera.update_projection();
        camera.update_view();
        camera
    }

    pub fn from_settings(settings: &CameraSettings, aspect: f32) -> Self {
        Self::new(settings.fov_degrees, aspect, settings.near, settings.far)
    }

    /// Moves along the view axes by `speed` per call and applies mouse look.
    pub fn handle_inputs(&mut self, controller: &Controller, speed: f32, sensitivity: f32) {
        let key = |code| controller.key_value(code) as f32;
        // View space: +X right, +Y up, -Z forward.
        let local = Vec3::new(
            key(KeyCode::KeyD) - key(KeyCode::KeyA),
            key(KeyCode::Space) - key(KeyCode::ShiftLeft),
            key(KeyCode::KeyS) - key(KeyCode::KeyW),
        );
        let world = self.inv_view.transform_vector3(local.normalize_or_zero());
        self.position += world * speed;

        let delta = controller.mouse().delta();
        self.look(delta.x as f32 * sensitivity, -delta.y as f32 * sensitivity);
    }

    /// Adds to yaw and pitch (degrees); pitch stays within ±89°.
    pub fn look(&mut self, yaw: f32, pitch: f32) {
        self.yaw += yaw;
        self.pitch = (self.pitch + pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        let (pitch, yaw) = (self.pitch.to_radians(), self.yaw.to_radians());
        self.front = Vec3::new(pitch.cos() * yaw.cos(), pitch.sin(), pitch.cos() * yaw.sin())
            .normalize();
        self.update_view();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection();
    }

    fn update_view(&mut self) {
        self.view = Mat4::look_at_rh(self.position, self.position + self.front, Vec3::Y);
        self.inv_view = self.view.inverse();
    }

    fn update_projection(&mut self) {
        let fov = self.fov_degrees.to_radians();
        self.projection = Mat4::perspective_rh_gl(fov, self.aspect, self.near, self.far);
        self.inv_projection = self.projection.inverse();
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn right(&self) -> Vec3 {
        self.inv_view.transform_vector3(Vec3::X)
    }

    pub fn up(&self) -> Vec3 {
        self.inv_view.transform_vector3(Vec3::Y)
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn fov(&self) -> f32 {
        self.fov_degrees
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn inv_view(&self) -> Mat4 {
        self.inv_view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn inv_projection(&self) -> Mat4 {
        self.inv_projection
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use winit::event::ElementState;

    use super::*;

    fn camera() -> Camera {
        Camera::new(75.0, 4.0 / 3.0, 0.1, 100.0)
    }

    #[test]
    fn starts_looking_down_negative_z() {
        let camera = camera();
        assert!(camera.front().abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert!(camera.right().abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn cached_inverses_match() {
        let mut camera = camera();
        camera.look(30.0, 20.0);
        camera.set_aspect(16.0 / 9.0);
        assert!((camera.view() * camera.inv_view()).abs_diff_eq(Mat4::IDENTITY, 1e-4));
        assert!((camera.projection() * camera.inv_projection()).abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = camera();
        camera.look(0.0, 500.0);
        assert_eq!(camera.pitch(), 89.0);
        camera.look(0.0, -500.0);
        assert_eq!(camera.pitch(), -89.0);
    }

    #[test]
    fn forward_key_moves_along_front() {
        let mut controller = Controller::new();
        controller.handle_key(KeyCode::KeyW, ElementState::Pressed);
        controller.update(Instant::now());

        let mut camera = camera();
        camera.handle_inputs(&controller, 0.5, 0.1);
        assert!(camera.position().abs_diff_eq(Vec3::new(0.0, 0.0, 1.5), 1e-5));
    }

    #[test]
    fn speed_scales_the_step() {
        let mut controller = Controller::new();
        controller.handle_key(KeyCode::KeyD, ElementState::Pressed);
        controller.update(Instant::now());

        let mut camera = camera();
        camera.handle_inputs(&controller, 0.05 * 0.1, 0.1);
        assert!(camera.position().abs_diff_eq(Vec3::new(0.005, 0.0, 2.0), 1e-6));
    }
}
