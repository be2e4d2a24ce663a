use glam::{Mat3, Mat4, Vec2, Vec3};

use crate::settings::ShadowFrustum;

/// Per-frame values supplied by the driver loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInput {
    pub use_shadows: bool,
    /// Seconds since startup.
    pub elapsed: f32,
    /// Cursor position in clip space.
    pub mouse: Vec2,
    pub speed_modifier: f32,
}

impl Default for FrameInput {
    fn default() -> Self {
        Self {
            use_shadows: true,
            elapsed: 0.0,
            mouse: Vec2::ZERO,
            speed_modifier: 1.0,
        }
    }
}

/// Everything the passes of one frame read. Built at the start of a frame
/// and dropped at its end.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameState {
    pub use_shadows: bool,
    pub camera_position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    pub inv_view: Mat4,
    pub inv_projection: Mat4,
    pub near: f32,
    pub far: f32,
    pub light_space: Mat4,
    pub elapsed: f32,
    pub mouse: Vec2,
    pub resolution: Vec2,
    pub speed_modifier: f32,
}

impl FrameState {
    /// View matrix with the translation removed, for the skybox.
    pub fn rotation_only_view(&self) -> Mat4 {
        Mat4::from_mat3(Mat3::from_mat4(self.view))
    }
}

/// Orthographic light projection times the light's view of the origin.
pub fn light_space_matrix(light_position: Vec3, frustum: &ShadowFrustum) -> Mat4 {
    let h = frustum.half_extent;
    let projection = Mat4::orthographic_rh_gl(-h, h, -h, h, frustum.near, frustum.far);
    // look_at degenerates when the light sits straight above the origin.
    let up = if light_position.normalize_or_zero().cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_at_rh(light_position, Vec3::ZERO, up);
    projection * view
}
