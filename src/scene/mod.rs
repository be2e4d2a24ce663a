//! Scene collaborators the frame pipeline draws.
//!
//! The pipeline only borrows a [`Scene`] for the duration of a frame; it
//! never owns or mutates anything in here.

pub mod camera;
pub mod light;
pub mod loader;
pub mod model;
pub mod raymarched;
pub mod skybox;
pub mod surface;

pub use camera::Camera;
pub use light::{Attenuation, Light, LightKind, LightList};
pub use loader::{load_model, MeshData, ModelData};
pub use model::{compose_transform, Model};
pub use raymarched::{RaymarchKind, RaymarchedObject, RaymarchedSet};
pub use skybox::Skybox;
pub use surface::RaymarchedSurface;

use glam::Vec3;

use crate::renderer::shader::ShaderProgram;

/// Something that can push its uniforms and issue its draw calls into a
/// bound program.
pub trait Drawable {
    fn render(&self, program: &ShaderProgram);
}

#[derive(Default)]
pub struct Scene {
    pub models: Vec<Model>,
    pub lights: LightList,
    pub skybox: Option<Skybox>,
    pub raymarched: Option<RaymarchedSet>,
    /// Drawn by the surface pass.
    pub surfaces: Vec<RaymarchedSurface>,
    /// Textured quads composited by the post-process pass.
    pub overlays: Vec<RaymarchedSurface>,
}

impl Scene {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Camera speed factor for this frame; 1.0 away from every slow zone.
    pub fn speed_modifier(&self, camera_position: Vec3) -> f32 {
        self.raymarched
            .as_ref()
            .map_or(1.0, |set| set.compute_speed_modifier(camera_position))
    }

    pub fn has_directional_light(&self) -> bool {
        self.lights.directional().is_some()
    }

    /// Per-frame animation of scene state that depends on time.
    pub fn animate(&mut self, elapsed: f32, light_orbit_speed: f32) {
        self.lights.animate(elapsed, light_orbit_speed);
    }
}
