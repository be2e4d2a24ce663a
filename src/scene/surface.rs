use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::error::ResourceError;
use crate::gpu::{GpuGeometry, GpuRef};
use crate::renderer::primitives::unit_quad;
use crate::renderer::shader::ShaderProgram;
use crate::renderer::texture::Texture;
use crate::renderer::vertex::QuadVertex;

use super::model::compose_transform;
use super::Drawable;

/// A world-space quad whose fragment shader draws a procedural effect,
/// sampling a shared noise texture on unit 0.
pub struct RaymarchedSurface {
    quad: GpuGeometry,
    noise: Rc<Texture>,
    pub position: Vec3,
    pub orientation: Vec3,
    pub scale: Vec3,
}

impl RaymarchedSurface {
    pub fn new(
        gpu: &GpuRef,
        noise: Rc<Texture>,
        position: Vec3,
        orientation: Vec3,
        scale: Vec3,
    ) -> Result<Self, ResourceError> {
        let (vertices, indices) = unit_quad();
        let quad = GpuGeometry::new(gpu, &vertices, &indices, &QuadVertex::LAYOUT)?;
        Ok(Self {
            quad,
            noise,
            position,
            orientation,
            scale,
        })
    }

    pub fn transform(&self) -> Mat4 {
        compose_transform(self.position, self.orientation, self.scale)
    }

    pub fn noise(&self) -> &Texture {
        &self.noise
    }
}

impl Drawable for RaymarchedSurface {
    fn render(&self, program: &ShaderProgram) {
        program.set_uniform("model", self.transform());
        program.set_uniform("noiseSampler", 0);
        self.noise.bind(0);
        self.quad.draw();
    }
}
