use std::path::Path;

use crate::error::ResourceError;
use crate::gpu::{GpuGeometry, GpuRef};
use crate::renderer::primitives::skybox_cube;
use crate::renderer::shader::ShaderProgram;
use crate::renderer::texture::{load_cubemap_or_placeholder, Texture};
use crate::renderer::vertex::QuadVertex;

use super::Drawable;

pub struct Skybox {
    cube: GpuGeometry,
    cubemap: Texture,
}

impl Skybox {
    /// `faces` in +X, -X, +Y, -Y, +Z, -Z order. Unreadable faces give a grey sky.
    pub fn load<P: AsRef<Path>>(gpu: &GpuRef, faces: &[P]) -> Result<Self, ResourceError> {
        let cubemap = load_cubemap_or_placeholder(gpu, faces)?;
        Self::with_cubemap(gpu, cubemap)
    }

    pub fn with_cubemap(gpu: &GpuRef, cubemap: Texture) -> Result<Self, ResourceError> {
        let (vertices, indices) = skybox_cube();
        let cube = GpuGeometry::new(gpu, &vertices, &indices, &QuadVertex::LAYOUT)?;
        Ok(Self { cube, cubemap })
    }

    pub fn cubemap(&self) -> &Texture {
        &self.cubemap
    }
}

impl Drawable for Skybox {
    fn render(&self, program: &ShaderProgram) {
        program.set_uniform("skybox", 0);
        self.cubemap.bind(0);
        self.cube.draw();
    }
}
