use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::error::ResourceError;
use crate::gpu::GpuRef;
use crate::renderer::material::Material;
use crate::renderer::mesh::{Mesh, MeshTexture};
use crate::renderer::primitives::unit_quad_mesh;
use crate::renderer::shader::ShaderProgram;
use crate::renderer::texture::Texture;

use super::loader::ModelData;
use super::Drawable;

/// Translation, then Z, Y, X rotations (radians), then scale.
pub fn compose_transform(position: Vec3, orientation: Vec3, scale: Vec3) -> Mat4 {
    Mat4::from_translation(position)
        * Mat4::from_rotation_z(orientation.z)
        * Mat4::from_rotation_y(orientation.y)
        * Mat4::from_rotation_x(orientation.x)
        * Mat4::from_scale(scale)
}

/// A placed instance of a mesh list. Several models can share one list.
pub struct Model {
    meshes: Rc<[Mesh]>,
    pub position: Vec3,
    pub orientation: Vec3,
    pub scale: Vec3,
}

impl Model {
    pub fn new(meshes: Rc<[Mesh]>, position: Vec3, orientation: Vec3, scale: Vec3) -> Self {
        Self {
            meshes,
            position,
            orientation,
            scale,
        }
    }

    /// Uploads imported data. Images the importer could not convert become
    /// the checker placeholder.
    pub fn upload(gpu: &GpuRef, data: &ModelData) -> Result<Rc<[Mesh]>, ResourceError> {
        let mut textures = Vec::with_capacity(data.images.len());
        for image in &data.images {
            let texture = match image {
                Some(image) => Texture::from_image(gpu, image)?,
                None => Texture::placeholder(gpu)?,
            };
            textures.push(Rc::new(texture));
        }

        let mut meshes = Vec::with_capacity(data.meshes.len());
        for mesh in &data.meshes {
            let bound = mesh
                .textures
                .iter()
                .filter_map(|&(role, index)| {
                    textures.get(index).map(|texture| MeshTexture {
                        role,
                        texture: texture.clone(),
                    })
                })
                .collect();
            meshes.push(Mesh::new(
                gpu,
                &mesh.vertices,
                &mesh.indices,
                mesh.material,
                bound,
            )?);
        }
        Ok(meshes.into())
    }

    /// Unit quad in the XY plane, so flat surfaces can take part in the
    /// geometry and shadow passes.
    pub fn quad(
        gpu: &GpuRef,
        position: Vec3,
        orientation: Vec3,
        scale: Vec3,
        material: Material,
    ) -> Result<Self, ResourceError> {
        let (vertices, indices) = unit_quad_mesh();
        let mesh = Mesh::new(gpu, &vertices, &indices, material, Vec::new())?;
        Ok(Self::new(Rc::new([mesh]), position, orientation, scale))
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn transform(&self) -> Mat4 {
        compose_transform(self.position, self.orientation, self.scale)
    }

    /// Draws positions only, for depth passes.
    pub fn render_depth(&self, program: &ShaderProgram) {
        program.set_uniform("model", self.transform());
        for mesh in self.meshes.iter() {
            mesh.draw();
        }
    }
}

impl Drawable for Model {
    fn render(&self, program: &ShaderProgram) {
        program.set_uniform("model", self.transform());
        for mesh in self.meshes.iter() {
            mesh.render(program);
        }
    }
}
