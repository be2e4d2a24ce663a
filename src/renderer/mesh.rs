use std::rc::Rc;

use crate::error::ResourceError;
use crate::gpu::{GpuGeometry, GpuRef};

use super::material::Material;
use super::shader::ShaderProgram;
use super::texture::Texture;
use super::uniforms::SKYBOX_UNIT;
use super::vertex::Vertex;

/// Mesh textures take units `0..MAX_MESH_TEXTURES`; the units above hold the
/// skybox, shadow map and camera depth.
pub const MAX_MESH_TEXTURES: usize = SKYBOX_UNIT as usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureRole {
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureRole {
    fn uniform_prefix(self) -> &'static str {
        match self {
            TextureRole::Diffuse => "texture_diffuse",
            TextureRole::Specular => "texture_specular",
            TextureRole::Normal => "texture_normal",
            TextureRole::Height => "texture_height",
        }
    }
}

#[derive(Clone)]
pub struct MeshTexture {
    pub role: TextureRole,
    pub texture: Rc<Texture>,
}

/// Sampler names for `roles` in binding order: the n-th texture of a role
/// is `texture_<role>n`, counting from 1.
pub fn texture_uniform_names(roles: impl IntoIterator<Item = TextureRole>) -> Vec<String> {
    let mut counters = [0u32; 4];
    roles
        .into_iter()
        .map(|role| {
            let counter = &mut counters[role as usize];
            *counter += 1;
            format!("{}{}", role.uniform_prefix(), counter)
        })
        .collect()
}

/// Indexed triangle geometry plus the material and textures it is drawn with.
pub struct Mesh {
    geometry: GpuGeometry,
    material: Material,
    textures: Vec<MeshTexture>,
    sampler_names: Vec<String>,
}

impl Mesh {
    pub fn new(
        gpu: &GpuRef,
        vertices: &[Vertex],
        indices: &[u32],
        material: Material,
        mut textures: Vec<MeshTexture>,
    ) -> Result<Self, ResourceError> {
        if textures.len() > MAX_MESH_TEXTURES {
            log::warn!(
                "Mesh has {} textures, only the first {MAX_MESH_TEXTURES} are bound",
                textures.len()
            );
            textures.truncate(MAX_MESH_TEXTURES);
        }
        let geometry = GpuGeometry::new(gpu, vertices, indices, &Vertex::LAYOUT)?;
        let sampler_names = texture_uniform_names(textures.iter().map(|t| t.role));
        Ok(Self {
            geometry,
            material,
            textures,
            sampler_names,
        })
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn opacity(&self) -> f32 {
        self.material.opacity
    }

    pub fn textures(&self) -> &[MeshTexture] {
        &self.textures
    }

    /// Issues the draw call only; used by depth-only passes.
    pub fn draw(&self) {
        self.geometry.draw();
    }

    /// Binds textures to units 0..n, pushes the material and draws.
    pub fn render(&self, program: &ShaderProgram) {
        let bindings = self.textures.iter().zip(&self.sampler_names);
        for (unit, (texture, name)) in bindings.enumerate() {
            program.set_uniform(name, unit as i32);
            texture.texture.bind(unit as u32);
        }
        self.material.apply(program, "");
        self.geometry.draw();
    }
}

/// Most opaque first, so translucent meshes blend over what is behind them.
pub fn sort_by_opacity<T>(items: &mut [T], opacity: impl Fn(&T) -> f32) {
    items.sort_by(|a, b| opacity(b).total_cmp(&opacity(a)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::{GpuCall, RecordingContext};
    use crate::renderer::registry::{ProgramKind, ShaderRegistry};

    #[test]
    fn sampler_names_count_per_role() {
        let names = texture_uniform_names([
            TextureRole::Diffuse,
            TextureRole::Specular,
            TextureRole::Diffuse,
            TextureRole::Normal,
        ]);
        assert_eq!(
            names,
            [
                "texture_diffuse1",
                "texture_specular1",
                "texture_diffuse2",
                "texture_normal1"
            ]
        );
    }

    #[test]
    fn opaque_meshes_sort_first() {
        let mut opacities = vec![0.3f32, 1.0, 0.7, 1.0];
        sort_by_opacity(&mut opacities, |o| *o);
        assert_eq!(opacities, [1.0, 1.0, 0.7, 0.3]);
    }

    #[test]
    fn extra_textures_never_reach_the_fixed_sampler_units() {
        let recorder = Rc::new(RecordingContext::new());
        let gpu: GpuRef = recorder.clone();
        let textures = (0..10)
            .map(|_| MeshTexture {
                role: TextureRole::Diffuse,
                texture: Rc::new(Texture::placeholder(&gpu).unwrap()),
            })
            .collect();
        let vertices = [bytemuck::Zeroable::zeroed(); 3];
        let mesh = Mesh::new(&gpu, &vertices, &[0, 1, 2], Material::default(), textures).unwrap();
        assert_eq!(mesh.textures().len(), MAX_MESH_TEXTURES);

        let mut shaders = ShaderRegistry::new();
        shaders.compile(&gpu, ProgramKind::Mesh, "", "").unwrap();
        recorder.clear_calls();
        mesh.render(shaders.get(ProgramKind::Mesh).unwrap());

        let units = recorder
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                GpuCall::BindTexture { unit, .. } => Some(unit),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(units, (0..SKYBOX_UNIT).collect::<Vec<_>>());
    }
}
