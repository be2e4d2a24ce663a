// renderer/material.rs (Phong version)

use glam::Vec3;

use super::shader::ShaderProgram;

/// Phong surface parameters as the mesh and raymarch shaders read them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    pub opacity: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self::new(Vec3::splat(0.8))
    }
}

impl Material {
    pub fn new(diffuse: Vec3) -> Self {
        Self {
            ambient: diffuse * 0.1,
            diffuse,
            specular: Vec3::splat(0.5),
            shininess: 32.0,
            opacity: 1.0,
        }
    }

    /// Phong approximation of a metallic-roughness material: rougher surfaces
    /// get a wider, dimmer highlight.
    pub fn from_pbr(base_color: [f32; 4], metallic: f32, roughness: f32) -> Self {
        let diffuse = Vec3::new(base_color[0], base_color[1], base_color[2]);
        let roughness = roughness.clamp(0.0, 1.0);
        let specular =
            Vec3::splat(0.04).lerp(diffuse, metallic.clamp(0.0, 1.0)) + (1.0 - roughness) * 0.5;
        Self {
            ambient: diffuse * 0.1,
            diffuse,
            specular: specular.min(Vec3::ONE),
            shininess: shininess_from_roughness(roughness),
            opacity: base_color[3],
        }
    }

    pub fn with_ambient(mut self, ambient: Vec3) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn with_specular(mut self, specular: Vec3) -> Self {
        self.specular = specular;
        self
    }

    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Writes `<prefix>material.*`; `prefix` is empty for meshes and
    /// `object[i].` for raymarched objects.
    pub fn apply(&self, program: &ShaderProgram, prefix: &str) {
        program.set_uniform(&format!("{prefix}material.ambient"), self.ambient);
        program.set_uniform(&format!("{prefix}material.diffuse"), self.diffuse);
        program.set_uniform(&format!("{prefix}material.specular"), self.specular);
        program.set_uniform(&format!("{prefix}material.shininess"), self.shininess);
        program.set_uniform(&format!("{prefix}material.opacity"), self.opacity);
    }
}

fn shininess_from_roughness(roughness: f32) -> f32 {
    // Blinn-Phong exponent matching a GGX lobe of the same width.
    let alpha = (roughness * roughness).max(1e-3);
    (2.0 / (alpha * alpha) - 2.0).clamp(1.0, 256.0)
}
