use glam::{Quat, Vec3};

use crate::renderer::shader::ShaderProgram;

use super::Drawable;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    /// Roughly a 50 unit falloff.
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    /// Shines from `position` towards the origin.
    Directional,
    Point(Attenuation),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl Light {
    pub fn directional(position: Vec3, ambient: Vec3, diffuse: Vec3, specular: Vec3) -> Self {
        Self {
            kind: LightKind::Directional,
            position,
            ambient,
            diffuse,
            specular,
        }
    }

    pub fn point(position: Vec3, ambient: Vec3, diffuse: Vec3, specular: Vec3) -> Self {
        Self {
            kind: LightKind::Point(Attenuation::default()),
            position,
            ambient,
            diffuse,
            specular,
        }
    }

    pub fn with_attenuation(mut self, attenuation: Attenuation) -> Self {
        if let LightKind::Point(_) = self.kind {
            self.kind = LightKind::Point(attenuation);
        }
        self
    }

    pub fn is_directional(&self) -> bool {
        matches!(self.kind, LightKind::Directional)
    }

    fn push(&self, program: &ShaderProgram, point_index: Option<usize>) {
        match (self.kind, point_index) {
            (LightKind::Directional, _) => {
                let direction = -self.position.normalize_or_zero();
                program.set_uniform("directionalLight.direction", direction);
                program.set_uniform("directionalLight.ambient", self.ambient);
                program.set_uniform("directionalLight.diffuse", self.diffuse);
                program.set_uniform("directionalLight.specular", self.specular);
            }
            (LightKind::Point(att), Some(i)) => {
                let field = |name: &str| format!("pointLights[{i}].{name}");
                program.set_uniform(&field("position"), self.position);
                program.set_uniform(&field("ambient"), self.ambient);
                program.set_uniform(&field("diffuse"), self.diffuse);
                program.set_uniform(&field("specular"), self.specular);
                program.set_uniform(&field("constant"), att.constant);
                program.set_uniform(&field("linear"), att.linear);
                program.set_uniform(&field("quadratic"), att.quadratic);
            }
            (LightKind::Point(_), None) => {}
        }
    }
}

/// Size of the `pointLights` array in the lighting shaders.
pub const MAX_POINT_LIGHTS: usize = 16;

/// The scene's lights with their shader array slots.
///
/// Point lights get indices 0..N-1 in construction order; the index is
/// fixed for the list's lifetime.
#[derive(Clone, Debug, Default)]
pub struct LightList {
    lights: Vec<Light>,
    point_indices: Vec<Option<usize>>,
    directional_rest: Option<Vec3>,
}

impl LightList {
    pub fn new(lights: Vec<Light>) -> Self {
        let mut next = 0;
        let point_indices = lights
            .iter()
            .map(|light| match light.kind {
                LightKind::Point(_) if next >= MAX_POINT_LIGHTS => {
                    log::warn!("Point light ignored: shaders hold {MAX_POINT_LIGHTS} at most");
                    None
                }
                LightKind::Point(_) => {
                    next += 1;
                    Some(next - 1)
                }
                LightKind::Directional => None,
            })
            .collect();
        let directional_rest = lights
            .iter()
            .find(|light| light.is_directional())
            .map(|light| light.position);
        Self {
            lights,
            point_indices,
            directional_rest,
        }
    }

    pub fn point_count(&self) -> usize {
        self.point_indices.iter().flatten().count()
    }

    pub fn point_index(&self, light: usize) -> Option<usize> {
        self.point_indices.get(light).copied().flatten()
    }

    pub fn directional(&self) -> Option<&Light> {
        self.lights.iter().find(|light| light.is_directional())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Orbits the directional light around the Y axis from its initial
    /// position, `orbit_speed` radians per second.
    pub fn animate(&mut self, elapsed: f32, orbit_speed: f32) {
        let Some(rest) = self.directional_rest else {
            return;
        };
        let rotated = Quat::from_rotation_y(elapsed * orbit_speed) * rest;
        if let Some(light) = self.lights.iter_mut().find(|light| light.is_directional()) {
            light.position = rotated;
        }
    }
}

impl Drawable for LightList {
    fn render(&self, program: &ShaderProgram) {
        for (light, index) in self.lights.iter().zip(&self.point_indices) {
            light.push(program, *index);
        }
        program.set_uniform("nPointLights", self.point_count() as i32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Light {
        Light::point(Vec3::ONE, Vec3::ZERO, Vec3::ONE, Vec3::ONE)
    }

    fn sun() -> Light {
        Light::directional(Vec3::new(4.0, 8.0, 0.0), Vec3::ZERO, Vec3::ONE, Vec3::ONE)
    }

    #[test]
    fn point_lights_are_indexed_in_construction_order() {
        let lights = LightList::new(vec![point(), sun(), point(), point()]);

        assert_eq!(lights.point_count(), 3);
        assert_eq!(lights.point_index(0), Some(0));
        assert_eq!(lights.point_index(1), None);
        assert_eq!(lights.point_index(2), Some(1));
        assert_eq!(lights.point_index(3), Some(2));
    }

    #[test]
    fn point_lights_past_the_shader_array_get_no_slot() {
        let lights = LightList::new(vec![point(); MAX_POINT_LIGHTS + 2]);
        assert_eq!(lights.point_count(), MAX_POINT_LIGHTS);
        assert_eq!(lights.point_index(MAX_POINT_LIGHTS), None);
    }

    #[test]
    fn separate_lists_do_not_share_indices() {
        let first = LightList::new(vec![point(), point()]);
        let second = LightList::new(vec![point()]);
        drop(first);
        assert_eq!(second.point_index(0), Some(0));
    }

    #[test]
    fn directional_light_orbits_around_y() {
        let mut lights = LightList::new(vec![sun()]);
        lights.animate(std::f32::consts::PI, 1.0);

        let position = lights.directional().unwrap().position;
        assert!(position.abs_diff_eq(Vec3::new(-4.0, 8.0, 0.0), 1e-4), "{position:?}");
    }
}
