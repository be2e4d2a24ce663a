//! Signed-distance objects evaluated together by the raymarch shader.

use glam::{Mat4, Vec3};

use crate::error::ResourceError;
use crate::gpu::{GpuGeometry, GpuRef};
use crate::renderer::material::Material;
use crate::renderer::primitives::fullscreen_quad;
use crate::renderer::shader::ShaderProgram;
use crate::renderer::vertex::QuadVertex;

use super::Drawable;

/// Width of the band around an object's bounding sphere over which the
/// camera speed eases back to normal.
pub const SLOW_ZONE_WIDTH: f32 = 1.0;

/// Size of the `object` array in the raymarch shader.
pub const MAX_RAYMARCHED_OBJECTS: usize = 8;

/// Distance function selected in the shader by `object[i].id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RaymarchKind {
    Mandelbox = 0,
    Mandelbulb = 1,
    Ifs = 2,
    Marble = 3,
    Cloud = 4,
    Blob = 5,
}

impl RaymarchKind {
    pub fn id(self) -> i32 {
        self as i32
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaymarchedObject {
    pub kind: RaymarchKind,
    pub position: Vec3,
    /// Euler angles in radians, applied Z, then Y, then X.
    pub orientation: Vec3,
    pub scale: f32,
    /// Bounding sphere radius relative to `scale`.
    pub bounding_sphere_scale: f32,
    /// Camera speed factor inside the bounding sphere.
    pub speed_modifier: f32,
    pub material: Material,
}

impl RaymarchedObject {
    pub fn new(kind: RaymarchKind, position: Vec3, scale: f32) -> Self {
        Self {
            kind,
            position,
            orientation: Vec3::ZERO,
            scale,
            bounding_sphere_scale: 1.0,
            speed_modifier: 1.0,
            material: Material::default(),
        }
    }

    pub fn with_orientation(mut self, orientation: Vec3) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_slow_zone(mut self, bounding_sphere_scale: f32, speed_modifier: f32) -> Self {
        self.bounding_sphere_scale = bounding_sphere_scale;
        self.speed_modifier = speed_modifier;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    /// World to object space. Scale is left out; the shader divides by
    /// `object[i].scale` itself.
    pub fn inverse_transform(&self) -> Mat4 {
        let o = self.orientation;
        let transform = Mat4::from_translation(self.position)
            * Mat4::from_rotation_z(o.z)
            * Mat4::from_rotation_y(o.y)
            * Mat4::from_rotation_x(o.x);
        transform.inverse()
    }

    pub fn bounding_radius(&self) -> f32 {
        self.scale * self.bounding_sphere_scale * std::f32::consts::SQRT_2
    }

    pub fn speed_modifier_at(&self, camera_position: Vec3) -> f32 {
        interpolate_speed(
            camera_position.distance(self.position),
            self.bounding_radius(),
            SLOW_ZONE_WIDTH,
            self.speed_modifier,
        )
    }
}

/// `zone` inside `radius`, 1.0 beyond `radius + width`, linear in between.
pub fn interpolate_speed(distance: f32, radius: f32, width: f32, zone: f32) -> f32 {
    if distance < radius {
        zone
    } else if distance < radius + width {
        let t = (distance - radius) / width;
        zone + (1.0 - zone) * t
    } else {
        1.0
    }
}

/// Every raymarched object of the scene, drawn with a single full-screen quad.
pub struct RaymarchedSet {
    objects: Vec<RaymarchedObject>,
    quad: GpuGeometry,
}

impl RaymarchedSet {
    /// Objects past [`MAX_RAYMARCHED_OBJECTS`] are dropped with a warning.
    pub fn new(gpu: &GpuRef, mut objects: Vec<RaymarchedObject>) -> Result<Self, ResourceError> {
        if objects.len() > MAX_RAYMARCHED_OBJECTS {
            log::warn!(
                "{} raymarched objects, keeping the first {MAX_RAYMARCHED_OBJECTS}",
                objects.len()
            );
            objects.truncate(MAX_RAYMARCHED_OBJECTS);
        }
        let (vertices, indices) = fullscreen_quad();
        let quad = GpuGeometry::new(gpu, &vertices, &indices, &QuadVertex::LAYOUT)?;
        log::debug!("Raymarched set with {} objects", objects.len());
        Ok(Self { objects, quad })
    }

    pub fn objects(&self) -> &[RaymarchedObject] {
        &self.objects
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Slowest factor over all objects, so the camera slows down near the
    /// closest slow zone.
    pub fn compute_speed_modifier(&self, camera_position: Vec3) -> f32 {
        self.objects
            .iter()
            .map(|object| object.speed_modifier_at(camera_position))
            .fold(1.0, f32::min)
    }
}

impl Drawable for RaymarchedSet {
    fn render(&self, program: &ShaderProgram) {
        program.set_uniform("model", Mat4::IDENTITY);
        program.set_uniform("nObjects", self.objects.len() as i32);
        for (i, object) in self.objects.iter().enumerate() {
            let prefix = format!("object[{i}].");
            object.material.apply(program, &prefix);
            program.set_uniform(&format!("{prefix}id"), object.kind.id());
            program.set_uniform(&format!("{prefix}scale"), object.scale);
            program.set_uniform(&format!("{prefix}invMat"), object.inverse_transform());
        }
        self.quad.draw();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::gpu::recording::RecordingContext;

    const RADIUS: f32 = 1.4142;

    #[test]
    fn speed_halfway_through_the_band() {
        let speed = interpolate_speed(RADIUS + 0.5, RADIUS, 1.0, 0.1);
        assert!((speed - 0.55).abs() < 1e-5, "{speed}");
    }

    #[test]
    fn speed_inside_and_beyond_the_zone() {
        assert_eq!(interpolate_speed(0.2, RADIUS, 1.0, 0.1), 0.1);
        assert_eq!(interpolate_speed(RADIUS, RADIUS, 1.0, 0.1), 0.1);
        assert_eq!(interpolate_speed(RADIUS + 1.0, RADIUS, 1.0, 0.1), 1.0);
        assert_eq!(interpolate_speed(50.0, RADIUS, 1.0, 0.1), 1.0);
    }

    #[test]
    fn bounding_radius_covers_the_unit_cube_diagonal() {
        let object = RaymarchedObject::new(RaymarchKind::Mandelbulb, Vec3::ZERO, 1.0);
        assert!((object.bounding_radius() - std::f32::consts::SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn inverse_transform_ignores_scale() {
        let object = RaymarchedObject::new(RaymarchKind::Blob, Vec3::new(2.0, 0.0, 0.0), 5.0);
        let local = object.inverse_transform().transform_point3(Vec3::new(3.0, 0.0, 0.0));
        assert!(local.abs_diff_eq(Vec3::X, 1e-6), "{local:?}");
    }

    #[test]
    fn inverse_transform_undoes_orientation() {
        let object = RaymarchedObject::new(RaymarchKind::Ifs, Vec3::new(0.0, 1.0, 0.0), 1.0)
            .with_orientation(Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0));
        // A quarter turn about Y carries local +X onto world -Z.
        let local = object.inverse_transform().transform_point3(Vec3::new(0.0, 1.0, -1.0));
        assert!(local.abs_diff_eq(Vec3::X, 1e-5), "{local:?}");
    }

    #[test]
    fn closest_slow_zone_wins() {
        let gpu: GpuRef = Rc::new(RecordingContext::new());
        let set = RaymarchedSet::new(
            &gpu,
            vec![
                RaymarchedObject::new(RaymarchKind::Cloud, Vec3::ZERO, 1.0)
                    .with_slow_zone(1.0, 0.1),
                RaymarchedObject::new(RaymarchKind::Ifs, Vec3::new(10.0, 0.0, 0.0), 1.0)
                    .with_slow_zone(1.0, 0.5),
            ],
        )
        .unwrap();

        assert_eq!(set.compute_speed_modifier(Vec3::new(0.5, 0.0, 0.0)), 0.1);
        assert_eq!(set.compute_speed_modifier(Vec3::new(10.0, 0.0, 0.0)), 0.5);
        assert_eq!(set.compute_speed_modifier(Vec3::new(5.0, 0.0, 0.0)), 1.0);
    }

    #[test]
    fn empty_set_does_not_slow_the_camera() {
        let gpu: GpuRef = Rc::new(RecordingContext::new());
        let set = RaymarchedSet::new(&gpu, Vec::new()).unwrap();
        assert_eq!(set.compute_speed_modifier(Vec3::ZERO), 1.0);
    }
}
