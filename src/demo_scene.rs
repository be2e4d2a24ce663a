//! The gallery: an inn with five stands, each showing a raymarched fractal,
//! plus two procedural wall surfaces and a textured panel.

use std::f32::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use glam::Vec3;

use shaderpixel::gpu::GpuRef;
use shaderpixel::renderer::texture::noise_texture;
use shaderpixel::renderer::Material;
use shaderpixel::scene::{
    load_model, Light, LightList, Model, RaymarchKind, RaymarchedObject, RaymarchedSet,
    RaymarchedSurface, Scene, Skybox,
};
use shaderpixel::Result;

const NOISE_SEED: u64 = 0x5eed;
const NOISE_SIZE: u32 = 256;

pub struct GalleryAssets {
    root: PathBuf,
}

impl Default for GalleryAssets {
    fn default() -> Self {
        Self::new("resource")
    }
}

impl GalleryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    fn skybox_faces(&self) -> Vec<PathBuf> {
        ["Left", "Right", "Up", "Down", "Front", "Back"]
            .iter()
            .map(|face| self.path(format!("skybox/ThickCloudsWater{face}2048.png")))
            .collect()
    }

    pub fn build(&self, gpu: &GpuRef) -> Result<Scene> {
        log::info!("Building gallery scene from {:?}", self.root);

        let inn = load_model(self.path("models/inn/inn.gltf"))?;
        let inn = Model::upload(gpu, &inn)?;
        let stand = load_model(self.path("models/stand/stand.gltf"))?;
        let stand = Model::upload(gpu, &stand)?;

        let mut models = vec![Model::new(
            inn,
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::ZERO,
            Vec3::splat(75.0),
        )];
        let stands = [
            (Vec3::new(10.0, -0.75, 14.0), 0.0, Vec3::splat(2.5)),
            (Vec3::new(11.3, 1.15, -17.65), 1.0, Vec3::splat(3.0)),
            (Vec3::new(-15.0, -1.5, 3.1), 0.5, Vec3::splat(2.5)),
            (Vec3::new(-27.6, 3.53, -22.55), 2.5, Vec3::splat(2.5)),
            (Vec3::new(-27.6, -2.75, 12.5), 2.0, Vec3::new(2.5, 2.0, 2.5)),
        ];
        for (position, yaw, scale) in stands {
            models.push(Model::new(
                stand.clone(),
                position,
                Vec3::new(0.0, yaw, 0.0),
                scale,
            ));
        }

        let wall_orientation = Vec3::new(0.0, FRAC_PI_2, 0.0);
        // Stand-in for the surface below so it shows up in the shadow map.
        models.push(Model::quad(
            gpu,
            Vec3::new(17.01, 0.58, 28.75),
            wall_orientation,
            Vec3::new(4.3, 11.5, 1.0),
            Material::default(),
        )?);

        let noise = Rc::new(noise_texture(
            gpu,
            self.path("RGBAnoiseMedium.png"),
            NOISE_SEED,
            NOISE_SIZE,
        )?);
        let surfaces = vec![
            RaymarchedSurface::new(
                gpu,
                noise.clone(),
                Vec3::new(17.0, 0.58, 28.75),
                wall_orientation,
                Vec3::new(4.3, 11.5, 1.0),
            )?,
            RaymarchedSurface::new(
                gpu,
                noise.clone(),
                Vec3::new(16.8, 5.85, -18.215),
                wall_orientation,
                Vec3::new(2.825, 3.45, 1.0),
            )?,
        ];
        let overlays = vec![RaymarchedSurface::new(
            gpu,
            noise,
            Vec3::new(16.88, 4.8, -6.015),
            wall_orientation,
            Vec3::new(10.0, 13.0, 1.0),
        )?];

        let raymarched = RaymarchedSet::new(gpu, fractals())?;

        let lights = LightList::new(vec![Light::directional(
            Vec3::new(30.0, 30.0, 18.0),
            Vec3::new(0.77, 0.88, 1.0) * 0.075,
            Vec3::new(1.0, 0.964, 0.77),
            Vec3::ONE,
        )]);

        let skybox = Skybox::load(gpu, &self.skybox_faces())?;

        Ok(Scene {
            models,
            lights,
            skybox: Some(skybox),
            raymarched: Some(raymarched),
            surfaces,
            overlays,
        })
    }
}

fn phong(ambient: Vec3, diffuse: Vec3, specular: Vec3, shininess: f32) -> Material {
    Material::new(diffuse)
        .with_ambient(ambient)
        .with_specular(specular)
        .with_shininess(shininess)
}

fn fractals() -> Vec<RaymarchedObject> {
    vec![
        RaymarchedObject::new(RaymarchKind::Marble, Vec3::new(10.0, 2.5, 14.0), 1.0)
            .with_material(phong(Vec3::ZERO, Vec3::ONE, Vec3::ONE, 2048.0)),
        RaymarchedObject::new(RaymarchKind::Cloud, Vec3::new(-27.6, 7.73, -22.55), 2.0)
            .with_material(phong(Vec3::ZERO, Vec3::ONE, Vec3::ZERO, 1.0)),
        RaymarchedObject::new(RaymarchKind::Ifs, Vec3::new(11.3, 5.0, -17.65), 0.5)
            .with_slow_zone(3.0, 0.03)
            .with_material(phong(Vec3::ZERO, Vec3::ONE, Vec3::splat(0.35), 128.0)),
        RaymarchedObject::new(RaymarchKind::Mandelbox, Vec3::new(-27.6, 0.0, 12.5), 0.5)
            .with_slow_zone(2.0, 0.015)
            .with_material(phong(
                Vec3::ZERO,
                Vec3::ZERO,
                Vec3::new(1.0, 0.659, 0.537),
                256.0,
            )),
        RaymarchedObject::new(RaymarchKind::Mandelbulb, Vec3::new(-15.0, 2.0, 3.1), 1.0)
            .with_slow_zone(1.15, 0.1)
            .with_material(phong(Vec3::ZERO, Vec3::ZERO, Vec3::splat(0.35), 82.0)),
    ]
}
