use std::rc::Rc;

use glam::{Mat4, Vec3};

use shaderpixel::error::{Error, ResourceError, ShaderError};
use shaderpixel::gpu::recording::{GpuCall, RecordingContext};
use shaderpixel::gpu::{FramebufferStatus, GpuRef, TextureTarget, UniformValue};
use shaderpixel::renderer::texture::{placeholder_cubemap, Texture};
use shaderpixel::renderer::uniforms::DEPTH_MAP_UNIT;
use shaderpixel::renderer::{
    FrameInput, FramePipeline, Material, PassKind, ProgramKind, ShaderRegistry,
};
use shaderpixel::scene::{
    Attenuation, Camera, Light, LightList, Model, RaymarchKind, RaymarchedObject, RaymarchedSet,
    RaymarchedSurface, Scene, Skybox,
};
use shaderpixel::settings::RenderSettings;

struct Harness {
    recorder: Rc<RecordingContext>,
    gpu: GpuRef,
}

impl Harness {
    fn new() -> Self {
        let recorder = Rc::new(RecordingContext::new());
        let gpu: GpuRef = recorder.clone();
        Self { recorder, gpu }
    }

    fn registry(&self) -> ShaderRegistry {
        let mut shaders = ShaderRegistry::new();
        for kind in ProgramKind::ALL {
            shaders.compile(&self.gpu, kind, "", "").unwrap();
        }
        shaders
    }

    fn pipeline(&self, settings: &RenderSettings) -> FramePipeline {
        FramePipeline::new(&self.gpu, self.registry(), settings).unwrap()
    }

    fn model(&self, position: Vec3, opacity: f32) -> Model {
        Model::quad(
            &self.gpu,
            position,
            Vec3::ZERO,
            Vec3::ONE,
            Material::new(Vec3::ONE).with_opacity(opacity),
        )
        .unwrap()
    }

    fn surface(&self) -> RaymarchedSurface {
        let noise = Rc::new(Texture::placeholder(&self.gpu).unwrap());
        RaymarchedSurface::new(&self.gpu, noise, Vec3::ZERO, Vec3::ZERO, Vec3::ONE).unwrap()
    }

    fn skybox(&self) -> Skybox {
        Skybox::with_cubemap(&self.gpu, placeholder_cubemap(&self.gpu).unwrap()).unwrap()
    }

    fn gallery(&self) -> Scene {
        let fractals = vec![
            RaymarchedObject::new(RaymarchKind::Mandelbulb, Vec3::new(0.0, 0.0, -5.0), 1.0),
            RaymarchedObject::new(RaymarchKind::Marble, Vec3::new(3.0, 0.0, -5.0), 0.5),
        ];
        Scene {
            models: vec![
                self.model(Vec3::new(0.0, 0.0, -2.0), 1.0),
                self.model(Vec3::new(1.0, 0.0, -3.0), 0.5),
            ],
            lights: LightList::new(vec![
                sun(),
                Light::point(Vec3::new(0.0, 2.0, 0.0), Vec3::ZERO, Vec3::ONE, Vec3::ONE)
                    .with_attenuation(Attenuation {
                        constant: 1.0,
                        linear: 0.35,
                        quadratic: 0.44,
                    }),
            ]),
            skybox: Some(self.skybox()),
            raymarched: Some(RaymarchedSet::new(&self.gpu, fractals).unwrap()),
            surfaces: vec![self.surface()],
            overlays: vec![self.surface()],
        }
    }
}

fn sun() -> Light {
    Light::directional(Vec3::new(30.0, 30.0, 18.0), Vec3::splat(0.1), Vec3::ONE, Vec3::ONE)
}

fn camera() -> Camera {
    Camera::new(75.0, 16.0 / 9.0, 0.1, 100.0)
}

fn shadows(on: bool) -> FrameInput {
    FrameInput {
        use_shadows: on,
        ..FrameInput::default()
    }
}

fn light_space_writes(recorder: &RecordingContext) -> Vec<Mat4> {
    recorder
        .uniform_writes("lightSpaceMatrix")
        .into_iter()
        .filter_map(|value| match value {
            UniformValue::Mat4(m) => Some(m),
            _ => None,
        })
        .collect()
}

#[test]
fn depth_copy_sits_between_mesh_draws_and_raymarching() {
    let harness = Harness::new();
    let mut pipeline = harness.pipeline(&RenderSettings::default());
    let scene = harness.gallery();
    let mesh_program = pipeline.shaders().get(ProgramKind::Mesh).unwrap().id();
    let raymarch_program = pipeline.shaders().get(ProgramKind::Raymarch).unwrap().id();
    let depth_texture = pipeline.camera_depth().texture().unwrap().id();

    harness.recorder.clear_calls();
    let report = pipeline.render_frame(&scene, &camera(), shadows(true)).unwrap();
    assert!(report.ran(PassKind::Raymarch));

    let calls = harness.recorder.calls();
    let draws_with = |id| {
        move |c: &GpuCall| matches!(c, GpuCall::DrawIndexed { program, .. } if *program == Some(id))
    };
    let last_mesh_draw = calls.iter().rposition(draws_with(mesh_program)).unwrap();
    let depth_copy = calls
        .iter()
        .position(|c| {
            matches!(c, GpuCall::CopyDepthToTexture { texture, .. } if *texture == depth_texture)
        })
        .unwrap();
    let depth_bind = calls
        .iter()
        .position(|c| {
            *c == GpuCall::BindTexture {
                unit: DEPTH_MAP_UNIT,
                target: TextureTarget::Texture2d,
                texture: Some(depth_texture),
            }
        })
        .unwrap();
    let raymarch_draw = calls.iter().position(draws_with(raymarch_program)).unwrap();

    assert!(last_mesh_draw < depth_copy);
    assert!(depth_copy < depth_bind);
    assert!(depth_bind < raymarch_draw);
}

#[test]
fn passes_run_in_frame_order() {
    let harness = Harness::new();
    let settings = RenderSettings {
        post_process: true,
        ..RenderSettings::default()
    };
    let mut pipeline = harness.pipeline(&settings);
    let report = pipeline
        .render_frame(&harness.gallery(), &camera(), shadows(true))
        .unwrap();

    assert_eq!(
        report.passes,
        vec![
            PassKind::Shadow,
            PassKind::Lights,
            PassKind::Geometry,
            PassKind::DepthCopy,
            PassKind::Skybox,
            PassKind::Raymarch,
            PassKind::Surface,
            PassKind::PostProcess,
        ]
    );
}

#[test]
fn empty_scene_with_only_a_skybox() {
    let harness = Harness::new();
    let mut pipeline = harness.pipeline(&RenderSettings::default());
    let scene = Scene {
        skybox: Some(harness.skybox()),
        ..Scene::empty()
    };

    harness.recorder.clear_calls();
    let report = pipeline.render_frame(&scene, &camera(), shadows(true)).unwrap();

    assert!(report.ran(PassKind::Skybox));
    assert!(!report.ran(PassKind::Shadow));
    assert!(!report.ran(PassKind::Raymarch));
    assert_eq!(harness.recorder.count(GpuCall::is_draw), 1);
}

#[test]
fn uniform_locations_are_looked_up_once() {
    let harness = Harness::new();
    let mut pipeline = harness.pipeline(&RenderSettings::default());
    let scene = harness.gallery();

    pipeline.render_frame(&scene, &camera(), shadows(true)).unwrap();
    let after_first = harness.recorder.location_queries();
    pipeline.render_frame(&scene, &camera(), shadows(true)).unwrap();

    assert_eq!(harness.recorder.location_queries(), after_first);
    assert!(harness.recorder.uniform_writes("viewPos").len() >= 2);
}

#[test]
fn light_space_follows_the_orbiting_light_only_with_shadows() {
    let harness = Harness::new();
    let mut pipeline = harness.pipeline(&RenderSettings::default());
    let mut scene = harness.gallery();

    pipeline.render_frame(&scene, &camera(), shadows(true)).unwrap();
    let first = pipeline.light_space();
    assert_ne!(first, Mat4::IDENTITY);

    scene.animate(1.0, 0.5);
    pipeline.render_frame(&scene, &camera(), shadows(false)).unwrap();
    assert_eq!(pipeline.light_space(), first);

    pipeline.render_frame(&scene, &camera(), shadows(true)).unwrap();
    assert_ne!(pipeline.light_space(), first);
    assert!(light_space_writes(&harness.recorder).contains(&pipeline.light_space()));
}

#[test]
fn shadows_off_tells_the_shaders_to_skip_sampling() {
    let harness = Harness::new();
    let mut pipeline = harness.pipeline(&RenderSettings::default());

    harness.recorder.clear_calls();
    let report = pipeline
        .render_frame(&harness.gallery(), &camera(), shadows(false))
        .unwrap();

    assert!(!report.ran(PassKind::Shadow));
    assert!(harness
        .recorder
        .uniform_writes("useShadows")
        .iter()
        .all(|value| *value == UniformValue::Int(0)));
}

#[test]
fn point_light_slots_reach_every_lit_program() {
    let harness = Harness::new();
    let mut pipeline = harness.pipeline(&RenderSettings::default());
    pipeline
        .render_frame(&harness.gallery(), &camera(), shadows(true))
        .unwrap();

    let counts = harness.recorder.uniform_writes("nPointLights");
    assert_eq!(counts, vec![UniformValue::Int(1); 3]);
    assert_eq!(
        harness.recorder.uniform_writes("pointLights[0].linear"),
        vec![UniformValue::Float(0.35); 3]
    );
    assert!(harness.recorder.uniform_writes("pointLights[1].constant").is_empty());
}

#[test]
fn missing_program_aborts_the_frame() {
    let harness = Harness::new();
    let mut shaders = ShaderRegistry::new();
    shaders.compile(&harness.gpu, ProgramKind::Mesh, "", "").unwrap();
    let mut pipeline =
        FramePipeline::new(&harness.gpu, shaders, &RenderSettings::default()).unwrap();

    let err = pipeline
        .render_frame(&harness.gallery(), &camera(), shadows(true))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Shader(ShaderError::NotRegistered(ProgramKind::Shadow))
    ));
}

#[test]
fn incomplete_framebuffer_fails_pipeline_creation() {
    let harness = Harness::new();
    let shaders = harness.registry();
    harness
        .recorder
        .set_framebuffer_status(FramebufferStatus::IncompleteAttachment);

    let err = FramePipeline::new(&harness.gpu, shaders, &RenderSettings::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        Error::Resource(ResourceError::IncompleteFramebuffer {
            status: FramebufferStatus::IncompleteAttachment,
            ..
        })
    ));
}

#[test]
fn dropping_everything_releases_every_gpu_object() {
    let harness = Harness::new();
    {
        let settings = RenderSettings {
            post_process: true,
            ..RenderSettings::default()
        };
        let mut pipeline = harness.pipeline(&settings);
        let scene = harness.gallery();
        pipeline.render_frame(&scene, &camera(), shadows(true)).unwrap();
        pipeline.resize(800, 600).unwrap();
        assert!(harness.recorder.live_objects() > 0);
    }
    assert_eq!(harness.recorder.live_objects(), 0);
}
