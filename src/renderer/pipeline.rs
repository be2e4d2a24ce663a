//! The per-frame pass sequence.
//!
//! Passes run strictly in order because each one reads what an earlier one
//! wrote: the shadow pass fills the shadow map that the lit passes sample,
//! and the geometry pass leaves the camera depth that raymarching tests
//! against. [`FramePipeline`] owns every render target and shader program;
//! the scene and camera are only borrowed for the duration of a frame.

use glam::{Mat4, Vec2, Vec4};

use crate::error::{ResourceError, Result};
use crate::gpu::{
    BlendFactor, Capability, ClearMask, DepthFunc, FramebufferBinding, FramebufferTarget,
    GpuGeometry, GpuRef, Viewport,
};
use crate::scene::{Camera, Drawable, Model, Scene};
use crate::settings::{RenderSettings, ShadowFrustum};

use super::frame::{light_space_matrix, FrameInput, FrameState};
use super::mesh::{sort_by_opacity, Mesh};
use super::primitives::fullscreen_quad;
use super::registry::{ProgramKind, ShaderRegistry};
use super::render_target::RenderTarget;
use super::uniforms::{self, DEPTH_MAP_UNIT, SHADOW_MAP_UNIT, SKYBOX_UNIT};
use super::vertex::QuadVertex;

const CLEAR_COLOR: Vec4 = Vec4::new(0.1, 0.1, 0.1, 1.0);

/// Programs that receive the scene's light uniforms.
const LIT_PROGRAMS: [ProgramKind; 3] = [
    ProgramKind::Mesh,
    ProgramKind::Raymarch,
    ProgramKind::Surface,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassKind {
    Shadow,
    Lights,
    Geometry,
    DepthCopy,
    Skybox,
    Raymarch,
    Surface,
    PostProcess,
}

/// The passes a frame executed, in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub passes: Vec<PassKind>,
}

impl FrameReport {
    pub fn ran(&self, pass: PassKind) -> bool {
        self.passes.contains(&pass)
    }
}

/// Off-screen chain of the post-process pass: overlays are drawn into a
/// renderbuffer, which is blitted into a texture the blend shader samples.
struct PostTargets {
    render: RenderTarget,
    intermediate: RenderTarget,
}

impl PostTargets {
    fn new(gpu: &GpuRef, width: u32, height: u32) -> Result<Self, ResourceError> {
        let render = RenderTarget::create_color_renderbuffer(gpu, "post_render", width, height)?;
        let intermediate =
            RenderTarget::create_color_target(gpu, "post_intermediate", width, height)?;
        Ok(Self {
            render,
            intermediate,
        })
    }
}

pub struct FramePipeline {
    gpu: GpuRef,
    shaders: ShaderRegistry,
    shadow_map: RenderTarget,
    camera_depth: RenderTarget,
    post: Option<PostTargets>,
    screen_quad: GpuGeometry,
    window: Viewport,
    shadow_frustum: ShadowFrustum,
    /// Last computed light-space matrix. Kept while shadows are off so the
    /// lit shaders always receive a well-defined value.
    light_space: Mat4,
}

impl FramePipeline {
    pub fn new(gpu: &GpuRef, shaders: ShaderRegistry, settings: &RenderSettings) -> Result<Self> {
        let (width, height) = (settings.resolution.width, settings.resolution.height);
        let shadow_size = settings.shadow_map_size;

        let shadow_map =
            RenderTarget::create_depth_target(gpu, "shadow_map", shadow_size, shadow_size)?;
        let camera_depth = RenderTarget::create_depth_target(gpu, "camera_depth", width, height)?;
        let post = if settings.post_process {
            Some(PostTargets::new(gpu, width, height)?)
        } else {
            None
        };

        let (vertices, indices) = fullscreen_quad();
        let screen_quad = GpuGeometry::new(gpu, &vertices, &indices, &QuadVertex::LAYOUT)?;

        gpu.set_capability(Capability::DepthTest, true);
        gpu.set_depth_func(DepthFunc::Less);
        gpu.set_capability(Capability::CullFace, true);
        gpu.set_capability(Capability::Blend, true);
        gpu.set_blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        gpu.set_capability(Capability::Multisample, true);

        log::info!(
            "Frame pipeline ready: {width}x{height}, shadow map {shadow_size}, post-process {}",
            post.is_some()
        );

        Ok(Self {
            gpu: gpu.clone(),
            shaders,
            shadow_map,
            camera_depth,
            post,
            screen_quad,
            window: Viewport::sized(width, height),
            shadow_frustum: settings.shadow_frustum,
            light_space: Mat4::IDENTITY,
        })
    }

    /// Recreates the window-sized targets. A zero-sized window (minimised)
    /// is ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), ResourceError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.camera_depth =
            RenderTarget::create_depth_target(&self.gpu, "camera_depth", width, height)?;
        if self.post.is_some() {
            self.post = Some(PostTargets::new(&self.gpu, width, height)?);
        }
        self.window = Viewport::sized(width, height);
        log::debug!("Resized frame pipeline to {width}x{height}");
        Ok(())
    }

    pub fn shaders(&self) -> &ShaderRegistry {
        &self.shaders
    }

    pub fn window(&self) -> Viewport {
        self.window
    }

    pub fn light_space(&self) -> Mat4 {
        self.light_space
    }

    pub fn shadow_map(&self) -> &RenderTarget {
        &self.shadow_map
    }

    pub fn camera_depth(&self) -> &RenderTarget {
        &self.camera_depth
    }

    /// Runs every pass of one frame into the default framebuffer. Any error
    /// aborts the frame.
    pub fn render_frame(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        input: FrameInput,
    ) -> Result<FrameReport> {
        let mut report = FrameReport::default();

        let directional = scene.lights.directional();
        let cast_shadows = input.use_shadows && directional.is_some();
        if let Some(light) = directional.filter(|_| cast_shadows) {
            self.light_space = light_space_matrix(light.position, &self.shadow_frustum);
        }
        let frame = self.frame_state(camera, input);

        if cast_shadows {
            self.shadow_pass(scene, &frame)?;
            report.passes.push(PassKind::Shadow);
        }

        self.light_pass(scene);
        report.passes.push(PassKind::Lights);

        self.geometry_pass(scene, &frame)?;
        report.passes.push(PassKind::Geometry);

        self.copy_camera_depth();
        report.passes.push(PassKind::DepthCopy);

        if scene.skybox.is_some() {
            self.skybox_pass(scene, &frame)?;
            report.passes.push(PassKind::Skybox);
        }

        if scene.raymarched.as_ref().is_some_and(|set| !set.is_empty()) {
            self.raymarch_pass(scene, &frame)?;
            report.passes.push(PassKind::Raymarch);
        }

        if !scene.surfaces.is_empty() {
            self.surface_pass(scene, &frame)?;
            report.passes.push(PassKind::Surface);
        }

        if self.post.is_some() && !scene.overlays.is_empty() {
            self.post_process_pass(scene, &frame)?;
            report.passes.push(PassKind::PostProcess);
        }

        log::trace!("Frame passes: {:?}", report.passes);
        Ok(report)
    }

    fn frame_state(&self, camera: &Camera, input: FrameInput) -> FrameState {
        FrameState {
            use_shadows: input.use_shadows,
            camera_position: camera.position(),
            view: camera.view(),
            projection: camera.projection(),
            inv_view: camera.inv_view(),
            inv_projection: camera.inv_projection(),
            near: camera.near(),
            far: camera.far(),
            light_space: self.light_space,
            elapsed: input.elapsed,
            mouse: input.mouse,
            resolution: Vec2::new(self.window.width as f32, self.window.height as f32),
            speed_modifier: input.speed_modifier,
        }
    }

    fn shadow_pass(&self, scene: &Scene, frame: &FrameState) -> Result<()> {
        let program = self.shaders.get(ProgramKind::Shadow)?;
        let _target = self.shadow_map.bind(&self.gpu, self.window);
        self.gpu.clear(ClearMask::DEPTH);

        program.bind();
        uniforms::apply(program, &[uniforms::SHADOW_CASTING], frame);
        for model in &scene.models {
            model.render_depth(program);
        }
        Ok(())
    }

    fn light_pass(&self, scene: &Scene) {
        for kind in LIT_PROGRAMS {
            if let Ok(program) = self.shaders.get(kind) {
                program.bind();
                scene.lights.render(program);
            }
        }
    }

    fn geometry_pass(&self, scene: &Scene, frame: &FrameState) -> Result<()> {
        let program = self.shaders.get(ProgramKind::Mesh)?;
        self.gpu.bind_framebuffer(FramebufferTarget::Both, None);
        self.gpu.set_viewport(self.window);
        self.gpu.set_clear_color(CLEAR_COLOR);
        self.gpu.clear(ClearMask::COLOR | ClearMask::DEPTH);

        program.bind();
        uniforms::apply(program, &[uniforms::CAMERA, uniforms::SHADOW_SAMPLING], frame);
        if let Some(shadow_map) = self.shadow_map.texture() {
            shadow_map.bind(SHADOW_MAP_UNIT);
        }

        let mut draws: Vec<(&Model, &Mesh)> = scene
            .models
            .iter()
            .flat_map(|model| model.meshes().iter().map(move |mesh| (model, mesh)))
            .collect();
        sort_by_opacity(&mut draws, |(_, mesh)| mesh.opacity());
        for (model, mesh) in draws {
            program.set_uniform("model", model.transform());
            mesh.render(program);
        }
        Ok(())
    }

    /// Copies the default framebuffer's depth into the camera depth target.
    /// Relies on in-order command processing to see the geometry pass.
    fn copy_camera_depth(&self) {
        if let Some(depth) = self.camera_depth.texture() {
            self.gpu
                .copy_depth_to_texture(depth.id(), self.window.width, self.window.height);
        }
    }

    fn skybox_pass(&self, scene: &Scene, frame: &FrameState) -> Result<()> {
        let Some(skybox) = &scene.skybox else {
            return Ok(());
        };
        let program = self.shaders.get(ProgramKind::Skybox)?;

        self.gpu.set_capability(Capability::CullFace, false);
        self.gpu.set_depth_func(DepthFunc::LessEqual);
        program.bind();
        uniforms::apply(program, &[uniforms::SKYBOX], frame);
        skybox.render(program);
        self.gpu.set_depth_func(DepthFunc::Less);
        self.gpu.set_capability(Capability::CullFace, true);
        Ok(())
    }

    /// Binds the scene-depth, shadow and environment textures the raymarch
    /// and surface shaders sample.
    fn bind_raymarch_inputs(&self, scene: &Scene) {
        if let Some(depth) = self.camera_depth.texture() {
            depth.bind(DEPTH_MAP_UNIT);
        }
        if let Some(shadow_map) = self.shadow_map.texture() {
            shadow_map.bind(SHADOW_MAP_UNIT);
        }
        if let Some(skybox) = &scene.skybox {
            skybox.cubemap().bind(SKYBOX_UNIT);
        }
    }

    fn raymarch_pass(&self, scene: &Scene, frame: &FrameState) -> Result<()> {
        let Some(set) = &scene.raymarched else {
            return Ok(());
        };
        let program = self.shaders.get(ProgramKind::Raymarch)?;

        // Occlusion against the scene happens in the shader via the depth map.
        self.gpu.set_capability(Capability::DepthTest, false);
        self.gpu.set_capability(Capability::CullFace, false);
        program.bind();
        self.bind_raymarch_inputs(scene);
        uniforms::apply(
            program,
            &[
                uniforms::CAMERA,
                uniforms::TIME,
                uniforms::SHADOW_SAMPLING,
                uniforms::RAYMARCH,
            ],
            frame,
        );
        program.set_uniform("speedModifier", frame.speed_modifier);
        set.render(program);
        self.gpu.set_capability(Capability::CullFace, true);
        self.gpu.set_capability(Capability::DepthTest, true);
        Ok(())
    }

    fn surface_pass(&self, scene: &Scene, frame: &FrameState) -> Result<()> {
        let program = self.shaders.get(ProgramKind::Surface)?;

        self.gpu.set_capability(Capability::CullFace, false);
        program.bind();
        self.bind_raymarch_inputs(scene);
        uniforms::apply(
            program,
            &[
                uniforms::CAMERA,
                uniforms::TIME,
                uniforms::SHADOW_SAMPLING,
                uniforms::RAYMARCH,
            ],
            frame,
        );
        for surface in &scene.surfaces {
            surface.render(program);
        }
        self.gpu.set_capability(Capability::CullFace, true);
        Ok(())
    }

    fn post_process_pass(&self, scene: &Scene, frame: &FrameState) -> Result<()> {
        let Some(post) = &self.post else {
            return Ok(());
        };
        let textured = self.shaders.get(ProgramKind::Textured)?;
        let blend = self.shaders.get(ProgramKind::Blend)?;

        {
            let _target = post.render.bind(&self.gpu, self.window);
            self.gpu.set_clear_color(Vec4::ZERO);
            self.gpu.clear(ClearMask::COLOR);
            self.gpu.set_capability(Capability::CullFace, false);
            textured.bind();
            uniforms::apply(
                textured,
                &[uniforms::CAMERA, uniforms::TIME, uniforms::SCREEN],
                frame,
            );
            for overlay in &scene.overlays {
                overlay.render(textured);
            }
            self.gpu.set_capability(Capability::CullFace, true);
        }

        {
            let _read = FramebufferBinding::bind(
                &self.gpu,
                FramebufferTarget::Read,
                post.render.framebuffer(),
            );
            let _draw = FramebufferBinding::bind(
                &self.gpu,
                FramebufferTarget::Draw,
                post.intermediate.framebuffer(),
            );
            self.gpu
                .blit_framebuffer(self.window.width, self.window.height, ClearMask::COLOR);
        }

        self.gpu.set_capability(Capability::DepthTest, false);
        self.gpu.set_capability(Capability::Blend, true);
        self.gpu
            .set_blend_func(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        blend.bind();
        uniforms::apply(blend, &[uniforms::SCREEN], frame);
        blend.set_uniform("screenTexture", 0);
        if let Some(texture) = post.intermediate.texture() {
            texture.bind(0);
        }
        self.screen_quad.draw();
        self.gpu.set_capability(Capability::DepthTest, true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use glam::Vec3;

    use super::*;
    use crate::gpu::recording::{GpuCall, RecordingContext};
    use crate::renderer::texture::Texture;
    use crate::scene::{Light, LightList, RaymarchedSurface};

    fn registry(gpu: &GpuRef) -> ShaderRegistry {
        let mut shaders = ShaderRegistry::new();
        for kind in ProgramKind::ALL {
            shaders.compile(gpu, kind, "", "").unwrap();
        }
        shaders
    }

    fn pipeline(settings: &RenderSettings) -> (Rc<RecordingContext>, FramePipeline) {
        let recorder = Rc::new(RecordingContext::new());
        let gpu: GpuRef = recorder.clone();
        let pipeline = FramePipeline::new(&gpu, registry(&gpu), settings).unwrap();
        (recorder, pipeline)
    }

    fn camera() -> Camera {
        Camera::new(75.0, 16.0 / 9.0, 0.1, 100.0)
    }

    fn sun() -> Light {
        Light::directional(Vec3::new(4.0, 8.0, 0.0), Vec3::splat(0.1), Vec3::ONE, Vec3::ONE)
    }

    #[test]
    fn shadow_pass_needs_a_directional_light() {
        let (_, mut pipeline) = pipeline(&RenderSettings::default());
        let report = pipeline
            .render_frame(&Scene::empty(), &camera(), FrameInput::default())
            .unwrap();
        assert!(!report.ran(PassKind::Shadow));

        let scene = Scene {
            lights: LightList::new(vec![sun()]),
            ..Scene::default()
        };
        let report = pipeline
            .render_frame(&scene, &camera(), FrameInput::default())
            .unwrap();
        assert_eq!(report.passes[0], PassKind::Shadow);
    }

    #[test]
    fn shadow_pass_restores_the_window_viewport() {
        let (recorder, mut pipeline) = pipeline(&RenderSettings::default());
        let scene = Scene {
            lights: LightList::new(vec![sun()]),
            ..Scene::default()
        };
        recorder.clear_calls();
        pipeline
            .render_frame(&scene, &camera(), FrameInput::default())
            .unwrap();

        let calls = recorder.calls();
        let shadow_viewport = Viewport::sized(2048, 2048);
        let inner = calls
            .iter()
            .position(|c| *c == GpuCall::SetViewport(shadow_viewport))
            .unwrap();
        assert_eq!(
            calls[inner + 1..]
                .iter()
                .find(|c| matches!(c, GpuCall::SetViewport(_))),
            Some(&GpuCall::SetViewport(pipeline.window()))
        );
    }

    #[test]
    fn post_process_is_skipped_without_targets() {
        let (recorder, mut pipeline) = pipeline(&RenderSettings::default());
        pipeline
            .render_frame(&Scene::empty(), &camera(), FrameInput::default())
            .unwrap();
        assert_eq!(
            recorder.count(|c| matches!(c, GpuCall::BlitFramebuffer { .. })),
            0
        );
    }

    #[test]
    fn post_process_draws_overlays_offscreen_then_blends_them_in() {
        let settings = RenderSettings {
            post_process: true,
            ..RenderSettings::default()
        };
        let (recorder, mut pipeline) = pipeline(&settings);
        let gpu: GpuRef = recorder.clone();
        let noise = Rc::new(Texture::placeholder(&gpu).unwrap());
        let overlay =
            RaymarchedSurface::new(&gpu, noise, Vec3::ZERO, Vec3::ZERO, Vec3::ONE).unwrap();
        let scene = Scene {
            overlays: vec![overlay],
            ..Scene::default()
        };

        let post = pipeline.post.as_ref().unwrap();
        let render = post.render.framebuffer().id();
        let intermediate = post.intermediate.framebuffer().id();
        let screen_texture = post.intermediate.texture().unwrap().id();
        let textured = pipeline.shaders().get(ProgramKind::Textured).unwrap().id();
        let blend = pipeline.shaders().get(ProgramKind::Blend).unwrap().id();

        recorder.clear_calls();
        let report = pipeline
            .render_frame(&scene, &camera(), FrameInput::default())
            .unwrap();
        assert!(report.ran(PassKind::PostProcess));

        let (mut reading, mut drawing) = (None, None);
        let mut steps = Vec::new();
        for call in recorder.calls() {
            match call {
                GpuCall::BindFramebuffer {
                    target,
                    framebuffer,
                } => {
                    if target != FramebufferTarget::Draw {
                        reading = framebuffer;
                    }
                    if target != FramebufferTarget::Read {
                        drawing = framebuffer;
                    }
                }
                GpuCall::DrawIndexed {
                    program: Some(program),
                    ..
                } if program == textured => steps.push(("overlay", drawing == Some(render))),
                GpuCall::BlitFramebuffer { mask, .. } => steps.push((
                    "blit",
                    mask == ClearMask::COLOR
                        && reading == Some(render)
                        && drawing == Some(intermediate),
                )),
                GpuCall::BindTexture {
                    unit: 0,
                    texture: Some(texture),
                    ..
                } if texture == screen_texture => steps.push(("screen texture", drawing.is_none())),
                GpuCall::DrawIndexed {
                    program: Some(program),
                    ..
                } if program == blend => steps.push(("blend", drawing.is_none())),
                _ => {}
            }
        }

        assert_eq!(
            steps,
            [
                ("overlay", true),
                ("blit", true),
                ("screen texture", true),
                ("blend", true),
            ]
        );
    }

    #[test]
    fn resize_recreates_window_sized_targets() {
        let settings = RenderSettings {
            post_process: true,
            ..RenderSettings::default()
        };
        let (recorder, mut pipeline) = pipeline(&settings);
        let before = recorder.live_objects();

        pipeline.resize(640, 480).unwrap();

        assert_eq!(pipeline.window(), Viewport::sized(640, 480));
        assert_eq!(pipeline.camera_depth().width(), 640);
        assert_eq!(recorder.live_objects(), before);
    }

    #[test]
    fn minimised_window_keeps_targets() {
        let (_, mut pipeline) = pipeline(&RenderSettings::default());
        let window = pipeline.window();
        pipeline.resize(0, 0).unwrap();
        assert_eq!(pipeline.window(), window);
    }
}
