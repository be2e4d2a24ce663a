//! Window, GL context and the per-frame driver.
use std::ffi::CString;
use std::num::NonZeroU32;
use std::rc::Rc;
use std::time::Instant;

use glutin::config::{ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext, PossiblyCurrentContext,
    Version,
};
use glutin::display::{Display, DisplayApiPreference, GlDisplay};
use glutin::surface::{GlSurface, Surface, SwapInterval, WindowSurface};
use glutin_winit::GlWindow;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawWindowHandle};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{KeyEvent, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::error::{Error, Result};
use crate::gpu::glow_backend::GlowContext;
use crate::gpu::GpuRef;
use crate::input::{Controller, KeyMode};
use crate::renderer::{FrameInput, FramePipeline, ProgramKind, ShaderRegistry};
use crate::scene::{Camera, Scene};
use crate::settings::RenderSettings;
use crate::time::{FrameClock, FramePacer};

#[cfg(target_os = "windows")]
fn display_preference(window: RawWindowHandle) -> DisplayApiPreference {
    DisplayApiPreference::Wgl(Some(window))
}

#[cfg(target_os = "macos")]
fn display_preference(_window: RawWindowHandle) -> DisplayApiPreference {
    DisplayApiPreference::Cgl
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn display_preference(_window: RawWindowHandle) -> DisplayApiPreference {
    DisplayApiPreference::Egl
}

/// Fewest samples first, ties to the earliest config. Camera depth is
/// copied out of the default framebuffer, which must be single-sampled.
fn pick_config<C>(configs: impl Iterator<Item = C>, samples: impl Fn(&C) -> u8) -> Option<C> {
    configs.min_by_key(|config| samples(config))
}

/// Builds the scene once the GL context exists.
pub type SceneBuilder = Box<dyn FnOnce(&GpuRef) -> Result<Scene>>;

/// Everything that only exists while the window and its context are alive.
/// Field order matters: GPU objects go before the context that owns them.
struct Viewer {
    pipeline: FramePipeline,
    scene: Scene,
    camera: Camera,
    _gpu: GpuRef,
    surface: Surface<WindowSurface>,
    context: PossiblyCurrentContext,
    window: Window,
}

pub struct App {
    settings: RenderSettings,
    build_scene: Option<SceneBuilder>,
    viewer: Option<Viewer>,
    controller: Controller,
    clock: FrameClock,
    pacer: FramePacer,
    error: Option<Error>,
}

impl App {
    pub fn new(settings: RenderSettings, build_scene: SceneBuilder) -> Self {
        let mut controller = Controller::new();
        controller.set_key_properties(
            KeyCode::KeyP,
            KeyMode::Toggle,
            u16::from(settings.use_shadows),
            1000,
            1,
        );
        Self {
            pacer: FramePacer::new(settings.target_fps),
            settings,
            build_scene: Some(build_scene),
            viewer: None,
            controller,
            clock: FrameClock::new(),
            error: None,
        }
    }

    /// The fatal error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Error) {
        log::error!("{err}");
        self.error = Some(err);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<Viewer> {
        let settings = &self.settings;
        let attributes = Window::default_attributes()
            .with_title(settings.title.clone())
            .with_inner_size(PhysicalSize::new(
                settings.resolution.width,
                settings.resolution.height,
            ))
            .with_resizable(false);

        let window = event_loop
            .create_window(attributes)
            .map_err(|err| Error::init(format!("window creation failed: {err}")))?;
        let raw_handle = window
            .window_handle()
            .map(|handle| handle.as_raw())
            .map_err(|err| Error::init(format!("window handle unavailable: {err}")))?;
        let raw_display = event_loop
            .display_handle()
            .map(|handle| handle.as_raw())
            .map_err(|err| Error::init(format!("display handle unavailable: {err}")))?;

        let display = unsafe { Display::new(raw_display, display_preference(raw_handle)) }
            .map_err(|err| Error::init(format!("GL display: {err}")))?;
        let template = ConfigTemplateBuilder::new()
            .with_alpha_size(8)
            .with_depth_size(24)
            .compatible_with_native_window(raw_handle)
            .build();
        let configs = unsafe { display.find_configs(template) }
            .map_err(|err| Error::init(format!("no suitable GL config: {err}")))?;
        let config = pick_config(configs, |config| config.num_samples())
            .ok_or_else(|| Error::init("no suitable GL config"))?;
        log::info!("GL config with {} samples", config.num_samples());

        let version = settings.gl_version;
        let context_attributes = ContextAttributesBuilder::new()
            .with_profile(GlProfile::Core)
            .with_context_api(ContextApi::OpenGl(Some(Version::new(
                version.major,
                version.minor,
            ))))
            .build(Some(raw_handle));

        let context = unsafe { display.create_context(&config, &context_attributes) }.map_err(
            |err| Error::init(format!("OpenGL {}.{} context: {err}", version.major, version.minor)),
        )?;
        let surface_attributes = window
            .build_surface_attributes(Default::default())
            .map_err(|err| Error::init(format!("surface attributes: {err}")))?;
        let surface = unsafe { display.create_window_surface(&config, &surface_attributes) }
            .map_err(|err| Error::init(format!("window surface: {err}")))?;
        let context = context
            .make_current(&surface)
            .map_err(|err| Error::init(format!("make current: {err}")))?;

        let interval = if settings.vsync {
            SwapInterval::Wait(NonZeroU32::MIN)
        } else {
            SwapInterval::DontWait
        };
        if let Err(err) = surface.set_swap_interval(&context, interval) {
            log::warn!("Could not set swap interval: {err}");
        }

        // SAFETY: the context was made current on this thread just above.
        let gl = unsafe {
            GlowContext::from_loader(|symbol| match CString::new(symbol) {
                Ok(symbol) => display.get_proc_address(&symbol),
                Err(_) => std::ptr::null(),
            })
        };
        let gpu: GpuRef = Rc::new(gl);

        let shaders = ShaderRegistry::load(&gpu, &settings.shader_dir, &ProgramKind::ALL)?;
        let mut pipeline = FramePipeline::new(&gpu, shaders, settings)?;
        let size = window.inner_size();
        pipeline.resize(size.width, size.height)?;

        let build_scene = self
            .build_scene
            .take()
            .ok_or_else(|| Error::runtime("scene was already built"))?;
        let scene = build_scene(&gpu)?;
        let camera = Camera::from_settings(&settings.camera, settings.aspect_ratio());

        Ok(Viewer {
            pipeline,
            scene,
            camera,
            _gpu: gpu,
            surface,
            context,
            window,
        })
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(viewer) = self.viewer.as_mut() else {
            return Ok(());
        };
        let frame_start = Instant::now();
        let elapsed = self.clock.elapsed_at(frame_start);

        self.controller.update(frame_start);
        let speed_modifier = viewer.scene.speed_modifier(viewer.camera.position());
        let camera_settings = &self.settings.camera;
        viewer.camera.handle_inputs(
            &self.controller,
            camera_settings.move_speed * speed_modifier,
            camera_settings.mouse_sensitivity,
        );
        viewer
            .scene
            .animate(elapsed, self.settings.light_orbit_speed);

        let window = viewer.pipeline.window();
        let input = FrameInput {
            use_shadows: self.controller.use_shadows(),
            elapsed,
            mouse: self
                .controller
                .mouse_clip_space(window.width as u32, window.height as u32),
            speed_modifier,
        };
        viewer
            .pipeline
            .render_frame(&viewer.scene, &viewer.camera, input)?;

        viewer
            .surface
            .swap_buffers(&viewer.context)
            .map_err(|err| Error::runtime(format!("swap buffers: {err}")))?;
        self.clock.tick();
        self.pacer.pace(frame_start);
        Ok(())
    }

    fn resize(&mut self, size: PhysicalSize<u32>) -> Result<()> {
        let Some(viewer) = self.viewer.as_mut() else {
            return Ok(());
        };
        let (Some(width), Some(height)) =
            (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        else {
            return Ok(());
        };
        viewer.surface.resize(&viewer.context, width, height);
        viewer.pipeline.resize(size.width, size.height)?;
        viewer
            .camera
            .set_aspect(size.width as f32 / size.height as f32);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(viewer) => {
                log::info!("Viewer ready");
                viewer.window.request_redraw();
                self.clock = FrameClock::new();
                self.viewer = Some(viewer);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.viewer.as_ref().map(|v| v.window.id()) != Some(id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.controller.request_close();
            }
            WindowEvent::Resized(size) => {
                if let Err(err) = self.resize(size) {
                    self.fail(event_loop, err);
                }
            }
            WindowEvent::Focused(false) => self.controller.release_all(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat: false,
                        ..
                    },
                ..
            } => self.controller.handle_key(code, state),
            WindowEvent::CursorMoved { position, .. } => {
                self.controller.handle_cursor(position.x, position.y);
            }
            WindowEvent::RedrawRequested => {
                // Close is only honoured between frames.
                if self.controller.close_requested() {
                    event_loop.exit();
                    return;
                }
                if let Err(err) = self.redraw() {
                    self.fail(event_loop, err);
                    return;
                }
                if let Some(viewer) = &self.viewer {
                    viewer.window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("Shutting down after {} frames", self.clock.frame());
        self.viewer = None;
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // Release GPU objects while the context is still alive.
        self.viewer = None;
    }
}
