pub mod app;
pub mod error;
pub mod gpu;
pub mod input;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod time;

pub use error::{Error, Result};

use app::{App, SceneBuilder};
use settings::RenderSettings;
use winit::event_loop::EventLoop;

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Opens the viewer window and drives frames until it is closed.
///
/// `build_scene` runs once, after the GL context is current.
pub fn run(settings: RenderSettings, build_scene: SceneBuilder) -> Result<()> {
    log::info!(
        "Starting {} at {}x{}",
        settings.title,
        settings.resolution.width,
        settings.resolution.height
    );

    let event_loop = EventLoop::new().map_err(|err| Error::init(err.to_string()))?;
    let mut app = App::new(settings, build_scene);
    let result = event_loop.run_app(&mut app);

    if let Some(err) = app.take_error() {
        return Err(err);
    }
    result.map_err(|err| Error::runtime(err.to_string()))?;

    log::info!("Application shutdown complete");
    Ok(())
}
