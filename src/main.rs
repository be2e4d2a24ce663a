mod demo_scene;

use demo_scene::GalleryAssets;
use shaderpixel::settings::RenderSettings;

fn main() {
    shaderpixel::init_logging();

    let settings = RenderSettings::load();
    let assets = GalleryAssets::default();
    if let Err(err) = shaderpixel::run(settings, Box::new(move |gpu| assets.build(gpu))) {
        log::error!("Application error: {err}");
        eprintln!("Application error: {err}");
        std::process::exit(1);
    }
}
