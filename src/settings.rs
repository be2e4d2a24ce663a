use std::path::PathBuf;

use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "RenderSettings::default_title")]
    pub title: String,
    #[serde(default)]
    pub gl_version: GlVersion,
    #[serde(default = "RenderSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    /// Frame-rate cap; 0 leaves the loop uncapped.
    #[serde(default = "RenderSettings::default_target_fps")]
    pub target_fps: u32,
    #[serde(default = "RenderSettings::default_true")]
    pub vsync: bool,
    /// Initial state of the shadow toggle key.
    #[serde(default = "RenderSettings::default_true")]
    pub use_shadows: bool,
    #[serde(default)]
    pub post_process: bool,
    #[serde(default = "RenderSettings::default_shader_dir")]
    pub shader_dir: PathBuf,
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default)]
    pub shadow_frustum: ShadowFrustum,
    /// Radians per second the directional light orbits the scene.
    #[serde(default = "RenderSettings::default_light_orbit_speed")]
    pub light_orbit_speed: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            title: Self::default_title(),
            gl_version: GlVersion::default(),
            shadow_map_size: Self::default_shadow_map_size(),
            target_fps: Self::default_target_fps(),
            vsync: true,
            use_shadows: true,
            post_process: false,
            shader_dir: Self::default_shader_dir(),
            camera: CameraSettings::default(),
            shadow_frustum: ShadowFrustum::default(),
            light_orbit_speed: Self::default_light_orbit_speed(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        if self.shadow_map_size == 0 {
            warn!("Shadow map size must be greater than zero. Using default value.");
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        if self.gl_version.major < 3 {
            warn!(
                "OpenGL {}.{} is too old for the pipeline. Using default.",
                self.gl_version.major, self.gl_version.minor
            );
            self.gl_version = GlVersion::default();
        }

        if !(self.camera.fov_degrees > 0.0 && self.camera.fov_degrees < 180.0) {
            warn!("Camera fov must lie in (0, 180) degrees. Using default value.");
            self.camera.fov_degrees = CameraSettings::default().fov_degrees;
        }
        if !(self.camera.near > 0.0 && self.camera.far > self.camera.near) {
            warn!("Camera clip planes must satisfy 0 < near < far. Using defaults.");
            self.camera.near = CameraSettings::default().near;
            self.camera.far = CameraSettings::default().far;
        }

        let frustum = &self.shadow_frustum;
        if !(frustum.half_extent > 0.0 && frustum.far > frustum.near) {
            warn!("Shadow frustum is degenerate. Using default frustum.");
            self.shadow_frustum = ShadowFrustum::default();
        }

        self
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.resolution.width as f32 / self.resolution.height as f32
    }

    fn default_title() -> String {
        "shaderpixel".to_owned()
    }

    const fn default_shadow_map_size() -> u32 {
        2048
    }

    const fn default_target_fps() -> u32 {
        60
    }

    const fn default_true() -> bool {
        true
    }

    fn default_shader_dir() -> PathBuf {
        PathBuf::from("shaders")
    }

    const fn default_light_orbit_speed() -> f32 {
        0.25
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GlVersion {
    pub major: u8,
    pub minor: u8,
}

impl Default for GlVersion {
    fn default() -> Self {
        Self { major: 4, minor: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub move_speed: f32,
    pub mouse_sensitivity: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 100.0,
            move_speed: 0.05,
            mouse_sensitivity: 0.1,
        }
    }
}

/// Orthographic volume the shadow map covers, centred on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowFrustum {
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowFrustum {
    fn default() -> Self {
        Self {
            half_extent: 10.0,
            near: 1.0,
            far: 30.0,
        }
    }
}
