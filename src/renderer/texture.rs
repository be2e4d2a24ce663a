// renderer/texture.rs (with mipmaps)

use std::path::Path;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::ResourceError;
use crate::gpu::{
    GpuRef, GpuTexture, SamplerDescriptor, TextureDescriptor, TextureFormat, TextureId,
    TextureTarget, WrapMode,
};

/// A sampleable 2D texture or cubemap.
pub struct Texture {
    texture: GpuTexture,
    width: u32,
    height: u32,
}

impl Texture {
    /// Create texture from rgba8 data with mipmaps
    pub fn from_rgba8(
        gpu: &GpuRef,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Self, ResourceError> {
        let texture = GpuTexture::new(gpu, TextureTarget::Texture2d)?;
        let descriptor = TextureDescriptor {
            width,
            height,
            format: TextureFormat::Rgba8,
        };
        gpu.allocate_texture_2d(texture.id(), &descriptor, Some(pixels));
        gpu.generate_mipmaps(texture.id(), TextureTarget::Texture2d);
        gpu.set_sampler(
            texture.id(),
            TextureTarget::Texture2d,
            &SamplerDescriptor::mipmapped(WrapMode::Repeat),
        );
        Ok(Self {
            texture,
            width,
            height,
        })
    }

    pub fn from_image(gpu: &GpuRef, image: &image::RgbaImage) -> Result<Self, ResourceError> {
        let (width, height) = image.dimensions();
        Self::from_rgba8(gpu, width, height, image.as_raw())
    }

    /// Load texture from file path with mipmaps
    pub fn from_path(gpu: &GpuRef, path: impl AsRef<Path>) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        log::info!("Loading texture: {:?}", path);
        let img = image::open(path).map_err(|source| ResourceError::TextureDecode {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_image(gpu, &img.to_rgba8())
    }

    /// Magenta/black checkerboard used in place of textures that fail to load.
    pub fn placeholder(gpu: &GpuRef) -> Result<Self, ResourceError> {
        const SIZE: u32 = 8;
        Self::from_rgba8(gpu, SIZE, SIZE, &checker_pixels(SIZE))
    }

    /// Seeded RGBA white noise.
    pub fn noise(gpu: &GpuRef, seed: u64, size: u32) -> Result<Self, ResourceError> {
        Self::from_rgba8(gpu, size, size, &noise_pixels(seed, size))
    }

    pub fn id(&self) -> TextureId {
        self.texture.id()
    }

    pub fn target(&self) -> TextureTarget {
        self.texture.target()
    }

    pub fn bind(&self, unit: u32) {
        self.texture.bind(unit);
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn checker_pixels(size: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let texel: [u8; 4] = if (x + y) % 2 == 0 {
                [255, 0, 255, 255]
            } else {
                [0, 0, 0, 255]
            };
            pixels.extend_from_slice(&texel);
        }
    }
    pixels
}

fn noise_pixels(seed: u64, size: u32) -> Vec<u8> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..size * size * 4).map(|_| rng.gen::<u8>()).collect()
}

pub fn load_texture(gpu: &GpuRef, path: impl AsRef<Path>) -> Result<Texture, ResourceError> {
    Texture::from_path(gpu, path)
}

/// Like [`load_texture`], but a decode failure yields the checker placeholder.
/// GPU allocation failures still propagate.
pub fn load_texture_or_placeholder(
    gpu: &GpuRef,
    path: impl AsRef<Path>,
) -> Result<Texture, ResourceError> {
    match Texture::from_path(gpu, path.as_ref()) {
        Err(err @ ResourceError::TextureDecode { .. }) => {
            log::warn!("{err}; using placeholder texture");
            Texture::placeholder(gpu)
        }
        other => other,
    }
}

/// Noise texture read from `path`, or generated from `seed` when the image
/// is missing or unreadable.
pub fn noise_texture(
    gpu: &GpuRef,
    path: impl AsRef<Path>,
    seed: u64,
    size: u32,
) -> Result<Texture, ResourceError> {
    match Texture::from_path(gpu, path.as_ref()) {
        Err(err @ ResourceError::TextureDecode { .. }) => {
            log::warn!("{err}; generating {size}x{size} noise");
            Texture::noise(gpu, seed, size)
        }
        other => other,
    }
}

/// Loads six square faces in +X, -X, +Y, -Y, +Z, -Z order into a cubemap.
pub fn load_cubemap<P: AsRef<Path>>(gpu: &GpuRef, faces: &[P]) -> Result<Texture, ResourceError> {
    if faces.len() != 6 {
        return Err(ResourceError::CubemapFaces(faces.len()));
    }

    let mut images = Vec::with_capacity(6);
    for face in faces {
        let path = face.as_ref();
        let img = image::open(path)
            .map_err(|source| ResourceError::TextureDecode {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        let expected = images
            .first()
            .map(|first: &image::RgbaImage| first.width())
            .unwrap_or(img.width());
        if img.width() != img.height() || img.width() != expected {
            return Err(ResourceError::CubemapFaceSize {
                path: path.to_path_buf(),
                width: img.width(),
                height: img.height(),
                expected,
            });
        }
        images.push(img);
    }

    let size = images[0].width();
    let texture = GpuTexture::new(gpu, TextureTarget::CubeMap)?;
    for (face, img) in images.iter().enumerate() {
        gpu.upload_cubemap_face(texture.id(), face as u32, size, size, img.as_raw());
    }
    gpu.set_sampler(
        texture.id(),
        TextureTarget::CubeMap,
        &SamplerDescriptor::linear(WrapMode::ClampToEdge),
    );
    log::info!("Loaded {size}x{size} cubemap from {:?}", faces[0].as_ref());
    Ok(Texture {
        texture,
        width: size,
        height: size,
    })
}

/// 1x1 grey cubemap.
pub fn placeholder_cubemap(gpu: &GpuRef) -> Result<Texture, ResourceError> {
    let texture = GpuTexture::new(gpu, TextureTarget::CubeMap)?;
    for face in 0..6 {
        gpu.upload_cubemap_face(texture.id(), face, 1, 1, &[128, 128, 128, 255]);
    }
    gpu.set_sampler(
        texture.id(),
        TextureTarget::CubeMap,
        &SamplerDescriptor::linear(WrapMode::ClampToEdge),
    );
    Ok(Texture {
        texture,
        width: 1,
        height: 1,
    })
}

pub fn load_cubemap_or_placeholder<P: AsRef<Path>>(
    gpu: &GpuRef,
    faces: &[P],
) -> Result<Texture, ResourceError> {
    match load_cubemap(gpu, faces) {
        Err(err @ ResourceError::Allocation { .. }) => Err(err),
        Err(err) => {
            log::warn!("{err}; using grey skybox");
            placeholder_cubemap(gpu)
        }
        ok => ok,
    }
}
