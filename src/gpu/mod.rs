//! Thin command interface over the graphics API.
//!
//! Everything the renderer issues to the GPU goes through [`GpuContext`], so
//! the frame pipeline can run against the OpenGL backend in
//! [`glow_backend`] or against the headless [`recording`] backend used by
//! tests. Object lifetimes are handled by the wrappers in [`resource`].

pub mod glow_backend;
pub mod recording;
pub mod resource;

use std::fmt;
use std::num::NonZeroU32;
use std::rc::Rc;

use bitflags::bitflags;
use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

pub use resource::{
    FramebufferBinding, GpuBuffer, GpuFramebuffer, GpuGeometry, GpuProgram, GpuRenderbuffer,
    GpuShader, GpuTexture, GpuVertexArray,
};

/// Shared handle to the active GPU context.
pub type GpuRef = Rc<dyn GpuContext>;

macro_rules! gpu_handle {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            pub struct $name(pub NonZeroU32);
        )*
    };
}

gpu_handle!(
    BufferId,
    VertexArrayId,
    TextureId,
    RenderbufferId,
    FramebufferId,
    ShaderId,
    ProgramId,
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("VERTEX"),
            ShaderStage::Fragment => f.write_str("FRAGMENT"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureTarget {
    Texture2d,
    CubeMap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
    Depth24,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
    LinearMipmapLinear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerDescriptor {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap: WrapMode,
    pub border_color: Option<[f32; 4]>,
}

impl SamplerDescriptor {
    pub const fn linear(wrap: WrapMode) -> Self {
        Self {
            min_filter: FilterMode::Linear,
            mag_filter: FilterMode::Linear,
            wrap,
            border_color: None,
        }
    }

    pub const fn mipmapped(wrap: WrapMode) -> Self {
        Self {
            min_filter: FilterMode::LinearMipmapLinear,
            mag_filter: FilterMode::Linear,
            wrap,
            border_color: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attachment {
    Color0,
    Depth,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramebufferTarget {
    Draw,
    Read,
    Both,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramebufferStatus {
    Complete,
    IncompleteAttachment,
    MissingAttachment,
    IncompleteDrawBuffer,
    IncompleteReadBuffer,
    IncompleteMultisample,
    Unsupported,
    Unknown(u32),
}

impl FramebufferStatus {
    pub fn is_complete(self) -> bool {
        matches!(self, FramebufferStatus::Complete)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ClearMask: u8 {
        const COLOR = 0b001;
        const DEPTH = 0b010;
        const STENCIL = 0b100;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    DepthTest,
    CullFace,
    Blend,
    Multisample,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthFunc {
    Less,
    LessEqual,
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: width as i32,
            height: height as i32,
        }
    }
}

/// A value written to a shader uniform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<u32> for UniformValue {
    fn from(value: u32) -> Self {
        UniformValue::Int(value as i32)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Int(value as i32)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        UniformValue::Vec2(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        UniformValue::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        UniformValue::Vec4(value)
    }
}

impl From<Mat3> for UniformValue {
    fn from(value: Mat3) -> Self {
        UniformValue::Mat3(value)
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        UniformValue::Mat4(value)
    }
}

/// One float attribute inside an interleaved vertex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: i32,
    pub offset: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: i32,
    pub attributes: &'static [VertexAttribute],
}

/// Commands the renderer needs from the graphics API.
///
/// Methods take `&self`: the context is shared through [`GpuRef`] by every
/// resource wrapper so that `Drop` can release the object it owns. All calls
/// are issued from the render thread.
pub trait GpuContext {
    fn create_buffer(&self) -> Result<BufferId, String>;
    fn delete_buffer(&self, buffer: BufferId);
    fn create_vertex_array(&self) -> Result<VertexArrayId, String>;
    fn delete_vertex_array(&self, vertex_array: VertexArrayId);
    /// Uploads interleaved vertices and u32 indices and records the
    /// attribute layout in `vertex_array`.
    fn upload_geometry(
        &self,
        vertex_array: VertexArrayId,
        vertex_buffer: BufferId,
        index_buffer: BufferId,
        vertices: &[u8],
        indices: &[u32],
        layout: &VertexLayout,
    );
    fn draw_indexed(&self, vertex_array: VertexArrayId, index_count: i32);

    fn create_texture(&self) -> Result<TextureId, String>;
    fn delete_texture(&self, texture: TextureId);
    fn allocate_texture_2d(
        &self,
        texture: TextureId,
        descriptor: &TextureDescriptor,
        pixels: Option<&[u8]>,
    );
    /// Uploads one RGBA8 face; `face` follows the +X, -X, +Y, -Y, +Z, -Z order.
    fn upload_cubemap_face(
        &self,
        texture: TextureId,
        face: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    );
    fn set_sampler(&self, texture: TextureId, target: TextureTarget, sampler: &SamplerDescriptor);
    fn generate_mipmaps(&self, texture: TextureId, target: TextureTarget);
    fn bind_texture(&self, unit: u32, target: TextureTarget, texture: Option<TextureId>);

    fn create_renderbuffer(&self) -> Result<RenderbufferId, String>;
    fn delete_renderbuffer(&self, renderbuffer: RenderbufferId);
    fn allocate_renderbuffer(
        &self,
        renderbuffer: RenderbufferId,
        format: TextureFormat,
        width: u32,
        height: u32,
    );

    fn create_framebuffer(&self) -> Result<FramebufferId, String>;
    fn delete_framebuffer(&self, framebuffer: FramebufferId);
    fn bind_framebuffer(&self, target: FramebufferTarget, framebuffer: Option<FramebufferId>);
    /// Attaches to the framebuffer currently bound for drawing.
    fn attach_texture(&self, attachment: Attachment, texture: TextureId);
    fn attach_renderbuffer(&self, attachment: Attachment, renderbuffer: RenderbufferId);
    /// Marks the bound framebuffer as having no color buffers (depth-only).
    fn disable_color_buffers(&self);
    fn framebuffer_status(&self) -> FramebufferStatus;
    /// Copies the bound read framebuffer into the bound draw framebuffer.
    fn blit_framebuffer(&self, width: i32, height: i32, mask: ClearMask);
    /// Copies the depth buffer of the bound read framebuffer into `texture`.
    fn copy_depth_to_texture(&self, texture: TextureId, width: i32, height: i32);

    fn set_viewport(&self, viewport: Viewport);
    fn set_clear_color(&self, color: Vec4);
    fn clear(&self, mask: ClearMask);
    fn set_capability(&self, capability: Capability, enabled: bool);
    fn set_depth_func(&self, func: DepthFunc);
    fn set_blend_func(&self, src: BlendFactor, dst: BlendFactor);

    /// Compiles one stage; the error carries the compiler diagnostic.
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderId, String>;
    fn delete_shader(&self, shader: ShaderId);
    /// Links the stages into a program; the error carries the link log.
    fn link_program(&self, shaders: &[ShaderId]) -> Result<ProgramId, String>;
    fn delete_program(&self, program: ProgramId);
    fn use_program(&self, program: Option<ProgramId>);
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    /// Writes to the program currently in use.
    fn set_uniform(&self, location: UniformLocation, value: &UniformValue);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_uniforms_are_written_as_ints() {
        assert_eq!(UniformValue::from(true), UniformValue::Int(1));
        assert_eq!(UniformValue::from(false), UniformValue::Int(0));
    }

    #[test]
    fn stage_display_matches_diagnostic_prefix() {
        assert_eq!(ShaderStage::Vertex.to_string(), "VERTEX");
        assert_eq!(ShaderStage::Fragment.to_string(), "FRAGMENT");
    }
}
