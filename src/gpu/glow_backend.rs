//! OpenGL 4.1 core implementation of [`GpuContext`] on top of `glow`.

use std::ffi::c_void;

use glam::Vec4;
use glow::HasContext;

use super::{
    Attachment, BlendFactor, BufferId, Capability, ClearMask, DepthFunc, FilterMode,
    FramebufferId, FramebufferStatus, FramebufferTarget, GpuContext, ProgramId, RenderbufferId,
    SamplerDescriptor, ShaderId, ShaderStage, TextureDescriptor, TextureFormat, TextureId,
    TextureTarget, UniformLocation, UniformValue, VertexArrayId, VertexLayout, Viewport, WrapMode,
};

pub struct GlowContext {
    gl: glow::Context,
}

impl GlowContext {
    /// Loads the GL entry points through `loader` (usually the windowing
    /// display's `get_proc_address`).
    ///
    /// # Safety
    /// A context must be current on this thread and `loader` must return
    /// valid function pointers for it.
    pub unsafe fn from_loader(loader: impl FnMut(&str) -> *const c_void) -> Self {
        let gl = glow::Context::from_loader_function(loader);
        log::info!(
            "OpenGL {} ({})",
            gl.get_parameter_string(glow::VERSION),
            gl.get_parameter_string(glow::RENDERER)
        );
        Self { gl }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

fn texture_target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2d => glow::TEXTURE_2D,
        TextureTarget::CubeMap => glow::TEXTURE_CUBE_MAP,
    }
}

fn framebuffer_target(target: FramebufferTarget) -> u32 {
    match target {
        FramebufferTarget::Draw => glow::DRAW_FRAMEBUFFER,
        FramebufferTarget::Read => glow::READ_FRAMEBUFFER,
        FramebufferTarget::Both => glow::FRAMEBUFFER,
    }
}

fn attachment(attachment: Attachment) -> u32 {
    match attachment {
        Attachment::Color0 => glow::COLOR_ATTACHMENT0,
        Attachment::Depth => glow::DEPTH_ATTACHMENT,
    }
}

fn filter(mode: FilterMode) -> i32 {
    (match mode {
        FilterMode::Nearest => glow::NEAREST,
        FilterMode::Linear => glow::LINEAR,
        FilterMode::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR,
    }) as i32
}

fn wrap(mode: WrapMode) -> i32 {
    (match mode {
        WrapMode::Repeat => glow::REPEAT,
        WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE,
        WrapMode::ClampToBorder => glow::CLAMP_TO_BORDER,
    }) as i32
}

/// (internal format, pixel format, pixel type)
fn pixel_formats(format: TextureFormat) -> (u32, u32, u32) {
    match format {
        TextureFormat::Rgba8 => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        TextureFormat::Depth24 => (glow::DEPTH_COMPONENT24, glow::DEPTH_COMPONENT, glow::FLOAT),
    }
}

fn clear_bits(mask: ClearMask) -> u32 {
    let mut bits = 0;
    if mask.contains(ClearMask::COLOR) {
        bits |= glow::COLOR_BUFFER_BIT;
    }
    if mask.contains(ClearMask::DEPTH) {
        bits |= glow::DEPTH_BUFFER_BIT;
    }
    if mask.contains(ClearMask::STENCIL) {
        bits |= glow::STENCIL_BUFFER_BIT;
    }
    bits
}

fn capability(capability: Capability) -> u32 {
    match capability {
        Capability::DepthTest => glow::DEPTH_TEST,
        Capability::CullFace => glow::CULL_FACE,
        Capability::Blend => glow::BLEND,
        Capability::Multisample => glow::MULTISAMPLE,
    }
}

fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
    }
}

fn framebuffer_status(raw: u32) -> FramebufferStatus {
    match raw {
        glow::FRAMEBUFFER_COMPLETE => FramebufferStatus::Complete,
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => FramebufferStatus::IncompleteAttachment,
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => FramebufferStatus::MissingAttachment,
        glow::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => FramebufferStatus::IncompleteDrawBuffer,
        glow::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => FramebufferStatus::IncompleteReadBuffer,
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => FramebufferStatus::IncompleteMultisample,
        glow::FRAMEBUFFER_UNSUPPORTED => FramebufferStatus::Unsupported,
        other => FramebufferStatus::Unknown(other),
    }
}

fn native_texture(texture: TextureId) -> glow::NativeTexture {
    glow::NativeTexture(texture.0)
}

impl GpuContext for GlowContext {
    fn create_buffer(&self) -> Result<BufferId, String> {
        unsafe { self.gl.create_buffer() }.map(|buffer| BufferId(buffer.0))
    }

    fn delete_buffer(&self, buffer: BufferId) {
        unsafe { self.gl.delete_buffer(glow::NativeBuffer(buffer.0)) }
    }

    fn create_vertex_array(&self) -> Result<VertexArrayId, String> {
        unsafe { self.gl.create_vertex_array() }.map(|vao| VertexArrayId(vao.0))
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) {
        unsafe {
            self.gl
                .delete_vertex_array(glow::NativeVertexArray(vertex_array.0))
        }
    }

    fn upload_geometry(
        &self,
        vertex_array: VertexArrayId,
        vertex_buffer: BufferId,
        index_buffer: BufferId,
        vertices: &[u8],
        indices: &[u32],
        layout: &VertexLayout,
    ) {
        let gl = &self.gl;
        unsafe {
            gl.bind_vertex_array(Some(glow::NativeVertexArray(vertex_array.0)));

            gl.bind_buffer(glow::ARRAY_BUFFER, Some(glow::NativeBuffer(vertex_buffer.0)));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, vertices, glow::STATIC_DRAW);

            gl.bind_buffer(
                glow::ELEMENT_ARRAY_BUFFER,
                Some(glow::NativeBuffer(index_buffer.0)),
            );
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
                glow::STATIC_DRAW,
            );

            for attribute in layout.attributes {
                gl.enable_vertex_attrib_array(attribute.location);
                gl.vertex_attrib_pointer_f32(
                    attribute.location,
                    attribute.components,
                    glow::FLOAT,
                    false,
                    layout.stride,
                    attribute.offset,
                );
            }

            gl.bind_vertex_array(None);
        }
    }

    fn draw_indexed(&self, vertex_array: VertexArrayId, index_count: i32) {
        unsafe {
            self.gl
                .bind_vertex_array(Some(glow::NativeVertexArray(vertex_array.0)));
            self.gl
                .draw_elements(glow::TRIANGLES, index_count, glow::UNSIGNED_INT, 0);
            self.gl.bind_vertex_array(None);
        }
    }

    fn create_texture(&self) -> Result<TextureId, String> {
        unsafe { self.gl.create_texture() }.map(|texture| TextureId(texture.0))
    }

    fn delete_texture(&self, texture: TextureId) {
        unsafe { self.gl.delete_texture(native_texture(texture)) }
    }

    fn allocate_texture_2d(
        &self,
        texture: TextureId,
        descriptor: &TextureDescriptor,
        pixels: Option<&[u8]>,
    ) {
        let (internal, format, ty) = pixel_formats(descriptor.format);
        unsafe {
            self.gl
                .bind_texture(glow::TEXTURE_2D, Some(native_texture(texture)));
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal as i32,
                descriptor.width as i32,
                descriptor.height as i32,
                0,
                format,
                ty,
                pixels,
            );
        }
    }

    fn upload_cubemap_face(
        &self,
        texture: TextureId,
        face: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) {
        unsafe {
            self.gl
                .bind_texture(glow::TEXTURE_CUBE_MAP, Some(native_texture(texture)));
            self.gl.tex_image_2d(
                glow::TEXTURE_CUBE_MAP_POSITIVE_X + face,
                0,
                glow::RGBA8 as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                Some(pixels),
            );
        }
    }

    fn set_sampler(&self, texture: TextureId, target: TextureTarget, sampler: &SamplerDescriptor) {
        let target = texture_target(target);
        let gl = &self.gl;
        unsafe {
            gl.bind_texture(target, Some(native_texture(texture)));
            gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, filter(sampler.min_filter));
            gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, filter(sampler.mag_filter));
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, wrap(sampler.wrap));
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, wrap(sampler.wrap));
            if target == glow::TEXTURE_CUBE_MAP {
                gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, wrap(sampler.wrap));
            }
            if let Some(border) = sampler.border_color {
                gl.tex_parameter_f32_slice(target, glow::TEXTURE_BORDER_COLOR, &border);
            }
        }
    }

    fn generate_mipmaps(&self, texture: TextureId, target: TextureTarget) {
        let target = texture_target(target);
        unsafe {
            self.gl.bind_texture(target, Some(native_texture(texture)));
            self.gl.generate_mipmap(target);
        }
    }

    fn bind_texture(&self, unit: u32, target: TextureTarget, texture: Option<TextureId>) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl
                .bind_texture(texture_target(target), texture.map(native_texture));
        }
    }

    fn create_renderbuffer(&self) -> Result<RenderbufferId, String> {
        unsafe { self.gl.create_renderbuffer() }.map(|rb| RenderbufferId(rb.0))
    }

    fn delete_renderbuffer(&self, renderbuffer: RenderbufferId) {
        unsafe {
            self.gl
                .delete_renderbuffer(glow::NativeRenderbuffer(renderbuffer.0))
        }
    }

    fn allocate_renderbuffer(
        &self,
        renderbuffer: RenderbufferId,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) {
        let (internal, _, _) = pixel_formats(format);
        unsafe {
            self.gl.bind_renderbuffer(
                glow::RENDERBUFFER,
                Some(glow::NativeRenderbuffer(renderbuffer.0)),
            );
            self.gl.renderbuffer_storage(
                glow::RENDERBUFFER,
                internal,
                width as i32,
                height as i32,
            );
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
        }
    }

    fn create_framebuffer(&self) -> Result<FramebufferId, String> {
        unsafe { self.gl.create_framebuffer() }.map(|fb| FramebufferId(fb.0))
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        unsafe {
            self.gl
                .delete_framebuffer(glow::NativeFramebuffer(framebuffer.0))
        }
    }

    fn bind_framebuffer(&self, target: FramebufferTarget, framebuffer: Option<FramebufferId>) {
        unsafe {
            self.gl.bind_framebuffer(
                framebuffer_target(target),
                framebuffer.map(|fb| glow::NativeFramebuffer(fb.0)),
            )
        }
    }

    fn attach_texture(&self, point: Attachment, texture: TextureId) {
        unsafe {
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                attachment(point),
                glow::TEXTURE_2D,
                Some(native_texture(texture)),
                0,
            )
        }
    }

    fn attach_renderbuffer(&self, point: Attachment, renderbuffer: RenderbufferId) {
        unsafe {
            self.gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                attachment(point),
                glow::RENDERBUFFER,
                Some(glow::NativeRenderbuffer(renderbuffer.0)),
            )
        }
    }

    fn disable_color_buffers(&self) {
        unsafe {
            self.gl.draw_buffer(glow::NONE);
            self.gl.read_buffer(glow::NONE);
        }
    }

    fn framebuffer_status(&self) -> FramebufferStatus {
        framebuffer_status(unsafe { self.gl.check_framebuffer_status(glow::FRAMEBUFFER) })
    }

    fn blit_framebuffer(&self, width: i32, height: i32, mask: ClearMask) {
        unsafe {
            self.gl.blit_framebuffer(
                0,
                0,
                width,
                height,
                0,
                0,
                width,
                height,
                clear_bits(mask),
                glow::NEAREST,
            )
        }
    }

    fn copy_depth_to_texture(&self, texture: TextureId, width: i32, height: i32) {
        unsafe {
            self.gl
                .bind_texture(glow::TEXTURE_2D, Some(native_texture(texture)));
            self.gl.copy_tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::DEPTH_COMPONENT,
                0,
                0,
                width,
                height,
                0,
            );
            if log::log_enabled!(log::Level::Debug) {
                let error = self.gl.get_error();
                if error != glow::NO_ERROR {
                    log::debug!("depth copy into {texture:?} failed with GL error {error:#06x}");
                }
            }
        }
    }

    fn set_viewport(&self, viewport: Viewport) {
        unsafe {
            self.gl
                .viewport(viewport.x, viewport.y, viewport.width, viewport.height)
        }
    }

    fn set_clear_color(&self, color: Vec4) {
        unsafe { self.gl.clear_color(color.x, color.y, color.z, color.w) }
    }

    fn clear(&self, mask: ClearMask) {
        unsafe { self.gl.clear(clear_bits(mask)) }
    }

    fn set_capability(&self, cap: Capability, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(capability(cap));
            } else {
                self.gl.disable(capability(cap));
            }
        }
    }

    fn set_depth_func(&self, func: DepthFunc) {
        let func = match func {
            DepthFunc::Less => glow::LESS,
            DepthFunc::LessEqual => glow::LEQUAL,
            DepthFunc::Always => glow::ALWAYS,
        };
        unsafe { self.gl.depth_func(func) }
    }

    fn set_blend_func(&self, src: BlendFactor, dst: BlendFactor) {
        unsafe { self.gl.blend_func(blend_factor(src), blend_factor(dst)) }
    }

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<ShaderId, String> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe {
            let shader = self.gl.create_shader(kind)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                return Err(log);
            }
            Ok(ShaderId(shader.0))
        }
    }

    fn delete_shader(&self, shader: ShaderId) {
        unsafe { self.gl.delete_shader(glow::NativeShader(shader.0)) }
    }

    fn link_program(&self, shaders: &[ShaderId]) -> Result<ProgramId, String> {
        unsafe {
            let program = self.gl.create_program()?;
            for shader in shaders {
                self.gl
                    .attach_shader(program, glow::NativeShader(shader.0));
            }
            self.gl.link_program(program);
            for shader in shaders {
                self.gl
                    .detach_shader(program, glow::NativeShader(shader.0));
            }
            if !self.gl.get_program_link_status(program) {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                return Err(log);
            }
            Ok(ProgramId(program.0))
        }
    }

    fn delete_program(&self, program: ProgramId) {
        unsafe { self.gl.delete_program(glow::NativeProgram(program.0)) }
    }

    fn use_program(&self, program: Option<ProgramId>) {
        unsafe {
            self.gl
                .use_program(program.map(|program| glow::NativeProgram(program.0)))
        }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        unsafe {
            self.gl
                .get_uniform_location(glow::NativeProgram(program.0), name)
        }
        .map(|location| UniformLocation(location.0))
    }

    fn set_uniform(&self, location: UniformLocation, value: &UniformValue) {
        let location = glow::NativeUniformLocation(location.0);
        let location = Some(&location);
        let gl = &self.gl;
        unsafe {
            match value {
                UniformValue::Int(v) => gl.uniform_1_i32(location, *v),
                UniformValue::Float(v) => gl.uniform_1_f32(location, *v),
                UniformValue::Vec2(v) => gl.uniform_2_f32(location, v.x, v.y),
                UniformValue::Vec3(v) => gl.uniform_3_f32(location, v.x, v.y, v.z),
                UniformValue::Vec4(v) => gl.uniform_4_f32(location, v.x, v.y, v.z, v.w),
                UniformValue::Mat3(m) => {
                    gl.uniform_matrix_3_f32_slice(location, false, &m.to_cols_array())
                }
                UniformValue::Mat4(m) => {
                    gl.uniform_matrix_4_f32_slice(location, false, &m.to_cols_array())
                }
            }
        }
    }
}
