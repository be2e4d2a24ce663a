//! Headless [`GpuContext`] that records every command.
//!
//! Nothing is rendered. Each call is appended to a log that tests inspect to
//! check pass ordering, uniform traffic and resource lifetimes. Failure modes
//! (incomplete framebuffers, compiler errors, missing uniforms) can be
//! injected to exercise the error paths.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;

use glam::Vec4;

use super::{
    Attachment, BlendFactor, BufferId, Capability, ClearMask, DepthFunc, FramebufferId,
    FramebufferStatus, FramebufferTarget, GpuContext, ProgramId, RenderbufferId,
    SamplerDescriptor, ShaderId, ShaderStage, TextureDescriptor, TextureFormat, TextureId,
    TextureTarget, UniformLocation, UniformValue, VertexArrayId, VertexLayout, Viewport,
};

#[derive(Clone, Debug, PartialEq)]
pub enum GpuCall {
    CreateBuffer(BufferId),
    DeleteBuffer(BufferId),
    CreateVertexArray(VertexArrayId),
    DeleteVertexArray(VertexArrayId),
    UploadGeometry {
        vertex_array: VertexArrayId,
        vertex_bytes: usize,
        index_count: usize,
        stride: i32,
    },
    DrawIndexed {
        vertex_array: VertexArrayId,
        index_count: i32,
        program: Option<ProgramId>,
    },
    CreateTexture(TextureId),
    DeleteTexture(TextureId),
    AllocateTexture2d {
        texture: TextureId,
        descriptor: TextureDescriptor,
        has_pixels: bool,
    },
    UploadCubemapFace {
        texture: TextureId,
        face: u32,
        width: u32,
        height: u32,
    },
    SetSampler {
        texture: TextureId,
        target: TextureTarget,
        sampler: SamplerDescriptor,
    },
    GenerateMipmaps {
        texture: TextureId,
        target: TextureTarget,
    },
    BindTexture {
        unit: u32,
        target: TextureTarget,
        texture: Option<TextureId>,
    },
    CreateRenderbuffer(RenderbufferId),
    DeleteRenderbuffer(RenderbufferId),
    AllocateRenderbuffer {
        renderbuffer: RenderbufferId,
        format: TextureFormat,
        width: u32,
        height: u32,
    },
    CreateFramebuffer(FramebufferId),
    DeleteFramebuffer(FramebufferId),
    BindFramebuffer {
        target: FramebufferTarget,
        framebuffer: Option<FramebufferId>,
    },
    AttachTexture {
        attachment: Attachment,
        texture: TextureId,
    },
    AttachRenderbuffer {
        attachment: Attachment,
        renderbuffer: RenderbufferId,
    },
    DisableColorBuffers,
    CheckFramebuffer(FramebufferStatus),
    BlitFramebuffer {
        width: i32,
        height: i32,
        mask: ClearMask,
    },
    CopyDepthToTexture {
        texture: TextureId,
        width: i32,
        height: i32,
    },
    SetViewport(Viewport),
    SetClearColor(Vec4),
    Clear(ClearMask),
    SetCapability {
        capability: Capability,
        enabled: bool,
    },
    SetDepthFunc(DepthFunc),
    SetBlendFunc {
        src: BlendFactor,
        dst: BlendFactor,
    },
    CompileShader {
        stage: ShaderStage,
        shader: Option<ShaderId>,
    },
    DeleteShader(ShaderId),
    LinkProgram(Option<ProgramId>),
    DeleteProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    QueryUniform {
        program: ProgramId,
        name: String,
    },
    SetUniform {
        program: Option<ProgramId>,
        name: Option<String>,
        value: UniformValue,
    },
}

impl GpuCall {
    pub fn is_draw(&self) -> bool {
        matches!(self, GpuCall::DrawIndexed { .. })
    }
}

pub struct RecordingContext {
    calls: RefCell<Vec<GpuCall>>,
    next_id: Cell<u32>,
    live_objects: Cell<i64>,
    current_program: Cell<Option<ProgramId>>,
    locations: RefCell<HashMap<(ProgramId, String), UniformLocation>>,
    location_names: RefCell<HashMap<UniformLocation, String>>,
    location_queries: Cell<usize>,
    framebuffer_status: Cell<FramebufferStatus>,
    compile_failure: RefCell<Option<(ShaderStage, String)>>,
    link_failure: RefCell<Option<String>>,
    hidden_uniforms: RefCell<HashSet<String>>,
}

impl Default for RecordingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingContext {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            live_objects: Cell::new(0),
            current_program: Cell::new(None),
            locations: RefCell::new(HashMap::new()),
            location_names: RefCell::new(HashMap::new()),
            location_queries: Cell::new(0),
            framebuffer_status: Cell::new(FramebufferStatus::Complete),
            compile_failure: RefCell::new(None),
            link_failure: RefCell::new(None),
            hidden_uniforms: RefCell::new(HashSet::new()),
        }
    }

    pub fn calls(&self) -> Vec<GpuCall> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn position(&self, predicate: impl Fn(&GpuCall) -> bool) -> Option<usize> {
        self.calls.borrow().iter().position(predicate)
    }

    pub fn count(&self, predicate: impl Fn(&GpuCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| predicate(call)).count()
    }

    /// Number of uniform-location lookups issued so far.
    pub fn location_queries(&self) -> usize {
        self.location_queries.get()
    }

    /// Objects created and not yet deleted.
    pub fn live_objects(&self) -> i64 {
        self.live_objects.get()
    }

    /// Values written to the uniform `name`, in call order.
    pub fn uniform_writes(&self, name: &str) -> Vec<UniformValue> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                GpuCall::SetUniform {
                    name: Some(written),
                    value,
                    ..
                } if written == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Status every subsequent completeness check reports.
    pub fn set_framebuffer_status(&self, status: FramebufferStatus) {
        self.framebuffer_status.set(status);
    }

    /// Makes every later compilation of `stage` fail with `log`.
    pub fn fail_compilation(&self, stage: ShaderStage, log: impl Into<String>) {
        *self.compile_failure.borrow_mut() = Some((stage, log.into()));
    }

    pub fn fail_link(&self, log: impl Into<String>) {
        *self.link_failure.borrow_mut() = Some(log.into());
    }

    /// Reports `name` as absent from every program, like an optimised-out uniform.
    pub fn hide_uniform(&self, name: impl Into<String>) {
        self.hidden_uniforms.borrow_mut().insert(name.into());
    }

    fn record(&self, call: GpuCall) {
        self.calls.borrow_mut().push(call);
    }

    fn allocate(&self) -> NonZeroU32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.live_objects.set(self.live_objects.get() + 1);
        NonZeroU32::new(id).unwrap_or(NonZeroU32::MIN)
    }

    fn release(&self) {
        self.live_objects.set(self.live_objects.get() - 1);
    }
}

impl GpuContext for RecordingContext {
    fn create_buffer(&self) -> Result<BufferId, String> {
        let id = BufferId(self.allocate());
        self.record(GpuCall::CreateBuffer(id));
        Ok(id)
    }

    fn delete_buffer(&self, buffer: BufferId) {
        self.release();
        self.record(GpuCall::DeleteBuffer(buffer));
    }

    fn create_vertex_array(&self) -> Result<VertexArrayId, String> {
        let id = VertexArrayId(self.allocate());
        self.record(GpuCall::CreateVertexArray(id));
        Ok(id)
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) {
        self.release();
        self.record(GpuCall::DeleteVertexArray(vertex_array));
    }

    fn upload_geometry(
        &self,
        vertex_array: VertexArrayId,
        _vertex_buffer: BufferId,
        _index_buffer: BufferId,
        vertices: &[u8],
        indices: &[u32],
        layout: &VertexLayout,
    ) {
        self.record(GpuCall::UploadGeometry {
            vertex_array,
            vertex_bytes: vertices.len(),
            index_count: indices.len(),
            stride: layout.stride,
        });
    }

    fn draw_indexed(&self, vertex_array: VertexArrayId, index_count: i32) {
        self.record(GpuCall::DrawIndexed {
            vertex_array,
            index_count,
            program: self.current_program.get(),
        });
    }

    fn create_texture(&self) -> Result<TextureId, String> {
        let id = TextureId(self.allocate());
        self.record(GpuCall::CreateTexture(id));
        Ok(id)
    }

    fn delete_texture(&self, texture: TextureId) {
        self.release();
        self.record(GpuCall::DeleteTexture(texture));
    }

    fn allocate_texture_2d(
        &self,
        texture: TextureId,
        descriptor: &TextureDescriptor,
        pixels: Option<&[u8]>,
    ) {
        self.record(GpuCall::AllocateTexture2d {
            texture,
            descriptor: *descriptor,
            has_pixels: pixels.is_some(),
        });
    }

    fn upload_cubemap_face(
        &self,
        texture: TextureId,
        face: u32,
        width: u32,
        height: u32,
        _pixels: &[u8],
    ) {
        self.record(GpuCall::UploadCubemapFace {
            texture,
            face,
            width,
            height,
        });
    }

    fn set_sampler(&self, texture: TextureId, target: TextureTarget, sampler: &SamplerDescriptor) {
        self.record(GpuCall::SetSampler {
            texture,
            target,
            sampler: *sampler,
        });
    }

    fn generate_mipmaps(&self, texture: TextureId, target: TextureTarget) {
        self.record(GpuCall::GenerateMipmaps { texture, target });
    }

    fn bind_texture(&self, unit: u32, target: TextureTarget, texture: Option<TextureId>) {
        self.record(GpuCall::BindTexture {
            unit,
            target,
            texture,
        });
    }

    fn create_renderbuffer(&self) -> Result<RenderbufferId, String> {
        let id = RenderbufferId(self.allocate());
        self.record(GpuCall::CreateRenderbuffer(id));
        Ok(id)
    }

    fn delete_renderbuffer(&self, renderbuffer: RenderbufferId) {
        self.release();
        self.record(GpuCall::DeleteRenderbuffer(renderbuffer));
    }

    fn allocate_renderbuffer(
        &self,
        renderbuffer: RenderbufferId,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) {
        self.record(GpuCall::AllocateRenderbuffer {
            renderbuffer,
            format,
            width,
            height,
        });
    }

    fn create_framebuffer(&self) -> Result<FramebufferId, String> {
        let id = FramebufferId(self.allocate());
        self.record(GpuCall::CreateFramebuffer(id));
        Ok(id)
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        self.release();
        self.record(GpuCall::DeleteFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&self, target: FramebufferTarget, framebuffer: Option<FramebufferId>) {
        self.record(GpuCall::BindFramebuffer {
            target,
            framebuffer,
        });
    }

    fn attach_texture(&self, attachment: Attachment, texture: TextureId) {
        self.record(GpuCall::AttachTexture {
            attachment,
            texture,
        });
    }

    fn attach_renderbuffer(&self, attachment: Attachment, renderbuffer: RenderbufferId) {
        self.record(GpuCall::AttachRenderbuffer {
            attachment,
            renderbuffer,
        });
    }

    fn disable_color_buffers(&self) {
        self.record(GpuCall::DisableColorBuffers);
    }

    fn framebuffer_status(&self) -> FramebufferStatus {
        let status = self.framebuffer_status.get();
        self.record(GpuCall::CheckFramebuffer(status));
        status
    }

    fn blit_framebuffer(&self, width: i32, height: i32, mask: ClearMask) {
        self.record(GpuCall::BlitFramebuffer {
            width,
            height,
            mask,
        });
    }

    fn copy_depth_to_texture(&self, texture: TextureId, width: i32, height: i32) {
        self.record(GpuCall::CopyDepthToTexture {
            texture,
            width,
            height,
        });
    }

    fn set_viewport(&self, viewport: Viewport) {
        self.record(GpuCall::SetViewport(viewport));
    }

    fn set_clear_color(&self, color: Vec4) {
        self.record(GpuCall::SetClearColor(color));
    }

    fn clear(&self, mask: ClearMask) {
        self.record(GpuCall::Clear(mask));
    }

    fn set_capability(&self, capability: Capability, enabled: bool) {
        self.record(GpuCall::SetCapability {
            capability,
            enabled,
        });
    }

    fn set_depth_func(&self, func: DepthFunc) {
        self.record(GpuCall::SetDepthFunc(func));
    }

    fn set_blend_func(&self, src: BlendFactor, dst: BlendFactor) {
        self.record(GpuCall::SetBlendFunc { src, dst });
    }

    fn compile_shader(&self, stage: ShaderStage, _source: &str) -> Result<ShaderId, String> {
        let failure = self
            .compile_failure
            .borrow()
            .as_ref()
            .filter(|(failing, _)| *failing == stage)
            .map(|(_, log)| log.clone());
        if let Some(log) = failure {
            self.record(GpuCall::CompileShader {
                stage,
                shader: None,
            });
            return Err(log);
        }
        let id = ShaderId(self.allocate());
        self.record(GpuCall::CompileShader {
            stage,
            shader: Some(id),
        });
        Ok(id)
    }

    fn delete_shader(&self, shader: ShaderId) {
        self.release();
        self.record(GpuCall::DeleteShader(shader));
    }

    fn link_program(&self, _shaders: &[ShaderId]) -> Result<ProgramId, String> {
        if let Some(log) = self.link_failure.borrow().clone() {
            self.record(GpuCall::LinkProgram(None));
            return Err(log);
        }
        let id = ProgramId(self.allocate());
        self.record(GpuCall::LinkProgram(Some(id)));
        Ok(id)
    }

    fn delete_program(&self, program: ProgramId) {
        self.release();
        self.record(GpuCall::DeleteProgram(program));
    }

    fn use_program(&self, program: Option<ProgramId>) {
        self.current_program.set(program);
        self.record(GpuCall::UseProgram(program));
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.location_queries.set(self.location_queries.get() + 1);
        self.record(GpuCall::QueryUniform {
            program,
            name: name.to_string(),
        });
        if self.hidden_uniforms.borrow().contains(name) {
            return None;
        }

        let mut locations = self.locations.borrow_mut();
        let next = UniformLocation(self.location_names.borrow().len() as u32);
        let location = *locations
            .entry((program, name.to_string()))
            .or_insert(next);
        self.location_names
            .borrow_mut()
            .entry(location)
            .or_insert_with(|| name.to_string());
        Some(location)
    }

    fn set_uniform(&self, location: UniformLocation, value: &UniformValue) {
        let name = self.location_names.borrow().get(&location).cloned();
        self.record(GpuCall::SetUniform {
            program: self.current_program.get(),
            name,
            value: *value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_locations_are_stable_per_program_and_name() {
        let recorder = RecordingContext::new();
        let program = recorder.link_program(&[]).unwrap();

        let first = recorder.uniform_location(program, "view");
        let again = recorder.uniform_location(program, "view");
        let other = recorder.uniform_location(program, "projection");

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(recorder.location_queries(), 3);
    }

    #[test]
    fn hidden_uniforms_have_no_location() {
        let recorder = RecordingContext::new();
        let program = recorder.link_program(&[]).unwrap();
        recorder.hide_uniform("time");

        assert_eq!(recorder.uniform_location(program, "time"), None);
    }

    #[test]
    fn injected_compile_failure_only_hits_its_stage() {
        let recorder = RecordingContext::new();
        recorder.fail_compilation(ShaderStage::Fragment, "syntax error");

        assert!(recorder.compile_shader(ShaderStage::Vertex, "").is_ok());
        assert_eq!(
            recorder.compile_shader(ShaderStage::Fragment, ""),
            Err("syntax error".to_string())
        );
    }
}
