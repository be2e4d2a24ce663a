//! Scoped GPU objects.
//!
//! Each wrapper owns exactly one API object and deletes it when dropped, so
//! early returns during scene setup never leak and nothing is freed twice.

use bytemuck::Pod;

use super::{
    BufferId, FramebufferId, FramebufferTarget, GpuRef, ProgramId, RenderbufferId, ShaderId,
    TextureId, TextureTarget, VertexArrayId, VertexLayout, Viewport,
};
use crate::error::ResourceError;

fn allocation(what: &'static str) -> impl FnOnce(String) -> ResourceError {
    move |reason| ResourceError::Allocation { what, reason }
}

pub struct GpuBuffer {
    gpu: GpuRef,
    id: BufferId,
}

impl GpuBuffer {
    pub fn new(gpu: &GpuRef) -> Result<Self, ResourceError> {
        let id = gpu.create_buffer().map_err(allocation("buffer"))?;
        Ok(Self {
            gpu: gpu.clone(),
            id,
        })
    }

    pub fn id(&self) -> BufferId {
        self.id
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.gpu.delete_buffer(self.id);
    }
}

pub struct GpuVertexArray {
    gpu: GpuRef,
    id: VertexArrayId,
}

impl GpuVertexArray {
    pub fn new(gpu: &GpuRef) -> Result<Self, ResourceError> {
        let id = gpu
            .create_vertex_array()
            .map_err(allocation("vertex array"))?;
        Ok(Self {
            gpu: gpu.clone(),
            id,
        })
    }

    pub fn id(&self) -> VertexArrayId {
        self.id
    }
}

impl Drop for GpuVertexArray {
    fn drop(&mut self) {
        self.gpu.delete_vertex_array(self.id);
    }
}

pub struct GpuTexture {
    gpu: GpuRef,
    id: TextureId,
    target: TextureTarget,
}

impl GpuTexture {
    pub fn new(gpu: &GpuRef, target: TextureTarget) -> Result<Self, ResourceError> {
        let id = gpu.create_texture().map_err(allocation("texture"))?;
        Ok(Self {
            gpu: gpu.clone(),
            id,
            target,
        })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    pub fn bind(&self, unit: u32) {
        self.gpu.bind_texture(unit, self.target, Some(self.id));
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        self.gpu.delete_texture(self.id);
    }
}

pub struct GpuRenderbuffer {
    gpu: GpuRef,
    id: RenderbufferId,
}

impl GpuRenderbuffer {
    pub fn new(gpu: &GpuRef) -> Result<Self, ResourceError> {
        let id = gpu
            .create_renderbuffer()
            .map_err(allocation("renderbuffer"))?;
        Ok(Self {
            gpu: gpu.clone(),
            id,
        })
    }

    pub fn id(&self) -> RenderbufferId {
        self.id
    }
}

impl Drop for GpuRenderbuffer {
    fn drop(&mut self) {
        self.gpu.delete_renderbuffer(self.id);
    }
}

pub struct GpuFramebuffer {
    gpu: GpuRef,
    id: FramebufferId,
}

impl GpuFramebuffer {
    pub fn new(gpu: &GpuRef) -> Result<Self, ResourceError> {
        let id = gpu
            .create_framebuffer()
            .map_err(allocation("framebuffer"))?;
        Ok(Self {
            gpu: gpu.clone(),
            id,
        })
    }

    pub fn id(&self) -> FramebufferId {
        self.id
    }
}

impl Drop for GpuFramebuffer {
    fn drop(&mut self) {
        self.gpu.delete_framebuffer(self.id);
    }
}

/// A compiled stage. Dropped right after linking.
pub struct GpuShader {
    gpu: GpuRef,
    id: ShaderId,
}

impl GpuShader {
    pub(crate) fn from_raw(gpu: &GpuRef, id: ShaderId) -> Self {
        Self {
            gpu: gpu.clone(),
            id,
        }
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }
}

impl Drop for GpuShader {
    fn drop(&mut self) {
        self.gpu.delete_shader(self.id);
    }
}

pub struct GpuProgram {
    gpu: GpuRef,
    id: ProgramId,
}

impl GpuProgram {
    pub(crate) fn from_raw(gpu: &GpuRef, id: ProgramId) -> Self {
        Self {
            gpu: gpu.clone(),
            id,
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn gpu(&self) -> &GpuRef {
        &self.gpu
    }
}

impl Drop for GpuProgram {
    fn drop(&mut self) {
        self.gpu.delete_program(self.id);
    }
}

/// Vertex array plus its vertex and index buffers.
pub struct GpuGeometry {
    // Field order matters: the vertex array goes before the buffers it references.
    vertex_array: GpuVertexArray,
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    index_count: i32,
}

impl GpuGeometry {
    pub fn new<V: Pod>(
        gpu: &GpuRef,
        vertices: &[V],
        indices: &[u32],
        layout: &VertexLayout,
    ) -> Result<Self, ResourceError> {
        let vertex_array = GpuVertexArray::new(gpu)?;
        let vertex_buffer = GpuBuffer::new(gpu)?;
        let index_buffer = GpuBuffer::new(gpu)?;
        gpu.upload_geometry(
            vertex_array.id(),
            vertex_buffer.id(),
            index_buffer.id(),
            bytemuck::cast_slice(vertices),
            indices,
            layout,
        );
        Ok(Self {
            vertex_array,
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as i32,
        })
    }

    pub fn index_count(&self) -> i32 {
        self.index_count
    }

    pub fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array.id()
    }

    pub fn buffers(&self) -> (BufferId, BufferId) {
        (self.vertex_buffer.id(), self.index_buffer.id())
    }

    pub fn draw(&self) {
        self.vertex_array
            .gpu
            .draw_indexed(self.vertex_array.id(), self.index_count);
    }
}

/// Keeps a framebuffer bound for the guard's lifetime.
///
/// On drop the default framebuffer (0) is rebound on the same target and,
/// when configured, the window viewport is restored.
pub struct FramebufferBinding<'a> {
    gpu: &'a GpuRef,
    target: FramebufferTarget,
    restore_viewport: Option<Viewport>,
}

impl<'a> FramebufferBinding<'a> {
    pub fn bind(gpu: &'a GpuRef, target: FramebufferTarget, framebuffer: &GpuFramebuffer) -> Self {
        gpu.bind_framebuffer(target, Some(framebuffer.id()));
        Self {
            gpu,
            target,
            restore_viewport: None,
        }
    }

    /// Switches the viewport to `inner` now and back to `restore` on drop.
    pub fn with_viewport(mut self, inner: Viewport, restore: Viewport) -> Self {
        self.gpu.set_viewport(inner);
        self.restore_viewport = Some(restore);
        self
    }
}

impl Drop for FramebufferBinding<'_> {
    fn drop(&mut self) {
        self.gpu.bind_framebuffer(self.target, None);
        if let Some(viewport) = self.restore_viewport {
            self.gpu.set_viewport(viewport);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::gpu::recording::{GpuCall, RecordingContext};
    use crate::gpu::VertexAttribute;

    const LAYOUT: VertexLayout = VertexLayout {
        stride: 12,
        attributes: &[VertexAttribute {
            location: 0,
            components: 3,
            offset: 0,
        }],
    };

    #[test]
    fn geometry_releases_every_object_on_drop() {
        let recorder = Rc::new(RecordingContext::new());
        let gpu: GpuRef = recorder.clone();

        let geometry = GpuGeometry::new(&gpu, &[[0.0f32; 3]; 3], &[0, 1, 2], &LAYOUT).unwrap();
        assert_eq!(recorder.live_objects(), 3);
        assert_eq!(geometry.index_count(), 3);

        drop(geometry);
        assert_eq!(recorder.live_objects(), 0);
    }

    #[test]
    fn binding_guard_restores_default_framebuffer_and_viewport() {
        let recorder = Rc::new(RecordingContext::new());
        let gpu: GpuRef = recorder.clone();
        let framebuffer = GpuFramebuffer::new(&gpu).unwrap();
        let window = Viewport::sized(800, 600);

        {
            let _bound = FramebufferBinding::bind(&gpu, FramebufferTarget::Both, &framebuffer)
                .with_viewport(Viewport::sized(1024, 1024), window);
        }

        let calls = recorder.calls();
        let tail = &calls[calls.len() - 2..];
        assert_eq!(
            tail,
            &[
                GpuCall::BindFramebuffer {
                    target: FramebufferTarget::Both,
                    framebuffer: None,
                },
                GpuCall::SetViewport(window),
            ]
        );
    }
}
