//! Fixed-size off-screen targets owned by the frame pipeline.
//!
//! Every constructor validates framebuffer completeness before returning and
//! leaves framebuffer 0 bound, whether it succeeds or not.

use crate::error::ResourceError;
use crate::gpu::{
    Attachment, FilterMode, FramebufferBinding, FramebufferTarget, GpuFramebuffer, GpuRef,
    GpuRenderbuffer, GpuTexture, SamplerDescriptor, TextureDescriptor, TextureFormat,
    TextureTarget, Viewport, WrapMode,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentKind {
    Depth,
    Color,
}

enum Storage {
    Texture(GpuTexture),
    Renderbuffer(GpuRenderbuffer),
}

pub struct RenderTarget {
    label: &'static str,
    // The framebuffer is released before the attachment it references.
    framebuffer: GpuFramebuffer,
    storage: Storage,
    width: u32,
    height: u32,
    kind: AttachmentKind,
}

/// Outside the light frustum the shadow map reads as maximum depth.
const DEPTH_SAMPLER: SamplerDescriptor = SamplerDescriptor {
    min_filter: FilterMode::Nearest,
    mag_filter: FilterMode::Nearest,
    wrap: WrapMode::ClampToBorder,
    border_color: Some([1.0, 1.0, 1.0, 1.0]),
};

impl RenderTarget {
    /// Depth-only texture target (shadow map, camera depth copy).
    pub fn create_depth_target(
        gpu: &GpuRef,
        label: &'static str,
        width: u32,
        height: u32,
    ) -> Result<Self, ResourceError> {
        let texture = GpuTexture::new(gpu, TextureTarget::Texture2d)?;
        let descriptor = TextureDescriptor {
            width,
            height,
            format: TextureFormat::Depth24,
        };
        gpu.allocate_texture_2d(texture.id(), &descriptor, None);
        gpu.set_sampler(texture.id(), TextureTarget::Texture2d, &DEPTH_SAMPLER);

        let framebuffer = GpuFramebuffer::new(gpu)?;
        {
            let _bound = FramebufferBinding::bind(gpu, FramebufferTarget::Both, &framebuffer);
            gpu.attach_texture(Attachment::Depth, texture.id());
            gpu.disable_color_buffers();
            check_complete(gpu, label)?;
        }

        log::debug!("Created {width}x{height} depth target '{label}'");
        Ok(Self {
            label,
            framebuffer,
            storage: Storage::Texture(texture),
            width,
            height,
            kind: AttachmentKind::Depth,
        })
    }

    /// RGBA8 texture target that later passes can sample.
    pub fn create_color_target(
        gpu: &GpuRef,
        label: &'static str,
        width: u32,
        height: u32,
    ) -> Result<Self, ResourceError> {
        let texture = GpuTexture::new(gpu, TextureTarget::Texture2d)?;
        let descriptor = TextureDescriptor {
            width,
            height,
            format: TextureFormat::Rgba8,
        };
        gpu.allocate_texture_2d(texture.id(), &descriptor, None);
        gpu.set_sampler(
            texture.id(),
            TextureTarget::Texture2d,
            &SamplerDescriptor::linear(WrapMode::ClampToEdge),
        );

        let framebuffer = GpuFramebuffer::new(gpu)?;
        {
            let _bound = FramebufferBinding::bind(gpu, FramebufferTarget::Both, &framebuffer);
            gpu.attach_texture(Attachment::Color0, texture.id());
            check_complete(gpu, label)?;
        }

        log::debug!("Created {width}x{height} color target '{label}'");
        Ok(Self {
            label,
            framebuffer,
            storage: Storage::Texture(texture),
            width,
            height,
            kind: AttachmentKind::Color,
        })
    }

    /// RGBA8 renderbuffer target; only readable by blitting out of it.
    pub fn create_color_renderbuffer(
        gpu: &GpuRef,
        label: &'static str,
        width: u32,
        height: u32,
    ) -> Result<Self, ResourceError> {
        let renderbuffer = GpuRenderbuffer::new(gpu)?;
        gpu.allocate_renderbuffer(renderbuffer.id(), TextureFormat::Rgba8, width, height);

        let framebuffer = GpuFramebuffer::new(gpu)?;
        {
            let _bound = FramebufferBinding::bind(gpu, FramebufferTarget::Both, &framebuffer);
            gpu.attach_renderbuffer(Attachment::Color0, renderbuffer.id());
            check_complete(gpu, label)?;
        }

        log::debug!("Created {width}x{height} renderbuffer target '{label}'");
        Ok(Self {
            label,
            framebuffer,
            storage: Storage::Renderbuffer(renderbuffer),
            width,
            height,
            kind: AttachmentKind::Color,
        })
    }

    /// Binds the target for drawing with its own viewport; the guard
    /// restores framebuffer 0 and `window` when dropped.
    pub fn bind<'a>(&self, gpu: &'a GpuRef, window: Viewport) -> FramebufferBinding<'a> {
        FramebufferBinding::bind(gpu, FramebufferTarget::Both, &self.framebuffer)
            .with_viewport(self.viewport(), window)
    }

    pub fn framebuffer(&self) -> &GpuFramebuffer {
        &self.framebuffer
    }

    /// The sampleable attachment, if the target is texture-backed.
    pub fn texture(&self) -> Option<&GpuTexture> {
        match &self.storage {
            Storage::Texture(texture) => Some(texture),
            Storage::Renderbuffer(_) => None,
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::sized(self.width, self.height)
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn kind(&self) -> AttachmentKind {
        self.kind
    }
}

fn check_complete(gpu: &GpuRef, label: &'static str) -> Result<(), ResourceError> {
    let status = gpu.framebuffer_status();
    if status.is_complete() {
        Ok(())
    } else {
        log::error!("Framebuffer '{label}' incomplete: {status:?}");
        Err(ResourceError::IncompleteFramebuffer { label, status })
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::gpu::recording::{GpuCall, RecordingContext};
    use crate::gpu::FramebufferStatus;

    fn recorder() -> (Rc<RecordingContext>, GpuRef) {
        let recorder = Rc::new(RecordingContext::new());
        let gpu: GpuRef = recorder.clone();
        (recorder, gpu)
    }

    fn last_bind(recorder: &RecordingContext) -> Option<GpuCall> {
        recorder
            .calls()
            .into_iter()
            .rev()
            .find(|call| matches!(call, GpuCall::BindFramebuffer { .. }))
    }

    #[test]
    fn depth_target_uses_white_border() {
        let (recorder, gpu) = recorder();
        let target = RenderTarget::create_depth_target(&gpu, "shadow", 1024, 1024).unwrap();

        assert_eq!(target.kind(), AttachmentKind::Depth);
        assert!(target.texture().is_some());
        assert_eq!(
            recorder.count(|call| matches!(
                call,
                GpuCall::SetSampler { sampler, .. } if sampler.border_color == Some([1.0; 4])
            )),
            1
        );
    }

    #[test]
    fn incomplete_framebuffer_is_rejected() {
        let (recorder, gpu) = recorder();
        recorder.set_framebuffer_status(FramebufferStatus::IncompleteAttachment);

        let depth = RenderTarget::create_depth_target(&gpu, "shadow", 16, 16);
        let color = RenderTarget::create_color_target(&gpu, "intermediate", 16, 16);

        assert!(matches!(
            depth,
            Err(ResourceError::IncompleteFramebuffer { label: "shadow", .. })
        ));
        assert!(matches!(
            color,
            Err(ResourceError::IncompleteFramebuffer { label: "intermediate", .. })
        ));
        assert_eq!(recorder.live_objects(), 0);
    }

    #[test]
    fn creation_leaves_default_framebuffer_bound() {
        let (recorder, gpu) = recorder();
        let expected = Some(GpuCall::BindFramebuffer {
            target: FramebufferTarget::Both,
            framebuffer: None,
        });

        let _target = RenderTarget::create_color_renderbuffer(&gpu, "post", 64, 32).unwrap();
        assert_eq!(last_bind(&recorder), expected);

        recorder.set_framebuffer_status(FramebufferStatus::Unsupported);
        let _ = RenderTarget::create_depth_target(&gpu, "depth", 64, 32);
        assert_eq!(last_bind(&recorder), expected);
    }
}
