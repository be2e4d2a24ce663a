pub mod frame;
pub mod material;
pub mod mesh;
pub mod pipeline;
pub mod primitives;
pub mod registry;
pub mod render_target;
pub mod shader;
pub mod texture;
pub mod uniforms;
pub mod vertex;

pub use frame::{FrameInput, FrameState};
pub use material::Material;
pub use mesh::{Mesh, MeshTexture, TextureRole};
pub use pipeline::{FramePipeline, FrameReport, PassKind};
pub use registry::{ProgramKind, ShaderRegistry};
pub use render_target::{AttachmentKind, RenderTarget};
pub use shader::ShaderProgram;
pub use texture::{load_cubemap, load_texture, Texture};
pub use vertex::{QuadVertex, Vertex};
