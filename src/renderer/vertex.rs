use bytemuck::{Pod, Zeroable};
use std::mem;

use crate::gpu::{VertexAttribute, VertexLayout};

/// Mesh vertex as uploaded to the GPU. Field order and stride are part of
/// the shader contract (locations 0..=4).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex {
    const ATTRS: [VertexAttribute; 5] = [
        VertexAttribute {
            location: 0,
            components: 3,
            offset: 0,
        },
        VertexAttribute {
            location: 1,
            components: 3,
            offset: 12,
        },
        VertexAttribute {
            location: 2,
            components: 2,
            offset: 24,
        },
        VertexAttribute {
            location: 3,
            components: 3,
            offset: 32,
        },
        VertexAttribute {
            location: 4,
            components: 3,
            offset: 44,
        },
    ];

    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: mem::size_of::<Vertex>() as i32,
        attributes: &Self::ATTRS,
    };
}

/// Position plus texture coordinates, used by every quad and the skybox.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl QuadVertex {
    const ATTRS: [VertexAttribute; 2] = [
        VertexAttribute {
            location: 0,
            components: 3,
            offset: 0,
        },
        VertexAttribute {
            location: 1,
            components: 2,
            offset: 12,
        },
    ];

    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: mem::size_of::<QuadVertex>() as i32,
        attributes: &Self::ATTRS,
    };
}

#[inline]
pub fn v(position: [f32; 3], normal: [f32; 3], uv: [f32; 2], tangent: [f32; 3]) -> Vertex {
    let n = glam::Vec3::from(normal);
    let t = glam::Vec3::from(tangent);
    Vertex {
        position,
        normal,
        uv,
        tangent,
        bitangent: n.cross(t).to_array(),
    }
}

#[inline]
pub fn qv(position: [f32; 3], uv: [f32; 2]) -> QuadVertex {
    QuadVertex { position, uv }
}
