//! Interleaved vertex layout shared by the extractor and the renderer

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Floats per output vertex: position (3), normal (3), uv (2).
pub const FLOATS_PER_VERTEX: usize = 8;

/// Byte stride between consecutive vertices.
pub const VERTEX_STRIDE: usize = FLOATS_PER_VERTEX * std::mem::size_of::<f32>();

/// Indices emitted per triangle.
pub const INDICES_PER_TRIANGLE: usize = 3;

/// One interleaved vertex record as uploaded to the GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InterleavedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl InterleavedVertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
        }
    }
}

/// Vertex shader inputs, in record order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    Position,
    Normal,
    TexCoord,
}

impl VertexAttribute {
    pub const ALL: [VertexAttribute; 3] = [
        VertexAttribute::Position,
        VertexAttribute::Normal,
        VertexAttribute::TexCoord,
    ];

    /// Shader input location
    pub fn location(self) -> u32 {
        match self {
            VertexAttribute::Position => 0,
            VertexAttribute::Normal => 1,
            VertexAttribute::TexCoord => 2,
        }
    }

    /// Number of f32 components
    pub fn components(self) -> usize {
        match self {
            VertexAttribute::Position | VertexAttribute::Normal => 3,
            VertexAttribute::TexCoord => 2,
        }
    }

    /// Byte offset inside a vertex record
    pub fn offset(self) -> usize {
        match self {
            VertexAttribute::Position => 0,
            VertexAttribute::Normal => 12,
            VertexAttribute::TexCoord => 24,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VertexAttribute::Position => "position",
            VertexAttribute::Normal => "normal",
            VertexAttribute::TexCoord => "uv",
        }
    }
}
