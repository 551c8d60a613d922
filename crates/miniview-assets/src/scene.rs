//! In-memory scene document produced by the FBX reader and consumed by the
//! mesh extractor.

use glam::{Vec2, Vec3};

/// A parsed scene. Read-only to the extractor.
#[derive(Debug, Clone, Default)]
pub struct SceneDocument {
    pub meshes: Vec<SceneMesh>,
}

impl SceneDocument {
    pub fn new(meshes: Vec<SceneMesh>) -> Self {
        Self { meshes }
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

/// A named mesh and its geometry.
#[derive(Debug, Clone)]
pub struct SceneMesh {
    pub name: String,
    pub geometry: GeometryData,
}

/// Per-corner attribute streams plus the polygon list, split by material.
///
/// A `None` normal or uv stream means the mesh carries no such data; it is
/// checked once per mesh, not per corner.
#[derive(Debug, Clone, Default)]
pub struct GeometryData {
    pub positions: AttributeStream<Vec3>,
    pub normals: Option<AttributeStream<Vec3>>,
    pub uvs: Option<AttributeStream<Vec2>>,
    pub partitions: Vec<GeometryPartition>,
}

impl GeometryData {
    /// Number of polygon corners addressable through the position stream.
    pub fn corner_count(&self) -> usize {
        self.positions.len()
    }

    /// All polygons of all partitions, in partition order.
    pub fn polygons(&self) -> impl Iterator<Item = &Polygon> + '_ {
        self.partitions.iter().flat_map(|p| p.polygons.iter())
    }
}

/// A contiguous run of polygons sharing one material.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeometryPartition {
    pub polygons: Vec<Polygon>,
}

/// One polygon: `vertex_count` corners starting at corner `from_vertex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polygon {
    pub from_vertex: u32,
    pub vertex_count: u32,
}

impl Polygon {
    pub fn new(from_vertex: u32, vertex_count: u32) -> Self {
        Self {
            from_vertex,
            vertex_count,
        }
    }

    /// Triangles produced by fan triangulation, zero for degenerate polygons.
    pub fn triangle_count(&self) -> u32 {
        self.vertex_count.saturating_sub(2)
    }

    pub fn is_degenerate(&self) -> bool {
        self.vertex_count < 3
    }
}

/// Attribute values addressed by flat corner index.
///
/// With `indices` present, corner `i` reads `values[indices[i]]`; otherwise
/// it reads `values[i]` directly.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeStream<T> {
    pub values: Vec<T>,
    pub indices: Option<Vec<u32>>,
}

impl<T> Default for AttributeStream<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            indices: None,
        }
    }
}

impl<T: Copy> AttributeStream<T> {
    /// One value per corner.
    pub fn direct(values: Vec<T>) -> Self {
        Self {
            values,
            indices: None,
        }
    }

    /// Values shared between corners through an index table.
    pub fn indexed(values: Vec<T>, indices: Vec<u32>) -> Self {
        Self {
            values,
            indices: Some(indices),
        }
    }

    /// Value for `corner`, or `None` if the corner or its index is out of range.
    pub fn get(&self, corner: usize) -> Option<T> {
        let index = match &self.indices {
            Some(indices) => *indices.get(corner)? as usize,
            None => corner,
        };
        self.values.get(index).copied()
    }

    /// Number of addressable corners.
    pub fn len(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
