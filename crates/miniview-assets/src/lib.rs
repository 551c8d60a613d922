//! Miniview Assets - FBX mesh import
//!
//! Reads binary FBX files, expands every polygon corner into an interleaved
//! position/normal/uv vertex, and fan-triangulates polygons into a 32-bit
//! index buffer ready for upload.

mod error;
mod extract;
pub mod fbx;
mod import;
mod layout;
mod scene;

pub use error::{AssetError, ExtractError, FbxError};
pub use extract::{
    extract_mesh, DegeneratePolicy, ExtractOptions, ExtractStats, ExtractedMesh, MeshExtractor,
};
pub use fbx::parse_fbx;
pub use import::{import_fbx, ImportOptions, ImportedModel};
pub use layout::{
    InterleavedVertex, VertexAttribute, FLOATS_PER_VERTEX, INDICES_PER_TRIANGLE, VERTEX_STRIDE,
};
pub use scene::{AttributeStream, GeometryData, GeometryPartition, Polygon, SceneDocument, SceneMesh};
