use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::AssetError;
use crate::extract::{DegeneratePolicy, ExtractOptions, ExtractedMesh, MeshExtractor};
use crate::fbx;

/// Options for [`import_fbx`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Fail with [`AssetError::NoMeshes`] when the file holds no mesh.
    pub require_mesh: bool,
    pub degenerate: DegeneratePolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            require_mesh: true,
            degenerate: DegeneratePolicy::default(),
        }
    }
}

/// Result of importing an FBX file: the names of its meshes and the merged
/// vertex/index buffers of all of them.
#[derive(Debug, Clone)]
pub struct ImportedModel {
    pub mesh_names: Vec<String>,
    pub mesh: ExtractedMesh,
}

impl ImportedModel {
    /// Number of indices for the draw call.
    pub fn draw_count(&self) -> usize {
        self.mesh.index_count()
    }
}

/// Load a binary FBX file and extract all of its meshes into one vertex
/// buffer and one index buffer. Nothing is returned on failure.
pub fn import_fbx(path: &Path, options: &ImportOptions) -> Result<ImportedModel, AssetError> {
    if !path.exists() {
        return Err(AssetError::NotFound(path.to_path_buf()));
    }

    let data = fs::read(path).map_err(|e| AssetError::Io(path.to_path_buf(), e))?;
    debug!("Read {} bytes from '{}'", data.len(), path.display());

    let document = fbx::parse_fbx(&data).map_err(|e| AssetError::NoScene(path.to_path_buf(), e))?;
    drop(data);

    if document.is_empty() && options.require_mesh {
        return Err(AssetError::NoMeshes(path.to_path_buf()));
    }

    let extractor = MeshExtractor::new(ExtractOptions {
        degenerate: options.degenerate,
    });
    let mesh = extractor
        .extract(&document)
        .map_err(|e| AssetError::Extract(path.to_path_buf(), e))?;

    let mesh_names = document.meshes.into_iter().map(|m| m.name).collect::<Vec<_>>();

    info!(
        "Imported '{}': {} meshes, {} vertices, {} triangles",
        path.display(),
        mesh_names.len(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );

    Ok(ImportedModel { mesh_names, mesh })
}
