//! Expands a scene document into unindexed interleaved vertices and a
//! fan-triangulated index buffer.
//!
//! Every polygon corner becomes its own output vertex; nothing is merged.
//! The polygon list is walked once to build a [`CornerLayout`] that fixes
//! the output slot of every corner, and the fill pass reads that layout
//! instead of re-walking the scene.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::layout::{InterleavedVertex, FLOATS_PER_VERTEX, INDICES_PER_TRIANGLE};
use crate::scene::SceneDocument;

/// What to do with polygons that have fewer than three corners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegeneratePolicy {
    /// Drop the polygon and log a warning. It contributes no vertices or triangles.
    #[default]
    Skip,
    /// Abort extraction with [`ExtractError::DegeneratePolygon`].
    Fail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub degenerate: DegeneratePolicy,
}

/// Counters collected while extracting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub meshes: usize,
    pub polygons: usize,
    pub skipped_polygons: usize,
}

/// Output buffers ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMesh {
    /// `FLOATS_PER_VERTEX` floats per corner: position, normal, uv.
    pub vertices: Vec<f32>,
    /// Three vertex offsets per triangle.
    pub indices: Vec<u32>,
    pub stats: ExtractStats,
}

impl ExtractedMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_VERTEX
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / INDICES_PER_TRIANGLE
    }

    /// Number of indices to pass to an indexed draw call.
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The vertex at output slot `index`.
    pub fn vertex(&self, index: usize) -> Option<InterleavedVertex> {
        let records: &[InterleavedVertex] = bytemuck::cast_slice(&self.vertices);
        records.get(index).copied()
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Fan triangulation from corner 0 of a polygon whose corners occupy output
/// slots `first..first + vertex_count`.
///
/// Yields `vertex_count - 2` triangles `[first, first + 1 + t, first + 2 + t]`
/// and nothing for polygons with fewer than three corners. No convexity check
/// is made. The last slot, `first + vertex_count - 1`, must fit in a `u32`;
/// `CornerLayout::build` guarantees this for every span it produces.
pub(crate) fn triangulate(first: u32, vertex_count: u32) -> impl Iterator<Item = [u32; 3]> {
    (0..vertex_count.saturating_sub(2)).map(move |t| [first, first + 1 + t, first + 2 + t])
}

/// One accepted polygon and the output slot of its first corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PolygonSpan {
    mesh: usize,
    from_vertex: usize,
    vertex_count: u32,
    first_slot: usize,
}

/// The materialized polygon list shared by the sizing and fill passes.
#[derive(Debug, Default)]
struct CornerLayout {
    spans: Vec<PolygonSpan>,
    corner_total: usize,
    triangle_total: usize,
    skipped: usize,
}

impl CornerLayout {
    fn build(document: &SceneDocument, options: &ExtractOptions) -> Result<Self, ExtractError> {
        let mut layout = CornerLayout::default();

        for (mesh_idx, mesh) in document.meshes.iter().enumerate() {
            let available = mesh.geometry.corner_count();

            for (polygon_idx, polygon) in mesh.geometry.polygons().enumerate() {
                if polygon.is_degenerate() {
                    match options.degenerate {
                        DegeneratePolicy::Fail => {
                            return Err(ExtractError::DegeneratePolygon {
                                mesh: mesh_idx,
                                polygon: polygon_idx,
                                corners: polygon.vertex_count,
                            });
                        }
                        DegeneratePolicy::Skip => {
                            warn!(
                                "Skipping polygon {} of mesh '{}': only {} corners",
                                polygon_idx, mesh.name, polygon.vertex_count
                            );
                            layout.skipped += 1;
                            continue;
                        }
                    }
                }

                let from = u64::from(polygon.from_vertex);
                let to = from + u64::from(polygon.vertex_count);
                if to > available as u64 {
                    return Err(ExtractError::CornerOutOfRange {
                        mesh: mesh_idx,
                        from,
                        to,
                        available,
                    });
                }

                layout.spans.push(PolygonSpan {
                    mesh: mesh_idx,
                    from_vertex: polygon.from_vertex as usize,
                    vertex_count: polygon.vertex_count,
                    first_slot: layout.corner_total,
                });
                layout.corner_total += polygon.vertex_count as usize;
                layout.triangle_total += polygon.triangle_count() as usize;
            }
        }

        if u32::try_from(layout.corner_total).is_err() {
            return Err(ExtractError::IndexOverflow(layout.corner_total));
        }

        Ok(layout)
    }
}

/// Stateless converter from [`SceneDocument`] to [`ExtractedMesh`].
///
/// Holds only options, so one extractor can serve any number of documents,
/// from any number of threads.
#[derive(Debug, Clone, Default)]
pub struct MeshExtractor {
    options: ExtractOptions,
}

impl MeshExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn extract(&self, document: &SceneDocument) -> Result<ExtractedMesh, ExtractError> {
        let layout = CornerLayout::build(document, &self.options)?;

        let mut vertices = vec![0.0f32; layout.corner_total * FLOATS_PER_VERTEX];
        let mut indices = Vec::with_capacity(layout.triangle_total * INDICES_PER_TRIANGLE);

        {
            let records: &mut [InterleavedVertex] = bytemuck::cast_slice_mut(&mut vertices);

            for span in &layout.spans {
                let geometry = &document.meshes[span.mesh].geometry;

                for k in 0..span.vertex_count as usize {
                    let corner = span.from_vertex + k;
                    let missing = |stream| ExtractError::MissingAttribute {
                        mesh: span.mesh,
                        corner,
                        stream,
                    };

                    let position = geometry
                        .positions
                        .get(corner)
                        .ok_or_else(|| missing("position"))?;
                    let normal = match &geometry.normals {
                        Some(normals) => normals.get(corner).ok_or_else(|| missing("normal"))?,
                        None => Vec3::ZERO,
                    };
                    let uv = match &geometry.uvs {
                        Some(uvs) => uvs.get(corner).ok_or_else(|| missing("uv"))?,
                        None => Vec2::ZERO,
                    };

                    records[span.first_slot + k] = InterleavedVertex::new(position, normal, uv);
                }

                // corner_total fits in u32, checked when the layout was built
                for triangle in triangulate(span.first_slot as u32, span.vertex_count) {
                    indices.extend_from_slice(&triangle);
                }
            }
        }

        debug_assert_eq!(indices.len(), layout.triangle_total * INDICES_PER_TRIANGLE);

        let stats = ExtractStats {
            meshes: document.meshes.len(),
            polygons: layout.spans.len(),
            skipped_polygons: layout.skipped,
        };

        debug!(
            "Extracted {} vertices, {} triangles from {} meshes ({} polygons skipped)",
            layout.corner_total, layout.triangle_total, stats.meshes, stats.skipped_polygons
        );

        Ok(ExtractedMesh {
            vertices,
            indices,
            stats,
        })
    }
}

/// Extract with default options.
pub fn extract_mesh(document: &SceneDocument) -> Result<ExtractedMesh, ExtractError> {
    MeshExtractor::default().extract(document)
}
