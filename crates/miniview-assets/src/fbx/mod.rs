//! Binary FBX reader.
//!
//! Only what mesh extraction needs is decoded: geometry records with their
//! positions, first normal/uv layers and per-polygon materials. Skins,
//! deformers, cameras, lights and animation are skipped.

mod geometry;
mod node;
#[cfg(test)]
pub(crate) mod writer;

pub use geometry::build_scene;
pub use node::{parse_tree, FbxTree, Node, Property};

use tracing::debug;

use crate::error::FbxError;
use crate::scene::SceneDocument;

/// Parse a binary FBX file held in memory into a scene document.
pub fn parse_fbx(data: &[u8]) -> Result<SceneDocument, FbxError> {
    let tree = parse_tree(data)?;
    debug!("FBX version {}, {} top-level records", tree.version, tree.roots.len());
    build_scene(&tree)
}
