use std::path::PathBuf;

/// Errors raised while decoding a binary FBX stream into a scene document.
#[derive(Debug, thiserror::Error)]
pub enum FbxError {
    #[error("not a binary FBX file")]
    NotBinary,

    #[error("unexpected end of data at byte {0}")]
    Truncated(usize),

    #[error("malformed node record at byte {offset}: {reason}")]
    MalformedNode { offset: usize, reason: String },

    #[error("unknown property type code {code:?} at byte {offset}")]
    UnknownProperty { code: char, offset: usize },

    #[error("unsupported array encoding {0}")]
    UnsupportedEncoding(u32),

    #[error("failed to inflate compressed array: {0}")]
    Inflate(String),

    #[error("invalid geometry '{geometry}': {reason}")]
    InvalidGeometry { geometry: String, reason: String },
}

/// Errors raised while expanding a scene document into vertex and index buffers.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("mesh {mesh}: polygon {polygon} has only {corners} corners")]
    DegeneratePolygon {
        mesh: usize,
        polygon: usize,
        corners: u32,
    },

    #[error("mesh {mesh}: polygon corners {from}..{to} exceed the {available} corners of the mesh")]
    CornerOutOfRange {
        mesh: usize,
        from: u64,
        to: u64,
        available: usize,
    },

    #[error("mesh {mesh}: {stream} stream has no value for corner {corner}")]
    MissingAttribute {
        mesh: usize,
        corner: usize,
        stream: &'static str,
    },

    #[error("scene has {0} corners, more than a 32-bit index buffer can address")]
    IndexOverflow(usize),
}

/// Errors that can occur during asset import.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error loading '{0}': {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("no scene could be loaded from '{0}'")]
    NoScene(PathBuf, #[source] FbxError),

    #[error("scene '{0}' contains no meshes")]
    NoMeshes(PathBuf),

    #[error("failed to extract geometry from '{0}'")]
    Extract(PathBuf, #[source] ExtractError),
}
