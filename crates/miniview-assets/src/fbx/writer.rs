//! Minimal binary FBX writer used to build test fixtures.

use super::node::{Node, Property, MAGIC, WIDE_RECORD_VERSION};

pub(crate) struct FbxWriter {
    out: Vec<u8>,
    wide: bool,
    compress: bool,
}

impl FbxWriter {
    pub(crate) fn new(version: u32) -> Self {
        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&[0x1a, 0x00]);
        out.extend_from_slice(&version.to_le_bytes());
        Self {
            out,
            wide: version >= WIDE_RECORD_VERSION,
            compress: false,
        }
    }

    /// Store every array as a zlib stream.
    pub(crate) fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    pub(crate) fn finish(mut self, roots: &[Node]) -> Vec<u8> {
        for node in roots {
            self.node(node);
        }
        self.null_record();
        self.out
    }

    fn word_size(&self) -> usize {
        if self.wide {
            8
        } else {
            4
        }
    }

    fn word(&mut self, value: u64) {
        if self.wide {
            self.out.extend_from_slice(&value.to_le_bytes());
        } else {
            self.out.extend_from_slice(&(value as u32).to_le_bytes());
        }
    }

    fn patch(&mut self, at: usize, value: u64) {
        if self.wide {
            self.out[at..at + 8].copy_from_slice(&value.to_le_bytes());
        } else {
            self.out[at..at + 4].copy_from_slice(&(value as u32).to_le_bytes());
        }
    }

    fn null_record(&mut self) {
        let len = self.word_size() * 3 + 1;
        self.out.resize(self.out.len() + len, 0);
    }

    fn node(&mut self, node: &Node) {
        let header_at = self.out.len();
        self.word(0);
        self.word(node.properties.len() as u64);
        self.word(0);
        self.out.push(node.name.len() as u8);
        self.out.extend_from_slice(node.name.as_bytes());

        let properties_at = self.out.len();
        for property in &node.properties {
            self.property(property);
        }
        let properties_len = (self.out.len() - properties_at) as u64;

        if !node.children.is_empty() {
            for child in &node.children {
                self.node(child);
            }
            self.null_record();
        }

        let end = self.out.len() as u64;
        let word = self.word_size();
        self.patch(header_at, end);
        self.patch(header_at + 2 * word, properties_len);
    }

    fn property(&mut self, property: &Property) {
        match property {
            Property::I16(v) => self.scalar(b'Y', &v.to_le_bytes()),
            Property::Bool(v) => self.scalar(b'C', &[u8::from(*v)]),
            Property::I32(v) => self.scalar(b'I', &v.to_le_bytes()),
            Property::F32(v) => self.scalar(b'F', &v.to_le_bytes()),
            Property::F64(v) => self.scalar(b'D', &v.to_le_bytes()),
            Property::I64(v) => self.scalar(b'L', &v.to_le_bytes()),
            Property::F32Array(v) => {
                self.array(b'f', v.len(), v.iter().flat_map(|x| x.to_le_bytes()).collect())
            }
            Property::F64Array(v) => {
                self.array(b'd', v.len(), v.iter().flat_map(|x| x.to_le_bytes()).collect())
            }
            Property::I64Array(v) => {
                self.array(b'l', v.len(), v.iter().flat_map(|x| x.to_le_bytes()).collect())
            }
            Property::I32Array(v) => {
                self.array(b'i', v.len(), v.iter().flat_map(|x| x.to_le_bytes()).collect())
            }
            Property::BoolArray(v) => {
                self.array(b'b', v.len(), v.iter().map(|&x| u8::from(x)).collect())
            }
            Property::String(s) => self.blob(b'S', s.as_bytes()),
            Property::Raw(bytes) => self.blob(b'R', bytes),
        }
    }

    fn scalar(&mut self, code: u8, bytes: &[u8]) {
        self.out.push(code);
        self.out.extend_from_slice(bytes);
    }

    fn blob(&mut self, code: u8, bytes: &[u8]) {
        self.out.push(code);
        self.out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        self.out.extend_from_slice(bytes);
    }

    fn array(&mut self, code: u8, len: usize, raw: Vec<u8>) {
        self.out.push(code);
        self.out.extend_from_slice(&(len as u32).to_le_bytes());
        let (encoding, payload) = if self.compress {
            (1u32, zlib_stored(&raw))
        } else {
            (0u32, raw)
        };
        self.out.extend_from_slice(&encoding.to_le_bytes());
        self.out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.out.extend_from_slice(&payload);
    }
}

/// Wrap `data` in a zlib stream made of uncompressed deflate blocks.
pub(crate) fn zlib_stored(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x78, 0x01];

    let mut blocks: Vec<&[u8]> = data.chunks(u16::MAX as usize).collect();
    if blocks.is_empty() {
        blocks.push(&[]);
    }
    let last = blocks.len() - 1;
    for (i, block) in blocks.iter().enumerate() {
        let len = block.len() as u16;
        out.push(u8::from(i == last));
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(block);
    }

    let (mut a, mut b) = (1u32, 0u32);
    for &byte in data {
        a = (a + u32::from(byte)) % 65521;
        b = (b + a) % 65521;
    }
    out.extend_from_slice(&((b << 16) | a).to_be_bytes());
    out
}
