//! Binary FBX node-record tree.
//!
//! A file is a 27-byte header followed by node records. Each record holds
//! `end_offset`, `num_properties`, `property_list_len` (u32 before version
//! 7500, u64 after), a length-prefixed name, the properties, and optionally
//! nested records closed by an all-zero null record.

use std::borrow::Cow;

use nom::bytes::complete::{tag, take};
use nom::multi::length_data;
use nom::number::complete::{le_f32, le_f64, le_i16, le_i32, le_i64, le_u32, le_u64, le_u8};
use nom::sequence::tuple;
use nom::IResult;

use crate::error::FbxError;

pub const MAGIC: &[u8] = b"Kaydara FBX Binary  \0";

/// First version whose record headers use 64-bit fields.
pub const WIDE_RECORD_VERSION: u32 = 7500;

/// Deepest record nesting accepted; top-level records are at depth 0.
pub const MAX_NESTING_DEPTH: usize = 64;

type Res<'a, T> = IResult<&'a [u8], T>;

/// A typed node property.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    I16(i16),
    Bool(bool),
    I32(i32),
    F32(f32),
    F64(f64),
    I64(i64),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
    I64Array(Vec<i64>),
    I32Array(Vec<i32>),
    BoolArray(Vec<bool>),
    String(String),
    Raw(Vec<u8>),
}

impl Property {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Property::I16(v) => Some(v.into()),
            Property::I32(v) => Some(v.into()),
            Property::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32_array(&self) -> Option<&[i32]> {
        match self {
            Property::I32Array(v) => Some(v),
            _ => None,
        }
    }

    /// Float arrays of either precision, widened to f64.
    pub fn as_f64_array(&self) -> Option<Cow<'_, [f64]>> {
        match self {
            Property::F64Array(v) => Some(Cow::Borrowed(v)),
            Property::F32Array(v) => Some(Cow::Owned(v.iter().map(|&x| f64::from(x)).collect())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>, properties: Vec<Property>, children: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            properties,
            children,
        }
    }

    /// First child called `name`.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    /// First property of the child called `name`.
    pub fn child_value(&self, name: &str) -> Option<&Property> {
        self.child(name).and_then(|c| c.property(0))
    }
}

/// A decoded file: format version and top-level records.
#[derive(Debug, Clone, PartialEq)]
pub struct FbxTree {
    pub version: u32,
    pub roots: Vec<Node>,
}

impl FbxTree {
    pub fn root(&self, name: &str) -> Option<&Node> {
        self.roots.iter().find(|n| n.name == name)
    }
}

/// Fixed-width little-endian array element.
trait ArrayElement: Sized {
    const SIZE: usize;
    fn read(bytes: &[u8]) -> Self;
}

macro_rules! le_array_element {
    ($($t:ty),*) => {
        $(
            impl ArrayElement for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn read(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(bytes);
                    <$t>::from_le_bytes(raw)
                }
            }
        )*
    };
}

le_array_element!(f32, f64, i32, i64);

impl ArrayElement for bool {
    const SIZE: usize = 1;

    fn read(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

fn decode_elements<T: ArrayElement>(raw: &[u8]) -> Vec<T> {
    raw.chunks_exact(T::SIZE).map(T::read).collect()
}

fn header(input: &[u8]) -> Res<'_, u32> {
    let (input, _) = tag(MAGIC)(input)?;
    let (input, _) = take(2usize)(input)?;
    le_u32(input)
}

/// Parse the node tree of a binary FBX file.
pub fn parse_tree(data: &[u8]) -> Result<FbxTree, FbxError> {
    let (mut input, version) = header(data).map_err(|_| FbxError::NotBinary)?;

    let reader = RecordReader {
        data,
        wide: version >= WIDE_RECORD_VERSION,
    };

    let mut roots = Vec::new();
    while !input.is_empty() {
        let (rest, node) = reader.node(input, 0)?;
        input = rest;
        match node {
            Some(node) => roots.push(node),
            // Anything after the top-level null record is the footer.
            None => break,
        }
    }

    Ok(FbxTree { version, roots })
}

struct RecordReader<'d> {
    data: &'d [u8],
    wide: bool,
}

impl<'d> RecordReader<'d> {
    /// Absolute position of `input`, which is always a suffix of `data`.
    fn offset(&self, input: &[u8]) -> usize {
        self.data.len() - input.len()
    }

    fn nom_error(&self, err: nom::Err<nom::error::Error<&[u8]>>) -> FbxError {
        match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => FbxError::Truncated(self.offset(e.input)),
            nom::Err::Incomplete(_) => FbxError::Truncated(self.data.len()),
        }
    }

    fn malformed(&self, offset: usize, reason: impl Into<String>) -> FbxError {
        FbxError::MalformedNode {
            offset,
            reason: reason.into(),
        }
    }

    fn record_header<'a>(&self, input: &'a [u8]) -> Result<(&'a [u8], [u64; 3]), FbxError> {
        let parsed: Res<'a, [u64; 3]> = if self.wide {
            tuple((le_u64, le_u64, le_u64))(input).map(|(i, (a, b, c))| (i, [a, b, c]))
        } else {
            tuple((le_u32, le_u32, le_u32))(input)
                .map(|(i, (a, b, c))| (i, [a.into(), b.into(), c.into()]))
        };
        parsed.map_err(|e| self.nom_error(e))
    }

    /// One record, or `None` for a null record.
    fn node<'a>(&self, input: &'a [u8], depth: usize) -> Result<(&'a [u8], Option<Node>), FbxError> {
        let start = self.offset(input);
        let (input, [end_offset, num_properties, property_list_len]) = self.record_header(input)?;
        let parsed: Res<'a, &'a [u8]> = length_data(le_u8)(input);
        let (mut input, name) = parsed.map_err(|e| self.nom_error(e))?;

        if end_offset == 0 {
            return Ok((input, None));
        }
        if depth > MAX_NESTING_DEPTH {
            return Err(self.malformed(start, "nesting too deep"));
        }

        let end_offset = usize::try_from(end_offset)
            .ok()
            .filter(|&end| end > start && end <= self.data.len())
            .ok_or_else(|| self.malformed(start, format!("end offset {end_offset} out of bounds")))?;

        let properties_start = self.offset(input);
        let mut properties = Vec::new();
        for _ in 0..num_properties {
            let (rest, property) = self.property(input)?;
            input = rest;
            properties.push(property);
        }

        let properties_len = (self.offset(input) - properties_start) as u64;
        if properties_len != property_list_len {
            return Err(self.malformed(
                start,
                format!("property list is {properties_len} bytes, header says {property_list_len}"),
            ));
        }

        let mut children = Vec::new();
        while self.offset(input) < end_offset {
            let (rest, child) = self.node(input, depth + 1)?;
            input = rest;
            match child {
                Some(child) => children.push(child),
                None => break,
            }
        }

        if self.offset(input) != end_offset {
            return Err(self.malformed(
                start,
                format!("record ends at byte {}, header says {end_offset}", self.offset(input)),
            ));
        }

        Ok((
            input,
            Some(Node {
                name: String::from_utf8_lossy(name).into_owned(),
                properties,
                children,
            }),
        ))
    }

    fn property<'a>(&self, input: &'a [u8]) -> Result<(&'a [u8], Property), FbxError> {
        let offset = self.offset(input);
        let parsed: Res<'a, u8> = le_u8(input);
        let (input, code) = parsed.map_err(|e| self.nom_error(e))?;

        let parsed: Res<'a, Property> = match code {
            b'Y' => le_i16(input).map(|(i, v)| (i, Property::I16(v))),
            b'C' => le_u8(input).map(|(i, v)| (i, Property::Bool(v != 0))),
            b'I' => le_i32(input).map(|(i, v)| (i, Property::I32(v))),
            b'F' => le_f32(input).map(|(i, v)| (i, Property::F32(v))),
            b'D' => le_f64(input).map(|(i, v)| (i, Property::F64(v))),
            b'L' => le_i64(input).map(|(i, v)| (i, Property::I64(v))),
            b'S' => length_data(le_u32)(input).map(|(i, bytes)| {
                (i, Property::String(String::from_utf8_lossy(bytes).into_owned()))
            }),
            b'R' => length_data(le_u32)(input).map(|(i, bytes)| (i, Property::Raw(bytes.to_vec()))),
            b'f' => return self.array(input).map(|(i, v)| (i, Property::F32Array(v))),
            b'd' => return self.array(input).map(|(i, v)| (i, Property::F64Array(v))),
            b'l' => return self.array(input).map(|(i, v)| (i, Property::I64Array(v))),
            b'i' => return self.array(input).map(|(i, v)| (i, Property::I32Array(v))),
            b'b' => return self.array(input).map(|(i, v)| (i, Property::BoolArray(v))),
            other => {
                return Err(FbxError::UnknownProperty {
                    code: other as char,
                    offset,
                })
            }
        };
        parsed.map_err(|e| self.nom_error(e))
    }

    fn array<'a, T: ArrayElement>(&self, input: &'a [u8]) -> Result<(&'a [u8], Vec<T>), FbxError> {
        let parsed: Res<'a, (u32, u32, u32)> = tuple((le_u32, le_u32, le_u32))(input);
        let (input, (length, encoding, compressed_length)) = parsed.map_err(|e| self.nom_error(e))?;
        let byte_len = length as usize * T::SIZE;

        match encoding {
            0 => {
                let parsed: Res<'a, &'a [u8]> = take(byte_len)(input);
                let (input, raw) = parsed.map_err(|e| self.nom_error(e))?;
                Ok((input, decode_elements(raw)))
            }
            1 => {
                let parsed: Res<'a, &'a [u8]> = take(compressed_length)(input);
                let (input, deflated) = parsed.map_err(|e| self.nom_error(e))?;
                let inflated = inflate::inflate_bytes_zlib(deflated).map_err(FbxError::Inflate)?;
                if inflated.len() != byte_len {
                    return Err(FbxError::Inflate(format!(
                        "expected {byte_len} bytes, got {}",
                        inflated.len()
                    )));
                }
                Ok((input, decode_elements(&inflated)))
            }
            other => Err(FbxError::UnsupportedEncoding(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbx::writer::FbxWriter;

    fn sample_tree() -> Vec<Node> {
        vec![
            Node::new(
                "FBXHeaderExtension",
                vec![],
                vec![Node::new("FBXVersion", vec![Property::I32(7400)], vec![])],
            ),
            Node::new(
                "Objects",
                vec![],
                vec![Node::new(
                    "Geometry",
                    vec![
                        Property::I64(42),
                        Property::String("Cube\0\x01Geometry".into()),
                        Property::String("Mesh".into()),
                    ],
                    vec![
                        Node::new("Vertices", vec![Property::F64Array(vec![0.0, 1.5, -2.0])], vec![]),
                        Node::new("PolygonVertexIndex", vec![Property::I32Array(vec![0, 1, -3])], vec![]),
                        Node::new(
                            "Flags",
                            vec![
                                Property::I16(-2),
                                Property::Bool(true),
                                Property::F32(0.5),
                                Property::F64(0.25),
                                Property::F32Array(vec![1.0, 2.0]),
                                Property::I64Array(vec![i64::MIN, 7]),
                                Property::BoolArray(vec![true, false, true]),
                                Property::Raw(vec![0xde, 0xad]),
                            ],
                            vec![],
                        ),
                    ],
                )],
            ),
        ]
    }

    #[test]
    fn reads_32_bit_records() {
        let data = FbxWriter::new(7400).finish(&sample_tree());
        let tree = parse_tree(&data).unwrap();
        assert_eq!(tree.version, 7400);
        assert_eq!(tree.roots, sample_tree());
    }

    #[test]
    fn reads_64_bit_records() {
        let data = FbxWriter::new(7500).finish(&sample_tree());
        let tree = parse_tree(&data).unwrap();
        assert_eq!(tree.version, 7500);
        assert_eq!(tree.roots, sample_tree());
    }

    #[test]
    fn reads_zlib_compressed_arrays() {
        let data = FbxWriter::new(7400).compressed().finish(&sample_tree());
        let tree = parse_tree(&data).unwrap();
        assert_eq!(tree.roots, sample_tree());
    }

    /// Zlib stream produced by a real deflater (fixed Huffman codes with
    /// back-references) for 24 little-endian f64 values cycling 0.0..=2.0.
    const DEFLATED_F64S: [u8; 26] = [
        0x78, 0xda, 0x63, 0x60, 0x40, 0x06, 0x0f, 0xec, 0x21, 0xf4, 0x07, 0x28, 0xfd, 0x03, 0x4a,
        0x33, 0x38, 0x30, 0x0c, 0x52, 0x75, 0x00, 0x86, 0x73, 0x12, 0x9a,
    ];

    #[test]
    fn reads_deflate_compressed_arrays() {
        let mut record = Vec::new();
        record.push(b'd');
        record.extend_from_slice(&24u32.to_le_bytes());
        record.extend_from_slice(&1u32.to_le_bytes());
        record.extend_from_slice(&(DEFLATED_F64S.len() as u32).to_le_bytes());
        record.extend_from_slice(&DEFLATED_F64S);

        let name = b"Vertices";
        let start = 27;
        let end = start + 12 + 1 + name.len() + record.len();

        let mut data = MAGIC.to_vec();
        data.extend_from_slice(&[0x1a, 0x00]);
        data.extend_from_slice(&7400u32.to_le_bytes());
        data.extend_from_slice(&(end as u32).to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&(record.len() as u32).to_le_bytes());
        data.push(name.len() as u8);
        data.extend_from_slice(name);
        data.extend_from_slice(&record);
        data.extend_from_slice(&[0; 13]);

        let tree = parse_tree(&data).unwrap();
        let values = tree.roots[0].properties[0].as_f64_array().unwrap();
        let expected = (0..24).map(|i| (i % 5) as f64 * 0.5).collect::<Vec<_>>();
        assert_eq!(values.as_ref(), expected.as_slice());
    }

    /// A chain of `depth` empty records, each the only child of the one
    /// before, built without recursion.
    fn nested_records(depth: usize) -> Vec<u8> {
        const RECORD: usize = 12 + 1 + 1;
        const NULL_RECORD: usize = 13;

        let mut data = MAGIC.to_vec();
        data.extend_from_slice(&[0x1a, 0x00]);
        data.extend_from_slice(&7400u32.to_le_bytes());
        let records_end = 27 + RECORD * depth;
        for k in 0..depth {
            let end = records_end + NULL_RECORD * (depth - 1 - k);
            data.extend_from_slice(&(end as u32).to_le_bytes());
            data.extend_from_slice(&[0; 8]);
            data.extend_from_slice(&[1, b'N']);
        }
        // Closes every record that has a child, then the top level.
        data.resize(data.len() + NULL_RECORD * depth, 0);
        data
    }

    #[test]
    fn accepts_nesting_up_to_the_limit() {
        let tree = parse_tree(&nested_records(MAX_NESTING_DEPTH + 1)).unwrap();
        let mut depth = 0;
        let mut node = &tree.roots[0];
        while let Some(child) = node.children.first() {
            node = child;
            depth += 1;
        }
        assert_eq!(depth, MAX_NESTING_DEPTH);
    }

    #[test]
    fn rejects_deeply_nested_records() {
        match parse_tree(&nested_records(20_000)) {
            Err(FbxError::MalformedNode { offset, reason }) => {
                assert_eq!(reason, "nesting too deep");
                assert_eq!(offset, 27 + 14 * (MAX_NESTING_DEPTH + 1));
            }
            other => panic!("expected MalformedNode, got: {:?}", other),
        }
    }

    #[test]
    fn ignores_footer_after_null_record() {
        let mut data = FbxWriter::new(7400).finish(&sample_tree());
        data.extend_from_slice(&[0xfa, 0xbc, 0xab, 0x09, 0xd0, 0xc8, 0xd4, 0x66]);
        assert_eq!(parse_tree(&data).unwrap().roots.len(), 2);
    }

    #[test]
    fn rejects_ascii_fbx() {
        let data = b"; FBX 7.4.0 project file\nFBXHeaderExtension:  {\n}\n";
        assert!(matches!(parse_tree(data), Err(FbxError::NotBinary)));
    }

    #[test]
    fn rejects_truncated_file() {
        let data = FbxWriter::new(7400).finish(&sample_tree());
        let cut = &data[..data.len() / 2];
        assert!(matches!(
            parse_tree(cut),
            Err(FbxError::Truncated(_)) | Err(FbxError::MalformedNode { .. })
        ));
    }

    #[test]
    fn rejects_unknown_property_code() {
        let mut data = FbxWriter::new(7400).finish(&[Node::new("Bad", vec![Property::I32(1)], vec![])]);
        // header (27) + record header (12) + name length and name (4)
        let code_at = 27 + 12 + 4;
        assert_eq!(data[code_at], b'I');
        data[code_at] = b'?';
        assert!(matches!(
            parse_tree(&data),
            Err(FbxError::UnknownProperty { code: '?', .. })
        ));
    }

    #[test]
    fn rejects_end_offset_past_end_of_file() {
        let mut data = FbxWriter::new(7400).finish(&[Node::new("Empty", vec![], vec![])]);
        data[27..31].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            parse_tree(&data),
            Err(FbxError::MalformedNode { offset: 27, .. })
        ));
    }

    #[test]
    fn f32_arrays_widen_to_f64() {
        let property = Property::F32Array(vec![0.5, 2.0]);
        assert_eq!(property.as_f64_array().unwrap().as_ref(), &[0.5, 2.0]);
        assert!(Property::I32(3).as_f64_array().is_none());
        assert_eq!(Property::I16(-3).as_i64(), Some(-3));
    }
}
