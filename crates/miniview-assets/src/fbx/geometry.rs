//! Builds [`SceneMesh`]es from `Objects/Geometry` records.

use glam::{Vec2, Vec3};
use tracing::debug;

use super::node::{FbxTree, Node, Property};
use crate::error::FbxError;
use crate::scene::{AttributeStream, GeometryData, GeometryPartition, Polygon, SceneDocument, SceneMesh};

/// How a layer element's values are assigned to the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mapping {
    ByPolygonVertex,
    ByControlPoint,
    ByPolygon,
    AllSame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reference {
    Direct,
    IndexToDirect,
}

/// Decoded `PolygonVertexIndex`: the control point of every corner and the
/// polygon list over those corners.
struct PolygonList {
    corner_points: Vec<u32>,
    polygons: Vec<Polygon>,
}

impl PolygonList {
    fn decode(raw: &[i32], control_point_count: usize) -> Result<Self, String> {
        let mut corner_points = Vec::with_capacity(raw.len());
        let mut polygons = Vec::new();
        let mut from = 0usize;

        for (corner, &value) in raw.iter().enumerate() {
            // a negative value closes the polygon and stores the index as !value
            let point = (if value < 0 { !value } else { value }) as u32;
            if point as usize >= control_point_count {
                return Err(format!(
                    "corner {corner} references control point {point}, mesh has {control_point_count}"
                ));
            }
            corner_points.push(point);

            if value < 0 {
                let end = corner + 1;
                polygons.push(Polygon::new(from as u32, (end - from) as u32));
                from = end;
            }
        }

        if from != raw.len() {
            return Err(format!("polygon starting at corner {from} is not terminated"));
        }

        Ok(Self {
            corner_points,
            polygons,
        })
    }

    fn corner_count(&self) -> usize {
        self.corner_points.len()
    }

    /// Polygon number of every corner.
    fn corner_polygons(&self) -> Vec<u32> {
        let mut owners = Vec::with_capacity(self.corner_count());
        for (index, polygon) in self.polygons.iter().enumerate() {
            owners.extend(std::iter::repeat(index as u32).take(polygon.vertex_count as usize));
        }
        owners
    }
}

/// Collect every `Geometry` record of class `Mesh`, in file order.
pub fn build_scene(tree: &FbxTree) -> Result<SceneDocument, FbxError> {
    let Some(objects) = tree.root("Objects") else {
        debug!("FBX file has no Objects section");
        return Ok(SceneDocument::default());
    };

    let mut meshes = Vec::new();
    for node in objects.children_named("Geometry") {
        if node.property(2).and_then(Property::as_str) != Some("Mesh") {
            continue;
        }

        let name = object_name(node);
        let geometry = read_geometry(node).map_err(|reason| FbxError::InvalidGeometry {
            geometry: name.clone(),
            reason,
        })?;

        debug!(
            "Geometry '{}': {} corners, {} partitions, normals: {}, uvs: {}",
            name,
            geometry.corner_count(),
            geometry.partitions.len(),
            geometry.normals.is_some(),
            geometry.uvs.is_some()
        );
        meshes.push(SceneMesh { name, geometry });
    }

    Ok(SceneDocument::new(meshes))
}

/// Object names are stored as `Name\0\x01Class`.
fn object_name(node: &Node) -> String {
    let raw = node.property(1).and_then(Property::as_str).unwrap_or("");
    let name = raw.split('\0').next().unwrap_or("");
    let name = name.strip_prefix("Geometry::").unwrap_or(name);
    if name.is_empty() {
        "unnamed".to_string()
    } else {
        name.to_string()
    }
}

fn f64_array(node: &Node, name: &str) -> Vec<f64> {
    node.child_value(name)
        .and_then(Property::as_f64_array)
        .map(|values| values.into_owned())
        .unwrap_or_default()
}

fn read_geometry(node: &Node) -> Result<GeometryData, String> {
    let vertices = f64_array(node, "Vertices");
    if vertices.len() % 3 != 0 {
        return Err(format!("{} vertex components is not a multiple of 3", vertices.len()));
    }
    let control_points: Vec<Vec3> = vertices
        .chunks_exact(3)
        .map(|c| Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32))
        .collect();

    let raw_polygons = node
        .child_value("PolygonVertexIndex")
        .and_then(Property::as_i32_array)
        .unwrap_or(&[]);
    let list = PolygonList::decode(raw_polygons, control_points.len())?;

    let normals = read_layer(node, "LayerElementNormal", "Normals", "NormalsIndex", 3, &list)?
        .map(|(values, indices)| {
            stream(
                values.chunks_exact(3).map(|c| Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32)).collect(),
                indices,
            )
        });
    let uvs = read_layer(node, "LayerElementUV", "UV", "UVIndex", 2, &list)?.map(|(values, indices)| {
        stream(
            values.chunks_exact(2).map(|c| Vec2::new(c[0] as f32, c[1] as f32)).collect(),
            indices,
        )
    });

    let partitions = partition_by_material(node, &list.polygons)?;

    Ok(GeometryData {
        positions: AttributeStream::indexed(control_points, list.corner_points),
        normals,
        uvs,
        partitions,
    })
}

fn stream<T: Copy>(values: Vec<T>, indices: Option<Vec<u32>>) -> AttributeStream<T> {
    match indices {
        Some(indices) => AttributeStream::indexed(values, indices),
        None => AttributeStream::direct(values),
    }
}

fn mapping(layer: &Node) -> Result<Mapping, String> {
    match layer.child_value("MappingInformationType").and_then(Property::as_str) {
        None | Some("ByPolygonVertex") => Ok(Mapping::ByPolygonVertex),
        Some("ByVertice") | Some("ByVertex") | Some("ByControlPoint") => Ok(Mapping::ByControlPoint),
        Some("ByPolygon") => Ok(Mapping::ByPolygon),
        Some("AllSame") => Ok(Mapping::AllSame),
        Some(other) => Err(format!("{}: unsupported mapping '{other}'", layer.name)),
    }
}

fn reference(layer: &Node) -> Result<Reference, String> {
    match layer.child_value("ReferenceInformationType").and_then(Property::as_str) {
        None | Some("Direct") => Ok(Reference::Direct),
        Some("IndexToDirect") | Some("Index") => Ok(Reference::IndexToDirect),
        Some(other) => Err(format!("{}: unsupported reference '{other}'", layer.name)),
    }
}

/// Values of the first `layer` element plus a per-corner index table, or
/// `None` when the mesh has no such layer. A `None` table means the values
/// are already one per corner.
fn read_layer(
    geometry: &Node,
    layer: &str,
    values_name: &str,
    index_name: &str,
    width: usize,
    list: &PolygonList,
) -> Result<Option<(Vec<f64>, Option<Vec<u32>>)>, String> {
    let Some(element) = geometry.child(layer) else {
        return Ok(None);
    };

    let values = f64_array(element, values_name);
    if values.len() % width != 0 {
        return Err(format!("{layer}: {} components is not a multiple of {width}", values.len()));
    }

    let mapping = mapping(element)?;
    let reference = reference(element)?;

    // element slot of every corner before any IndexToDirect lookup
    let slots: Option<Vec<u32>> = match mapping {
        Mapping::ByPolygonVertex => None,
        Mapping::ByControlPoint => Some(list.corner_points.clone()),
        Mapping::ByPolygon => Some(list.corner_polygons()),
        Mapping::AllSame => Some(vec![0; list.corner_count()]),
    };

    let indices = match reference {
        Reference::Direct => slots,
        Reference::IndexToDirect => {
            let table = element
                .child_value(index_name)
                .and_then(Property::as_i32_array)
                .ok_or_else(|| format!("{layer}: IndexToDirect without {index_name}"))?;
            let lookup = |slot: usize| -> Result<u32, String> {
                match table.get(slot) {
                    Some(&index) if index >= 0 => Ok(index as u32),
                    Some(&index) => Err(format!("{layer}: negative index {index} at {slot}")),
                    None => Err(format!("{layer}: {index_name} has no entry {slot}")),
                }
            };
            let resolved = match slots {
                Some(slots) => slots.iter().map(|&s| lookup(s as usize)).collect::<Result<_, _>>()?,
                None => (0..list.corner_count()).map(lookup).collect::<Result<_, _>>()?,
            };
            Some(resolved)
        }
    };

    Ok(Some((values, indices)))
}

/// Split polygons into one partition per material index.
fn partition_by_material(geometry: &Node, polygons: &[Polygon]) -> Result<Vec<GeometryPartition>, String> {
    let single = || {
        vec![GeometryPartition {
            polygons: polygons.to_vec(),
        }]
    };

    let Some(layer) = geometry.child("LayerElementMaterial") else {
        return Ok(single());
    };

    match mapping(layer)? {
        Mapping::AllSame => Ok(single()),
        Mapping::ByPolygon => {
            let materials = layer
                .child_value("Materials")
                .and_then(Property::as_i32_array)
                .unwrap_or(&[]);
            if materials.len() < polygons.len() {
                return Err(format!(
                    "{} material entries for {} polygons",
                    materials.len(),
                    polygons.len()
                ));
            }
            if let Some(&negative) = materials.iter().find(|&&m| m < 0) {
                return Err(format!("negative material index {negative}"));
            }

            let count = materials[..polygons.len()]
                .iter()
                .map(|&m| m as usize + 1)
                .max()
                .unwrap_or(0);
            let mut partitions = vec![GeometryPartition::default(); count];
            for (polygon, &material) in polygons.iter().zip(materials) {
                partitions[material as usize].polygons.push(*polygon);
            }
            Ok(partitions)
        }
        other => Err(format!("unsupported material mapping {other:?}")),
    }
}
