use anyhow::{anyhow, Result};
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, Value};
use serde::Deserialize;
use std::collections::HashMap;

/// A TopoJSON topology: shared borders stored once as arcs, polygons
/// referencing arcs by index. Quantized topologies delta-encode arc points
/// and carry a transform back to map coordinates.
#[derive(Debug, Clone, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub transform: Option<Transform>,
    pub arcs: Vec<Vec<Vec<f64>>>,
    pub objects: HashMap<String, TopoGeometry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transform {
    pub scale: [f64; 2],
    pub translate: [f64; 2],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum TopoGeometry {
    GeometryCollection {
        geometries: Vec<TopoGeometry>,
    },
    Polygon {
        arcs: Vec<Vec<i64>>,
        #[serde(default)]
        id: Option<serde_json::Value>,
    },
    MultiPolygon {
        arcs: Vec<Vec<Vec<i64>>>,
        #[serde(default)]
        id: Option<serde_json::Value>,
    },
}

impl TopoGeometry {
    /// Number of leaf geometries, before any decoding.
    pub fn geometry_count(&self) -> usize {
        match self {
            TopoGeometry::GeometryCollection { geometries } => {
                geometries.iter().map(|g| g.geometry_count()).sum()
            }
            _ => 1,
        }
    }
}

/// Decode one named object of the topology into a GeoJSON feature
/// collection, one feature per leaf geometry. Decoding is a pure structural
/// transform; no geometry is dropped or duplicated.
pub fn feature(topology: &Topology, name: &str) -> Result<FeatureCollection> {
    let object = topology
        .objects
        .get(name)
        .ok_or_else(|| anyhow!("topology has no object named '{}'", name))?;

    let arcs = decode_arcs(topology);
    let mut features = Vec::new();
    collect_features(object, &arcs, &mut features)?;

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Expand every arc to absolute map coordinates: accumulate the deltas and
/// apply the topology transform when present.
fn decode_arcs(topology: &Topology) -> Vec<Vec<[f64; 2]>> {
    topology
        .arcs
        .iter()
        .map(|arc| {
            let mut x = 0.0;
            let mut y = 0.0;
            arc.iter()
                .map(|point| {
                    let px = *point.first().unwrap_or(&0.0);
                    let py = *point.get(1).unwrap_or(&0.0);
                    match &topology.transform {
                        Some(t) => {
                            x += px;
                            y += py;
                            [
                                x * t.scale[0] + t.translate[0],
                                y * t.scale[1] + t.translate[1],
                            ]
                        }
                        None => [px, py],
                    }
                })
                .collect()
        })
        .collect()
}

fn collect_features(
    geometry: &TopoGeometry,
    arcs: &[Vec<[f64; 2]>],
    out: &mut Vec<Feature>,
) -> Result<()> {
    match geometry {
        TopoGeometry::GeometryCollection { geometries } => {
            for child in geometries {
                collect_features(child, arcs, out)?;
            }
        }
        TopoGeometry::Polygon { arcs: rings, id } => {
            let value = Value::Polygon(polygon_rings(rings, arcs)?);
            out.push(make_feature(value, id));
        }
        TopoGeometry::MultiPolygon { arcs: polygons, id } => {
            let value = Value::MultiPolygon(
                polygons
                    .iter()
                    .map(|rings| polygon_rings(rings, arcs))
                    .collect::<Result<Vec<_>>>()?,
            );
            out.push(make_feature(value, id));
        }
    }
    Ok(())
}

fn polygon_rings(rings: &[Vec<i64>], arcs: &[Vec<[f64; 2]>]) -> Result<Vec<Vec<Vec<f64>>>> {
    rings.iter().map(|ring| stitch_ring(ring, arcs)).collect()
}

/// Stitch a ring from arc indices. A negative index means the complemented
/// arc (`!index`) traversed in reverse. Adjoining arcs share their junction
/// point, which is emitted once.
fn stitch_ring(arc_indices: &[i64], arcs: &[Vec<[f64; 2]>]) -> Result<Vec<Vec<f64>>> {
    let mut points: Vec<Vec<f64>> = Vec::new();
    for &index in arc_indices {
        let resolved = if index < 0 { !index } else { index } as usize;
        let arc = arcs
            .get(resolved)
            .ok_or_else(|| anyhow!("arc index {} out of range ({} arcs)", index, arcs.len()))?;
        if !points.is_empty() {
            points.pop();
        }
        if index < 0 {
            points.extend(arc.iter().rev().map(|p| vec![p[0], p[1]]));
        } else {
            points.extend(arc.iter().map(|p| vec![p[0], p[1]]));
        }
    }
    Ok(points)
}

fn make_feature(value: Value, id: &Option<serde_json::Value>) -> Feature {
    let id = match id {
        Some(serde_json::Value::Number(n)) => Some(Id::Number(n.clone())),
        Some(serde_json::Value::String(s)) => Some(Id::String(s.clone())),
        _ => None,
    };
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id,
        properties: None,
        foreign_members: None,
    }
}
