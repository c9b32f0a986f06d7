use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Map, Value};

use crate::crs::Crs;
use crate::feature::Feature;
use crate::io::VectorSource;

/// Read a GeoJSON FeatureCollection (or a single Feature).
pub fn read_geojson(path: &Path) -> Result<VectorSource> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read GeoJSON: {}", path.display()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse GeoJSON: {}", path.display()))?;
    parse_geojson(value)
}

/// Build a source from an already parsed GeoJSON value.
pub(crate) fn parse_geojson(mut value: Value) -> Result<VectorSource> {
    let crs = declared_crs(&value);
    let kind = value["type"].as_str().map(str::to_owned);

    let raw_features = match kind.as_deref() {
        Some("FeatureCollection") => match value.get_mut("features").map(Value::take) {
            Some(Value::Array(features)) => features,
            _ => return Err(anyhow!("FeatureCollection has no features array")),
        },
        Some("Feature") => vec![value],
        other => return Err(anyhow!("expected FeatureCollection or Feature, found {other:?}")),
    };

    let features = raw_features.into_iter().enumerate()
        .map(|(idx, raw)| {
            let geometry = parse_geometry(&raw["geometry"])
                .with_context(|| format!("Invalid geometry in feature {idx}"))?;
            let properties = match &raw["properties"] {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            Ok(Feature::new(idx, geometry, properties, raw))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(VectorSource::new(features, crs))
}

/// Legacy `crs` member, e.g. `{"type": "name", "properties": {"name": "EPSG:3857"}}`.
fn declared_crs(value: &Value) -> Option<Crs> {
    let name = value["crs"]["properties"]["name"].as_str()?;
    match Crs::parse(name) {
        Ok(crs) => Some(crs),
        Err(e) => {
            log::warn!("ignoring unrecognised GeoJSON crs member {name:?}: {e}");
            None
        }
    }
}

/// Polygon and MultiPolygon become a MultiPolygon; anything else (including null) is read as
/// an empty geometry so the feature is excluded downstream instead of failing the read.
fn parse_geometry(geometry: &Value) -> Result<MultiPolygon<f64>> {
    match geometry["type"].as_str() {
        Some("Polygon") => {
            let rings = geometry["coordinates"].as_array()
                .ok_or_else(|| anyhow!("Polygon coordinates must be an array"))?;
            Ok(MultiPolygon(parse_polygon_rings(rings)?.into_iter().collect()))
        }
        Some("MultiPolygon") => {
            let polygons = geometry["coordinates"].as_array()
                .ok_or_else(|| anyhow!("MultiPolygon coordinates must be an array"))?;
            let mut parts = Vec::with_capacity(polygons.len());
            for polygon in polygons {
                let rings = polygon.as_array()
                    .ok_or_else(|| anyhow!("MultiPolygon member must be an array of rings"))?;
                parts.extend(parse_polygon_rings(rings)?);
            }
            Ok(MultiPolygon(parts))
        }
        other => {
            if let Some(kind) = other {
                log::debug!("reading non-polygonal {kind} geometry as empty");
            }
            Ok(MultiPolygon(vec![]))
        }
    }
}

/// First ring is the exterior, the rest are holes. No rings gives no polygon.
fn parse_polygon_rings(rings: &[Value]) -> Result<Option<Polygon<f64>>> {
    let mut parsed = rings.iter()
        .map(|ring| ring.as_array()
            .ok_or_else(|| anyhow!("ring must be an array of positions"))
            .and_then(|coords| parse_ring_coords(coords)))
        .collect::<Result<Vec<_>>>()?
        .into_iter();

    Ok(parsed.next().map(|exterior| Polygon::new(exterior, parsed.collect())))
}

/// Parse a ring from `[[x, y], ...]`, closing it if needed.
fn parse_ring_coords(coords: &[Value]) -> Result<LineString<f64>> {
    let mut points = Vec::with_capacity(coords.len() + 1);
    for position in coords {
        let pair = position.as_array()
            .filter(|p| p.len() >= 2)
            .ok_or_else(|| anyhow!("position must have at least two numbers"))?;
        let x = pair[0].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: x must be a number"))?;
        let y = pair[1].as_f64().ok_or_else(|| anyhow!("Invalid coordinate: y must be a number"))?;
        points.push(Coord { x, y });
    }

    if !points.is_empty() && points[0] != points[points.len() - 1] {
        points.push(points[0]);
    }
    Ok(LineString(points))
}

/// GeoJSON MultiPolygon geometry object for a shape.
pub fn multipolygon_to_geojson(mp: &MultiPolygon<f64>) -> Value {
    let ring = |ls: &LineString<f64>| ls.coords().map(|c| vec![c.x, c.y]).collect::<Vec<_>>();
    let polygons: Vec<Value> = mp.0.iter()
        .map(|polygon| {
            let mut rings = vec![ring(polygon.exterior())];
            rings.extend(polygon.interiors().iter().map(ring));
            json!(rings)
        })
        .collect();

    json!({
        "type": "MultiPolygon",
        "coordinates": polygons,
    })
}

/// Wrap features into a FeatureCollection.
pub fn feature_collection<'a>(features: impl IntoIterator<Item = &'a Value>) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features.into_iter().cloned().collect::<Vec<_>>(),
    })
}
