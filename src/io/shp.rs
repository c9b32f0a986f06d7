use std::{fs, path::Path, sync::LazyLock};

use anyhow::{Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use regex::Regex;
use serde_json::{json, Map, Value};
use shapefile::{dbase::FieldValue, Reader, Shape};

use crate::crs::Crs;
use crate::feature::Feature;
use crate::io::VectorSource;

static AUTHORITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"AUTHORITY\["EPSG",\s*"?(\d+)"?\]"#).expect("valid AUTHORITY pattern")
});

/// Reads all shapes + attribute records from a given `.shp` file path.
pub fn read_shapefile(path: &Path) -> Result<VectorSource> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;

    let mut features = Vec::with_capacity(reader.shape_count()?);
    for (idx, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result.context("Error reading shape+record")?;
        let properties: Map<String, Value> = record.into_iter()
            .map(|(field, value)| (field, field_to_json(value)))
            .collect();
        features.push(Feature::from_parts(idx, shape_to_geo(&shape), properties));
    }

    Ok(VectorSource::new(features, read_prj(path)))
}

/// Polygon shapes become a MultiPolygon; null and non-polygonal shapes become empty.
fn shape_to_geo(shape: &Shape) -> MultiPolygon<f64> {
    fn xy<P>(rings: &[shapefile::PolygonRing<P>], f: impl Fn(&P) -> Coord<f64>) -> Vec<Vec<Coord<f64>>> {
        rings.iter().map(|ring| ring.points().iter().map(&f).collect()).collect()
    }

    match shape {
        Shape::Polygon(p) => rings_to_geo(xy(p.rings(), |pt| Coord { x: pt.x, y: pt.y })),
        Shape::PolygonM(p) => rings_to_geo(xy(p.rings(), |pt| Coord { x: pt.x, y: pt.y })),
        Shape::PolygonZ(p) => rings_to_geo(xy(p.rings(), |pt| Coord { x: pt.x, y: pt.y })),
        Shape::NullShape => MultiPolygon(vec![]),
        other => {
            log::debug!("reading non-polygonal {:?} shape as empty", other.shapetype());
            MultiPolygon(vec![])
        }
    }
}

/// Group shapefile rings into polygons: each clockwise exterior owns the holes that follow it.
fn rings_to_geo(rings: Vec<Vec<Coord<f64>>>) -> MultiPolygon<f64> {
    /// Get the signed area of a geo::Coord list (negative for clockwise)
    fn signed_area(pts: &[Coord<f64>]) -> f64 {
        pts.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum::<f64>() / 2.0
    }

    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<LineString<f64>> = None;
    let mut current_holes: Vec<LineString<f64>> = Vec::new();

    for mut coords in rings {
        if !coords.is_empty() && coords[0] != coords[coords.len() - 1] {
            coords.push(coords[0]);
        }
        let is_exterior = signed_area(&coords) < 0.0;
        let ring = LineString(coords);

        if is_exterior || current_exterior.is_none() {
            if let Some(ext) = current_exterior.take() {
                polys.push(Polygon::new(ext, std::mem::take(&mut current_holes)));
            }
            current_exterior = Some(ring);
        } else {
            current_holes.push(ring);
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(Polygon::new(ext, current_holes));
    }

    MultiPolygon(polys)
}

fn field_to_json(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(s) => s.map_or(Value::Null, Value::String),
        FieldValue::Numeric(n) => n.map_or(Value::Null, |n| json!(n)),
        FieldValue::Float(n) => n.map_or(Value::Null, |n| json!(n)),
        FieldValue::Logical(b) => b.map_or(Value::Null, Value::Bool),
        FieldValue::Integer(n) => json!(n),
        FieldValue::Double(n) => json!(n),
        FieldValue::Currency(n) => json!(n),
        FieldValue::Memo(s) => Value::String(s),
        other => Value::String(format!("{other:?}")),
    }
}

/// CRS from the sibling `.prj` file, when one exists and is recognisable.
fn read_prj(shp_path: &Path) -> Option<Crs> {
    let prj_path = shp_path.with_extension("prj");
    let wkt = fs::read_to_string(&prj_path).ok()?;
    let crs = crs_from_wkt(&wkt);
    if crs.is_none() {
        log::warn!("could not identify CRS from {}", prj_path.display());
    }
    crs
}

/// The outermost `AUTHORITY["EPSG", ...]` is the last one in the string. ESRI-flavoured WKT
/// usually has none, so a few well known names are matched as well.
fn crs_from_wkt(wkt: &str) -> Option<Crs> {
    if let Some(caps) = AUTHORITY_PATTERN.captures_iter(wkt).last() {
        if let Ok(crs) = Crs::parse(&format!("EPSG:{}", &caps[1])) {
            return Some(crs);
        }
    }

    let wkt = wkt.trim_start();
    if wkt.contains("Web_Mercator") || wkt.contains("Pseudo-Mercator") || wkt.contains("Mercator_Auxiliary_Sphere") {
        return Crs::from_epsg(3857).ok();
    }
    if wkt.starts_with("GEOGCS") {
        if wkt.contains("WGS_1984") || wkt.contains("WGS 84") {
            return Some(Crs::wgs84());
        }
        if wkt.contains("North_American_1983") || wkt.contains("NAD83") {
            return Crs::from_epsg(4269).ok();
        }
    }
    None
}
