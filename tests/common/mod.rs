// Shared fixtures for the pipeline integration tests:
//   five weighted polygons on a 100 m grid, an off-centre sliver, and
//   GeoTIFF read-back.
#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tiff::decoder::{Decoder, DecodingResult};

pub const RESOLUTION: f64 = 100.0;
pub const PIXEL_AREA: f64 = RESOLUTION * RESOLUTION;

/// A polygon feature; the ring is closed here.
pub fn polygon(coords: &[(f64, f64)], properties: Value) -> Value {
    let mut ring: Vec<[f64; 2]> = coords.iter().map(|&(x, y)| [x, y]).collect();
    ring.push(ring[0]);
    json!({
        "type": "Feature",
        "properties": properties,
        "geometry": { "type": "Polygon", "coordinates": [ring] },
    })
}

pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64, properties: Value) -> Value {
    polygon(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1)], properties)
}

/// Five shapes in EPSG:3857 whose centre-rasterized weights at 100 m (area factor 10 000)
/// form the block
///   1    0.5  0    0
///   0.5  0    0.5  0
///   0    0.5  1.25 0.25
///   0    0    0.25 0.25
/// over [-200, -200, 200, 200].
pub fn simple_polygons(properties: impl Fn(usize) -> Value) -> Vec<Value> {
    vec![
        rect(-200.0, 100.0, -100.0, 200.0, properties(0)),
        polygon(&[(-225.0, 25.0), (-175.0, -25.0), (25.0, 175.0), (-25.0, 225.0)], properties(1)),
        polygon(&[(-125.0, -75.0), (-75.0, -125.0), (125.0, 75.0), (75.0, 125.0)], properties(2)),
        rect(0.0, -200.0, 200.0, 0.0, properties(3)),
        rect(0.0, -100.0, 100.0, 0.0, properties(4)),
    ]
}

pub const SIMPLE_BLOCK: [[f32; 4]; 4] = [
    [1.0, 0.5, 0.0, 0.0],
    [0.5, 0.0, 0.5, 0.0],
    [0.0, 0.5, 1.25, 0.25],
    [0.0, 0.0, 0.25, 0.25],
];

/// A sliver in the north-east cell of [-100, -100, 100, 100] that misses its centre.
pub fn off_centre_polygon() -> Vec<Value> {
    vec![rect(60.0, 60.0, 72.5, 85.0, json!({}))]
}

/// Write a FeatureCollection, tagged with `crs` when given.
pub fn write_collection(dir: &Path, name: &str, features: Vec<Value>, crs: Option<&str>) -> PathBuf {
    let mut collection = json!({ "type": "FeatureCollection", "features": features });
    if let Some(crs) = crs {
        collection["crs"] = json!({ "type": "name", "properties": { "name": crs } });
    }
    let path = dir.join(name);
    fs::write(&path, serde_json::to_vec_pretty(&collection).unwrap()).unwrap();
    path
}

pub fn write_mercator(dir: &Path, name: &str, features: Vec<Value>) -> PathBuf {
    write_collection(dir, name, features, Some("EPSG:3857"))
}

/// (width, height, row-major pixels) of a float32 GeoTIFF.
pub fn read_raster(path: &Path) -> (u32, u32, Vec<f32>) {
    let mut decoder = Decoder::new(File::open(path).unwrap()).unwrap();
    let (width, height) = decoder.dimensions().unwrap();
    let DecodingResult::F32(pixels) = decoder.read_image().unwrap() else {
        panic!("expected a float32 band in {}", path.display());
    };
    (width, height, pixels)
}

/// Rows of an expected grid, flattened.
pub fn flatten<const W: usize>(rows: &[[f32; W]]) -> Vec<f32> {
    rows.iter().flatten().copied().collect()
}
