use geo::MultiPolygon;
use serde_json::{json, Map, Value};

use crate::io::multipolygon_to_geojson;

/// One input record: a (multi)polygon, its attributes, and where it sat in the source.
#[derive(Debug, Clone)]
pub struct Feature {
    index: usize,
    geometry: MultiPolygon<f64>,
    properties: Map<String, Value>,
    raw: Value,
}

impl Feature {
    /// `raw` is the record as it appeared in the source, echoed into the error collection.
    pub fn new(index: usize, geometry: MultiPolygon<f64>, properties: Map<String, Value>, raw: Value) -> Self {
        Self { index, geometry, properties, raw }
    }

    /// Build a feature whose raw record is synthesized as a GeoJSON Feature.
    pub fn from_parts(index: usize, geometry: MultiPolygon<f64>, properties: Map<String, Value>) -> Self {
        let raw = json!({
            "type": "Feature",
            "geometry": multipolygon_to_geojson(&geometry),
            "properties": properties,
        });
        Self { index, geometry, properties, raw }
    }

    /// Zero-based position in the source.
    #[inline] pub fn index(&self) -> usize { self.index }

    /// Geometry in the source CRS.
    #[inline] pub fn geometry(&self) -> &MultiPolygon<f64> { &self.geometry }

    #[inline] pub fn properties(&self) -> &Map<String, Value> { &self.properties }

    #[inline] pub fn raw(&self) -> &Value { &self.raw }

    #[inline]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key).filter(|v| !v.is_null())
    }

    /// Numeric attribute; numeric strings are accepted.
    pub fn property_f64(&self, key: &str) -> Option<f64> {
        match self.property(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Public identifier: `unique_id_field` when present on this feature, else the source index.
    pub fn public_id(&self, unique_id_field: Option<&str>) -> Value {
        unique_id_field
            .and_then(|field| self.property(field))
            .cloned()
            .unwrap_or_else(|| json!(self.index))
    }
}
