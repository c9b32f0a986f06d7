use std::path::Path;

use anyhow::Result;

use crate::crs::Crs;
use crate::error::SapError;
use crate::feature::Feature;
use crate::grid::Bounds;
use crate::io::{read_geojson, read_shapefile};

/// A fully read feature collection with its declared CRS, if any.
#[derive(Debug, Clone)]
pub struct VectorSource {
    features: Vec<Feature>,
    crs: Option<Crs>,
}

impl VectorSource {
    pub fn new(features: Vec<Feature>, crs: Option<Crs>) -> Self { Self { features, crs } }

    #[inline] pub fn features(&self) -> &[Feature] { &self.features }

    #[inline] pub fn crs(&self) -> Option<&Crs> { self.crs.as_ref() }

    #[inline] pub fn len(&self) -> usize { self.features.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.features.is_empty() }

    /// Extent of every feature geometry, in the source CRS.
    #[inline]
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of_shapes(self.features.iter().map(|f| f.geometry()))
    }
}

/// Read a vector file, choosing the reader from its extension.
pub fn read_vector(path: &Path) -> Result<VectorSource> {
    let ext = path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "geojson" | "json" => read_geojson(path),
        "shp" => read_shapefile(path),
        _ => Err(SapError::input(format!("unsupported vector format: {}", path.display())).into()),
    }
}
