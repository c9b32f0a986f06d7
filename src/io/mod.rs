//! IO module for format-specific reading and writing operations.
//!
//! # Format Modules
//!
//! - `geojson` - GeoJSON feature collections (input, error collection output)
//! - `shp` - ESRI Shapefile input, with CRS detection from the sibling `.prj`
//! - `geotiff` - single-band float32 GeoTIFF output
//! - `fs` - output paths, atomic writes, input hashing
//!
//! `read_vector` picks a reader from the file extension.

mod fs;
mod geojson;
mod shp;
mod geotiff;
mod source;

pub use fs::{sha256_file, write_output};
pub use geojson::{feature_collection, multipolygon_to_geojson, read_geojson};
pub use shp::read_shapefile;
pub use source::{read_vector, VectorSource};
pub use geotiff::{GeoTiffWriter, RasterWriter, NODATA};
