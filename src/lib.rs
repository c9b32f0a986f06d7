#![doc = "Spatial Access Priority (SAP) heatmaps: weighted survey polygons burned into a GeoTIFF grid"]
mod config;
mod crs;
mod error;
mod feature;
mod geom;
mod grid;
mod io;
mod manifest;
mod pipeline;
mod prepare;
mod raster;
mod sap;
mod sink;

#[doc(inline)]
pub use config::{RunConfig, RunConfigBuilder};

#[doc(inline)]
pub use crs::{Crs, Reprojector};

#[doc(inline)]
pub use error::{FeatureIssue, SapError};

#[doc(inline)]
pub use feature::Feature;

#[doc(inline)]
pub use geom::{exterior_length, shape_index, GeometryOps, PlanarOps, Validity};

#[doc(inline)]
pub use grid::{Bounds, GeoTransform, RasterGrid};

#[doc(inline)]
pub use io::{read_vector, GeoTiffWriter, RasterWriter, VectorSource, NODATA};

#[doc(inline)]
pub use manifest::{Manifest, ManifestRecorder, RunLog, ShapeIndexStats};

#[doc(inline)]
pub use pipeline::{gen_sap_map, RunPaths, SapMapper};

#[doc(inline)]
pub use prepare::{FeaturePreparer, Outcome, ShapeClassifier, WeightedShape};

#[doc(inline)]
pub use raster::{RasterCompositor, Rasterizer, ScanlineRasterizer};

#[doc(inline)]
pub use sap::{calc_sap, HeatMethod, SapParams};

#[doc(inline)]
pub use sink::{Artifact, ConsoleSink, FileSink, MemorySink, OutputSink};
