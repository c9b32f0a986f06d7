mod compose;
mod rasterize;

pub use compose::RasterCompositor;
pub use rasterize::{Rasterizer, ScanlineRasterizer};
