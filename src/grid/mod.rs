mod bounds;
mod grid;
mod transform;

pub use bounds::Bounds;
pub use grid::RasterGrid;
pub use transform::GeoTransform;
