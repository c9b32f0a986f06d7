use ndarray::Array2;

use crate::grid::RasterGrid;
use crate::prepare::WeightedShape;
use crate::raster::Rasterizer;

/// Merges the all-touched pass for small shapes with the centre pass for the rest.
pub struct RasterCompositor<'a> {
    rasterizer: &'a dyn Rasterizer,
}

impl<'a> RasterCompositor<'a> {
    pub fn new(rasterizer: &'a dyn Rasterizer) -> Self { Self { rasterizer } }

    /// Element-wise sum of both passes; a pass with no shapes contributes nothing.
    pub fn compose(&self, normal: &[WeightedShape], small: &[WeightedShape], grid: &RasterGrid) -> Array2<f32> {
        let mut out = Array2::<f32>::zeros(grid.shape());
        if !small.is_empty() {
            out += &self.rasterizer.rasterize(small, grid, true);
        }
        if !normal.is_empty() {
            out += &self.rasterizer.rasterize(normal, grid, false);
        }
        out
    }
}
