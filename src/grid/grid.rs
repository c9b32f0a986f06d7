use serde::Serialize;

use crate::error::SapError;
use crate::grid::{Bounds, GeoTransform};

/// Output raster layout: whole square cells covering the requested bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterGrid {
    out_bounds: Bounds,
    width: usize,
    height: usize,
    cell_size: f64,
    transform: GeoTransform,
}

impl RasterGrid {
    /// Plan a grid over `in_bounds` (already in the output CRS).
    ///
    /// The north-west corner is kept exactly; south and east edges are pushed out to the next
    /// whole cell. When `precision > 0` the input bounds are first rounded to that many digits.
    pub fn plan(in_bounds: &Bounds, cell_size: f64, precision: u32) -> Result<Self, SapError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(SapError::config(format!("cell size must be positive, got {cell_size}")));
        }
        if !in_bounds.is_finite() {
            return Err(SapError::config(format!("bounds must be finite, got {in_bounds:?}")));
        }

        let b = if precision > 0 { in_bounds.rounded(precision) } else { *in_bounds };

        let height = cell_count(b.height(), cell_size);
        let width = cell_count(b.width(), cell_size);
        if width == 0 || height == 0 {
            return Err(SapError::DegenerateGrid(format!(
                "bounds {:?} give a {width}x{height} grid at cell size {cell_size}",
                <[f64; 4]>::from(b),
            )));
        }

        let out_bounds = Bounds::new(
            b.west,
            b.north - cell_size * height as f64,
            b.west + cell_size * width as f64,
            b.north,
        );

        Ok(Self {
            transform: GeoTransform::from_bounds(&out_bounds, width, height),
            out_bounds,
            width,
            height,
            cell_size,
        })
    }

    #[inline] pub fn out_bounds(&self) -> &Bounds { &self.out_bounds }

    #[inline] pub fn width(&self) -> usize { self.width }

    #[inline] pub fn height(&self) -> usize { self.height }

    #[inline] pub fn cell_size(&self) -> f64 { self.cell_size }

    #[inline] pub fn transform(&self) -> &GeoTransform { &self.transform }

    /// (rows, cols), the ndarray shape of this grid.
    #[inline] pub fn shape(&self) -> (usize, usize) { (self.height, self.width) }

    /// Area over perimeter of one square cell.
    #[inline] pub fn cell_shape_index(&self) -> f64 { self.cell_size / 4.0 }
}

/// Whole cells needed to span `extent`; negative extents count as zero.
#[inline]
fn cell_count(extent: f64, cell_size: f64) -> usize {
    (extent / cell_size).ceil().max(0.0) as usize
}
