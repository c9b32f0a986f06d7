use serde::{Deserialize, Serialize};

use crate::grid::Bounds;

/// North-up affine transform between world coordinates and pixel space.
///
/// Pixel (0, 0) is the north-west corner; `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Transform that maps `bounds` onto a `width` x `height` pixel grid.
    pub fn from_bounds(bounds: &Bounds, width: usize, height: usize) -> Self {
        Self {
            origin_x: bounds.west,
            origin_y: bounds.north,
            pixel_width: bounds.width() / width as f64,
            pixel_height: -bounds.height() / height as f64,
        }
    }

    /// World coordinate to fractional (col, row).
    #[inline]
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.origin_x) / self.pixel_width, (y - self.origin_y) / self.pixel_height)
    }

    /// Fractional (col, row) to world coordinate.
    #[inline]
    pub fn to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (self.origin_x + col * self.pixel_width, self.origin_y + row * self.pixel_height)
    }

    /// World coordinate of the centre of pixel (col, row).
    #[inline]
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.to_world(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// GDAL ordering: [origin_x, pixel_width, 0, origin_y, 0, pixel_height].
    #[inline]
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.origin_x, self.pixel_width, 0.0, self.origin_y, 0.0, self.pixel_height]
    }
}

#[cfg(test)]
mod tests {
    use super::GeoTransform;
    use crate::grid::Bounds;

    #[test]
    fn round_trips_corners() {
        let t = GeoTransform::from_bounds(&Bounds::new(-400.0, -400.0, 400.0, 400.0), 8, 8);
        assert_eq!(t.to_gdal(), [-400.0, 100.0, 0.0, 400.0, 0.0, -100.0]);
        assert_eq!(t.to_pixel(-400.0, 400.0), (0.0, 0.0));
        assert_eq!(t.to_pixel(400.0, -400.0), (8.0, 8.0));
        assert_eq!(t.pixel_center(0, 7), (-350.0, -350.0));
    }
}
