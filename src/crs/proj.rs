use anyhow::{anyhow, Result};
use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj, transform::transform};

use crate::crs::Crs;
use crate::error::SapError;
use crate::grid::Bounds;

/// Coordinate transform between two CRSs.
///
/// Geographic coordinates are taken and returned in degrees; radians are handled internally.
pub struct Reprojector {
    from: Proj,
    to: Proj,
    from_geographic: bool,
    to_geographic: bool,
    label: String,
}

impl Reprojector {
    pub fn new(from: &Crs, to: &Crs) -> Result<Self, SapError> {
        Ok(Self {
            from: from.to_proj()?,
            to: to.to_proj()?,
            from_geographic: from.is_geographic(),
            to_geographic: to.is_geographic(),
            label: format!("{from} -> {to}"),
        })
    }

    /// Transform a single coordinate.
    pub fn reproject_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let mut point = if self.from_geographic { (x.to_radians(), y.to_radians(), 0.0) } else { (x, y, 0.0) };
        transform(&self.from, &self.to, &mut point)
            .map_err(|e| anyhow!("CRS transform {} failed at ({x}, {y}): {e:?}", self.label))?;

        let (px, py) = if self.to_geographic { (point.0.to_degrees(), point.1.to_degrees()) } else { (point.0, point.1) };
        if !(px.is_finite() && py.is_finite()) {
            return Err(anyhow!("CRS transform {} produced a non-finite coordinate at ({x}, {y})", self.label));
        }
        Ok((px, py))
    }

    /// Transform every ring of a shape. Returns a new geometry; the input is untouched.
    pub fn reproject(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        shape.try_map_coords(|coord: Coord<f64>| -> Result<Coord<f64>> {
            let (x, y) = self.reproject_point(coord.x, coord.y)?;
            Ok(Coord { x, y })
        })
    }

    /// Transform the south-west and north-east corners of `bounds`.
    pub fn reproject_bounds(&self, bounds: &Bounds) -> Result<Bounds> {
        let (west, south) = self.reproject_point(bounds.west, bounds.south)?;
        let (east, north) = self.reproject_point(bounds.east, bounds.north)?;
        Ok(Bounds::new(west, south, east, north))
    }
}
