use geo::{BoundingRect, Coord, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

/// Axis-aligned extent as (west, south, east, north), serialized as `[w, s, e, n]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    #[inline]
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self { west, south, east, north }
    }

    #[inline] pub fn width(&self) -> f64 { self.east - self.west }

    #[inline] pub fn height(&self) -> f64 { self.north - self.south }

    #[inline]
    pub fn is_finite(&self) -> bool {
        [self.west, self.south, self.east, self.north].iter().all(|v| v.is_finite())
    }

    /// True if `other` lies entirely within (or on the edge of) these bounds.
    #[inline]
    pub fn contains(&self, other: &Bounds) -> bool {
        self.west <= other.west && self.south <= other.south
            && self.east >= other.east && self.north >= other.north
    }

    /// Round every edge to `digits` decimal places.
    pub fn rounded(&self, digits: u32) -> Self {
        let scale = 10f64.powi(digits as i32);
        let round = |v: f64| (v * scale).round() / scale;
        Self::new(round(self.west), round(self.south), round(self.east), round(self.north))
    }

    /// Smallest bounds covering every shape, or None if no shape has coordinates.
    pub fn of_shapes<'a>(shapes: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> Option<Self> {
        shapes.into_iter()
            .filter_map(|shape| shape.bounding_rect())
            .reduce(|a, b| Rect::new(
                Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            ))
            .map(Self::from)
    }
}

impl From<Rect<f64>> for Bounds {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl From<[f64; 4]> for Bounds {
    fn from([west, south, east, north]: [f64; 4]) -> Self { Self::new(west, south, east, north) }
}

impl From<Bounds> for [f64; 4] {
    fn from(b: Bounds) -> Self { [b.west, b.south, b.east, b.north] }
}

#[cfg(test)]
mod tests {
    use geo::{polygon, MultiPolygon};

    use super::Bounds;

    #[test]
    fn rounding_to_digits() {
        let b = Bounds::new(-0.123456, 1.98765, 2.5, 3.00049).rounded(3);
        assert_eq!(b, Bounds::new(-0.123, 1.988, 2.5, 3.0));
    }

    #[test]
    fn union_of_shapes() {
        let a = MultiPolygon(vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]]);
        let b = MultiPolygon(vec![polygon![(x: -2.0, y: 3.0), (x: -1.0, y: 3.0), (x: -1.0, y: 4.0)]]);
        let empty = MultiPolygon::<f64>(vec![]);

        let bounds = Bounds::of_shapes([&a, &empty, &b]).unwrap();
        assert_eq!(bounds, Bounds::new(-2.0, 0.0, 1.0, 4.0));
        assert!(Bounds::of_shapes([&empty]).is_none());
    }

    #[test]
    fn serializes_as_array() {
        let json = serde_json::to_string(&Bounds::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");
        let back: Bounds = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Bounds::new(1.0, 2.0, 3.0, 4.0));
    }
}
