use geo::{LineString, MultiPolygon};

/// Summed length of every polygon's exterior ring.
pub fn exterior_length(shape: &MultiPolygon<f64>) -> f64 {
    shape.0.iter().map(|polygon| ring_length(polygon.exterior())).sum()
}

/// Area over exterior length; small values mean small or narrow shapes.
#[inline]
pub fn shape_index(area: f64, shape: &MultiPolygon<f64>) -> f64 {
    let length = exterior_length(shape);
    if length > 0.0 { area / length } else { 0.0 }
}

/// False when no member polygon has any exterior coordinate.
#[inline]
pub fn has_coordinates(shape: &MultiPolygon<f64>) -> bool {
    shape.0.iter().any(|polygon| !polygon.exterior().0.is_empty())
}

#[inline]
fn ring_length(ring: &LineString<f64>) -> f64 {
    ring.lines().map(|line| line.dx().hypot(line.dy())).sum()
}
