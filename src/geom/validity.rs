use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{unary_union, BooleanOps, Coord, Line, LineString, MultiPolygon, Polygon, Relate};

/// Outcome of a validity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid(String),
}

impl Validity {
    #[inline] pub fn is_valid(&self) -> bool { matches!(self, Self::Valid) }
}

/// Validity predicate and repair primitive used during feature preparation.
pub trait GeometryOps: Send + Sync {
    /// Report whether `shape` is a valid planar (multi)polygon.
    fn check(&self, shape: &MultiPolygon<f64>) -> Validity;

    /// Best-effort repair with zero-distance buffer semantics.
    /// The result may still be invalid or empty; callers re-check it.
    fn repair(&self, shape: &MultiPolygon<f64>) -> MultiPolygon<f64>;
}

/// Planar rules: closed rings of at least four finite coordinates that neither cross
/// themselves nor cross other rings of the same polygon, holes inside their shell and clear of
/// each other, and member polygons whose interiors stay apart. Empty rings pass, so that
/// coordinate-less features are excluded rather than reported as errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanarOps;

impl GeometryOps for PlanarOps {
    fn check(&self, shape: &MultiPolygon<f64>) -> Validity {
        let mut members = Vec::with_capacity(shape.0.len());
        for (idx, polygon) in shape.0.iter().enumerate() {
            match check_polygon(polygon) {
                Ok(rings) => members.push(rings),
                Err(reason) => return Validity::Invalid(format!("polygon {idx}: {reason}")),
            }
        }

        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                if members[i].is_empty() || members[j].is_empty() {
                    continue;
                }
                let shared_edge = members[i].iter()
                    .any(|a| members[j].iter().any(|b| rings_cross(a, b)));
                if shared_edge || interiors_meet(&shape.0[i], &shape.0[j]) {
                    return Validity::Invalid(format!("polygons {i} and {j} overlap"));
                }
            }
        }
        Validity::Valid
    }

    fn repair(&self, shape: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        // Overlaying each member against the empty set re-nodes its rings and rebuilds it
        // from the filled area: bow-ties split into lobes, spikes and slivers vanish. The
        // even-odd overlay would cancel overlapping members, so they are merged afterwards.
        let members: Vec<MultiPolygon<f64>> = shape.0.iter()
            .map(|polygon| polygon.union(&MultiPolygon::new(vec![])))
            .collect();
        unary_union(&members)
    }
}

/// Segments of every non-empty ring, exterior first.
fn check_polygon(polygon: &Polygon<f64>) -> Result<Vec<Vec<Line<f64>>>, String> {
    let rings: Vec<Vec<Line<f64>>> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .filter(|ring| !ring.0.is_empty())
        .map(ring_segments)
        .collect::<Result<_, _>>()?;

    for (i, segments) in rings.iter().enumerate() {
        if let Some((a, b)) = self_intersection(segments) {
            return Err(format!("ring {i} self-intersects between segments {a} and {b}"));
        }
        for (j, other) in rings.iter().enumerate().skip(i + 1) {
            if rings_cross(segments, other) {
                return Err(format!("rings {i} and {j} cross"));
            }
        }
    }

    check_holes(polygon)?;
    Ok(rings)
}

/// Holes lie inside the shell and outside each other. Rings are known not to cross here.
fn check_holes(polygon: &Polygon<f64>) -> Result<(), String> {
    let holes: Vec<Polygon<f64>> = polygon.interiors().iter()
        .filter(|ring| !ring.0.is_empty())
        .map(|ring| Polygon::new(ring.clone(), vec![]))
        .collect();
    if holes.is_empty() {
        return Ok(());
    }
    if polygon.exterior().0.is_empty() {
        return Err("holes without a shell".into());
    }

    let shell = Polygon::new(polygon.exterior().clone(), vec![]);
    for (k, hole) in holes.iter().enumerate() {
        if !shell.relate(hole).is_contains() {
            return Err(format!("hole {k} lies outside the shell"));
        }
        for (l, other) in holes.iter().enumerate().skip(k + 1) {
            if interiors_meet(hole, other) {
                return Err(format!("holes {k} and {l} overlap"));
            }
        }
    }
    Ok(())
}

#[inline]
fn interiors_meet(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    let matrix = a.relate(b);
    matrix.is_intersects() && !matrix.is_touches()
}

/// Segments of a ring with repeated consecutive vertices collapsed.
fn ring_segments(ring: &LineString<f64>) -> Result<Vec<Line<f64>>, String> {
    if ring.0.iter().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
        return Err("non-finite coordinate".into());
    }
    if !ring.is_closed() {
        return Err("ring is not closed".into());
    }

    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for &c in &ring.0 {
        if coords.last() != Some(&c) {
            coords.push(c);
        }
    }
    if coords.len() < 4 {
        return Err(format!("ring has {} distinct coordinates, need at least 4", coords.len()));
    }

    Ok(coords.windows(2).map(|w| Line::new(w[0], w[1])).collect())
}

/// First pair of segments in a ring that cross, or overlap along a stretch. Touching at a
/// vertex is allowed, which keeps pinched rings from a repair valid.
fn self_intersection(segments: &[Line<f64>]) -> Option<(usize, usize)> {
    let n = segments.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let crosses = match line_intersection(segments[i], segments[j]) {
                None => false,
                Some(LineIntersection::SinglePoint { is_proper, .. }) => is_proper,
                Some(LineIntersection::Collinear { intersection }) => intersection.start != intersection.end,
            };
            if crosses {
                return Some((i, j));
            }
        }
    }
    None
}

/// Rings may touch at isolated points but not cross or share an edge.
fn rings_cross(a: &[Line<f64>], b: &[Line<f64>]) -> bool {
    a.iter().any(|&sa| b.iter().any(|&sb| match line_intersection(sa, sb) {
        Some(LineIntersection::SinglePoint { is_proper, .. }) => is_proper,
        Some(LineIntersection::Collinear { intersection }) => intersection.start != intersection.end,
        None => false,
    }))
}
