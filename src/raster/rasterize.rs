use std::ops::Range;

use geo::{BoundingRect, Coord, Line, MultiPolygon};
use ndarray::Array2;

use crate::grid::{GeoTransform, RasterGrid};
use crate::prepare::WeightedShape;

/// Burns weighted shapes into a grid, adding each shape's weight to every cell it covers.
pub trait Rasterizer: Send + Sync {
    /// Returns a `(height, width)` array; cells no shape covers stay 0.
    ///
    /// Default mode covers a cell when its centre is inside the shape. With `all_touched`,
    /// a cell is covered when its interior overlaps the shape's interior at all.
    fn rasterize(&self, shapes: &[WeightedShape], grid: &RasterGrid, all_touched: bool) -> Array2<f32>;
}

/// Even-odd scanline fill over each shape's bounding window.
///
/// Centres on a boundary follow a half-open rule (west and south edges in, east and north
/// edges out), so shapes that share an edge never both cover a centre lying on it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanlineRasterizer;

impl Rasterizer for ScanlineRasterizer {
    fn rasterize(&self, shapes: &[WeightedShape], grid: &RasterGrid, all_touched: bool) -> Array2<f32> {
        let mut acc = Array2::<f64>::zeros(grid.shape());

        for shape in shapes {
            let Some(window) = Window::of(shape.geometry(), grid) else { continue };
            let edges = edges(shape.geometry());
            if all_touched {
                burn_touched(&mut acc, &edges, grid.transform(), &window, shape.weight());
            } else {
                burn_centres(&mut acc, &edges, grid.transform(), &window, shape.weight());
            }
        }

        acc.mapv(|v| v as f32)
    }
}

/// Cells overlapping a shape's bounding box, clipped to the grid.
struct Window {
    rows: Range<usize>,
    cols: Range<usize>,
}

impl Window {
    fn of(shape: &MultiPolygon<f64>, grid: &RasterGrid) -> Option<Self> {
        let rect = shape.bounding_rect()?;
        let t = grid.transform();
        let (c0, r0) = t.to_pixel(rect.min().x, rect.max().y);
        let (c1, r1) = t.to_pixel(rect.max().x, rect.min().y);

        let clamp = |v: f64, n: usize| v.max(0.0).min(n as f64) as usize;
        let rows = clamp(r0.floor(), grid.height())..clamp(r1.ceil(), grid.height());
        let cols = clamp(c0.floor(), grid.width())..clamp(c1.ceil(), grid.width());

        (!rows.is_empty() && !cols.is_empty()).then_some(Self { rows, cols })
    }
}

/// Every ring segment of every member polygon, holes included.
fn edges(shape: &MultiPolygon<f64>) -> Vec<Line<f64>> {
    shape.0.iter()
        .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
        .flat_map(|ring| ring.lines())
        .collect()
}

/// Where `edge` crosses the horizontal line at `y`. Edges are half-open in y, so a vertex
/// on the line is counted once and horizontal edges never cross.
#[inline]
fn crossing_x(edge: &Line<f64>, y: f64) -> Option<f64> {
    let (a, b) = (edge.start, edge.end);
    ((a.y > y) != (b.y > y)).then(|| a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y))
}

/// First column whose centre lies at or east of `x`.
#[inline]
fn first_centre_from(t: &GeoTransform, x: f64) -> f64 {
    ((x - t.origin_x) / t.pixel_width - 0.5).ceil()
}

/// Per window row, the columns whose centres lie inside the shape.
fn centre_spans(edges: &[Line<f64>], t: &GeoTransform, window: &Window, mut visit: impl FnMut(usize, Range<usize>)) {
    let clamp = |v: f64| v.max(window.cols.start as f64).min(window.cols.end as f64) as usize;
    let mut crossings = Vec::new();

    for row in window.rows.clone() {
        let (_, y) = t.pixel_center(0, row);
        crossings.clear();
        crossings.extend(edges.iter().filter_map(|edge| crossing_x(edge, y)));
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            visit(row, clamp(first_centre_from(t, span[0]))..clamp(first_centre_from(t, span[1])));
        }
    }
}

fn burn_centres(acc: &mut Array2<f64>, edges: &[Line<f64>], t: &GeoTransform, window: &Window, weight: f64) {
    centre_spans(edges, t, window, |row, cols| {
        for col in cols {
            acc[[row, col]] += weight;
        }
    });
}

/// Cells the boundary runs through, found by walking each edge row by row, plus cells
/// whose centre is inside. A cell with no boundary in it is wholly in or wholly out.
fn burn_touched(acc: &mut Array2<f64>, edges: &[Line<f64>], t: &GeoTransform, window: &Window, weight: f64) {
    let (row0, col0) = (window.rows.start, window.cols.start);
    let mut touched = Array2::from_elem((window.rows.len(), window.cols.len()), false);

    for edge in edges {
        let (_, ra) = t.to_pixel(edge.start.x, edge.start.y);
        let (_, rb) = t.to_pixel(edge.end.x, edge.end.y);
        for row in index_range(ra, rb, &window.rows) {
            let (_, top) = t.to_world(0.0, row as f64);
            let (_, bottom) = t.to_world(0.0, row as f64 + 1.0);
            let Some((xa, xb)) = x_extent_within(edge, top.min(bottom), top.max(bottom)) else { continue };
            let (ca, _) = t.to_pixel(xa, top);
            let (cb, _) = t.to_pixel(xb, top);

            for col in index_range(ca, cb, &window.cols) {
                let cell = &mut touched[[row - row0, col - col0]];
                if !*cell {
                    let (min, max) = cell_box(t, col, row);
                    *cell = crosses_interior(edge, min, max);
                }
            }
        }
    }

    centre_spans(edges, t, window, |row, cols| {
        for col in cols {
            touched[[row - row0, col - col0]] = true;
        }
    });

    for ((r, c), &hit) in touched.indexed_iter() {
        if hit {
            acc[[row0 + r, col0 + c]] += weight;
        }
    }
}

/// Indices between two fractional pixel coordinates, padded by one on each side and
/// clipped to `within`.
#[inline]
fn index_range(a: f64, b: f64, within: &Range<usize>) -> Range<usize> {
    let clamp = |v: f64| v.max(within.start as f64).min(within.end as f64) as usize;
    clamp(a.min(b).floor() - 1.0)..clamp(a.max(b).floor() + 2.0)
}

/// Horizontal extent of the part of `edge` between `y_min` and `y_max`, if any.
fn x_extent_within(edge: &Line<f64>, y_min: f64, y_max: f64) -> Option<(f64, f64)> {
    let (a, d) = (edge.start, edge.delta());
    let (t0, t1) = if d.y == 0.0 {
        if a.y < y_min || a.y > y_max {
            return None;
        }
        (0.0, 1.0)
    } else {
        let (ta, tb) = ((y_min - a.y) / d.y, (y_max - a.y) / d.y);
        (ta.min(tb).max(0.0), ta.max(tb).min(1.0))
    };
    (t0 <= t1).then(|| {
        let (xa, xb) = (a.x + d.x * t0, a.x + d.x * t1);
        (xa.min(xb), xa.max(xb))
    })
}

#[inline]
fn cell_box(t: &GeoTransform, col: usize, row: usize) -> (Coord<f64>, Coord<f64>) {
    let (west, north) = t.to_world(col as f64, row as f64);
    let (east, south) = t.to_world(col as f64 + 1.0, row as f64 + 1.0);
    (Coord { x: west.min(east), y: south.min(north) }, Coord { x: west.max(east), y: south.max(north) })
}

/// Liang-Barsky clip of `edge` against the box; true if some of it runs through the
/// open interior rather than only along the box's sides.
fn crosses_interior(edge: &Line<f64>, min: Coord<f64>, max: Coord<f64>) -> bool {
    let (a, d) = (edge.start, edge.delta());
    let (mut t0, mut t1) = (0.0f64, 1.0f64);

    for (p, q) in [(-d.x, a.x - min.x), (d.x, max.x - a.x), (-d.y, a.y - min.y), (d.y, max.y - a.y)] {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
        } else if p < 0.0 {
            t0 = t0.max(q / p);
        } else {
            t1 = t1.min(q / p);
        }
    }
    if t0 > t1 {
        return false;
    }

    // The clipped piece lies in the closed box; its midpoint is on a side only when the
    // whole piece is.
    let t = (t0 + t1) / 2.0;
    let m = Coord { x: a.x + d.x * t, y: a.y + d.y * t };
    min.x < m.x && m.x < max.x && min.y < m.y && m.y < max.y
}
