//! Polygon triangulation for glyph caps.
//!
//! Glyph outlines arrive as a flat list of contours with no reliable winding
//! (TrueType and CFF disagree, and the box font picks its own). We first
//! group them into [`Shape`]s by containment depth: even depth is an outer
//! boundary, odd depth is a hole in the nearest enclosing outer. Each shape
//! is then turned into a single simple polygon by bridging its holes into the
//! outer boundary, and that polygon is ear-clipped.
//!
//! Everything here is O(n²) in the vertex count of one shape. Glyph shapes
//! have tens of vertices, so this never shows up in profiles.

use super::font::Contour;
use tracing::debug;

/// One outer boundary (counter-clockwise) and its holes (clockwise).
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub outer: Contour,
    pub holes: Vec<Contour>,
}

/// Cap triangles of one shape. Indices point into `vertices`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triangulation {
    pub vertices: Vec<[f32; 2]>,
    pub triangles: Vec<[u32; 3]>,
}

const EPS: f32 = 1e-6;

/// Signed area, positive for counter-clockwise.
pub fn signed_area(c: &[[f32; 2]]) -> f32 {
    let n = c.len();
    let mut a = 0.0;
    for i in 0..n {
        let [x0, y0] = c[i];
        let [x1, y1] = c[(i + 1) % n];
        a += x0 * y1 - x1 * y0;
    }
    a * 0.5
}

/// Even-odd point-in-polygon test.
pub fn contains(poly: &[[f32; 2]], p: [f32; 2]) -> bool {
    let n = poly.len();
    let mut inside = false;
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let [xi, yi] = poly[i];
        let [xj, yj] = poly[j];
        if (yi > p[1]) != (yj > p[1]) && p[0] < (xj - xi) * (p[1] - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Group raw contours into outer boundaries with holes, fixing winding.
pub fn group_contours(contours: &[Contour]) -> Vec<Shape> {
    let usable: Vec<&Contour> = contours
        .iter()
        .filter(|c| c.len() >= 3 && signed_area(c).abs() > EPS)
        .collect();

    let depth: Vec<usize> = usable
        .iter()
        .enumerate()
        .map(|(i, c)| {
            usable
                .iter()
                .enumerate()
                .filter(|(j, other)| *j != i && contains(other, c[0]))
                .count()
        })
        .collect();

    let mut shapes: Vec<(usize, Shape)> = Vec::new();
    for (i, c) in usable.iter().enumerate() {
        if depth[i] % 2 == 0 {
            let mut outer = (*c).clone();
            if signed_area(&outer) < 0.0 {
                outer.reverse();
            }
            shapes.push((i, Shape { outer, holes: Vec::new() }));
        }
    }

    for (i, c) in usable.iter().enumerate() {
        if depth[i] % 2 == 0 {
            continue;
        }
        // smallest enclosing outer one level up
        let parent = shapes
            .iter_mut()
            .filter(|(j, s)| depth[*j] + 1 == depth[i] && contains(&s.outer, c[0]))
            .min_by(|(_, a), (_, b)| {
                signed_area(&a.outer).total_cmp(&signed_area(&b.outer))
            });
        match parent {
            Some((_, shape)) => {
                let mut hole = (*c).clone();
                if signed_area(&hole) > 0.0 {
                    hole.reverse();
                }
                shape.holes.push(hole);
            }
            None => debug!("Dropping orphan hole contour with {} points", c.len()),
        }
    }

    shapes.into_iter().map(|(_, s)| s).collect()
}

/// Triangulate one shape, holes included.
pub fn triangulate(shape: &Shape) -> Triangulation {
    let polygon = bridge_holes(shape);
    let triangles = ear_clip(&polygon);
    Triangulation {
        vertices: polygon,
        triangles,
    }
}

fn cross(o: [f32; 2], a: [f32; 2], b: [f32; 2]) -> f32 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn segments_cross(p1: [f32; 2], p2: [f32; 2], q1: [f32; 2], q2: [f32; 2]) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);
    ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS))
        && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
}

fn edges(poly: &[[f32; 2]]) -> impl Iterator<Item = ([f32; 2], [f32; 2])> + '_ {
    (0..poly.len()).map(move |i| (poly[i], poly[(i + 1) % poly.len()]))
}

/// Splice every hole into the outer ring through a visible bridge edge.
fn bridge_holes(shape: &Shape) -> Vec<[f32; 2]> {
    let mut polygon = shape.outer.clone();
    let mut holes: Vec<&Contour> = shape.holes.iter().collect();
    // Rightmost holes first, so later bridges never cross earlier ones.
    holes.sort_by(|a, b| max_x(b).total_cmp(&max_x(a)));

    for (h, hole) in holes.iter().enumerate() {
        let Some(mi) = (0..hole.len()).max_by(|&a, &b| hole[a][0].total_cmp(&hole[b][0])) else {
            continue;
        };
        let m = hole[mi];

        let mut candidates: Vec<usize> = (0..polygon.len()).collect();
        candidates.sort_by(|&a, &b| dist2(polygon[a], m).total_cmp(&dist2(polygon[b], m)));

        let visible = candidates.into_iter().find(|&pi| {
            let p = polygon[pi];
            let blocked = edges(&polygon)
                .chain(holes[h..].iter().flat_map(|c| edges(c)))
                .any(|(a, b)| segments_cross(m, p, a, b));
            let mid = [(m[0] + p[0]) * 0.5, (m[1] + p[1]) * 0.5];
            !blocked && !contains(hole, mid)
        });

        let Some(pi) = visible else {
            debug!("No bridge found for hole with {} points", hole.len());
            continue;
        };

        let mut merged = Vec::with_capacity(polygon.len() + hole.len() + 2);
        merged.extend_from_slice(&polygon[..=pi]);
        merged.extend(hole[mi..].iter().chain(hole[..=mi].iter()).copied());
        merged.extend_from_slice(&polygon[pi..]);
        polygon = merged;
    }
    polygon
}

fn max_x(c: &Contour) -> f32 {
    c.iter().map(|p| p[0]).fold(f32::MIN, f32::max)
}

fn dist2(a: [f32; 2], b: [f32; 2]) -> f32 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

fn in_triangle(p: [f32; 2], a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> bool {
    cross(a, b, p) >= -EPS && cross(b, c, p) >= -EPS && cross(c, a, p) >= -EPS
}

/// Ear clipping over a counter-clockwise (possibly weakly simple) polygon.
fn ear_clip(poly: &[[f32; 2]]) -> Vec<[u32; 3]> {
    let mut idx: Vec<usize> = (0..poly.len()).collect();
    let mut out = Vec::with_capacity(poly.len().saturating_sub(2));
    let mut stalled = 0usize;
    let mut i = 0usize;

    while idx.len() > 3 {
        let n = idx.len();
        let (ia, ib, ic) = (idx[(i + n - 1) % n], idx[i % n], idx[(i + 1) % n]);
        let (a, b, c) = (poly[ia], poly[ib], poly[ic]);
        let turn = cross(a, b, c);

        let is_ear = if turn.abs() <= EPS {
            // collinear or duplicate: drop the vertex without a triangle
            idx.remove(i % n);
            stalled = 0;
            continue;
        } else if turn < 0.0 {
            false
        } else {
            !idx.iter().any(|&k| {
                let p = poly[k];
                k != ia
                    && k != ib
                    && k != ic
                    && p != a
                    && p != b
                    && p != c
                    && in_triangle(p, a, b, c)
            })
        };

        if is_ear || stalled > n {
            out.push([ia as u32, ib as u32, ic as u32]);
            idx.remove(i % n);
            stalled = 0;
        } else {
            i = (i + 1) % n;
            stalled += 1;
        }
    }

    if idx.len() == 3 && cross(poly[idx[0]], poly[idx[1]], poly[idx[2]]).abs() > EPS {
        out.push([idx[0] as u32, idx[1] as u32, idx[2] as u32]);
    }
    out
}
