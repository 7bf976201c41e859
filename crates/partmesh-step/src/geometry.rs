//! Planar polygon and spline helpers used by the face tessellator.

use std::f64::consts::{PI, TAU};

use glam::Vec3;

/// A point in a face's 2D parameter space.
pub type Point2 = [f64; 2];

/// Triangulate a simple 2D polygon using ear clipping.
///
/// Returns triangles as indices into `vertices`, wound the same way as the
/// input polygon.
pub fn triangulate_polygon(vertices: &[Point2]) -> Vec<[usize; 3]> {
    let n = vertices.len();
    if n < 3 {
        return Vec::new();
    }
    if n == 3 {
        return vec![[0, 1, 2]];
    }

    let mut triangles = Vec::with_capacity(n - 2);
    let mut indices: Vec<usize> = (0..n).collect();
    let ccw = polygon_signed_area(vertices) > 0.0;

    while indices.len() > 3 {
        let count = indices.len();
        let ear = (0..count).find(|&i| {
            let a = indices[(i + count - 1) % count];
            let b = indices[i];
            let c = indices[(i + 1) % count];
            if !is_convex(vertices[a], vertices[b], vertices[c], ccw) {
                return false;
            }
            !indices.iter().any(|&p| {
                let q = vertices[p];
                q != vertices[a]
                    && q != vertices[b]
                    && q != vertices[c]
                    && point_in_triangle(q, vertices[a], vertices[b], vertices[c])
            })
        });

        // Degenerate remainder: clip the first vertex so the polygon still
        // gets covered.
        let i = ear.unwrap_or(0);
        let a = indices[(i + count - 1) % count];
        let c = indices[(i + 1) % count];
        triangles.push([a, indices[i], c]);
        indices.remove(i);
    }

    triangles.push([indices[0], indices[1], indices[2]]);
    triangles
}

/// Compute signed area of a 2D polygon (positive if CCW).
pub fn polygon_signed_area(vertices: &[Point2]) -> f64 {
    let n = vertices.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += vertices[i][0] * vertices[j][1];
        area -= vertices[j][0] * vertices[i][1];
    }
    area / 2.0
}

/// Check if vertex b is convex (forms a left turn from a to c).
fn is_convex(a: Point2, b: Point2, c: Point2, ccw: bool) -> bool {
    let cross = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
    if ccw {
        cross > 0.0
    } else {
        cross < 0.0
    }
}

fn orient(p1: Point2, p2: Point2, p3: Point2) -> f64 {
    (p1[0] - p3[0]) * (p2[1] - p3[1]) - (p2[0] - p3[0]) * (p1[1] - p3[1])
}

/// Check if point p is inside triangle abc (boundary counts as inside).
pub fn point_in_triangle(p: Point2, a: Point2, b: Point2, c: Point2) -> bool {
    let d1 = orient(p, a, b);
    let d2 = orient(p, b, c);
    let d3 = orient(p, c, a);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;

    !(has_neg && has_pos)
}

/// Check if segment AB properly intersects segment CD.
pub fn segments_intersect(a: Point2, b: Point2, c: Point2, d: Point2) -> bool {
    let d1 = orient(c, d, a);
    let d2 = orient(c, d, b);
    let d3 = orient(a, b, c);
    let d4 = orient(a, b, d);

    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Merge an outer polygon with its holes by cutting bridge edges.
///
/// The outer loop must be CCW and the holes CW. Returns the merged polygon
/// as indices into the concatenation of `outer` followed by every hole in
/// order.
pub fn merge_polygon_with_holes(outer: &[Point2], holes: &[Vec<Point2>]) -> Vec<usize> {
    let mut merged: Vec<usize> = (0..outer.len()).collect();
    let mut points: Vec<Point2> = outer.to_vec();

    let mut offset = outer.len();
    let mut order: Vec<(usize, &Vec<Point2>)> = Vec::with_capacity(holes.len());
    for hole in holes {
        order.push((offset, hole));
        offset += hole.len();
    }
    // Bridge the rightmost holes first so later bridges cannot cross them.
    order.sort_by(|a, b| max_x(b.1).total_cmp(&max_x(a.1)));

    for (base, hole) in order {
        if hole.len() < 3 {
            continue;
        }

        let (rightmost, hole_point) = hole
            .iter()
            .copied()
            .enumerate()
            .fold((0, hole[0]), |best, (i, p)| if p[0] > best.1[0] { (i, p) } else { best });

        let mut best: Option<(usize, f64)> = None;
        for (i, outer_point) in points.iter().enumerate() {
            let dist = (outer_point[0] - hole_point[0]).powi(2)
                + (outer_point[1] - hole_point[1]).powi(2);
            if best.is_some_and(|(_, d)| dist >= d) {
                continue;
            }

            let crosses_outer = (0..points.len()).any(|j| {
                let k = (j + 1) % points.len();
                j != i
                    && k != i
                    && segments_intersect(hole_point, *outer_point, points[j], points[k])
            });
            let crosses_hole = !crosses_outer
                && (0..hole.len()).any(|j| {
                    let k = (j + 1) % hole.len();
                    j != rightmost
                        && k != rightmost
                        && segments_intersect(hole_point, *outer_point, hole[j], hole[k])
                });

            if !crosses_outer && !crosses_hole {
                best = Some((i, dist));
            }
        }
        let Some((bridge, _)) = best else {
            continue;
        };

        let mut next_merged = Vec::with_capacity(merged.len() + hole.len() + 2);
        let mut next_points = Vec::with_capacity(points.len() + hole.len() + 2);
        for i in 0..=bridge {
            next_merged.push(merged[i]);
            next_points.push(points[i]);
        }
        for i in 0..=hole.len() {
            let idx = (rightmost + i) % hole.len();
            next_merged.push(base + idx);
            next_points.push(hole[idx]);
        }
        next_merged.push(merged[bridge]);
        next_points.push(points[bridge]);
        for i in (bridge + 1)..merged.len() {
            next_merged.push(merged[i]);
            next_points.push(points[i]);
        }

        merged = next_merged;
        points = next_points;
    }

    merged
}

fn max_x(polygon: &[Point2]) -> f64 {
    polygon.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max)
}

/// Bring `angle` within half a turn of `reference`.
pub fn unwrap_angle(angle: f64, reference: f64) -> f64 {
    if !(angle.is_finite() && reference.is_finite()) {
        return angle;
    }
    let mut a = angle;
    while a - reference > PI {
        a -= TAU;
    }
    while a - reference < -PI {
        a += TAU;
    }
    a
}

/// Unwrap one coordinate of a polygon to remove ±π discontinuities.
pub fn unwrap_angles(polygon: &mut [Point2], axis: usize) {
    for i in 1..polygon.len() {
        let previous = polygon[i - 1][axis];
        polygon[i][axis] = unwrap_angle(polygon[i][axis], previous);
    }
}

/// Newell normal of a closed 3D polygon (unnormalized).
pub fn newell_normal(points: &[Vec3]) -> Vec3 {
    let mut normal = Vec3::ZERO;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

/// Expand knots with multiplicities into full knot vector.
pub fn expand_knots(knots: &[f64], multiplicities: &[u32]) -> Vec<f64> {
    knots
        .iter()
        .zip(multiplicities)
        .flat_map(|(&knot, &mult)| std::iter::repeat(knot).take(mult as usize))
        .collect()
}

/// Valid parameter range `[knots[p], knots[n]]` of a B-spline with `n`
/// control points.
pub fn knot_domain(knots: &[f64], degree: usize, control_count: usize) -> Option<(f64, f64)> {
    if control_count == 0 || knots.len() != control_count + degree + 1 {
        return None;
    }
    let start = knots[degree];
    let end = knots[control_count];
    (end > start).then_some((start, end))
}

/// De Boor's algorithm for B-spline curve evaluation.
///
/// `knots` must hold `control_points.len() + degree + 1` entries. Anything
/// else degrades to the nearest control point.
pub fn de_boor(control_points: &[Vec3], knots: &[f64], degree: usize, t: f64) -> Vec3 {
    let n = control_points.len();
    if n == 0 {
        return Vec3::ZERO;
    }
    if n == 1 || knots.len() != n + degree + 1 {
        return control_points[0];
    }

    // Knot span k with knots[k] <= t < knots[k+1], clamped to [degree, n-1]
    let k = (degree..n)
        .rev()
        .find(|&i| t >= knots[i])
        .unwrap_or(degree);

    let mut d: Vec<Vec3> = (0..=degree)
        .map(|j| control_points[k + j - degree])
        .collect();

    for r in 1..=degree {
        for j in (r..=degree).rev() {
            let i = k + j - degree;
            let lo = knots[i];
            let hi = knots[i + degree + 1 - r];
            let denom = hi - lo;
            let alpha = if denom.abs() > 1e-12 {
                ((t - lo) / denom) as f32
            } else {
                0.0
            };
            d[j] = d[j - 1] * (1.0 - alpha) + d[j] * alpha;
        }
    }

    d[degree]
}

/// Evaluate a tensor-product B-spline surface with control net `[u][v]`.
pub fn evaluate_bspline_surface(
    control_points: &[Vec<Vec3>],
    u_knots: &[f64],
    v_knots: &[f64],
    u_degree: usize,
    v_degree: usize,
    u: f64,
    v: f64,
) -> Vec3 {
    let column: Vec<Vec3> = control_points
        .iter()
        .map(|row| de_boor(row, v_knots, v_degree, v))
        .collect();
    de_boor(&column, u_knots, u_degree, u)
}

/// Effective radius and total turning of a control polygon.
///
/// Used to size spline sampling with the same arc rule as circles.
pub fn control_polygon_curvature(points: &[Vec3]) -> (f64, f64) {
    let length: f64 = points
        .windows(2)
        .map(|w| f64::from(w[0].distance(w[1])))
        .sum();
    let turning: f64 = points
        .windows(3)
        .filter_map(|w| {
            let a = (w[1] - w[0]).normalize_or_zero();
            let b = (w[2] - w[1]).normalize_or_zero();
            (a != Vec3::ZERO && b != Vec3::ZERO).then(|| f64::from(a.dot(b).clamp(-1.0, 1.0)).acos())
        })
        .sum();

    if turning <= 1e-9 {
        (f64::INFINITY, 0.0)
    } else {
        (length / turning, turning)
    }
}
