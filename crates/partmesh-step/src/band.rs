//! Meshing of curved faces from their sampled boundary.
//!
//! A face that sweeps from one boundary chain to another is meshed as a
//! stack of rows zipped together. The first and last rows, and both ends of
//! every row in between, are the face's own boundary samples, so the mesh
//! edges along the boundary are exactly the sampled B-rep edges. Any other
//! trimmed region is ear-clipped in parameter space and refined by
//! bisecting interior edges only.

use std::collections::HashMap;
use std::f64::consts::TAU;

use glam::Vec3;
use partmesh_core::TriangleMesh;

use crate::geometry::{
    merge_polygon_with_holes, polygon_signed_area, triangulate_polygon, unwrap_angle, Point2,
};

/// Parameter distance under which two samples lie on the same `u` line.
pub(crate) const SIDE_EPS: f64 = 1e-5;

/// Bisection passes over a trimmed region.
const MAX_REFINE_PASSES: usize = 24;

/// Vertices a refined region may grow to, per boundary sample.
const MAX_REFINE_GROWTH: usize = 64;

/// A surface parameterized over `(u, v)`.
pub(crate) trait Sheet {
    fn point(&self, u: f64, v: f64) -> Vec3;

    /// Segments for a row at `v` that spans `span` in `u`.
    fn row_segments(&self, v: f64, span: f64) -> usize;

    /// Chordal deviation allowed inside a trimmed region.
    fn chord_tolerance(&self) -> f64;
}

/// Boundary samples with their surface parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Chain {
    pub uv: Vec<Point2>,
    pub points: Vec<Vec3>,
}

impl Chain {
    pub fn push(&mut self, uv: Point2, point: Vec3) {
        self.uv.push(uv);
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.uv.len()
    }

    pub fn reversed(mut self) -> Self {
        self.uv.reverse();
        self.points.reverse();
        self
    }

    pub fn mean_v(&self) -> f64 {
        self.uv.iter().map(|p| p[1]).sum::<f64>() / self.len().max(1) as f64
    }

    pub fn mean_u(&self) -> f64 {
        self.uv.iter().map(|p| p[0]).sum::<f64>() / self.len().max(1) as f64
    }

    pub fn shift(&mut self, du: f64, dv: f64) {
        for p in &mut self.uv {
            p[0] += du;
            p[1] += dv;
        }
    }

    /// `v` at `u` along a chain ordered by `u`, clamped past its ends.
    pub fn v_at(&self, u: f64) -> f64 {
        let n = self.len();
        if n == 0 {
            return 0.0;
        }
        let i = self.uv.partition_point(|p| p[0] < u);
        if i == 0 {
            return self.uv[0][1];
        }
        if i == n {
            return self.uv[n - 1][1];
        }
        lerp_v(self.uv[i - 1], self.uv[i], u)
    }

    /// `v` at `u` along a chain covering one full turn in `u`.
    pub fn ring_v_at(&self, u: f64) -> f64 {
        let Some((&first, &last)) = self.uv.first().zip(self.uv.last()) else {
            return 0.0;
        };
        let u = first[0] + (u - first[0]).rem_euclid(TAU);
        if u > last[0] {
            lerp_v(last, [first[0] + TAU, first[1]], u)
        } else {
            self.v_at(u)
        }
    }

    fn increasing_u(&self) -> bool {
        self.uv.windows(2).all(|w| w[1][0] >= w[0][0] - SIDE_EPS)
    }

    /// Samples `from..=to`, walking forward around a closed loop.
    fn cyclic(&self, from: usize, to: usize) -> Chain {
        let n = self.len();
        let mut chain = Chain::default();
        let mut i = from;
        loop {
            chain.push(self.uv[i], self.points[i]);
            if i == to {
                return chain;
            }
            i = (i + 1) % n;
        }
    }
}

fn lerp_v(a: Point2, b: Point2, u: f64) -> f64 {
    let du = b[0] - a[0];
    if du > 0.0 {
        a[1] + (b[1] - a[1]) * ((u - a[0]) / du).clamp(0.0, 1.0)
    } else {
        a[1]
    }
}

pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

// ----------------------------------------------------------------------------
// Rows
// ----------------------------------------------------------------------------

/// Mesh vertices across a face, with each one's position along the row.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Row {
    pub indices: Vec<u32>,
    pub along: Vec<f64>,
}

impl Row {
    /// Append a chain's samples to `mesh` as a row ordered by `u`.
    pub fn from_chain(mesh: &mut TriangleMesh, chain: &Chain) -> Self {
        let mut row = Row::default();
        for (uv, &p) in chain.uv.iter().zip(&chain.points) {
            row.push(mesh, p, uv[0]);
        }
        row
    }

    pub fn push(&mut self, mesh: &mut TriangleMesh, point: Vec3, along: f64) {
        self.push_index(mesh.positions.len() as u32, along);
        mesh.positions.push(point);
    }

    fn push_index(&mut self, index: u32, along: f64) {
        self.indices.push(index);
        self.along.push(along);
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// A ring rotated to start nearest `reference` and closed by repeating
    /// its first vertex one turn later. A single vertex is left alone.
    fn closed(&self, reference: f64) -> Row {
        let n = self.len();
        if n < 2 {
            return self.clone();
        }
        let offset = |k: usize| (unwrap_angle(self.along[k], reference) - reference).abs();
        let start = (0..n)
            .min_by(|&a, &b| offset(a).total_cmp(&offset(b)))
            .unwrap_or(0);

        let mut row = Row::default();
        let mut along = unwrap_angle(self.along[start], reference);
        for k in 0..n {
            let i = (start + k) % n;
            if k > 0 {
                let step = self.along[i] - self.along[(i + n - 1) % n];
                along += if i == 0 { step + TAU } else { step };
            }
            row.push_index(self.indices[i], along);
        }
        row.push_index(self.indices[start], row.along[0] + TAU);
        row
    }
}

/// Triangulate the strip between two open rows that start and end on the
/// same boundary lines. `upper` lies at higher `v` than `lower`.
pub(crate) fn zip_rows(mesh: &mut TriangleMesh, lower: &Row, upper: &Row, flip: bool) {
    let (nl, nu) = (lower.len(), upper.len());
    if nl == 0 || nu == 0 {
        return;
    }
    let (mut i, mut j) = (0, 0);
    while i + 1 < nl || j + 1 < nu {
        let advance_lower = if i + 1 == nl {
            false
        } else if j + 1 == nu {
            true
        } else {
            lower.along[i + 1] <= upper.along[j + 1]
        };
        let face = if advance_lower {
            i += 1;
            [lower.indices[i - 1], lower.indices[i], upper.indices[j]]
        } else {
            j += 1;
            [lower.indices[i], upper.indices[j], upper.indices[j - 1]]
        };
        push_face(mesh, face, flip);
    }
}

/// [`zip_rows`] for two rings that each cover a full turn in `u`.
pub(crate) fn zip_rings(mesh: &mut TriangleMesh, lower: &Row, upper: &Row, flip: bool) {
    let reference = lower
        .along
        .first()
        .or(upper.along.first())
        .copied()
        .unwrap_or(0.0);
    zip_rows(mesh, &lower.closed(reference), &upper.closed(reference), flip);
}

/// Push a triangle, skipping one with a repeated corner.
pub(crate) fn push_face(mesh: &mut TriangleMesh, [a, b, c]: [u32; 3], flip: bool) {
    if a == b || b == c || a == c {
        return;
    }
    if flip {
        mesh.faces.push([a, c, b]);
    } else {
        mesh.faces.push([a, b, c]);
    }
}

// ----------------------------------------------------------------------------
// Patches
// ----------------------------------------------------------------------------

/// A single boundary loop split at its extreme `u` into two chains across
/// the face and two sides of constant `u`.
///
/// `lower` and `upper` run in increasing `u`; `left` and `right` run from
/// `lower` to `upper`. Both sides carry the same number of samples.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Patch {
    pub lower: Chain,
    pub upper: Chain,
    pub left: Chain,
    pub right: Chain,
}

impl Patch {
    pub fn split(boundary: &Chain) -> Option<Self> {
        let n = boundary.len();
        if n < 4 {
            return None;
        }
        let (u_min, u_max) = boundary
            .uv
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[0]), hi.max(p[0]))
            });
        if u_max - u_min <= 10.0 * SIDE_EPS {
            return None;
        }

        let (left_first, left_last) = cyclic_run(n, |i| boundary.uv[i][0] - u_min < SIDE_EPS)?;
        let (right_first, right_last) = cyclic_run(n, |i| u_max - boundary.uv[i][0] < SIDE_EPS)?;
        let left = boundary.cyclic(left_first, left_last);
        let right = boundary.cyclic(right_first, right_last);
        if left.len() < 2 || left.len() != right.len() {
            return None;
        }

        let forward = boundary.cyclic(left_last, right_first);
        let back = boundary.cyclic(right_last, left_first).reversed();
        if !(forward.increasing_u() && back.increasing_u()) {
            return None;
        }

        Some(if forward.mean_v() < back.mean_v() {
            Patch {
                lower: forward,
                upper: back,
                left: left.reversed(),
                right,
            }
        } else {
            Patch {
                lower: back,
                upper: forward,
                left,
                right: right.reversed(),
            }
        })
    }

    /// Zip the patch row by row. Interior rows start and end on the side
    /// samples and take their other vertices from `sheet`.
    pub fn triangulate(&self, sheet: &impl Sheet, flip: bool, mesh: &mut TriangleMesh) {
        let k = self.left.len() - 1;
        let fraction = |side: &Chain, j: usize| {
            let span = side.uv[k][1] - side.uv[0][1];
            if span.abs() > 1e-12 {
                (side.uv[j][1] - side.uv[0][1]) / span
            } else {
                j as f64 / k as f64
            }
        };

        let mut previous = Row::from_chain(mesh, &self.lower);
        for j in 1..=k {
            let row = if j == k {
                Row::from_chain(mesh, &self.upper)
            } else {
                let (a, b) = (self.left.uv[j], self.right.uv[j]);
                let (ta, tb) = (fraction(&self.left, j), fraction(&self.right, j));
                let v_at = |u: f64, t: f64| lerp(self.lower.v_at(u), self.upper.v_at(u), t);

                let middle = 0.5 * (a[0] + b[0]);
                let n = sheet
                    .row_segments(v_at(middle, 0.5 * (ta + tb)), b[0] - a[0])
                    .max(1);
                let mut row = Row::default();
                row.push(mesh, self.left.points[j], a[0]);
                for i in 1..n {
                    let s = i as f64 / n as f64;
                    let u = lerp(a[0], b[0], s);
                    row.push(mesh, sheet.point(u, v_at(u, lerp(ta, tb, s))), u);
                }
                row.push(mesh, self.right.points[j], b[0]);
                row
            };
            zip_rows(mesh, &previous, &row, flip);
            previous = row;
        }
    }
}

/// The one maximal run of consecutive indices of a closed loop where
/// `inside` holds, as `(first, last)`.
fn cyclic_run(n: usize, inside: impl Fn(usize) -> bool) -> Option<(usize, usize)> {
    let inside: Vec<bool> = (0..n).map(inside).collect();
    let mut starts = (0..n).filter(|&i| inside[i] && !inside[(i + n - 1) % n]);
    let first = starts.next()?;
    if starts.next().is_some() {
        return None;
    }
    let mut last = first;
    while inside[(last + 1) % n] {
        last = (last + 1) % n;
    }
    Some((first, last))
}

// ----------------------------------------------------------------------------
// Trimmed regions
// ----------------------------------------------------------------------------

/// Mesh the region inside `outer` and outside `holes`, all given in
/// `(u, v)`.
///
/// Boundary segments are kept as sampled; only interior edges are split.
pub(crate) fn triangulate_region(
    sheet: &impl Sheet,
    outer: &Chain,
    holes: &[Chain],
    flip: bool,
    mesh: &mut TriangleMesh,
) {
    if outer.len() < 3 {
        return;
    }
    // Outer loop counter-clockwise, holes clockwise
    let oriented = |chain: &Chain, ccw: bool| {
        if (polygon_signed_area(&chain.uv) > 0.0) == ccw {
            chain.clone()
        } else {
            chain.clone().reversed()
        }
    };
    let mut rings = vec![oriented(outer, true)];
    rings.extend(holes.iter().filter(|h| h.len() >= 3).map(|h| oriented(h, false)));

    let hole_uv: Vec<Vec<Point2>> = rings[1..].iter().map(|c| c.uv.clone()).collect();
    let merged = merge_polygon_with_holes(&rings[0].uv, &hole_uv);

    let mut uv: Vec<Point2> = rings.iter().flat_map(|c| c.uv.iter().copied()).collect();
    let mut points: Vec<Vec3> = rings.iter().flat_map(|c| c.points.iter().copied()).collect();
    let polygon: Vec<Point2> = merged.iter().map(|&i| uv[i]).collect();
    let mut triangles: Vec<[usize; 3]> = triangulate_polygon(&polygon)
        .into_iter()
        .map(|t| t.map(|i| merged[i]))
        .collect();

    refine(sheet, &mut uv, &mut points, &mut triangles);

    let base = mesh.positions.len() as u32;
    mesh.positions.extend(points);
    for t in triangles {
        push_face(mesh, t.map(|i| base + i as u32), flip);
    }
}

/// Bisect interior edges whose chord strays from the surface.
fn refine(
    sheet: &impl Sheet,
    uv: &mut Vec<Point2>,
    points: &mut Vec<Vec3>,
    triangles: &mut Vec<[usize; 3]>,
) {
    let tolerance = sheet.chord_tolerance();
    let limit = points.len().max(16) * MAX_REFINE_GROWTH;

    for _ in 0..MAX_REFINE_PASSES {
        let mut edges: HashMap<(usize, usize), usize> = HashMap::with_capacity(triangles.len() * 3);
        for (t, tri) in triangles.iter().enumerate() {
            for k in 0..3 {
                edges.insert((tri[k], tri[(k + 1) % 3]), t);
            }
        }

        let mut touched = vec![false; triangles.len()];
        let mut split = false;
        for t in 0..touched.len() {
            if touched[t] {
                continue;
            }
            for k in 0..3 {
                let tri = triangles[t];
                let (a, b, c) = (tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]);
                // Boundary edges have no twin and are never split
                let Some(&other) = edges.get(&(b, a)) else {
                    continue;
                };
                if other == t || touched[other] {
                    continue;
                }

                let mid = [0.5 * (uv[a][0] + uv[b][0]), 0.5 * (uv[a][1] + uv[b][1])];
                let on_surface = sheet.point(mid[0], mid[1]);
                let chord = (points[a] + points[b]) * 0.5;
                if f64::from(on_surface.distance(chord)) <= tolerance {
                    continue;
                }

                let Some(p) = triangles[other].iter().position(|&i| i == b) else {
                    continue;
                };
                let d = triangles[other][(p + 2) % 3];
                let m = points.len();
                points.push(on_surface);
                uv.push(mid);

                triangles[t] = [a, m, c];
                triangles.push([m, b, c]);
                triangles[other] = [b, m, d];
                triangles.push([m, a, d]);
                touched[t] = true;
                touched[other] = true;
                split = true;
                break;
            }
        }
        if !split || points.len() > limit {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The plane z = 0 with `(u, v)` as `(x, y)`.
    struct Flat;

    impl Sheet for Flat {
        fn point(&self, u: f64, v: f64) -> Vec3 {
            Vec3::new(u as f32, v as f32, 0.0)
        }

        fn row_segments(&self, _: f64, span: f64) -> usize {
            span.ceil() as usize
        }

        fn chord_tolerance(&self) -> f64 {
            1e-3
        }
    }

    /// A paraboloid-like bump, to force refinement.
    struct Dome;

    impl Sheet for Dome {
        fn point(&self, u: f64, v: f64) -> Vec3 {
            Vec3::new(u as f32, v as f32, (4.0 - u * u - v * v) as f32)
        }

        fn row_segments(&self, _: f64, span: f64) -> usize {
            (span * 4.0).ceil() as usize
        }

        fn chord_tolerance(&self) -> f64 {
            0.05
        }
    }

    fn chain(sheet: &impl Sheet, uv: &[Point2]) -> Chain {
        let mut c = Chain::default();
        for &p in uv {
            c.push(p, sheet.point(p[0], p[1]));
        }
        c
    }

    /// Edges used by one triangle only: the open boundary of a mesh.
    fn boundary_edges(mesh: &TriangleMesh) -> Vec<(u32, u32)> {
        let mut count: HashMap<(u32, u32), usize> = HashMap::new();
        for f in &mesh.faces {
            for k in 0..3 {
                let (a, b) = (f[k], f[(k + 1) % 3]);
                *count.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        let mut open: Vec<_> = count.into_iter().filter(|(_, n)| *n == 1).map(|(e, _)| e).collect();
        open.sort_unstable();
        open
    }

    fn area(mesh: &TriangleMesh) -> f32 {
        mesh.triangles()
            .map(|[a, b, c]| (b - a).cross(c - a).z * 0.5)
            .sum()
    }

    #[test]
    fn test_zip_rows_with_different_counts() {
        let mut mesh = TriangleMesh::new();
        let lower = Row::from_chain(&mut mesh, &chain(&Flat, &[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0]]));
        let upper = Row::from_chain(&mut mesh, &chain(&Flat, &[[0.0, 1.0], [3.0, 1.0]]));
        zip_rows(&mut mesh, &lower, &upper, false);

        assert_eq!(mesh.face_count(), 4);
        assert!((area(&mesh) - 3.0).abs() < 1e-6);
        // Every triangle faces +z
        assert!(mesh.triangles().all(|[a, b, c]| (b - a).cross(c - a).z > 0.0));
    }

    #[test]
    fn test_zip_fans_into_a_point() {
        let mut mesh = TriangleMesh::new();
        let lower = Row::from_chain(&mut mesh, &chain(&Flat, &[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]));
        let mut apex = Row::default();
        apex.push(&mut mesh, Vec3::new(1.0, 1.0, 0.0), 1.0);
        zip_rows(&mut mesh, &lower, &apex, false);
        assert_eq!(mesh.faces, vec![[0, 1, 3], [1, 2, 3]]);
    }

    #[test]
    fn test_zip_rings_closes_the_turn() {
        let ring = |mesh: &mut TriangleMesh, n: usize, z: f32, phase: f64| {
            let mut row = Row::default();
            for i in 0..n {
                let u = phase + TAU * i as f64 / n as f64;
                row.push(mesh, Vec3::new(u.cos() as f32, u.sin() as f32, z), u);
            }
            row
        };
        let mut mesh = TriangleMesh::new();
        let lower = ring(&mut mesh, 12, 0.0, 0.0);
        let upper = ring(&mut mesh, 7, 1.0, 2.0);
        zip_rings(&mut mesh, &lower, &upper, false);

        assert_eq!(mesh.face_count(), 19);
        // Only the two rims stay open
        assert_eq!(boundary_edges(&mesh).len(), 19);
    }

    #[test]
    fn test_patch_split_orders_chains() {
        // Clockwise rectangle with two samples on each side
        let boundary = chain(
            &Flat,
            &[
                [0.0, 0.0],
                [0.0, 1.0],
                [0.0, 2.0],
                [1.0, 2.0],
                [2.0, 2.0],
                [2.0, 1.0],
                [2.0, 0.0],
                [1.0, 0.0],
            ],
        );
        let patch = Patch::split(&boundary).unwrap();
        assert_eq!(patch.lower.uv, vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
        assert_eq!(patch.upper.uv, vec![[0.0, 2.0], [1.0, 2.0], [2.0, 2.0]]);
        assert_eq!(patch.left.uv, vec![[0.0, 0.0], [0.0, 1.0], [0.0, 2.0]]);
        assert_eq!(patch.right.uv, vec![[2.0, 0.0], [2.0, 1.0], [2.0, 2.0]]);

        let mut mesh = TriangleMesh::new();
        patch.triangulate(&Flat, false, &mut mesh);
        assert!((area(&mesh) - 4.0).abs() < 1e-5);
        assert!(mesh.triangles().all(|[a, b, c]| (b - a).cross(c - a).z > 0.0));
    }

    #[test]
    fn test_patch_needs_matching_sides() {
        let boundary = chain(
            &Flat,
            &[[0.0, 0.0], [2.0, 0.0], [2.0, 1.0], [2.0, 2.0], [0.0, 2.0]],
        );
        assert!(Patch::split(&boundary).is_none());

        // A triangle has no side on the right
        let triangle = chain(&Flat, &[[0.0, 0.0], [2.0, 1.0], [0.0, 2.0], [0.0, 1.0]]);
        assert!(Patch::split(&triangle).is_none());
    }

    #[test]
    fn test_region_keeps_boundary_and_refines_inside() {
        let outer: Vec<Point2> = (0..16)
            .map(|i| {
                let t = TAU * i as f64 / 16.0;
                [1.5 * t.cos(), 1.5 * t.sin()]
            })
            .collect();
        let outer = chain(&Dome, &outer);

        let mut mesh = TriangleMesh::new();
        triangulate_region(&Dome, &outer, &[], false, &mut mesh);

        // Refinement added interior vertices without touching the rim
        assert!(mesh.vertex_count() > 16);
        let mut rim: Vec<(u32, u32)> = (0..16u32)
            .map(|i| (i.min((i + 1) % 16), i.max((i + 1) % 16)))
            .collect();
        rim.sort_unstable();
        assert_eq!(boundary_edges(&mesh), rim);
        for p in &mesh.positions {
            assert!((p.z - (4.0 - p.x * p.x - p.y * p.y)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_region_with_hole() {
        let square = |r: f64| vec![[-r, -r], [r, -r], [r, r], [-r, r]];
        let outer = chain(&Flat, &square(2.0));
        let hole = chain(&Flat, &square(1.0));

        let mut mesh = TriangleMesh::new();
        triangulate_region(&Flat, &outer, &[hole], false, &mut mesh);
        assert!((area(&mesh) - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_ring_v_at_wraps() {
        let ring = chain(&Flat, &[[0.0, 0.0], [2.0, 1.0], [4.0, 2.0]]);
        assert!((ring.ring_v_at(1.0) - 0.5).abs() < 1e-12);
        assert!((ring.ring_v_at(1.0 + TAU) - 0.5).abs() < 1e-12);
        // Between the last sample and the first one a turn later
        let u = 4.0 + 0.5 * (TAU - 4.0);
        assert!((ring.ring_v_at(u) - 1.0).abs() < 1e-9);
    }
}
