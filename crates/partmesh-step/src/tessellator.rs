//! Per-face B-rep tessellation.
//!
//! Every face is triangulated on its own, so vertices on shared edges are
//! duplicated. Edges are sampled from their canonical curve direction so
//! both faces that share an edge produce the same points, and every face
//! keeps those samples as its mesh boundary. A later weld then closes the
//! seams without cracks.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::{DVec3, Vec3};
use partmesh_core::tolerance::MAX_ARC_SEGMENTS;
use partmesh_core::{BoundingBox, DeviationTolerance, KernelError, TriangleMesh};
use tracing::debug;

use crate::band::{
    lerp, push_face, triangulate_region, zip_rings, Chain, Patch, Row, Sheet, SIDE_EPS,
};
use crate::entities::{BSplineCurve, BSplineSurface, EntityGraph, Face, Frame, StepEntity};
use crate::geometry::{
    control_polygon_curvature, de_boor, evaluate_bspline_surface, expand_knots, knot_domain,
    merge_polygon_with_holes, newell_normal, polygon_signed_area, triangulate_polygon,
    unwrap_angle, Point2,
};

/// Upper bound on the subdivisions of one straight ruling.
const MAX_RULING_SEGMENTS: usize = 256;

/// Relative distance under which two boundary samples are the same point.
const POINT_EPS: f32 = 1e-6;

/// Relative distance within which a spline domain corner must meet the
/// face boundary.
const CORNER_EPS: f64 = 1e-4;

/// A sampled face boundary, already oriented for its face.
#[derive(Debug, Clone)]
struct BoundaryLoop {
    points: Vec<Vec3>,
    outer: bool,
}

/// Tessellates the faces of one entity graph to a fixed tolerance.
pub(crate) struct FaceTessellator<'a> {
    graph: &'a EntityGraph,
    tolerance: &'a DeviationTolerance,
}

impl<'a> FaceTessellator<'a> {
    pub(crate) fn new(graph: &'a EntityGraph, tolerance: &'a DeviationTolerance) -> Self {
        Self { graph, tolerance }
    }

    /// Append the triangles of one face to `mesh`.
    pub(crate) fn tessellate_face(
        &self,
        face_id: u64,
        mesh: &mut TriangleMesh,
    ) -> Result<(), KernelError> {
        let face = self.graph.face(face_id)?;
        let loops = self.face_loops(face)?;
        let surface = face.surface.and_then(|id| self.graph.get(id));

        match surface {
            Some(StepEntity::Plane(plane)) => {
                let frame = self.graph.placement(plane.position);
                self.tessellate_planar(&loops, frame, !face.same_sense, mesh);
            }
            Some(StepEntity::BSplineSurface(s)) => {
                self.tessellate_bspline_surface(s, &loops, face.same_sense, mesh)?;
            }
            Some(entity) => match self.analytic(entity, &loops) {
                Some(surface) => self.tessellate_analytic(&surface, face, &loops, mesh),
                None => {
                    debug!(face_id, surface = ?entity, "unsupported surface, triangulating boundary plane");
                    self.tessellate_boundary_plane(&loops, mesh);
                }
            },
            None => self.tessellate_boundary_plane(&loops, mesh),
        }
        Ok(())
    }

    /// The closed-form parameterization of an elementary surface.
    fn analytic(&self, entity: &StepEntity, loops: &[BoundaryLoop]) -> Option<AnalyticSurface> {
        let (position, kind) = match entity {
            StepEntity::CylindricalSurface(s) => (s.position, Analytic::Cylinder { radius: s.radius }),
            StepEntity::ConicalSurface(s) => {
                let semi_angle = s.semi_angle * self.graph.plane_angle_scale();
                let kind = Analytic::Cone {
                    radius: s.radius,
                    tan: semi_angle.tan(),
                };
                (s.position, kind)
            }
            StepEntity::SphericalSurface(s) => (s.position, Analytic::Sphere { radius: s.radius }),
            StepEntity::ToroidalSurface(s) => {
                let kind = Analytic::Torus {
                    major: s.major_radius,
                    minor: s.minor_radius,
                };
                (s.position, kind)
            }
            _ => return None,
        };

        let points: Vec<Vec3> = loops.iter().flat_map(|l| l.points.iter().copied()).collect();
        let feature_size = if points.is_empty() {
            kind.u_radius(0.0, 0.0)
        } else {
            f64::from(BoundingBox::from_points(&points).diagonal())
        };
        Some(AnalyticSurface {
            frame: self.graph.placement(position),
            kind,
            tolerance: *self.tolerance,
            chord: self.tolerance.linear_for(feature_size),
        })
    }

    // ------------------------------------------------------------------
    // Boundaries
    // ------------------------------------------------------------------

    fn face_loops(&self, face: &Face) -> Result<Vec<BoundaryLoop>, KernelError> {
        let mut loops = Vec::with_capacity(face.bounds.len());
        for &bound_id in &face.bounds {
            let Some(StepEntity::FaceBound(bound)) = self.graph.get(bound_id) else {
                return Err(KernelError::MissingEntity {
                    id: bound_id,
                    expected: "FACE_BOUND",
                });
            };

            let mut points = match self.graph.get(bound.bound) {
                Some(StepEntity::EdgeLoop(edge_loop)) => self.sample_edge_loop(&edge_loop.edges)?,
                Some(StepEntity::PolyLoop(poly)) => {
                    let mut points = Vec::with_capacity(poly.points.len());
                    for &id in &poly.points {
                        push_distinct(&mut points, self.graph.point(id)?);
                    }
                    points
                }
                Some(other) => {
                    // VERTEX_LOOP and friends carry no area
                    debug!(bound = bound.bound, loop_kind = ?other, "skipping face bound");
                    continue;
                }
                None => {
                    return Err(KernelError::MissingEntity {
                        id: bound.bound,
                        expected: "EDGE_LOOP",
                    })
                }
            };

            close_loop(&mut points);
            if !bound.orientation {
                points.reverse();
            }
            if points.len() >= 2 {
                loops.push(BoundaryLoop {
                    points,
                    outer: bound.outer,
                });
            }
        }
        Ok(loops)
    }

    fn sample_edge_loop(&self, edges: &[u64]) -> Result<Vec<Vec3>, KernelError> {
        let mut points = Vec::new();
        for &edge_id in edges {
            let Some(StepEntity::OrientedEdge(oriented)) = self.graph.get(edge_id) else {
                return Err(KernelError::MissingEntity {
                    id: edge_id,
                    expected: "ORIENTED_EDGE",
                });
            };
            let mut samples = self.sample_edge_curve(oriented.edge)?;
            if !oriented.orientation {
                samples.reverse();
            }
            for p in samples {
                push_distinct(&mut points, p);
            }
        }
        Ok(points)
    }

    /// Sample an EDGE_CURVE from its start vertex to its end vertex.
    fn sample_edge_curve(&self, edge_id: u64) -> Result<Vec<Vec3>, KernelError> {
        let edge = self.graph.edge_curve(edge_id)?;
        let start = self.graph.vertex(edge.start_vertex)?;
        let end = self.graph.vertex(edge.end_vertex)?;

        // Sample along the curve's own direction
        let (from, to) = if edge.same_sense {
            (start, end)
        } else {
            (end, start)
        };

        let mut points = match self.graph.curve(edge.curve) {
            Some(StepEntity::Circle(circle)) => {
                let frame = self.graph.placement(circle.position);
                self.sample_conic(frame, circle.radius, circle.radius, circle.radius, from, to)
            }
            Some(StepEntity::Ellipse(ellipse)) => {
                let frame = self.graph.placement(ellipse.position);
                let (a, b) = (ellipse.semi_axis_1, ellipse.semi_axis_2);
                let radius = a.min(b).powi(2) / a.max(b);
                self.sample_conic(frame, a, b, radius, from, to)
            }
            Some(StepEntity::BSplineCurve(curve)) => self.sample_bspline_curve(curve)?,
            _ => vec![from, to],
        };

        if let Some(first) = points.first_mut() {
            *first = from;
        }
        if let Some(last) = points.last_mut() {
            *last = to;
        }
        if !edge.same_sense {
            points.reverse();
        }
        Ok(points)
    }

    /// Sample a counter-clockwise conic arc from `from` to `to`.
    ///
    /// Coincident endpoints mean a full turn.
    fn sample_conic(
        &self,
        frame: Frame,
        a: f64,
        b: f64,
        radius: f64,
        from: Vec3,
        to: Vec3,
    ) -> Vec<Vec3> {
        let parameter = |p: Vec3| {
            let local = frame.to_local(p).as_dvec3();
            (local.y / b).atan2(local.x / a)
        };

        let start = parameter(from);
        let mut span = (parameter(to) - start).rem_euclid(TAU);
        if span < 1e-6 || from.abs_diff_eq(to, POINT_EPS * (1.0 + from.abs().max_element())) {
            span = TAU;
        }

        let segments = self.tolerance.arc_segments(radius, span);
        (0..=segments)
            .map(|i| {
                let t = start + span * i as f64 / segments as f64;
                frame.to_world(DVec3::new(a * t.cos(), b * t.sin(), 0.0).as_vec3())
            })
            .collect()
    }

    fn sample_bspline_curve(&self, curve: &BSplineCurve) -> Result<Vec<Vec3>, KernelError> {
        let control = curve
            .control_points
            .iter()
            .map(|&id| self.graph.point(id))
            .collect::<Result<Vec<_>, _>>()?;
        let knots = expand_knots(&curve.knots, &curve.knot_multiplicities);

        let Some((t0, t1)) = knot_domain(&knots, curve.degree, control.len()) else {
            debug!(
                control_points = control.len(),
                knots = knots.len(),
                "inconsistent B-spline curve, using its control polygon"
            );
            return Ok(control);
        };

        let segments = self.spline_segments(std::iter::once(control.as_slice()), control.len());
        Ok((0..=segments)
            .map(|i| {
                let t = t0 + (t1 - t0) * i as f64 / segments as f64;
                de_boor(&control, &knots, curve.degree, t)
            })
            .collect())
    }

    /// Segments for spline polygons, sized by their effective radius.
    fn spline_segments<'p>(
        &self,
        polygons: impl Iterator<Item = &'p [Vec3]>,
        control_count: usize,
    ) -> usize {
        let curved = polygons
            .map(|polygon| {
                let (radius, turning) = control_polygon_curvature(polygon);
                if turning > 0.0 {
                    self.tolerance.arc_segments(radius, turning)
                } else {
                    1
                }
            })
            .max()
            .unwrap_or(1);
        curved
            .max(control_count.saturating_sub(1))
            .clamp(1, MAX_ARC_SEGMENTS)
    }

    /// Subdivisions of a straight ruling of `length` on a surface of
    /// `radius`, keeping cells close to square.
    fn ruling_segments(&self, length: f64, radius: f64) -> usize {
        let cell = radius * self.tolerance.arc_step(radius);
        if !(length.is_finite() && length > 0.0 && cell.is_finite() && cell > 0.0) {
            return 1;
        }
        ((length / cell).ceil() as usize).clamp(1, MAX_RULING_SEGMENTS)
    }

    // ------------------------------------------------------------------
    // Planar faces
    // ------------------------------------------------------------------

    /// Ear-clip loops projected into `frame`; triangles face `frame.z`.
    fn tessellate_planar(
        &self,
        loops: &[BoundaryLoop],
        frame: Frame,
        flip: bool,
        mesh: &mut TriangleMesh,
    ) {
        let mut projected: Vec<Vec<Point2>> = loops
            .iter()
            .map(|l| {
                l.points
                    .iter()
                    .map(|&p| {
                        let local = frame.to_local(p).as_dvec3();
                        [local.x, local.y]
                    })
                    .collect()
            })
            .collect();

        let Some(outer) = outer_loop_index(loops, &projected) else {
            return;
        };
        if projected[outer].len() < 3 {
            return;
        }

        // Outer loop counter-clockwise, holes clockwise
        let mut rings: Vec<(Vec<Point2>, Vec<Vec3>)> = Vec::with_capacity(loops.len());
        for (i, (points_2d, boundary)) in projected.iter_mut().zip(loops).enumerate() {
            let mut points_3d = boundary.points.clone();
            let ccw = polygon_signed_area(points_2d) > 0.0;
            if (i == outer) != ccw {
                points_2d.reverse();
                points_3d.reverse();
            }
            let ring = (std::mem::take(points_2d), points_3d);
            if i == outer {
                rings.insert(0, ring);
            } else {
                rings.push(ring);
            }
        }

        let holes: Vec<Vec<Point2>> = rings[1..].iter().map(|(p, _)| p.clone()).collect();
        let merged = merge_polygon_with_holes(&rings[0].0, &holes);
        let all_2d: Vec<Point2> = rings.iter().flat_map(|(p, _)| p.iter().copied()).collect();
        let polygon: Vec<Point2> = merged.iter().map(|&i| all_2d[i]).collect();

        let base = mesh.positions.len() as u32;
        mesh.positions
            .extend(rings.iter().flat_map(|(_, p)| p.iter().copied()));
        for [a, b, c] in triangulate_polygon(&polygon) {
            let face = [
                base + merged[a] as u32,
                base + merged[b] as u32,
                base + merged[c] as u32,
            ];
            push_face(mesh, face, flip);
        }
    }

    /// Triangulate in the Newell plane of the outer loop.
    fn tessellate_boundary_plane(&self, loops: &[BoundaryLoop], mesh: &mut TriangleMesh) {
        let Some(outer) = loops.iter().find(|l| l.outer).or_else(|| loops.first()) else {
            return;
        };
        let normal = newell_normal(&outer.points).normalize_or_zero();
        if normal == Vec3::ZERO {
            debug!(points = outer.points.len(), "degenerate face boundary");
            return;
        }

        let hint = if normal.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
        let x = (hint - normal * hint.dot(normal)).normalize();
        let frame = Frame {
            origin: outer.points[0],
            x,
            y: normal.cross(x),
            z: normal,
        };
        self.tessellate_planar(loops, frame, false, mesh);
    }

    // ------------------------------------------------------------------
    // Analytic surfaces
    // ------------------------------------------------------------------

    fn tessellate_analytic(
        &self,
        surface: &AnalyticSurface,
        face: &Face,
        loops: &[BoundaryLoop],
        mesh: &mut TriangleMesh,
    ) {
        let flip = !face.same_sense;
        match Layout::build(surface, loops, face.same_sense) {
            Layout::Band { lower, upper } => self.tessellate_band(surface, &lower, &upper, flip, mesh),
            Layout::Patch(patch) => patch.triangulate(surface, flip, mesh),
            Layout::Region { outer, holes } => triangulate_region(surface, &outer, &holes, flip, mesh),
            Layout::Empty => debug!(loops = loops.len(), "analytic face has no area to mesh"),
        }
    }

    /// Stack rings around the axis from one end of a band to the other.
    fn tessellate_band(
        &self,
        surface: &AnalyticSurface,
        lower: &BandEnd,
        upper: &BandEnd,
        flip: bool,
        mesh: &mut TriangleMesh,
    ) {
        let u0 = lower.start_u().or_else(|| upper.start_u()).unwrap_or(-PI);
        let rows = self.band_rows(surface.kind, lower.mean_v(), upper.mean_v());

        let mut previous = lower.row(surface, u0, mesh);
        for j in 1..=rows {
            let row = if j == rows {
                upper.row(surface, u0, mesh)
            } else {
                let t = j as f64 / rows as f64;
                ring_row(surface, u0, |u| lerp(lower.v_at(u), upper.v_at(u), t), mesh)
            };
            zip_rings(mesh, &previous, &row, flip);
            previous = row;
        }
    }

    /// Rows across a band, keeping cells close to square.
    fn band_rows(&self, kind: Analytic, v0: f64, v1: f64) -> usize {
        let dv = (v1 - v0).abs();
        match kind {
            Analytic::Cylinder { radius } => self.ruling_segments(dv, radius),
            Analytic::Cone { radius, tan } => {
                let slant = dv * (1.0 + tan * tan).sqrt();
                self.ruling_segments(slant, kind.u_radius(v0, v1).max(radius.abs()))
            }
            Analytic::Sphere { radius } => self.tolerance.arc_segments(radius, dv),
            Analytic::Torus { minor, .. } => self.tolerance.arc_segments(minor, dv),
        }
    }

    // ------------------------------------------------------------------
    // B-spline surfaces
    // ------------------------------------------------------------------

    fn tessellate_bspline_surface(
        &self,
        surface: &BSplineSurface,
        loops: &[BoundaryLoop],
        same_sense: bool,
        mesh: &mut TriangleMesh,
    ) -> Result<(), KernelError> {
        let net = surface
            .control_points
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&id| self.graph.point(id))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let u_count = net.len();
        let v_count = net.first().map_or(0, Vec::len);
        if v_count == 0 || net.iter().any(|row| row.len() != v_count) {
            return Err(KernelError::Degenerate(format!(
                "B-spline surface control net is empty or ragged ({u_count} rows)"
            )));
        }

        let u_knots = expand_knots(&surface.u_knots, &surface.u_multiplicities);
        let v_knots = expand_knots(&surface.v_knots, &surface.v_multiplicities);
        let (Some((u0, u1)), Some((v0, v1))) = (
            knot_domain(&u_knots, surface.u_degree, u_count),
            knot_domain(&v_knots, surface.v_degree, v_count),
        ) else {
            return Err(KernelError::Degenerate(format!(
                "B-spline surface knots do not match its {u_count}x{v_count} control net"
            )));
        };

        let columns: Vec<Vec<Vec3>> = (0..v_count)
            .map(|j| net.iter().map(|row| row[j]).collect())
            .collect();
        let nu = self.spline_segments(columns.iter().map(Vec::as_slice), u_count);
        let nv = self.spline_segments(net.iter().map(Vec::as_slice), v_count);

        let sheet = SplineSheet {
            net: &net,
            u_knots: &u_knots,
            v_knots: &v_knots,
            u_degree: surface.u_degree,
            v_degree: surface.v_degree,
            u_segments: nu,
            u_span: u1 - u0,
            chord: self
                .tolerance
                .linear_for(f64::from(BoundingBox::from_points(&net.concat()).diagonal())),
        };
        let flip = !same_sense;

        if let [boundary] = loops {
            if let Some(chain) = domain_boundary(&sheet, &boundary.points, [u0, u1, v0, v1]) {
                match Patch::split(&chain) {
                    Some(patch) => patch.triangulate(&sheet, flip, mesh),
                    None => triangulate_region(&sheet, &chain, &[], flip, mesh),
                }
                return Ok(());
            }
        }
        if !loops.is_empty() {
            debug!(
                loops = loops.len(),
                "spline face is trimmed inside its knot domain, meshing the whole domain"
            );
        }

        let row = nu + 1;
        let base = mesh.positions.len() as u32;
        for j in 0..=nv {
            let v = v0 + (v1 - v0) * j as f64 / nv as f64;
            for i in 0..=nu {
                let u = u0 + (u1 - u0) * i as f64 / nu as f64;
                mesh.positions.push(sheet.point(u, v));
            }
        }
        for j in 0..nv {
            for i in 0..nu {
                push_cell(mesh, base, row, i, j, flip);
            }
        }
        Ok(())
    }
}

fn same_point(a: Vec3, b: Vec3) -> bool {
    a.abs_diff_eq(b, POINT_EPS * (1.0 + a.abs().max_element()))
}

fn push_distinct(points: &mut Vec<Vec3>, p: Vec3) {
    if points.last().map_or(true, |&q| !same_point(q, p)) {
        points.push(p);
    }
}

/// Drop the closing duplicates of a loop.
fn close_loop(points: &mut Vec<Vec3>) {
    while points.len() > 1 && same_point(points[0], points[points.len() - 1]) {
        points.pop();
    }
}

fn outer_loop_index(loops: &[BoundaryLoop], projected: &[Vec<Point2>]) -> Option<usize> {
    loops.iter().position(|l| l.outer).or_else(|| {
        projected
            .iter()
            .enumerate()
            .max_by(|a, b| {
                polygon_signed_area(a.1)
                    .abs()
                    .total_cmp(&polygon_signed_area(b.1).abs())
            })
            .map(|(i, _)| i)
    })
}

/// Two triangles of grid cell `(i, j)`, wound with the parameterization.
fn push_cell(mesh: &mut TriangleMesh, base: u32, row: usize, i: usize, j: usize, flip: bool) {
    let i0 = base + (j * row + i) as u32;
    let i1 = i0 + 1;
    let i3 = base + ((j + 1) * row + i) as u32;
    let i2 = i3 + 1;
    push_face(mesh, [i0, i1, i2], flip);
    push_face(mesh, [i0, i2, i3], flip);
}

// ============================================================================
// B-spline parameterization
// ============================================================================

/// A B-spline surface evaluated over its knot domain.
struct SplineSheet<'s> {
    net: &'s [Vec<Vec3>],
    u_knots: &'s [f64],
    v_knots: &'s [f64],
    u_degree: usize,
    v_degree: usize,
    /// Segments across the whole `u` domain.
    u_segments: usize,
    u_span: f64,
    chord: f64,
}

impl Sheet for SplineSheet<'_> {
    fn point(&self, u: f64, v: f64) -> Vec3 {
        evaluate_bspline_surface(
            self.net,
            self.u_knots,
            self.v_knots,
            self.u_degree,
            self.v_degree,
            u,
            v,
        )
    }

    fn row_segments(&self, _v: f64, span: f64) -> usize {
        let share = if self.u_span > 0.0 {
            span.abs() / self.u_span
        } else {
            1.0
        };
        ((self.u_segments as f64 * share).ceil() as usize).clamp(1, MAX_ARC_SEGMENTS)
    }

    fn chord_tolerance(&self) -> f64 {
        self.chord
    }
}

/// Parameters for a boundary that runs once round the edge of the domain
/// `[u0, u1, v0, v1]`.
///
/// Each domain corner must be one of the boundary samples; samples between
/// two corners are spaced along that side of the domain by chord length.
fn domain_boundary(sheet: &impl Sheet, points: &[Vec3], domain: [f64; 4]) -> Option<Chain> {
    let n = points.len();
    if n < 4 {
        return None;
    }
    let [u0, u1, v0, v1] = domain;
    let corners: [Point2; 4] = [[u0, v0], [u1, v0], [u1, v1], [u0, v1]];
    let reach = CORNER_EPS * f64::from(BoundingBox::from_points(points).diagonal()).max(1e-9);

    let mut at = [0usize; 4];
    for (slot, corner) in at.iter_mut().zip(&corners) {
        let target = sheet.point(corner[0], corner[1]);
        let (index, distance) = points
            .iter()
            .enumerate()
            .map(|(i, p)| (i, f64::from(p.distance(target))))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        if distance > reach {
            return None;
        }
        *slot = index;
    }

    // Corners must follow the boundary in one direction or the other
    let offset = |k: usize| (at[k] + n - at[0]) % n;
    let order = if 0 < offset(1) && offset(1) < offset(2) && offset(2) < offset(3) {
        [0, 1, 2, 3]
    } else if 0 < offset(3) && offset(3) < offset(2) && offset(2) < offset(1) {
        [0, 3, 2, 1]
    } else {
        return None;
    };

    let mut chain = Chain::default();
    for k in 0..4 {
        let (a, b) = (order[k], order[(k + 1) % 4]);
        let count = (at[b] + n - at[a]) % n;
        let mut lengths = Vec::with_capacity(count + 1);
        let mut length = 0.0;
        lengths.push(length);
        for s in 0..count {
            let i = (at[a] + s) % n;
            length += f64::from(points[i].distance(points[(i + 1) % n]));
            lengths.push(length);
        }
        for (s, &l) in lengths[..count].iter().enumerate() {
            let t = if length > 0.0 { l / length } else { s as f64 / count as f64 };
            let uv = [
                lerp(corners[a][0], corners[b][0], t),
                lerp(corners[a][1], corners[b][1], t),
            ];
            chain.push(uv, points[(at[a] + s) % n]);
        }
    }
    Some(chain)
}

// ============================================================================
// Analytic surface parameterizations
// ============================================================================

/// Surface kinds with a closed-form `(u, v)` parameterization.
///
/// `u` is always the angle about the placement axis, and `∂u × ∂v` is the
/// outward surface normal.
#[derive(Debug, Clone, Copy)]
enum Analytic {
    /// `v` is height along the axis.
    Cylinder { radius: f64 },
    /// `v` is height along the axis; radius grows by `tan` per unit height.
    Cone { radius: f64, tan: f64 },
    /// `v` is latitude.
    Sphere { radius: f64 },
    /// `v` is the angle about the tube.
    Torus { major: f64, minor: f64 },
}

impl Analytic {
    /// Largest distance from the axis over `[v0, v1]`.
    fn u_radius(&self, v0: f64, v1: f64) -> f64 {
        match *self {
            Analytic::Cylinder { radius } | Analytic::Sphere { radius } => radius,
            Analytic::Cone { radius, tan } => (radius + v0 * tan).abs().max((radius + v1 * tan).abs()),
            Analytic::Torus { major, minor } => major + minor,
        }
    }

    /// Ends of the whole surface, for a face with no boundary.
    fn full_band(&self) -> Option<(BandEnd, BandEnd)> {
        match self {
            Analytic::Sphere { .. } => Some((BandEnd::Pole(-FRAC_PI_2), BandEnd::Pole(FRAC_PI_2))),
            Analytic::Torus { .. } => Some((BandEnd::Open(-PI), BandEnd::Open(PI))),
            Analytic::Cylinder { .. } | Analytic::Cone { .. } => None,
        }
    }

    fn v_periodic(&self) -> bool {
        matches!(self, Analytic::Torus { .. })
    }

    /// The pole or apex where a band open towards `side` closes to a point.
    fn closure(&self, side: f64, v_min: f64, v_max: f64) -> Option<f64> {
        match *self {
            Analytic::Sphere { .. } => Some(side * FRAC_PI_2),
            Analytic::Cone { radius, tan } if tan.abs() > 1e-12 => {
                let apex = -radius / tan;
                ((apex - 0.5 * (v_min + v_max)) * side > 0.0).then_some(apex)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct AnalyticSurface {
    frame: Frame,
    kind: Analytic,
    tolerance: DeviationTolerance,
    /// Chordal deviation allowed inside trimmed regions.
    chord: f64,
}

impl Sheet for AnalyticSurface {
    fn point(&self, u: f64, v: f64) -> Vec3 {
        let (sin_u, cos_u) = u.sin_cos();
        let local = match self.kind {
            Analytic::Cylinder { radius } => DVec3::new(radius * cos_u, radius * sin_u, v),
            Analytic::Cone { radius, tan } => {
                let rho = radius + v * tan;
                DVec3::new(rho * cos_u, rho * sin_u, v)
            }
            Analytic::Sphere { radius } => {
                let (sin_v, cos_v) = v.sin_cos();
                DVec3::new(radius * cos_v * cos_u, radius * cos_v * sin_u, radius * sin_v)
            }
            Analytic::Torus { major, minor } => {
                let (sin_v, cos_v) = v.sin_cos();
                let rho = major + minor * cos_v;
                DVec3::new(rho * cos_u, rho * sin_u, minor * sin_v)
            }
        };
        self.frame.to_world(local.as_vec3())
    }

    fn row_segments(&self, v: f64, span: f64) -> usize {
        self.tolerance.arc_segments(self.kind.u_radius(v, v), span)
    }

    fn chord_tolerance(&self) -> f64 {
        self.chord
    }
}

impl AnalyticSurface {
    /// Local point, plus whether it sits on the axis where `u` is undefined.
    fn local(&self, p: Vec3) -> (DVec3, bool) {
        let local = self.frame.to_local(p).as_dvec3();
        let scale = 1.0 + local.abs().max_element();
        (local, local.x.hypot(local.y) <= 1e-9 * scale)
    }

    fn v(&self, local: DVec3) -> f64 {
        match self.kind {
            Analytic::Cylinder { .. } | Analytic::Cone { .. } => local.z,
            Analytic::Sphere { radius } => (local.z / radius).clamp(-1.0, 1.0).asin(),
            Analytic::Torus { major, .. } => local.z.atan2(local.x.hypot(local.y) - major),
        }
    }

    /// Map a loop into unwrapped `(u, v)` coordinates.
    ///
    /// A point on the axis takes the `u` of both neighbours so the polygon
    /// runs along the pole line.
    fn uv_loop(&self, points: &[Vec3]) -> Chain {
        let samples: Vec<(Option<f64>, f64)> = points
            .iter()
            .map(|&p| {
                let (local, on_axis) = self.local(p);
                let u = (!on_axis).then(|| local.y.atan2(local.x));
                (u, self.v(local))
            })
            .collect();

        let n = samples.len();
        let neighbour_u = |start: usize, step: usize| {
            (1..n)
                .map(|k| (start + k * step) % n)
                .find_map(|i| samples[i].0)
        };

        let mut chain = Chain::default();
        for (i, (&(u, v), &p)) in samples.iter().zip(points).enumerate() {
            match u {
                Some(u) => chain.push([u, v], p),
                None => {
                    if let Some(prev) = neighbour_u(i, n - 1) {
                        chain.push([prev, v], p);
                    }
                    if let Some(next) = neighbour_u(i, 1) {
                        chain.push([next, v], p);
                    }
                }
            }
        }

        for i in 1..chain.len() {
            let previous = chain.uv[i - 1];
            chain.uv[i][0] = unwrap_angle(chain.uv[i][0], previous[0]);
            if self.kind.v_periodic() {
                chain.uv[i][1] = unwrap_angle(chain.uv[i][1], previous[1]);
            }
        }
        chain
    }

    /// A loop around the axis ordered by increasing `u`, without axis
    /// points. `None` when the loop doubles back.
    fn ring(&self, chain: &Chain, winding: f64) -> Option<Chain> {
        let ordered = if winding < 0.0 {
            chain.clone().reversed()
        } else {
            chain.clone()
        };
        let mut ring = Chain::default();
        for (&uv, &p) in ordered.uv.iter().zip(&ordered.points) {
            if self.local(p).1 {
                continue;
            }
            if ring.uv.last().is_some_and(|last| uv[0] < last[0] - SIDE_EPS) {
                return None;
            }
            ring.push(uv, p);
        }
        while ring.len() > 1 && ring.uv[ring.len() - 1][0] - ring.uv[0][0] > TAU - SIDE_EPS {
            ring.uv.pop();
            ring.points.pop();
        }
        (ring.len() >= 3).then_some(ring)
    }

    /// Ends of a band with a boundary ring on one side only. `side` is
    /// positive when the face lies above the ring.
    fn close_ring(&self, ring: Chain, side: f64) -> Option<(BandEnd, BandEnd)> {
        let (v_min, v_max) = ring
            .uv
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p[1]), hi.max(p[1]))
            });
        let other = match self.kind.closure(side, v_min, v_max) {
            Some(v) => BandEnd::Pole(v),
            None if self.kind.v_periodic() => {
                // Once round the tube and back to the same ring
                let mut twin = ring.clone();
                twin.shift(0.0, side * TAU);
                BandEnd::Loop(twin)
            }
            None => return None,
        };
        let ring = BandEnd::Loop(ring);
        Some(if side > 0.0 { (ring, other) } else { (other, ring) })
    }

    fn align_rings(&self, lower: Chain, mut upper: Chain) -> Option<(BandEnd, BandEnd)> {
        if self.kind.v_periodic() {
            let turns = ((lower.mean_v() - upper.mean_v()) / TAU).floor() + 1.0;
            upper.shift(0.0, turns * TAU);
        }
        (upper.mean_v() > lower.mean_v()).then(|| (BandEnd::Loop(lower), BandEnd::Loop(upper)))
    }
}

/// Net change in `u` once round a closed loop.
fn winding(chain: &Chain) -> f64 {
    match (chain.uv.first(), chain.uv.last()) {
        (Some(first), Some(last)) => unwrap_angle(first[0], last[0]) - first[0],
        _ => 0.0,
    }
}

/// A ring of new vertices around the axis, starting at `u0`.
fn ring_row(
    surface: &AnalyticSurface,
    u0: f64,
    v_at: impl Fn(f64) -> f64,
    mesh: &mut TriangleMesh,
) -> Row {
    let n = surface.row_segments(v_at(u0), TAU).max(3);
    let mut row = Row::default();
    for i in 0..n {
        let u = u0 + TAU * i as f64 / n as f64;
        row.push(mesh, surface.point(u, v_at(u)), u);
    }
    row
}

/// How an analytic face is meshed in parameter space.
#[derive(Debug)]
enum Layout {
    /// Rings stacked around the axis between two ends.
    Band { lower: BandEnd, upper: BandEnd },
    /// One loop that splits into chains across the face.
    Patch(Patch),
    /// Any other trimmed region.
    Region { outer: Chain, holes: Vec<Chain> },
    Empty,
}

/// One end of a band around the axis.
#[derive(Debug, Clone)]
enum BandEnd {
    /// A boundary loop over one turn, ordered by increasing `u`.
    Loop(Chain),
    /// A pole or apex where the band closes to a point.
    Pole(f64),
    /// A line of constant `v` with no boundary edge.
    Open(f64),
}

impl BandEnd {
    fn v_at(&self, u: f64) -> f64 {
        match self {
            BandEnd::Loop(ring) => ring.ring_v_at(u),
            BandEnd::Pole(v) | BandEnd::Open(v) => *v,
        }
    }

    fn mean_v(&self) -> f64 {
        match self {
            BandEnd::Loop(ring) => ring.mean_v(),
            BandEnd::Pole(v) | BandEnd::Open(v) => *v,
        }
    }

    fn start_u(&self) -> Option<f64> {
        match self {
            BandEnd::Loop(ring) => ring.uv.first().map(|p| p[0]),
            BandEnd::Pole(_) | BandEnd::Open(_) => None,
        }
    }

    fn row(&self, surface: &AnalyticSurface, u0: f64, mesh: &mut TriangleMesh) -> Row {
        match self {
            BandEnd::Loop(ring) => Row::from_chain(mesh, ring),
            BandEnd::Pole(v) => {
                let mut row = Row::default();
                row.push(mesh, surface.point(u0, *v), u0);
                row
            }
            BandEnd::Open(v) => ring_row(surface, u0, |_| *v, mesh),
        }
    }

    /// The end as an open line over one turn from near `u0`.
    fn line(&self, surface: &AnalyticSurface, u0: f64) -> Chain {
        let mut line = Chain::default();
        match self {
            BandEnd::Loop(ring) => {
                let (Some(&first), Some(&point)) = (ring.uv.first(), ring.points.first()) else {
                    return line;
                };
                line = ring.clone();
                line.shift(unwrap_angle(first[0], u0) - first[0], 0.0);
                let start = line.uv[0];
                line.push([start[0] + TAU, start[1]], point);
            }
            BandEnd::Pole(v) => {
                for u in [u0, u0 + TAU] {
                    line.push([u, *v], surface.point(u, *v));
                }
            }
            BandEnd::Open(v) => {
                let n = surface.row_segments(*v, TAU).max(3);
                for i in 0..=n {
                    let u = u0 + TAU * i as f64 / n as f64;
                    line.push([u, *v], surface.point(u, *v));
                }
            }
        }
        line
    }
}

impl Layout {
    fn build(surface: &AnalyticSurface, loops: &[BoundaryLoop], same_sense: bool) -> Self {
        let mut chains: Vec<Chain> = loops
            .iter()
            .map(|l| surface.uv_loop(&l.points))
            .filter(|c| c.len() >= 2)
            .collect();

        // Shift every loop by whole turns to sit next to the first one
        if let Some(reference) = chains.first().map(Chain::mean_u) {
            for chain in chains.iter_mut().skip(1) {
                let mean = chain.mean_u();
                chain.shift(unwrap_angle(mean, reference) - mean, 0.0);
            }
        }

        // The face lies left of its boundary when the loops follow the
        // surface normal
        let sense = if same_sense { 1.0 } else { -1.0 };
        let (mut lower, mut upper, mut plain) = (Vec::new(), Vec::new(), Vec::new());
        for chain in chains {
            let turn = winding(&chain);
            if turn.abs() > PI {
                let Some(ring) = surface.ring(&chain, turn) else {
                    debug!(samples = chain.len(), "boundary loop doubles back around the axis");
                    return Layout::Empty;
                };
                if turn * sense > 0.0 {
                    lower.push(ring);
                } else {
                    upper.push(ring);
                }
            } else if polygon_signed_area(&chain.uv).abs() > 1e-12 {
                plain.push(chain);
            }
        }
        if lower.len() > 1 || upper.len() > 1 {
            debug!(
                lower = lower.len(),
                upper = upper.len(),
                "more than one boundary ring on one side of a face"
            );
            return Layout::Empty;
        }

        let ends = match (lower.pop(), upper.pop()) {
            (Some(lower), Some(upper)) => surface.align_rings(lower, upper),
            (Some(lower), None) => surface.close_ring(lower, 1.0),
            (None, Some(upper)) => surface.close_ring(upper, -1.0),
            (None, None) => {
                let bounding = plain
                    .iter()
                    .position(|c| polygon_signed_area(&c.uv) * sense > 0.0);
                if let Some(index) = bounding {
                    let outer = plain.swap_remove(index);
                    if plain.is_empty() {
                        if let Some(patch) = Patch::split(&outer) {
                            return Layout::Patch(patch);
                        }
                    }
                    return Layout::Region {
                        outer,
                        holes: plain,
                    };
                }
                // Only holes: the rest of a closed surface
                surface.kind.full_band()
            }
        };
        let Some((lower, upper)) = ends else {
            debug!(kind = ?surface.kind, "face boundary does not close on its surface");
            return Layout::Empty;
        };
        if plain.is_empty() {
            return Layout::Band { lower, upper };
        }

        // Holes in a band: mesh the outline of the band as one region
        let u0 = lower.start_u().or_else(|| upper.start_u()).unwrap_or(-PI);
        let mut outer = lower.line(surface, u0);
        let top = upper.line(surface, u0).reversed();
        outer.uv.extend(top.uv);
        outer.points.extend(top.points);

        let base_v = lower.mean_v();
        for hole in &mut plain {
            let du = ((hole.mean_u() - u0) / TAU).floor() * TAU;
            let dv = if surface.kind.v_periodic() {
                ((hole.mean_v() - base_v) / TAU).floor() * TAU
            } else {
                0.0
            };
            hole.shift(-du, -dv);
        }
        Layout::Region {
            outer,
            holes: plain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::p21::parse_data_section;

    fn graph(data: &str) -> EntityGraph {
        let text = format!("DATA;\n{}\nENDSEC;", data);
        let (_, instances) = parse_data_section(&text).unwrap();
        EntityGraph::new(&instances)
    }

    const CIRCLE_EDGE: &str = "\
        #1=CARTESIAN_POINT('',(0.,0.,0.));\n\
        #2=DIRECTION('',(0.,0.,1.));\n\
        #3=DIRECTION('',(1.,0.,0.));\n\
        #4=AXIS2_PLACEMENT_3D('',#1,#2,#3);\n\
        #5=CIRCLE('',#4,2.);\n\
        #6=CARTESIAN_POINT('',(2.,0.,0.));\n\
        #7=VERTEX_POINT('',#6);\n\
        #8=CARTESIAN_POINT('',(0.,2.,0.));\n\
        #9=VERTEX_POINT('',#8);\n\
        #10=EDGE_CURVE('',#7,#9,#5,.T.);\n\
        #11=EDGE_CURVE('',#7,#7,#5,.T.);\n\
        #12=EDGE_CURVE('',#9,#7,#5,.F.);";

    /// Undirected edges used by exactly one triangle.
    fn open_edges(mesh: &TriangleMesh) -> Vec<(u32, u32)> {
        let mut uses: std::collections::HashMap<(u32, u32), usize> = Default::default();
        for f in &mesh.faces {
            for k in 0..3 {
                let (a, b) = (f[k], f[(k + 1) % 3]);
                *uses.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        let mut open: Vec<_> = uses.into_iter().filter(|&(_, n)| n == 1).map(|(e, _)| e).collect();
        open.sort_unstable();
        open
    }

    fn equator(n: usize) -> Vec<Vec3> {
        (0..n)
            .map(|i| {
                let t = TAU * i as f64 / n as f64;
                Vec3::new(t.cos() as f32, t.sin() as f32, 0.0)
            })
            .collect()
    }

    fn unit_sphere(tolerance: DeviationTolerance) -> AnalyticSurface {
        AnalyticSurface {
            frame: Frame::WORLD,
            kind: Analytic::Sphere { radius: 1.0 },
            tolerance,
            chord: tolerance.linear(),
        }
    }

    #[test]
    fn test_quarter_arc_follows_curve_direction() {
        let g = graph(CIRCLE_EDGE);
        let tol = DeviationTolerance::default();
        let t = FaceTessellator::new(&g, &tol);

        let arc = t.sample_edge_curve(10).unwrap();
        assert_eq!(arc.len(), tol.arc_segments(2.0, FRAC_PI_2) + 1);
        assert_eq!(arc[0], Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(*arc.last().unwrap(), Vec3::new(0.0, 2.0, 0.0));
        for p in &arc {
            assert!((p.length() - 2.0).abs() < 1e-5);
            assert!(p.x >= -1e-6 && p.y >= -1e-6);
        }

        // Reversed sense walks the same quarter backwards
        let back = t.sample_edge_curve(12).unwrap();
        assert_eq!(back[0], Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(back.len(), arc.len());
        for (a, b) in back.iter().rev().zip(&arc) {
            assert!((*a - *b).length() < 1e-5);
        }
    }

    #[test]
    fn test_full_circle_edge() {
        let g = graph(CIRCLE_EDGE);
        let tol = DeviationTolerance::default();
        let t = FaceTessellator::new(&g, &tol);
        let circle = t.sample_edge_curve(11).unwrap();
        assert_eq!(circle.len(), tol.arc_segments(2.0, TAU) + 1);
        assert_eq!(circle[0], *circle.last().unwrap());
    }

    #[test]
    fn test_tighter_tolerance_samples_more() {
        let g = graph(CIRCLE_EDGE);
        let coarse = DeviationTolerance::new(5.0, 3.0, false).unwrap();
        let fine = DeviationTolerance::new(0.001, 1.0, false).unwrap();
        let n_coarse = FaceTessellator::new(&g, &coarse).sample_edge_curve(11).unwrap().len();
        let n_fine = FaceTessellator::new(&g, &fine).sample_edge_curve(11).unwrap().len();
        assert!(n_fine > n_coarse);
        // The quarter-turn cap keeps four segments per circle
        assert_eq!(n_coarse, 5);
    }

    #[test]
    fn test_planar_face_with_hole() {
        // 4x4 square with a 2x2 hole, both as POLY_LOOPs
        let g = graph(
            "#1=CARTESIAN_POINT('',(0.,0.,0.));\n\
             #2=CARTESIAN_POINT('',(4.,0.,0.));\n\
             #3=CARTESIAN_POINT('',(4.,4.,0.));\n\
             #4=CARTESIAN_POINT('',(0.,4.,0.));\n\
             #5=CARTESIAN_POINT('',(1.,1.,0.));\n\
             #6=CARTESIAN_POINT('',(3.,1.,0.));\n\
             #7=CARTESIAN_POINT('',(3.,3.,0.));\n\
             #8=CARTESIAN_POINT('',(1.,3.,0.));\n\
             #10=POLY_LOOP('',(#1,#2,#3,#4));\n\
             #11=POLY_LOOP('',(#5,#6,#7,#8));\n\
             #12=FACE_OUTER_BOUND('',#10,.T.);\n\
             #13=FACE_BOUND('',#11,.T.);\n\
             #14=FACE('',(#12,#13));",
        );
        let tol = DeviationTolerance::default();
        let mut mesh = TriangleMesh::new();
        FaceTessellator::new(&g, &tol).tessellate_face(14, &mut mesh).unwrap();

        mesh.validate().unwrap();
        let area: f32 = mesh
            .triangles()
            .map(|[a, b, c]| (b - a).cross(c - a).z * 0.5)
            .sum();
        assert!((area - 12.0).abs() < 1e-4, "area {area}");
    }

    #[test]
    fn test_missing_bound_is_an_error() {
        let g = graph("#1=ADVANCED_FACE('',(#2),#3,.T.);");
        let tol = DeviationTolerance::default();
        let mut mesh = TriangleMesh::new();
        let err = FaceTessellator::new(&g, &tol)
            .tessellate_face(1, &mut mesh)
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::MissingEntity { id: 2, expected: "FACE_BOUND" }
        ));
    }

    #[test]
    fn test_unbounded_sphere_is_full() {
        let g = graph(
            "#1=CARTESIAN_POINT('',(0.,0.,0.));\n\
             #2=AXIS2_PLACEMENT_3D('',#1,$,$);\n\
             #3=SPHERICAL_SURFACE('',#2,3.);\n\
             #4=ADVANCED_FACE('',(),#3,.T.);",
        );
        let tol = DeviationTolerance::new(0.05, 0.5, false).unwrap();
        let mut mesh = TriangleMesh::new();
        FaceTessellator::new(&g, &tol).tessellate_face(4, &mut mesh).unwrap();

        assert!(mesh.face_count() > 0);
        for p in &mesh.positions {
            assert!((p.length() - 3.0).abs() < 1e-4);
        }
        // Outward winding gives positive volume
        assert!(mesh.signed_volume() > 0.0);
    }

    #[test]
    fn test_equator_bounds_a_hemisphere() {
        let surface = unit_sphere(DeviationTolerance::default());
        // Equator travelled counter-clockwise: the northern hemisphere
        let boundary = [BoundaryLoop {
            points: equator(16),
            outer: true,
        }];

        match Layout::build(&surface, &boundary, true) {
            Layout::Band {
                lower: BandEnd::Loop(ring),
                upper: BandEnd::Pole(v),
            } => {
                assert_eq!(ring.len(), 16);
                assert!((v - FRAC_PI_2).abs() < 1e-12);
            }
            other => panic!("unexpected layout {other:?}"),
        }

        match Layout::build(&surface, &boundary, false) {
            Layout::Band {
                lower: BandEnd::Pole(v),
                upper: BandEnd::Loop(_),
            } => assert!((v + FRAC_PI_2).abs() < 1e-12),
            other => panic!("unexpected layout {other:?}"),
        }
    }

    #[test]
    fn test_hemisphere_keeps_its_boundary_samples() {
        let g = EntityGraph::new(&[]);
        let tol = DeviationTolerance::new(0.01, 0.3, false).unwrap();
        let t = FaceTessellator::new(&g, &tol);
        let surface = unit_sphere(tol);
        let rim = equator(16);
        let boundary = [BoundaryLoop {
            points: rim.clone(),
            outer: true,
        }];

        let Layout::Band { lower, upper } = Layout::build(&surface, &boundary, true) else {
            panic!("expected a band");
        };
        let mut mesh = TriangleMesh::new();
        t.tessellate_band(&surface, &lower, &upper, false, &mut mesh);

        // The only open edges are the equator segments, in sample order
        assert_eq!(&mesh.positions[..16], &rim[..]);
        let expected: Vec<(u32, u32)> = {
            let mut e: Vec<_> = (0..16u32).map(|i| (i.min((i + 1) % 16), i.max((i + 1) % 16))).collect();
            e.sort_unstable();
            e
        };
        assert_eq!(open_edges(&mesh), expected);

        let exact = TAU / 3.0;
        assert!((mesh.signed_volume() - exact).abs() / exact < 0.05);
    }

    #[test]
    fn test_seam_loop_is_split_into_a_patch() {
        // Unit cylinder between z = 0 and z = 2, cut along u = 0
        let surface = AnalyticSurface {
            frame: Frame::WORLD,
            kind: Analytic::Cylinder { radius: 1.0 },
            tolerance: DeviationTolerance::default(),
            chord: 0.01,
        };
        let circle = |z: f32| -> Vec<Vec3> {
            (0..=12)
                .map(|i| {
                    let t = TAU * i as f64 / 12.0;
                    Vec3::new(t.cos() as f32, t.sin() as f32, z)
                })
                .collect()
        };
        let mut points = circle(0.0);
        let mut top = circle(2.0);
        top.reverse();
        points.extend(top);
        let boundary = [BoundaryLoop {
            points,
            outer: true,
        }];

        let Layout::Patch(patch) = Layout::build(&surface, &boundary, true) else {
            panic!("expected a patch");
        };
        assert_eq!(patch.lower.len(), 13);
        assert_eq!(patch.upper.len(), 13);
        assert_eq!(patch.left.len(), 2);
        assert!(patch.lower.uv.iter().all(|p| p[1].abs() < 1e-6));
    }

    #[test]
    fn test_cone_angle_in_degrees() {
        let g = graph(
            "#1=CARTESIAN_POINT('',(0.,0.,0.));\n\
             #2=AXIS2_PLACEMENT_3D('',#1,$,$);\n\
             #3=CONICAL_SURFACE('',#2,1.,2.);\n\
             #4=(NAMED_UNIT(*)PLANE_ANGLE_UNIT()SI_UNIT($,.RADIAN.));\n\
             #5=PLANE_ANGLE_MEASURE_WITH_UNIT(PLANE_ANGLE_MEASURE(0.0174532925199433),#4);\n\
             #6=(CONVERSION_BASED_UNIT('DEGREE',#5)NAMED_UNIT(*)PLANE_ANGLE_UNIT());",
        );
        let tol = DeviationTolerance::default();
        let t = FaceTessellator::new(&g, &tol);
        let Some(surface) = g.get(3).and_then(|e| t.analytic(e, &[])) else {
            panic!("cone not recognised");
        };
        let Analytic::Cone { tan, .. } = surface.kind else {
            panic!("expected a cone, got {:?}", surface.kind);
        };
        assert!((tan - 2f64.to_radians().tan()).abs() < 1e-12);

        // Without a unit the same value is radians
        let radians = graph(
            "#1=CARTESIAN_POINT('',(0.,0.,0.));\n\
             #2=AXIS2_PLACEMENT_3D('',#1,$,$);\n\
             #3=CONICAL_SURFACE('',#2,1.,0.5);",
        );
        let t = FaceTessellator::new(&radians, &tol);
        let Some(AnalyticSurface {
            kind: Analytic::Cone { tan, .. },
            ..
        }) = radians.get(3).and_then(|e| t.analytic(e, &[]))
        else {
            panic!("cone not recognised");
        };
        assert!((tan - 0.5f64.tan()).abs() < 1e-12);
    }

    #[test]
    fn test_spline_boundary_follows_domain_corners() {
        // Bilinear unit square, boundary walked anticlockwise from (0, 0)
        let net = vec![
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
            vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0)],
        ];
        let knots = [0.0, 0.0, 1.0, 1.0];
        let sheet = SplineSheet {
            net: &net,
            u_knots: &knots,
            v_knots: &knots,
            u_degree: 1,
            v_degree: 1,
            u_segments: 4,
            u_span: 1.0,
            chord: 1e-3,
        };
        let boundary = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let chain = domain_boundary(&sheet, &boundary, [0.0, 1.0, 0.0, 1.0]).unwrap();
        assert_eq!(
            chain.uv,
            vec![[0.0, 0.0], [0.5, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
        );

        let mut mesh = TriangleMesh::new();
        Patch::split(&chain).unwrap().triangulate(&sheet, false, &mut mesh);
        let area: f32 = mesh
            .triangles()
            .map(|[a, b, c]| (b - a).cross(c - a).z * 0.5)
            .sum();
        assert!((area - 1.0).abs() < 1e-5);

        // A boundary inside the domain does not match
        let inset: Vec<Vec3> = boundary.iter().map(|p| *p * 0.5 + Vec3::splat(0.25)).collect();
        assert!(domain_boundary(&sheet, &inset, [0.0, 1.0, 0.0, 1.0]).is_none());
    }
}
