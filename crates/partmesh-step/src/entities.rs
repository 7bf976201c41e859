//! Typed STEP entities and the entity graph.
//!
//! Covers the AP203/AP214/AP242 geometry and topology entities a B-rep
//! solid is built from. Everything else is kept as [`StepEntity::Unknown`].

use std::collections::HashMap;

use glam::Vec3;
use partmesh_core::KernelError;

use super::p21::{EntityInstance, StepValue};

/// A STEP instance with its parameters decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEntity {
    // Geometry entities
    CartesianPoint(Vec3),
    Direction(Vec3),
    Vector(Vector),
    Axis2Placement3D(Axis2Placement3D),
    Line(Line),
    Circle(Circle),
    Ellipse(Ellipse),
    BSplineCurve(BSplineCurve),
    /// SURFACE_CURVE, SEAM_CURVE or TRIMMED_CURVE: a wrapper around a 3D curve.
    CurveReference(u64),
    Plane(Plane),
    CylindricalSurface(CylindricalSurface),
    ConicalSurface(ConicalSurface),
    SphericalSurface(SphericalSurface),
    ToroidalSurface(ToroidalSurface),
    BSplineSurface(BSplineSurface),

    // Topology entities
    VertexPoint(VertexPoint),
    EdgeCurve(EdgeCurve),
    OrientedEdge(OrientedEdge),
    EdgeLoop(EdgeLoop),
    PolyLoop(PolyLoop),
    FaceBound(FaceBound),
    Face(Face),
    Shell(Shell),
    SolidBrep(SolidBrep),

    // Units
    ConversionBasedUnit(ConversionBasedUnit),
    /// A MEASURE_WITH_UNIT or one of its typed variants; only the value
    /// is kept.
    MeasureWithUnit(f64),

    /// Anything partmesh does not tessellate.
    Unknown { type_name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    pub orientation: u64,
    pub magnitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis2Placement3D {
    pub location: u64,
    pub axis: Option<u64>,
    pub ref_direction: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub point: u64,
    pub direction: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    pub position: u64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ellipse {
    pub position: u64,
    pub semi_axis_1: f64,
    pub semi_axis_2: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BSplineCurve {
    pub degree: usize,
    pub control_points: Vec<u64>,
    pub knot_multiplicities: Vec<u32>,
    pub knots: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub position: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CylindricalSurface {
    pub position: u64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConicalSurface {
    pub position: u64,
    pub radius: f64,
    pub semi_angle: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SphericalSurface {
    pub position: u64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToroidalSurface {
    pub position: u64,
    pub major_radius: f64,
    pub minor_radius: f64,
}

/// Control net indexed `[u][v]`, as in the exchange file.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineSurface {
    pub u_degree: usize,
    pub v_degree: usize,
    pub control_points: Vec<Vec<u64>>,
    pub u_multiplicities: Vec<u32>,
    pub v_multiplicities: Vec<u32>,
    pub u_knots: Vec<f64>,
    pub v_knots: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexPoint {
    pub point: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCurve {
    pub start_vertex: u64,
    pub end_vertex: u64,
    pub curve: u64,
    pub same_sense: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrientedEdge {
    pub edge: u64,
    pub orientation: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLoop {
    pub edges: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolyLoop {
    pub points: Vec<u64>,
}

/// FACE_BOUND or FACE_OUTER_BOUND.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBound {
    pub bound: u64,
    pub orientation: bool,
    pub outer: bool,
}

/// ADVANCED_FACE, FACE_SURFACE or a bare FACE (no surface).
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub bounds: Vec<u64>,
    pub surface: Option<u64>,
    pub same_sense: bool,
}

/// CLOSED_SHELL or OPEN_SHELL.
#[derive(Debug, Clone, PartialEq)]
pub struct Shell {
    pub faces: Vec<u64>,
    pub closed: bool,
}

/// MANIFOLD_SOLID_BREP, BREP_WITH_VOIDS or FACETED_BREP.
#[derive(Debug, Clone, PartialEq)]
pub struct SolidBrep {
    pub name: String,
    pub outer: u64,
}

/// A named unit defined as a multiple of another, such as DEGREE.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionBasedUnit {
    pub name: String,
    pub conversion: u64,
}

/// Positional access to an instance's parameters, with the fallbacks used
/// when an exporter omits a value.
struct Params<'a>(&'a [StepValue]);

impl<'a> Params<'a> {
    fn at(&self, i: usize) -> Option<&'a StepValue> {
        self.0.get(i)
    }

    fn real(&self, i: usize, default: f64) -> f64 {
        self.at(i).and_then(StepValue::as_real).unwrap_or(default)
    }

    fn optional_ref(&self, i: usize) -> Option<u64> {
        self.at(i).and_then(StepValue::as_reference)
    }

    /// Missing references become id 0, which no instance uses, so lookups
    /// report them as missing entities.
    fn reference(&self, i: usize) -> u64 {
        self.optional_ref(i).unwrap_or(0)
    }

    fn flag(&self, i: usize) -> bool {
        self.at(i).and_then(StepValue::as_logical).unwrap_or(true)
    }

    fn label(&self, i: usize) -> String {
        self.at(i)
            .and_then(StepValue::as_str)
            .unwrap_or_default()
            .to_string()
    }

    fn refs(&self, i: usize) -> Vec<u64> {
        self.at(i).map(ref_list).unwrap_or_default()
    }

    fn reals(&self, i: usize) -> Vec<f64> {
        self.at(i)
            .map(|v| v.as_list().iter().filter_map(StepValue::as_real).collect())
            .unwrap_or_default()
    }

    fn counts(&self, i: usize) -> Vec<u32> {
        self.at(i)
            .map(|v| {
                v.as_list()
                    .iter()
                    .map(|c| c.as_integer().and_then(|n| u32::try_from(n).ok()).unwrap_or(0))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn ref_grid(&self, i: usize) -> Vec<Vec<u64>> {
        self.at(i)
            .map(|v| v.as_list().iter().map(ref_list).collect())
            .unwrap_or_default()
    }

    fn coords(&self, i: usize, default: Vec3) -> Vec3 {
        let Some(list) = self.at(i).map(StepValue::as_list) else {
            return default;
        };
        let c = |k: usize| list.get(k).and_then(StepValue::as_real).unwrap_or(0.0) as f32;
        Vec3::new(c(0), c(1), c(2))
    }

    fn degree(&self, i: usize) -> usize {
        self.at(i)
            .and_then(StepValue::as_integer)
            .and_then(|d| usize::try_from(d).ok())
            .unwrap_or(1)
    }
}

fn ref_list(value: &StepValue) -> Vec<u64> {
    value
        .as_list()
        .iter()
        .filter_map(StepValue::as_reference)
        .collect()
}

/// Give a raw instance its typed meaning. Parameter 0 is always the
/// instance label and is skipped except for solids.
pub fn convert_entity(instance: &EntityInstance) -> StepEntity {
    let p = Params(&instance.params);
    let kind = instance.type_name.as_str();

    match kind {
        "CARTESIAN_POINT" => StepEntity::CartesianPoint(p.coords(1, Vec3::ZERO)),
        "DIRECTION" => StepEntity::Direction(p.coords(1, Vec3::Z)),
        "VECTOR" => StepEntity::Vector(Vector {
            orientation: p.reference(1),
            magnitude: p.real(2, 1.0),
        }),
        "AXIS2_PLACEMENT_3D" => StepEntity::Axis2Placement3D(Axis2Placement3D {
            location: p.reference(1),
            axis: p.optional_ref(2),
            ref_direction: p.optional_ref(3),
        }),
        "LINE" => StepEntity::Line(Line {
            point: p.reference(1),
            direction: p.reference(2),
        }),
        "CIRCLE" => StepEntity::Circle(Circle {
            position: p.reference(1),
            radius: p.real(2, 1.0),
        }),
        "ELLIPSE" => StepEntity::Ellipse(Ellipse {
            position: p.reference(1),
            semi_axis_1: p.real(2, 1.0),
            semi_axis_2: p.real(3, 1.0),
        }),
        "B_SPLINE_CURVE_WITH_KNOTS" => StepEntity::BSplineCurve(BSplineCurve {
            degree: p.degree(1),
            control_points: p.refs(2),
            knot_multiplicities: p.counts(6),
            knots: p.reals(7),
        }),
        "SURFACE_CURVE" | "SEAM_CURVE" | "TRIMMED_CURVE" => {
            StepEntity::CurveReference(p.reference(1))
        }
        "PLANE" => StepEntity::Plane(Plane {
            position: p.reference(1),
        }),
        "CYLINDRICAL_SURFACE" => StepEntity::CylindricalSurface(CylindricalSurface {
            position: p.reference(1),
            radius: p.real(2, 1.0),
        }),
        "CONICAL_SURFACE" => StepEntity::ConicalSurface(ConicalSurface {
            position: p.reference(1),
            radius: p.real(2, 1.0),
            semi_angle: p.real(3, 0.0),
        }),
        "SPHERICAL_SURFACE" => StepEntity::SphericalSurface(SphericalSurface {
            position: p.reference(1),
            radius: p.real(2, 1.0),
        }),
        "TOROIDAL_SURFACE" => StepEntity::ToroidalSurface(ToroidalSurface {
            position: p.reference(1),
            major_radius: p.real(2, 1.0),
            minor_radius: p.real(3, 0.5),
        }),
        "B_SPLINE_SURFACE_WITH_KNOTS" => StepEntity::BSplineSurface(BSplineSurface {
            u_degree: p.degree(1),
            v_degree: p.degree(2),
            control_points: p.ref_grid(3),
            u_multiplicities: p.counts(8),
            v_multiplicities: p.counts(9),
            u_knots: p.reals(10),
            v_knots: p.reals(11),
        }),

        "VERTEX_POINT" => StepEntity::VertexPoint(VertexPoint {
            point: p.reference(1),
        }),
        "EDGE_CURVE" => StepEntity::EdgeCurve(EdgeCurve {
            start_vertex: p.reference(1),
            end_vertex: p.reference(2),
            curve: p.reference(3),
            same_sense: p.flag(4),
        }),
        // Parameters 1 and 2 are derived (*) vertices
        "ORIENTED_EDGE" => StepEntity::OrientedEdge(OrientedEdge {
            edge: p.reference(3),
            orientation: p.flag(4),
        }),
        "EDGE_LOOP" => StepEntity::EdgeLoop(EdgeLoop { edges: p.refs(1) }),
        "POLY_LOOP" => StepEntity::PolyLoop(PolyLoop { points: p.refs(1) }),
        "FACE_OUTER_BOUND" | "FACE_BOUND" => StepEntity::FaceBound(FaceBound {
            bound: p.reference(1),
            orientation: p.flag(2),
            outer: kind == "FACE_OUTER_BOUND",
        }),
        "ADVANCED_FACE" | "FACE_SURFACE" => StepEntity::Face(Face {
            bounds: p.refs(1),
            surface: p.optional_ref(2),
            same_sense: p.flag(3),
        }),
        "FACE" => StepEntity::Face(Face {
            bounds: p.refs(1),
            surface: None,
            same_sense: true,
        }),
        "CLOSED_SHELL" | "OPEN_SHELL" => StepEntity::Shell(Shell {
            faces: p.refs(1),
            closed: kind == "CLOSED_SHELL",
        }),
        "MANIFOLD_SOLID_BREP" | "BREP_WITH_VOIDS" | "FACETED_BREP" => {
            StepEntity::SolidBrep(SolidBrep {
                name: p.label(0),
                outer: p.reference(1),
            })
        }

        // In a complex instance the unit name comes first: partial types
        // are listed alphabetically
        "CONVERSION_BASED_UNIT" => StepEntity::ConversionBasedUnit(ConversionBasedUnit {
            name: p.label(0),
            conversion: p.reference(1),
        }),
        "MEASURE_WITH_UNIT" | "PLANE_ANGLE_MEASURE_WITH_UNIT" | "LENGTH_MEASURE_WITH_UNIT" => {
            StepEntity::MeasureWithUnit(p.real(0, f64::NAN))
        }

        other => StepEntity::Unknown {
            type_name: other.to_string(),
        },
    }
}

/// Typed entities keyed by instance id, with lookup helpers.
#[derive(Debug, Default)]
pub struct EntityGraph {
    entities: HashMap<u64, StepEntity>,
    /// Radians per plane angle unit, when the file declares degrees.
    angle_unit: Option<f64>,
}

impl EntityGraph {
    /// Build an entity graph from raw instances.
    pub fn new(instances: &[EntityInstance]) -> Self {
        let entities = instances
            .iter()
            .map(|inst| (inst.id, convert_entity(inst)))
            .collect();
        let mut graph = Self {
            entities,
            angle_unit: None,
        };
        graph.angle_unit = graph.degree_unit();
        graph
    }

    /// Scale from the file's plane angle values to radians.
    ///
    /// Angles are radians unless the file defines a DEGREE unit.
    pub fn plane_angle_scale(&self) -> f64 {
        self.angle_unit.unwrap_or(1.0)
    }

    fn degree_unit(&self) -> Option<f64> {
        let unit = self.entities.values().find_map(|e| match e {
            StepEntity::ConversionBasedUnit(u)
                if u.name.eq_ignore_ascii_case("DEGREE")
                    || u.name.eq_ignore_ascii_case("DEGREES") =>
            {
                Some(u)
            }
            _ => None,
        })?;
        // The stated conversion factor wins over the nominal one
        let factor = match self.get(unit.conversion) {
            Some(StepEntity::MeasureWithUnit(value)) if value.is_finite() && *value > 0.0 => *value,
            _ => 1f64.to_radians(),
        };
        Some(factor)
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Get an entity by ID.
    pub fn get(&self, id: u64) -> Option<&StepEntity> {
        self.entities.get(&id)
    }

    /// Get a cartesian point by ID.
    pub fn point(&self, id: u64) -> Result<Vec3, KernelError> {
        match self.get(id) {
            Some(StepEntity::CartesianPoint(p)) => Ok(*p),
            _ => Err(missing(id, "CARTESIAN_POINT")),
        }
    }

    /// Get a normalized direction by ID.
    pub fn direction(&self, id: u64) -> Option<Vec3> {
        match self.get(id)? {
            StepEntity::Direction(d) => Some(d.normalize_or_zero()).filter(|d| *d != Vec3::ZERO),
            _ => None,
        }
    }

    /// Get vertex point coordinates.
    pub fn vertex(&self, id: u64) -> Result<Vec3, KernelError> {
        match self.get(id) {
            Some(StepEntity::VertexPoint(v)) => self.point(v.point),
            _ => Err(missing(id, "VERTEX_POINT")),
        }
    }

    pub fn face(&self, id: u64) -> Result<&Face, KernelError> {
        match self.get(id) {
            Some(StepEntity::Face(f)) => Ok(f),
            _ => Err(missing(id, "FACE")),
        }
    }

    pub fn shell(&self, id: u64) -> Result<&Shell, KernelError> {
        match self.get(id) {
            Some(StepEntity::Shell(s)) => Ok(s),
            _ => Err(missing(id, "SHELL")),
        }
    }

    /// Follow curve wrappers down to the underlying 3D curve.
    pub fn curve(&self, id: u64) -> Option<&StepEntity> {
        let mut current = id;
        // Bounded so a reference cycle cannot hang
        for _ in 0..8 {
            match self.get(current)? {
                StepEntity::CurveReference(basis) => current = *basis,
                other => return Some(other),
            }
        }
        None
    }

    pub fn edge_curve(&self, id: u64) -> Result<&EdgeCurve, KernelError> {
        match self.get(id) {
            Some(StepEntity::EdgeCurve(e)) => Ok(e),
            _ => Err(missing(id, "EDGE_CURVE")),
        }
    }

    /// Solids in ascending id order.
    pub fn solids(&self) -> Vec<(u64, &SolidBrep)> {
        let mut solids: Vec<_> = self
            .entities
            .iter()
            .filter_map(|(id, e)| match e {
                StepEntity::SolidBrep(s) => Some((*id, s)),
                _ => None,
            })
            .collect();
        solids.sort_by_key(|(id, _)| *id);
        solids
    }

    /// Closed and open shells in ascending id order.
    pub fn shells(&self) -> Vec<u64> {
        let mut shells: Vec<u64> = self
            .entities
            .iter()
            .filter(|(_, e)| matches!(e, StepEntity::Shell(_)))
            .map(|(id, _)| *id)
            .collect();
        shells.sort_unstable();
        shells
    }

    /// Rigid frame of an AXIS2_PLACEMENT_3D.
    ///
    /// The Z axis is the placement axis and X is the reference direction,
    /// re-orthogonalized against Z. A missing placement maps to the world
    /// frame.
    pub fn placement(&self, id: u64) -> Frame {
        let Some(StepEntity::Axis2Placement3D(axis)) = self.get(id) else {
            return Frame::WORLD;
        };

        let origin = self.point(axis.location).unwrap_or(Vec3::ZERO);
        let z_axis = axis.axis.and_then(|d| self.direction(d)).unwrap_or(Vec3::Z);
        let x_hint = axis
            .ref_direction
            .and_then(|d| self.direction(d))
            .unwrap_or_else(|| {
                // Compute X from Z using Gram-Schmidt
                if z_axis.x.abs() < 0.9 {
                    Vec3::X
                } else {
                    Vec3::Y
                }
            });
        let y_axis = z_axis.cross(x_hint).normalize_or_zero();
        let x_axis = y_axis.cross(z_axis).normalize_or_zero();

        Frame {
            origin,
            x: x_axis,
            y: y_axis,
            z: z_axis,
        }
    }
}

fn missing(id: u64, expected: &'static str) -> KernelError {
    KernelError::MissingEntity { id, expected }
}

/// An orthonormal frame placed in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub origin: Vec3,
    pub x: Vec3,
    pub y: Vec3,
    pub z: Vec3,
}

impl Frame {
    pub const WORLD: Frame = Frame {
        origin: Vec3::ZERO,
        x: Vec3::X,
        y: Vec3::Y,
        z: Vec3::Z,
    };

    /// Map local coordinates to world space.
    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.origin + self.x * local.x + self.y * local.y + self.z * local.z
    }

    /// Map a world point into local coordinates.
    pub fn to_local(&self, world: Vec3) -> Vec3 {
        let d = world - self.origin;
        Vec3::new(d.dot(self.x), d.dot(self.y), d.dot(self.z))
    }
}
