//! STEP (ISO 10303-21) import for partmesh.
//!
//! Parses the Part 21 DATA section with nom, builds a typed entity graph and
//! exposes the result as a [`StepSolid`] that triangulates itself to a
//! [`partmesh_core::DeviationTolerance`].
//!
//! Supported surfaces:
//! - `PLANE` (ear clipping, holes bridged into the outer loop)
//! - `CYLINDRICAL_SURFACE`, `CONICAL_SURFACE`, `SPHERICAL_SURFACE`,
//!   `TOROIDAL_SURFACE` (rows zipped between boundary loops, or trimmed
//!   regions refined in parameter space)
//! - `B_SPLINE_SURFACE_WITH_KNOTS` (rows between the boundary edges when
//!   the face covers its knot domain, a full domain grid otherwise)
//!
//! Faces keep their sampled edges as mesh boundary, so neighbouring faces
//! meet exactly once their shared vertices are welded. Anything else is
//! triangulated in the plane of its boundary.

mod band;
pub mod entities;
pub mod geometry;
pub mod p21;
mod reader;
mod solid;
mod tessellator;

pub use entities::{EntityGraph, StepEntity};
pub use reader::{import_step, is_step, read_step};
pub use solid::StepSolid;
