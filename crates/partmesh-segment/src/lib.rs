//! The tessellation-and-segmentation core of partmesh.
//!
//! Stages run strictly left to right, each on the output of the previous:
//!
//! ```text
//! tessellate ─> normalize_orientation ─> classify ─> extract ─> package
//! ```
//!
//! # Example
//!
//! ```
//! use partmesh_core::{PartId, SceneEntry, TriangleMesh, Vec3};
//! use partmesh_segment::{classify, extract_all, package, AxisThreshold};
//!
//! let mesh = TriangleMesh::from_parts(
//!     vec![
//!         Vec3::new(0.0, 0.0, -30.0),
//!         Vec3::new(1.0, 0.0, -30.0),
//!         Vec3::new(0.0, 1.0, -30.0),
//!         Vec3::new(0.0, 0.0, 5.0),
//!     ],
//!     vec![[0, 1, 2], [0, 1, 3]],
//! );
//!
//! let labels = classify(&mesh, &AxisThreshold::lens_barrel_below_z(-20.0));
//! let parts = extract_all(&mesh, &labels, &PartId::ALL).unwrap();
//! let scene = package(
//!     "camera",
//!     parts.into_iter().map(|(part, sub)| SceneEntry::for_part(part, sub)),
//! )
//! .unwrap();
//!
//! assert_eq!(scene.get("lens_barrel").unwrap().mesh().face_count(), 1);
//! ```

pub mod adjacency;
pub mod classify;
pub mod extract;
pub mod orient;
pub mod package;
pub mod tessellate;
pub mod weld;

pub use adjacency::EdgeMap;
pub use classify::{classify, Axis, AxisThreshold, FacePredicate};
pub use extract::{extract, extract_all};
pub use orient::{normalize_orientation, OrientationReport};
pub use package::package;
pub use tessellate::{tessellate, tessellate_with};
pub use weld::{remove_unreferenced_vertices, weld_vertices, WeldStats};
