//! partmesh-core: shared types for the CAD-to-mesh segmentation pipeline.
//!
//! The pipeline turns a boundary-representation [`Solid`] into a
//! [`TriangleMesh`], labels every face with a [`PartId`], extracts one
//! [`SubMesh`] per part and packages them into a [`Scene`].
//!
//! ```text
//! Solid ─> TriangleMesh ─> FaceLabels ─> SubMesh* ─> Scene
//! ```

pub mod errors;
pub mod mesh;
pub mod part;
pub mod scene;
pub mod solid;
pub mod tolerance;

pub use errors::{
    ExportError, ExtractError, ImportError, KernelError, MeshError, PackageError, PipelineError,
    PostProcessError, TessellateError,
};
pub use mesh::{BoundingBox, TriangleMesh};
pub use part::{FaceLabels, PartId};
pub use scene::{Scene, SceneEntry, SubMesh};
pub use solid::Solid;
pub use tolerance::DeviationTolerance;

/// Re-export of the vector type used for positions.
pub use glam::Vec3;
