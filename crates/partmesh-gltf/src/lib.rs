//! glTF 2.0 output for partmesh.
//!
//! [`write_glb`] encodes a packaged [`partmesh_core::Scene`] as a binary
//! container with one root node per entry. [`GlbDocument`] reads such a
//! container back. The [`shading`] module hands a written file to the
//! external smoothing/compression tool.

pub mod glb;
pub mod schema;
pub mod shading;
mod writer;

pub use glb::GlbDocument;
pub use shading::{CommandPostProcessor, PostProcessor, ShadingConfig};
pub use writer::{save_glb, write_glb, write_gltf_json, ExportOptions};
