//! Extracted sub-meshes and the packaged scene.

use glam::Vec3;
use indexmap::IndexMap;

use crate::errors::{MeshError, PackageError};
use crate::mesh::TriangleMesh;
use crate::part::PartId;

/// A self-contained mesh holding one part's faces.
///
/// Indices are local to the sub-mesh. Once built it is never mutated.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubMesh {
    mesh: TriangleMesh,
    source_faces: Vec<usize>,
}

impl SubMesh {
    /// Build a sub-mesh, checking that every index is local and that each
    /// face has a source face index.
    pub fn new(mesh: TriangleMesh, source_faces: Vec<usize>) -> Result<Self, MeshError> {
        mesh.validate()?;
        if source_faces.len() != mesh.face_count() {
            return Err(MeshError::SourceCountMismatch {
                faces: mesh.face_count(),
                sources: source_faces.len(),
            });
        }
        Ok(Self { mesh, source_faces })
    }

    /// A sub-mesh with no vertices and no faces.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.mesh.positions
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.mesh.faces
    }

    /// Index in the source mesh of each retained face.
    pub fn source_faces(&self) -> &[usize] {
        &self.source_faces
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    pub fn face_count(&self) -> usize {
        self.mesh.face_count()
    }

    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
    }

    pub fn into_mesh(self) -> TriangleMesh {
        self.mesh
    }
}

/// A named node of a packaged scene.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SceneEntry {
    node_name: String,
    geometry_name: String,
    mesh: SubMesh,
}

impl SceneEntry {
    pub fn new(node_name: impl Into<String>, geometry_name: impl Into<String>, mesh: SubMesh) -> Self {
        Self {
            node_name: node_name.into(),
            geometry_name: geometry_name.into(),
            mesh,
        }
    }

    /// Entry whose node and geometry are both named after the part.
    pub fn for_part(part: PartId, mesh: SubMesh) -> Self {
        Self::new(part.as_str(), part.as_str(), mesh)
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn geometry_name(&self) -> &str {
        &self.geometry_name
    }

    pub fn mesh(&self) -> &SubMesh {
        &self.mesh
    }
}

/// An ordered set of uniquely named scene entries.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scene {
    name: String,
    entries: IndexMap<String, SceneEntry>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: IndexMap::new(),
        }
    }

    /// Build a scene from entries in order, rejecting a repeated node name.
    ///
    /// This is the only way to give a scene nodes; a built scene is never
    /// changed.
    pub fn from_entries(
        name: impl Into<String>,
        entries: impl IntoIterator<Item = SceneEntry>,
    ) -> Result<Self, PackageError> {
        let mut scene = Self::new(name);
        for entry in entries {
            scene.insert(entry)?;
        }
        Ok(scene)
    }

    fn insert(&mut self, entry: SceneEntry) -> Result<(), PackageError> {
        if self.entries.contains_key(entry.node_name()) {
            return Err(PackageError::DuplicateNode {
                name: entry.node_name.clone(),
            });
        }
        self.entries.insert(entry.node_name.clone(), entry);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &SceneEntry> {
        self.entries.values()
    }

    /// Look up an entry by node name.
    pub fn get(&self, node_name: &str) -> Option<&SceneEntry> {
        self.entries.get(node_name)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Total faces across all entries.
    pub fn face_count(&self) -> usize {
        self.entries.values().map(|e| e.mesh.face_count()).sum()
    }
}
