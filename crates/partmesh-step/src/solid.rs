//! The STEP-backed [`Solid`].

use partmesh_core::{DeviationTolerance, KernelError, Solid, TriangleMesh};
use tracing::debug;

use crate::entities::EntityGraph;
use crate::tessellator::FaceTessellator;

/// A solid read from a STEP file: its entity graph plus the shells that
/// bound it.
#[derive(Debug)]
pub struct StepSolid {
    name: String,
    graph: EntityGraph,
    shells: Vec<u64>,
}

impl StepSolid {
    pub(crate) fn new(name: String, graph: EntityGraph, shells: Vec<u64>) -> Self {
        Self {
            name,
            graph,
            shells,
        }
    }

    /// Shell entity ids, in ascending order.
    pub fn shells(&self) -> &[u64] {
        &self.shells
    }

    /// The parsed entity graph.
    pub fn graph(&self) -> &EntityGraph {
        &self.graph
    }

    /// Number of B-rep faces across all shells.
    pub fn face_count(&self) -> usize {
        self.shells
            .iter()
            .filter_map(|&id| self.graph.shell(id).ok())
            .map(|shell| shell.faces.len())
            .sum()
    }
}

impl Solid for StepSolid {
    fn name(&self) -> &str {
        &self.name
    }

    fn triangulate(&self, tolerance: &DeviationTolerance) -> Result<TriangleMesh, KernelError> {
        let tessellator = FaceTessellator::new(&self.graph, tolerance);
        let mut mesh = TriangleMesh::new();

        for &shell_id in &self.shells {
            let shell = self.graph.shell(shell_id)?;
            for &face_id in &shell.faces {
                tessellator.tessellate_face(face_id, &mut mesh)?;
            }
            debug!(
                shell = shell_id,
                closed = shell.closed,
                faces = shell.faces.len(),
                "tessellated shell"
            );
        }

        Ok(mesh)
    }
}
