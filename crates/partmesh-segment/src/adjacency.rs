//! Edge-to-face adjacency.

use std::collections::HashMap;

/// Normalize an edge so the smaller vertex index comes first.
#[inline]
pub fn normalize_edge(v0: u32, v1: u32) -> (u32, u32) {
    if v0 < v1 {
        (v0, v1)
    } else {
        (v1, v0)
    }
}

/// The three directed edges of a face.
#[inline]
pub fn face_edges([a, b, c]: [u32; 3]) -> [(u32, u32); 3] {
    [(a, b), (b, c), (c, a)]
}

/// Undirected edge to incident-face map.
///
/// Boundary edges have one incident face, manifold edges two, and
/// non-manifold edges more.
#[derive(Debug, Clone, Default)]
pub struct EdgeMap {
    edge_to_faces: HashMap<(u32, u32), Vec<usize>>,
}

impl EdgeMap {
    /// Build the map from triangle faces.
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        for (face_idx, &face) in faces.iter().enumerate() {
            for (v0, v1) in face_edges(face) {
                edge_to_faces
                    .entry(normalize_edge(v0, v1))
                    .or_default()
                    .push(face_idx);
            }
        }
        Self { edge_to_faces }
    }

    /// Faces incident to an edge, in ascending face order.
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> &[usize] {
        self.edge_to_faces
            .get(&normalize_edge(v0, v1))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }

    /// Edges with exactly one incident face.
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_to_faces.values().filter(|f| f.len() == 1).count()
    }

    /// Edges with more than two incident faces.
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces.values().filter(|f| f.len() > 2).count()
    }

    /// True when every edge has exactly two incident faces.
    pub fn is_closed_manifold(&self) -> bool {
        self.edge_to_faces.values().all(|f| f.len() == 2)
    }
}
