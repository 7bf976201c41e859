//! Mesh Normalizer: consistent outward face winding.

use std::collections::VecDeque;

use glam::Vec3;
use partmesh_core::mesh::signed_tetra_volume;
use partmesh_core::TriangleMesh;
use tracing::{debug, warn};

use crate::adjacency::{face_edges, EdgeMap};

/// Outcome of [`normalize_orientation`].
///
/// Non-manifold or open input never fails; it shows up here instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrientationReport {
    /// Edge-connected components (connected through manifold edges).
    pub components: usize,
    /// Faces whose winding differs from the input.
    pub flipped_faces: usize,
    /// Components flipped as a whole to face outward.
    pub inverted_components: usize,
    /// Edges shared by more than two faces.
    pub non_manifold_edges: usize,
    /// Edges used by a single face.
    pub boundary_edges: usize,
    /// Faces in components that are open, non-manifold or non-orientable.
    pub unresolved_faces: usize,
}

impl OrientationReport {
    /// True when every component was closed, manifold and orientable.
    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved_faces == 0
    }
}

/// Reorient faces in place so every closed manifold component winds
/// outward.
///
/// Only the order of indices inside a face changes. Positions, vertex
/// count and face count are untouched.
pub fn normalize_orientation(mesh: &mut TriangleMesh) -> OrientationReport {
    const UNVISITED: usize = usize::MAX;

    let edges = EdgeMap::build(&mesh.faces);
    let face_count = mesh.faces.len();

    let mut report = OrientationReport {
        non_manifold_edges: edges.non_manifold_edge_count(),
        boundary_edges: edges.boundary_edge_count(),
        ..Default::default()
    };

    let mut component = vec![UNVISITED; face_count];
    let mut flipped = vec![false; face_count];
    let mut queue = VecDeque::new();

    for seed in 0..face_count {
        if component[seed] != UNVISITED {
            continue;
        }

        let id = report.components;
        report.components += 1;
        component[seed] = id;
        queue.push_back(seed);

        let mut members = Vec::new();
        let mut closed = true;
        let mut consistent = true;

        while let Some(face) = queue.pop_front() {
            members.push(face);

            for (v0, v1) in face_edges(mesh.faces[face]) {
                let incident = edges.faces_for_edge(v0, v1);
                let [f0, f1] = incident else {
                    closed = false;
                    continue;
                };
                let other = if *f0 == face { *f1 } else { *f0 };

                // A consistent neighbour walks the shared edge backwards
                let same_direction = face_edges(mesh.faces[other]).contains(&(v0, v1));
                if component[other] == UNVISITED {
                    if same_direction {
                        flip_face(&mut mesh.faces[other]);
                        flipped[other] = !flipped[other];
                    }
                    component[other] = id;
                    queue.push_back(other);
                } else if same_direction {
                    consistent = false;
                }
            }
        }

        if component_volume(mesh, &members) < 0.0 {
            for &face in &members {
                flip_face(&mut mesh.faces[face]);
                flipped[face] = !flipped[face];
            }
            report.inverted_components += 1;
        }

        if !(closed && consistent) {
            report.unresolved_faces += members.len();
        }
    }

    report.flipped_faces = flipped.iter().filter(|&&f| f).count();

    if report.is_fully_resolved() {
        debug!(
            components = report.components,
            flipped = report.flipped_faces,
            "orientation normalized"
        );
    } else {
        warn!(
            unresolved = report.unresolved_faces,
            boundary_edges = report.boundary_edges,
            non_manifold_edges = report.non_manifold_edges,
            "mesh is open or non-manifold, orientation is best effort"
        );
    }

    report
}

fn flip_face(face: &mut [u32; 3]) {
    face.swap(1, 2);
}

/// Signed volume of a component measured from its vertex centroid.
fn component_volume(mesh: &TriangleMesh, members: &[usize]) -> f64 {
    let corners = || {
        members
            .iter()
            .filter_map(|&f| mesh.triangle(f))
    };

    let count = members.len() * 3;
    if count == 0 {
        return 0.0;
    }
    let centroid = corners().flatten().fold(Vec3::ZERO, |acc, p| acc + p) / count as f32;

    corners()
        .map(|[a, b, c]| signed_tetra_volume(centroid, a, b, c))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit cube, outward winding.
    fn cube() -> TriangleMesh {
        TriangleMesh::from_parts(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(0.0, 1.0, 1.0),
            ],
            vec![
                [0, 2, 1],
                [0, 3, 2],
                [4, 5, 6],
                [4, 6, 7],
                [0, 1, 5],
                [0, 5, 4],
                [2, 3, 7],
                [2, 7, 6],
                [0, 4, 7],
                [0, 7, 3],
                [1, 2, 6],
                [1, 6, 5],
            ],
        )
    }

    #[test]
    fn test_consistent_cube_is_untouched() {
        let mut mesh = cube();
        let report = normalize_orientation(&mut mesh);
        assert_eq!(mesh, cube());
        assert_eq!(report.components, 1);
        assert_eq!(report.flipped_faces, 0);
        assert!(report.is_fully_resolved());
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fixes_flipped_faces() {
        let mut mesh = cube();
        for f in [1, 4, 9] {
            mesh.faces[f].swap(1, 2);
        }
        let report = normalize_orientation(&mut mesh);

        assert_eq!(report.flipped_faces, 3);
        assert!(report.is_fully_resolved());
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_inverted_cube_is_turned_outward() {
        let mut mesh = cube();
        for face in &mut mesh.faces {
            face.swap(1, 2);
        }
        let report = normalize_orientation(&mut mesh);

        assert_eq!(report.inverted_components, 1);
        assert_eq!(report.flipped_faces, 12);
        assert_eq!(mesh, cube());
    }

    #[test]
    fn test_open_strip_is_unresolved() {
        let mut mesh = TriangleMesh::from_parts(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(1.0, 1.0, 0.0)],
            vec![[0, 1, 2], [1, 2, 3]],
        );
        let report = normalize_orientation(&mut mesh);

        assert_eq!(report.components, 1);
        assert_eq!(report.boundary_edges, 4);
        assert_eq!(report.unresolved_faces, 2);
        assert!(!report.is_fully_resolved());
        // Still made consistent with the seed face
        assert_eq!(mesh.faces[0], [0, 1, 2]);
        assert_eq!(mesh.faces[1], [1, 3, 2]);
    }

    #[test]
    fn test_separate_components() {
        let mut mesh = cube();
        let offset = Vec3::splat(5.0);
        let second = TriangleMesh::from_parts(
            mesh.positions.iter().map(|&p| p + offset).collect(),
            mesh.faces.iter().map(|&[a, b, c]| [a, c, b]).collect(),
        );
        mesh.append(&second);

        let report = normalize_orientation(&mut mesh);
        assert_eq!(report.components, 2);
        assert_eq!(report.inverted_components, 1);
        assert!((mesh.signed_volume() - 2.0).abs() < 1e-4);
    }
}
