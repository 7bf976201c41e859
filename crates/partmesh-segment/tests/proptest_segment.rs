//! Property-based tests for the mesh stages.
//!
//! Run with: cargo test -p partmesh-segment -- proptest

use partmesh_core::{TriangleMesh, Vec3};
use partmesh_segment::{normalize_orientation, weld_vertices, EdgeMap};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_position() -> impl Strategy<Value = Vec3> {
    prop::array::uniform3(-100.0..100.0f32).prop_map(Vec3::from_array)
}

/// Random mesh whose face indices are all in range.
fn arb_mesh(max_vertices: usize, max_faces: usize) -> impl Strategy<Value = TriangleMesh> {
    prop::collection::vec(arb_position(), 3..=max_vertices).prop_flat_map(move |positions| {
        let n = positions.len() as u32;
        prop::collection::vec(prop::array::uniform3(0..n), 0..=max_faces)
            .prop_map(move |faces| TriangleMesh::from_parts(positions.clone(), faces))
    })
}

/// Octahedron with a random subset of faces flipped.
fn arb_scrambled_octahedron() -> impl Strategy<Value = TriangleMesh> {
    prop::collection::vec(any::<bool>(), 8).prop_map(|flips| {
        let positions = vec![
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ];
        let outward = [
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];
        let faces = outward
            .iter()
            .zip(flips)
            .map(|(&[a, b, c], flip)| if flip { [a, c, b] } else { [a, b, c] })
            .collect();
        TriangleMesh::from_parts(positions, faces)
    })
}

// =============================================================================
// Orientation
// =============================================================================

proptest! {
    /// Orientation repair never panics and only reorders indices inside faces.
    #[test]
    fn orientation_keeps_connectivity(mesh in arb_mesh(30, 60)) {
        let mut oriented = mesh.clone();
        let report = normalize_orientation(&mut oriented);

        prop_assert_eq!(&oriented.positions, &mesh.positions);
        prop_assert_eq!(oriented.faces.len(), mesh.faces.len());
        prop_assert!(report.unresolved_faces <= mesh.faces.len());
        for (before, after) in mesh.faces.iter().zip(&oriented.faces) {
            let mut a = *before;
            let mut b = *after;
            a.sort_unstable();
            b.sort_unstable();
            prop_assert_eq!(a, b);
        }
    }

    /// Any scrambling of a closed solid is repaired to outward winding.
    #[test]
    fn orientation_repairs_closed_solid(mesh in arb_scrambled_octahedron()) {
        let mut oriented = mesh.clone();
        let report = normalize_orientation(&mut oriented);

        prop_assert!(report.is_fully_resolved());
        prop_assert!(oriented.signed_volume() > 0.0);
        prop_assert!(EdgeMap::build(&oriented.faces).is_closed_manifold());
    }

    /// Running the repair twice changes nothing the second time.
    #[test]
    fn orientation_is_idempotent(mesh in arb_scrambled_octahedron()) {
        let mut once = mesh;
        normalize_orientation(&mut once);
        let mut twice = once.clone();
        let report = normalize_orientation(&mut twice);

        prop_assert_eq!(report.flipped_faces, 0);
        prop_assert_eq!(once, twice);
    }
}

// =============================================================================
// Welding
// =============================================================================

proptest! {
    /// Welding never adds vertices and leaves every index in range.
    #[test]
    fn weld_keeps_mesh_valid(mesh in arb_mesh(30, 50), epsilon in 0.0..5.0f64) {
        let mut welded = mesh.clone();
        weld_vertices(&mut welded, epsilon);

        prop_assert!(welded.vertex_count() <= mesh.vertex_count());
        prop_assert!(welded.validate().is_ok());
        for face in &welded.faces {
            prop_assert!(face[0] != face[1] && face[1] != face[2] && face[0] != face[2]);
        }
    }
}
