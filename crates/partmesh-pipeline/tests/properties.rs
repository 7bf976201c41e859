//! Property tests for classification and extraction on arbitrary meshes.

use std::collections::HashSet;
use std::path::Path;

use partmesh_core::{DeviationTolerance, PartId, TriangleMesh, Vec3};
use partmesh_segment::{classify, extract_all, tessellate_with, AxisThreshold};
use proptest::prelude::*;

/// Meshes sharing vertices between faces, z spread across the cut.
fn arb_mesh() -> impl Strategy<Value = TriangleMesh> {
    prop::collection::vec((-50.0f32..50.0, -50.0f32..50.0, -60.0f32..30.0), 3..40).prop_flat_map(
        |points| {
            let n = points.len() as u32;
            let positions: Vec<Vec3> = points
                .into_iter()
                .map(|(x, y, z)| Vec3::new(x, y, z))
                .collect();
            let faces = prop::collection::vec([0..n, 0..n, 0..n], 0..60);
            (Just(positions), faces)
        },
    )
    .prop_map(|(positions, faces)| TriangleMesh::from_parts(positions, faces))
}

fn split(mesh: &TriangleMesh, threshold: f32) -> Vec<(PartId, partmesh_core::SubMesh)> {
    let labels = classify(mesh, &AxisThreshold::lens_barrel_below_z(threshold));
    extract_all(mesh, &labels, &PartId::ALL).unwrap()
}

proptest! {
    #[test]
    fn labels_are_total_and_match_the_cut(mesh in arb_mesh(), threshold in -60.0f32..30.0) {
        let predicate = AxisThreshold::lens_barrel_below_z(threshold);
        let labels = classify(&mesh, &predicate);
        prop_assert_eq!(labels.len(), mesh.face_count());

        for (face, tri) in mesh.triangles().enumerate() {
            let top = tri[0].z.max(tri[1].z).max(tri[2].z);
            let expected = if top < threshold { PartId::LensBarrel } else { PartId::Body };
            prop_assert_eq!(labels.get(face), Some(expected));
        }
    }

    #[test]
    fn submeshes_are_valid_and_minimal(mesh in arb_mesh(), threshold in -60.0f32..30.0) {
        for (_, sub) in split(&mesh, threshold) {
            let count = sub.vertex_count() as u32;
            prop_assert!(sub.faces().iter().flatten().all(|&i| i < count));

            let used: HashSet<u32> = sub.faces().iter().flatten().copied().collect();
            prop_assert_eq!(used.len(), sub.vertex_count());
        }
    }

    #[test]
    fn submeshes_reproduce_source_triangles(mesh in arb_mesh(), threshold in -60.0f32..30.0) {
        for (_, sub) in split(&mesh, threshold) {
            prop_assert_eq!(sub.source_faces().len(), sub.face_count());
            for (local, &source) in sub.source_faces().iter().enumerate() {
                prop_assert_eq!(sub.mesh().triangle(local), mesh.triangle(source));
            }
            // Source order is kept
            prop_assert!(sub.source_faces().windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn parts_partition_the_faces(mesh in arb_mesh(), threshold in -60.0f32..30.0) {
        let parts = split(&mesh, threshold);
        prop_assert_eq!(parts.len(), PartId::ALL.len());

        let mut seen: Vec<usize> = parts
            .iter()
            .flat_map(|(_, sub)| sub.source_faces().iter().copied())
            .collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..mesh.face_count()).collect::<Vec<_>>());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn tighter_linear_deviation_never_coarsens(a in 0.005f64..1.0, b in 0.005f64..1.0) {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../partmesh-step/tests/fixtures/cylinder.step");
        let solid = partmesh_step::import_step(path).unwrap();
        let (fine, coarse) = if a < b { (a, b) } else { (b, a) };

        let faces = |linear: f64| {
            let tolerance = DeviationTolerance::new(linear, 0.5, false).unwrap();
            tessellate_with(&solid, &tolerance).unwrap().face_count()
        };
        prop_assert!(faces(fine) >= faces(coarse));
    }
}
