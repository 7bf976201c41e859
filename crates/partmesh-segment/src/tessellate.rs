//! Tessellator.

use partmesh_core::{DeviationTolerance, Solid, TessellateError, TriangleMesh};
use tracing::{debug, info};

use crate::weld::weld_vertices;

/// Weld radius as a fraction of the bounding-box diagonal.
pub const WELD_RATIO: f64 = 1e-6;

/// Triangulate `solid` within the given deviations.
///
/// Both deviations must be positive and finite; `relative` makes
/// `linear_deviation` a ratio of the local feature size.
pub fn tessellate<S>(
    solid: &S,
    linear_deviation: f64,
    angular_deviation: f64,
    relative: bool,
) -> Result<TriangleMesh, TessellateError>
where
    S: Solid + ?Sized,
{
    let tolerance = DeviationTolerance::new(linear_deviation, angular_deviation, relative)?;
    tessellate_with(solid, &tolerance)
}

/// Triangulate `solid` with an already validated tolerance.
///
/// Vertices duplicated along shared edges are welded, so adjacent faces
/// share indices in the result.
pub fn tessellate_with<S>(
    solid: &S,
    tolerance: &DeviationTolerance,
) -> Result<TriangleMesh, TessellateError>
where
    S: Solid + ?Sized,
{
    debug!(
        solid = solid.name(),
        linear = tolerance.linear(),
        angular = tolerance.angular(),
        relative = tolerance.is_relative(),
        "tessellating solid"
    );

    let mut mesh = solid.triangulate(tolerance)?;
    let raw_vertices = mesh.vertex_count();

    let epsilon = f64::from(mesh.compute_bounds().diagonal()) * WELD_RATIO;
    let stats = weld_vertices(&mut mesh, epsilon);

    if mesh.is_empty() {
        return Err(TessellateError::EmptyMesh {
            solid: solid.name().to_string(),
        });
    }

    info!(
        solid = solid.name(),
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        raw_vertices,
        merged = stats.merged_vertices,
        collapsed_faces = stats.removed_faces,
        "tessellated solid"
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use partmesh_core::{KernelError, Vec3};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Two triangles of a unit square, each with its own vertices.
    struct Quad {
        calls: AtomicUsize,
    }

    impl Quad {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Solid for Quad {
        fn name(&self) -> &str {
            "quad"
        }

        fn triangulate(&self, _: &DeviationTolerance) -> Result<TriangleMesh, KernelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TriangleMesh::from_parts(
                vec![
                    Vec3::ZERO,
                    Vec3::X,
                    Vec3::new(1.0, 1.0, 0.0),
                    Vec3::ZERO,
                    Vec3::new(1.0, 1.0, 0.0),
                    Vec3::Y,
                ],
                vec![[0, 1, 2], [3, 4, 5]],
            ))
        }
    }

    struct Nothing;

    impl Solid for Nothing {
        fn name(&self) -> &str {
            "nothing"
        }

        fn triangulate(&self, _: &DeviationTolerance) -> Result<TriangleMesh, KernelError> {
            Ok(TriangleMesh::new())
        }
    }

    struct Broken;

    impl Solid for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn triangulate(&self, _: &DeviationTolerance) -> Result<TriangleMesh, KernelError> {
            Err(KernelError::MissingEntity {
                id: 42,
                expected: "EDGE_LOOP",
            })
        }
    }

    #[test]
    fn test_welds_shared_edge() {
        let mesh = tessellate(&Quad::new(), 0.01, 0.1, false).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 2);
        mesh.validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_tolerance_before_kernel() {
        let quad = Quad::new();
        for (linear, angular) in [
            (0.0, 0.1),
            (-1.0, 0.1),
            (f64::NAN, 0.1),
            (0.01, f64::INFINITY),
            (0.01, 0.0),
        ] {
            assert!(matches!(
                tessellate(&quad, linear, angular, false),
                Err(TessellateError::InvalidTolerance { .. })
            ));
        }
        assert_eq!(quad.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_mesh_is_an_error() {
        assert!(matches!(
            tessellate(&Nothing, 0.01, 0.1, false),
            Err(TessellateError::EmptyMesh { solid }) if solid == "nothing"
        ));
    }

    #[test]
    fn test_kernel_error_propagates() {
        assert!(matches!(
            tessellate_with(&Broken, &DeviationTolerance::default()),
            Err(TessellateError::Kernel(KernelError::MissingEntity { id: 42, .. }))
        ));
    }

    #[test]
    fn test_trait_object() {
        let solid: Box<dyn Solid> = Box::new(Quad::new());
        let mesh = tessellate_with(solid.as_ref(), &DeviationTolerance::default()).unwrap();
        assert_eq!(mesh.face_count(), 2);
    }
}
