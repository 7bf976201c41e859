//! Face Classifier.

use glam::Vec3;
use partmesh_core::{FaceLabels, PartId, TriangleMesh};
use tracing::debug;

/// A pure per-face rule assigning a part.
pub trait FacePredicate {
    /// Part of the face with the given corner positions.
    fn part_for(&self, corners: &[Vec3; 3]) -> PartId;
}

impl<F> FacePredicate for F
where
    F: Fn(&[Vec3; 3]) -> PartId,
{
    fn part_for(&self, corners: &[Vec3; 3]) -> PartId {
        self(corners)
    }
}

/// Coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Component of `point` along this axis.
    #[inline]
    pub fn of(self, point: Vec3) -> f32 {
        match self {
            Axis::X => point.x,
            Axis::Y => point.y,
            Axis::Z => point.z,
        }
    }
}

/// Single-axis cut on the highest corner of a face.
///
/// A face whose maximum coordinate along `axis` is strictly below
/// `threshold` gets `below`; every other face gets `otherwise`. NaN
/// coordinates never compare below, so such faces fall to `otherwise`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisThreshold {
    pub axis: Axis,
    pub threshold: f32,
    pub below: PartId,
    pub otherwise: PartId,
}

impl AxisThreshold {
    pub fn new(axis: Axis, threshold: f32, below: PartId, otherwise: PartId) -> Self {
        Self {
            axis,
            threshold,
            below,
            otherwise,
        }
    }

    /// Faces entirely under `threshold` in Z are the lens barrel.
    pub fn lens_barrel_below_z(threshold: f32) -> Self {
        Self::new(Axis::Z, threshold, PartId::LensBarrel, PartId::Body)
    }

    /// Largest coordinate of the three corners along the axis.
    pub fn face_max(&self, corners: &[Vec3; 3]) -> f32 {
        corners
            .iter()
            .map(|&p| self.axis.of(p))
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

impl FacePredicate for AxisThreshold {
    fn part_for(&self, corners: &[Vec3; 3]) -> PartId {
        // f32::max skips NaN, so check for it before taking the maximum
        if corners.iter().any(|&p| self.axis.of(p).is_nan()) {
            return self.otherwise;
        }
        if self.face_max(corners) < self.threshold {
            self.below
        } else {
            self.otherwise
        }
    }
}

/// Label every face of `mesh` with `predicate`.
///
/// The result has exactly one label per face. A face that references a
/// missing vertex is still labelled, with NaN standing in for the missing
/// corner.
pub fn classify<P>(mesh: &TriangleMesh, predicate: &P) -> FaceLabels
where
    P: FacePredicate + ?Sized,
{
    let labels: FaceLabels = mesh
        .faces
        .iter()
        .map(|face| {
            let corners = face.map(|i| {
                mesh.positions
                    .get(i as usize)
                    .copied()
                    .unwrap_or(Vec3::NAN)
            });
            predicate.part_for(&corners)
        })
        .collect();

    debug!(faces = labels.len(), counts = ?labels.counts(), "classified faces");
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_at(z: f32) -> [Vec3; 3] {
        [
            Vec3::new(0.0, 0.0, z - 2.0),
            Vec3::new(1.0, 0.0, z),
            Vec3::new(0.0, 1.0, z - 1.0),
        ]
    }

    #[test]
    fn test_threshold_is_strict() {
        let cut = AxisThreshold::lens_barrel_below_z(-20.0);
        assert_eq!(cut.part_for(&triangle_at(-20.5)), PartId::LensBarrel);
        assert_eq!(cut.part_for(&triangle_at(-20.0)), PartId::Body);
        assert_eq!(cut.part_for(&triangle_at(5.0)), PartId::Body);
    }

    #[test]
    fn test_uses_highest_corner() {
        let cut = AxisThreshold::lens_barrel_below_z(-20.0);
        // Two corners far below, one straddling the cut
        let face = [
            Vec3::new(0.0, 0.0, -50.0),
            Vec3::new(1.0, 0.0, -50.0),
            Vec3::new(0.0, 1.0, -19.0),
        ];
        assert_eq!(cut.face_max(&face), -19.0);
        assert_eq!(cut.part_for(&face), PartId::Body);
    }

    #[test]
    fn test_other_axis() {
        let cut = AxisThreshold::new(Axis::X, 0.5, PartId::Body, PartId::LensBarrel);
        let face = [Vec3::ZERO, Vec3::new(0.25, 9.0, 9.0), Vec3::Y];
        assert_eq!(cut.part_for(&face), PartId::Body);
    }

    #[test]
    fn test_classify_is_total() {
        let mesh = TriangleMesh::from_parts(
            vec![
                Vec3::new(0.0, 0.0, -30.0),
                Vec3::new(1.0, 0.0, -30.0),
                Vec3::new(0.0, 1.0, -25.0),
                Vec3::new(0.0, 0.0, 10.0),
            ],
            // The last face references a vertex that does not exist
            vec![[0, 1, 2], [0, 1, 3], [0, 1, 9]],
        );
        let labels = classify(&mesh, &AxisThreshold::lens_barrel_below_z(-20.0));

        assert_eq!(labels.len(), 3);
        assert_eq!(
            labels.as_slice(),
            &[PartId::LensBarrel, PartId::Body, PartId::Body]
        );
    }

    #[test]
    fn test_closure_predicate() {
        let mesh = TriangleMesh::from_parts(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::splat(4.0)],
            vec![[0, 1, 2], [1, 2, 3]],
        );
        let by_area = |c: &[Vec3; 3]| {
            if (c[1] - c[0]).cross(c[2] - c[0]).length() > 1.0 {
                PartId::LensBarrel
            } else {
                PartId::Body
            }
        };
        let labels = classify(&mesh, &by_area);
        assert_eq!(labels.as_slice(), &[PartId::Body, PartId::LensBarrel]);
    }

    #[test]
    fn test_classify_is_reproducible() {
        let mesh = TriangleMesh::from_parts(
            vec![Vec3::ZERO, Vec3::X, Vec3::new(0.0, 1.0, -40.0)],
            vec![[0, 1, 2], [2, 1, 0]],
        );
        let cut = AxisThreshold::lens_barrel_below_z(-20.0);
        assert_eq!(classify(&mesh, &cut), classify(&mesh, &cut));
    }
}
