//! The boundary-representation seam.

use crate::errors::KernelError;
use crate::mesh::TriangleMesh;
use crate::tolerance::DeviationTolerance;

/// An exact solid model that a kernel can discretize.
///
/// Implementations own whatever caches they need; nothing leaks between
/// calls to [`Solid::triangulate`].
pub trait Solid: Send + Sync {
    /// Human-readable name of the solid.
    fn name(&self) -> &str;

    /// Triangulate every face of the solid within `tolerance`.
    ///
    /// The result may contain duplicated vertices along shared edges.
    fn triangulate(&self, tolerance: &DeviationTolerance) -> Result<TriangleMesh, KernelError>;
}

impl<S: Solid + ?Sized> Solid for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn triangulate(&self, tolerance: &DeviationTolerance) -> Result<TriangleMesh, KernelError> {
        (**self).triangulate(tolerance)
    }
}
