//! Deviation tolerances for tessellation.

use std::f64::consts::{FRAC_PI_2, PI};

use crate::errors::TessellateError;

/// Upper bound on the segments used for one curve span.
pub const MAX_ARC_SEGMENTS: usize = 1024;

/// Validated linear and angular deviation bounds.
///
/// `linear` is the maximum chordal distance between the exact surface and
/// the mesh. When `relative` is set it is a ratio of the local feature
/// size instead of an absolute length. `angular` is the maximum normal
/// deflection in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationTolerance {
    linear: f64,
    angular: f64,
    relative: bool,
}

impl DeviationTolerance {
    /// Validate and build a tolerance.
    pub fn new(linear: f64, angular: f64, relative: bool) -> Result<Self, TessellateError> {
        check_positive("linear", linear)?;
        check_positive("angular", angular)?;
        Ok(Self {
            linear,
            angular,
            relative,
        })
    }

    pub fn linear(&self) -> f64 {
        self.linear
    }

    pub fn angular(&self) -> f64 {
        self.angular
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    /// Absolute chordal deviation allowed for a feature of the given size.
    pub fn linear_for(&self, feature_size: f64) -> f64 {
        if self.relative {
            self.linear * feature_size
        } else {
            self.linear
        }
    }

    /// Largest angular step along an arc of `radius` that honours both
    /// deviations.
    pub fn arc_step(&self, radius: f64) -> f64 {
        let linear = self.linear_for(radius);
        let sagitta_step = if radius > linear {
            2.0 * (1.0 - linear / radius).acos()
        } else {
            PI
        };
        self.angular.min(sagitta_step).min(FRAC_PI_2)
    }

    /// Number of segments needed to cover `span` radians of an arc.
    pub fn arc_segments(&self, radius: f64, span: f64) -> usize {
        if !(radius.is_finite() && radius > 0.0 && span.is_finite()) {
            return 1;
        }
        let segments = (span.abs() / self.arc_step(radius)).ceil();
        (segments as usize).clamp(1, MAX_ARC_SEGMENTS)
    }
}

impl Default for DeviationTolerance {
    fn default() -> Self {
        Self {
            linear: 0.01,
            angular: 0.1,
            relative: false,
        }
    }
}

fn check_positive(parameter: &'static str, value: f64) -> Result<(), TessellateError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TessellateError::InvalidTolerance { parameter, value })
    }
}
