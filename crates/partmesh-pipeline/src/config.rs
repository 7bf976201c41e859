//! Pipeline configuration.

use std::path::{Path, PathBuf};

use partmesh_core::{DeviationTolerance, PipelineError, TessellateError};
use partmesh_gltf::{ExportOptions, ShadingConfig};
use serde::{Deserialize, Serialize};

/// Everything one pipeline run needs.
///
/// Defaults reproduce the reference conversion: 0.01 linear and 0.1 rad
/// angular deviation, and a lens barrel cut at z = -20 in source units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// STEP file to read.
    pub input: PathBuf,
    /// GLB file to write.
    pub output: PathBuf,
    #[serde(default = "default_linear")]
    pub linear_deviation: f64,
    /// Radians.
    #[serde(default = "default_angular")]
    pub angular_deviation: f64,
    #[serde(default)]
    pub relative_deviation: bool,
    /// Faces whose highest corner lies below this Z are the lens barrel.
    #[serde(default = "default_threshold")]
    pub classification_threshold: f32,
    /// Scene name. Falls back to the input file stem.
    #[serde(default)]
    pub scene_name: Option<String>,
    #[serde(default)]
    pub export: ExportOptions,
    /// Run the shading stage after export.
    #[serde(default)]
    pub shading: Option<ShadingConfig>,
    /// Where the shading stage writes. Defaults to `<output>_shaded.glb`.
    #[serde(default)]
    pub shading_output: Option<PathBuf>,
}

fn default_linear() -> f64 {
    0.01
}

fn default_angular() -> f64 {
    0.1
}

fn default_threshold() -> f32 {
    -20.0
}

impl PipelineConfig {
    /// Configuration with default tolerances and threshold.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            linear_deviation: default_linear(),
            angular_deviation: default_angular(),
            relative_deviation: false,
            classification_threshold: default_threshold(),
            scene_name: None,
            export: ExportOptions::default(),
            shading: None,
            shading_output: None,
        }
    }

    pub fn with_deviation(mut self, linear: f64, angular: f64) -> Self {
        self.linear_deviation = linear;
        self.angular_deviation = angular;
        self
    }

    /// Treat the linear deviation as a ratio of feature size.
    pub fn with_relative_deviation(mut self, relative: bool) -> Self {
        self.relative_deviation = relative;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.classification_threshold = threshold;
        self
    }

    pub fn with_scene_name(mut self, name: impl Into<String>) -> Self {
        self.scene_name = Some(name.into());
        self
    }

    pub fn with_export(mut self, export: ExportOptions) -> Self {
        self.export = export;
        self
    }

    pub fn with_shading(mut self, shading: ShadingConfig) -> Self {
        self.shading = Some(shading);
        self
    }

    pub fn with_shading_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.shading_output = Some(path.into());
        self
    }

    /// Validated deviation tolerance.
    pub fn tolerance(&self) -> Result<DeviationTolerance, TessellateError> {
        DeviationTolerance::new(
            self.linear_deviation,
            self.angular_deviation,
            self.relative_deviation,
        )
    }

    /// The classification threshold, if it is a finite coordinate.
    pub fn threshold(&self) -> Result<f32, PipelineError> {
        let value = self.classification_threshold;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(PipelineError::InvalidThreshold { value })
        }
    }

    /// The configured scene name, else the input file stem.
    pub fn resolved_scene_name(&self) -> Option<String> {
        self.scene_name.clone().or_else(|| {
            self.input
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
    }

    /// Output path of the shading stage.
    pub fn resolved_shading_output(&self) -> PathBuf {
        self.shading_output
            .clone()
            .unwrap_or_else(|| shaded_path(&self.output))
    }
}

fn shaded_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scene".to_string());
    output.with_file_name(format!("{stem}_shaded.glb"))
}
