//! Hand-off to the external smoothing/compression stage.
//!
//! The stage reads a written scene, recomputes per-vertex normals with an
//! edge-angle threshold and re-encodes the geometry with a compressed-mesh
//! codec. partmesh only describes the configuration and launches the tool.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use partmesh_core::{ExportError, PostProcessError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::glb::GlbDocument;

/// Settings for normal smoothing and geometry compression.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingConfig {
    /// Edges sharper than this stay hard, in degrees.
    pub smoothing_angle_deg: f64,
    /// Codec effort, 0 (fastest) to 10 (smallest).
    pub compression_level: u8,
    pub position_quantization_bits: u8,
    pub normal_quantization_bits: u8,
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            smoothing_angle_deg: 70.0,
            compression_level: 6,
            position_quantization_bits: 14,
            normal_quantization_bits: 10,
        }
    }
}

impl ShadingConfig {
    pub const MAX_COMPRESSION_LEVEL: u8 = 10;
    pub const MAX_QUANTIZATION_BITS: u8 = 30;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_smoothing_angle(mut self, degrees: f64) -> Self {
        self.smoothing_angle_deg = degrees;
        self
    }

    pub fn with_compression_level(mut self, level: u8) -> Self {
        self.compression_level = level;
        self
    }

    /// Set position and normal quantization, in bits.
    pub fn with_quantization(mut self, position_bits: u8, normal_bits: u8) -> Self {
        self.position_quantization_bits = position_bits;
        self.normal_quantization_bits = normal_bits;
        self
    }

    /// Smoothing angle in radians.
    pub fn smoothing_angle_rad(&self) -> f64 {
        self.smoothing_angle_deg.to_radians()
    }

    /// Check every value against its valid range.
    pub fn validate(&self) -> Result<(), PostProcessError> {
        let angle = self.smoothing_angle_deg;
        if !(angle.is_finite() && (0.0..=180.0).contains(&angle)) {
            return Err(PostProcessError::InvalidConfig(format!(
                "smoothing angle {angle} is outside 0..=180 degrees"
            )));
        }
        if self.compression_level > Self::MAX_COMPRESSION_LEVEL {
            return Err(PostProcessError::InvalidConfig(format!(
                "compression level {} is outside 0..={}",
                self.compression_level,
                Self::MAX_COMPRESSION_LEVEL
            )));
        }
        for (name, bits) in [
            ("position", self.position_quantization_bits),
            ("normal", self.normal_quantization_bits),
        ] {
            if !(1..=Self::MAX_QUANTIZATION_BITS).contains(&bits) {
                return Err(PostProcessError::InvalidConfig(format!(
                    "{name} quantization of {bits} bits is outside 1..={}",
                    Self::MAX_QUANTIZATION_BITS
                )));
            }
        }
        Ok(())
    }
}

/// A stateless transform from one scene file to another.
pub trait PostProcessor {
    fn process(
        &self,
        input: &Path,
        output: &Path,
        config: &ShadingConfig,
    ) -> Result<(), PostProcessError>;
}

/// Runs an external program once per call.
///
/// The program is invoked as
/// `program leading_args... input output angle level position_bits normal_bits`,
/// with the angle in degrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPostProcessor {
    pub program: PathBuf,
    pub leading_args: Vec<OsString>,
}

impl CommandPostProcessor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the input and output paths, such as a
    /// script for a headless DCC application.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn command(&self, input: &Path, output: &Path, config: &ShadingConfig) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg(input)
            .arg(output)
            .arg(config.smoothing_angle_deg.to_string())
            .arg(config.compression_level.to_string())
            .arg(config.position_quantization_bits.to_string())
            .arg(config.normal_quantization_bits.to_string());
        command
    }
}

impl PostProcessor for CommandPostProcessor {
    fn process(
        &self,
        input: &Path,
        output: &Path,
        config: &ShadingConfig,
    ) -> Result<(), PostProcessError> {
        config.validate()?;

        let data = std::fs::read(input).map_err(|source| {
            PostProcessError::Container(ExportError::Io {
                path: input.to_path_buf(),
                source,
            })
        })?;
        let document = GlbDocument::parse(&data)?;
        debug!(
            input = %input.display(),
            nodes = document.gltf.nodes.len(),
            "validated shading input"
        );

        if input == output {
            return Err(PostProcessError::InvalidConfig(format!(
                "output {} would overwrite the input",
                output.display()
            )));
        }
        // A file left by an earlier run must not pass for this run's result
        if output.exists() {
            std::fs::remove_file(output).map_err(|source| {
                PostProcessError::Container(ExportError::Io {
                    path: output.to_path_buf(),
                    source,
                })
            })?;
            debug!(output = %output.display(), "removed previous output");
        }

        let program = self.program.display().to_string();
        let result = self
            .command(input, output, config)
            .output()
            .map_err(|source| PostProcessError::Launch {
                program: program.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(PostProcessError::Failed {
                program,
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        if !output.is_file() {
            return Err(PostProcessError::MissingOutput {
                path: output.to_path_buf(),
            });
        }
        let written = std::fs::read(output).map_err(|source| {
            PostProcessError::Container(ExportError::Io {
                path: output.to_path_buf(),
                source,
            })
        })?;
        GlbDocument::parse(&written)?;

        info!(
            program = %program,
            output = %output.display(),
            smoothing_deg = config.smoothing_angle_deg,
            compression = config.compression_level,
            "shading post-process finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{write_glb, ExportOptions};
    use partmesh_core::Scene;

    fn glb_file(dir: &Path) -> PathBuf {
        let path = dir.join("in.glb");
        let bytes = write_glb(&Scene::new("s"), &ExportOptions::default()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ShadingConfig::default();
        config.validate().unwrap();
        assert!((config.smoothing_angle_rad() - 1.2217).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_out_of_range() {
        for config in [
            ShadingConfig::new().with_compression_level(11),
            ShadingConfig::new().with_quantization(0, 10),
            ShadingConfig::new().with_quantization(14, 31),
            ShadingConfig::new().with_smoothing_angle(f64::NAN),
            ShadingConfig::new().with_smoothing_angle(-1.0),
        ] {
            assert!(matches!(
                config.validate(),
                Err(PostProcessError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_invalid_config_never_launches() {
        let dir = tempfile::tempdir().unwrap();
        let input = glb_file(dir.path());
        let tool = CommandPostProcessor::new("/nonexistent/partmesh-shader");

        let config = ShadingConfig::new().with_compression_level(42);
        assert!(matches!(
            tool.process(&input, &dir.path().join("out.glb"), &config),
            Err(PostProcessError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_non_glb_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.glb");
        std::fs::write(&input, b"solid nope").unwrap();
        let tool = CommandPostProcessor::new("/nonexistent/partmesh-shader");

        assert!(matches!(
            tool.process(&input, &dir.path().join("out.glb"), &ShadingConfig::default()),
            Err(PostProcessError::Container(_))
        ));
    }

    #[test]
    fn test_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = glb_file(dir.path());
        let tool = CommandPostProcessor::new("/nonexistent/partmesh-shader");

        assert!(matches!(
            tool.process(&input, &dir.path().join("out.glb"), &ShadingConfig::default()),
            Err(PostProcessError::Launch { .. })
        ));
    }

    #[test]
    fn test_argument_order() {
        let tool = CommandPostProcessor::new("blender").with_leading_args(["-b", "-P", "shade.py", "--"]);
        let config = ShadingConfig::default();
        let command = tool.command(Path::new("a.glb"), Path::new("b.glb"), &config);

        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["-b", "-P", "shade.py", "--", "a.glb", "b.glb", "70", "6", "14", "10"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_copying_tool() {
        let dir = tempfile::tempdir().unwrap();
        let input = glb_file(dir.path());
        let output = dir.path().join("out.glb");
        let tool = CommandPostProcessor::new("sh").with_leading_args(["-c", "cp \"$1\" \"$2\"", "sh"]);

        tool.process(&input, &output, &ShadingConfig::default()).unwrap();
        assert_eq!(std::fs::read(&input).unwrap(), std::fs::read(&output).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let input = glb_file(dir.path());
        let tool = CommandPostProcessor::new("sh").with_leading_args(["-c", "echo boom >&2; exit 3", "sh"]);

        let err = tool
            .process(&input, &dir.path().join("out.glb"), &ShadingConfig::default())
            .unwrap_err();
        assert!(matches!(&err, PostProcessError::Failed { stderr, .. } if stderr == "boom"));
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = glb_file(dir.path());
        let tool = CommandPostProcessor::new("sh").with_leading_args(["-c", "true", "sh"]);

        assert!(matches!(
            tool.process(&input, &dir.path().join("out.glb"), &ShadingConfig::default()),
            Err(PostProcessError::MissingOutput { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_previous_output_is_not_a_result() {
        let dir = tempfile::tempdir().unwrap();
        let input = glb_file(dir.path());
        let output = dir.path().join("out.glb");
        std::fs::copy(&input, &output).unwrap();
        let tool = CommandPostProcessor::new("true");

        assert!(matches!(
            tool.process(&input, &output, &ShadingConfig::default()),
            Err(PostProcessError::MissingOutput { .. })
        ));
        assert!(!output.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_output_must_be_glb() {
        let dir = tempfile::tempdir().unwrap();
        let input = glb_file(dir.path());
        let output = dir.path().join("out.glb");
        let tool = CommandPostProcessor::new("sh").with_leading_args(["-c", "echo done > \"$2\"", "sh"]);

        assert!(matches!(
            tool.process(&input, &output, &ShadingConfig::default()),
            Err(PostProcessError::Container(ExportError::InvalidContainer(_)))
        ));
    }

    #[test]
    fn test_output_must_differ_from_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = glb_file(dir.path());
        let tool = CommandPostProcessor::new("/nonexistent/partmesh-shader");

        assert!(matches!(
            tool.process(&input, &input, &ShadingConfig::default()),
            Err(PostProcessError::InvalidConfig(_))
        ));
        assert!(input.is_file());
    }
}
