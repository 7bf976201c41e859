//! Error types for the partmesh pipeline.
//!
//! Every stage has its own error enum. [`PipelineError`] wraps them so a
//! caller driving the whole conversion sees which stage failed.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("import failed: {0}")]
    Import(#[from] ImportError),

    #[error("tessellation failed: {0}")]
    Tessellate(#[from] TessellateError),

    #[error("sub-mesh extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("scene packaging failed: {0}")]
    Package(#[from] PackageError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    #[error("shading post-process failed: {0}")]
    PostProcess(#[from] PostProcessError),

    /// The classification threshold is NaN or infinite.
    #[error("classification threshold {value} is not a finite coordinate")]
    InvalidThreshold { value: f32 },
}

/// Errors while reading a CAD exchange file.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The input file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes carry no ISO 10303-21 header.
    #[error("input is not an ISO 10303-21 exchange file")]
    NotStep,

    /// The DATA section could not be parsed.
    #[error("parse error at byte {offset}: {message}")]
    Parse {
        /// Error message.
        message: String,
        /// Byte offset into the decoded text.
        offset: usize,
    },

    /// The file parsed but contains no solid or shell.
    #[error("no solid or shell found in {name}")]
    NoSolid { name: String },
}

/// Errors raised by a B-rep kernel while triangulating a solid.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A referenced entity is missing or has the wrong type.
    #[error("entity #{id} is missing or is not a {expected}")]
    MissingEntity { id: u64, expected: &'static str },

    /// Geometry that cannot be discretized.
    #[error("degenerate geometry: {0}")]
    Degenerate(String),
}

/// Errors from the tessellation stage.
#[derive(Debug, Error)]
pub enum TessellateError {
    /// A deviation tolerance is zero, negative or not finite.
    #[error("invalid {parameter} deviation: {value} (must be positive and finite)")]
    InvalidTolerance { parameter: &'static str, value: f64 },

    /// The kernel produced no triangles for the solid.
    #[error("tessellating solid '{solid}' produced no faces")]
    EmptyMesh { solid: String },

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// Violations of the triangle mesh invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("face {face} references vertex {index}, but the mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        face: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("{faces} faces but {sources} source face indices")]
    SourceCountMismatch { faces: usize, sources: usize },
}

/// Errors from the sub-mesh extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The label sequence does not cover the mesh faces one to one.
    #[error("{labels} face labels supplied for a mesh with {faces} faces")]
    LabelCountMismatch { labels: usize, faces: usize },

    #[error(transparent)]
    InvalidMesh(#[from] MeshError),
}

/// Errors from the scene packager.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackageError {
    /// Two entries share a node name.
    #[error("duplicate scene node name '{name}'")]
    DuplicateNode { name: String },
}

/// Errors while encoding or writing a scene container.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The output file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bytes that are not a well-formed binary container.
    #[error("invalid container: {0}")]
    InvalidContainer(String),
}

/// Errors from the external shading/compression stage.
#[derive(Debug, Error)]
pub enum PostProcessError {
    /// A configuration value is out of range.
    #[error("invalid shading configuration: {0}")]
    InvalidConfig(String),

    /// The external tool could not be started.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external tool exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The external tool succeeded but left no output file.
    #[error("post-process produced no output at {}", path.display())]
    MissingOutput { path: PathBuf },

    /// The input container is unreadable or malformed.
    #[error(transparent)]
    Container(#[from] ExportError),
}
