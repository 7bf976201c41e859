//! STEP to segmented GLB conversion.
//!
//! [`run`] wires the stages together:
//!
//! 1. import the STEP file
//! 2. tessellate within the configured deviations
//! 3. normalize face orientation
//! 4. classify faces with a single-axis cut
//! 5. extract one sub-mesh per part
//! 6. package the parts into a scene
//! 7. encode the scene and write it once
//!
//! Every stage finishes before the next starts, and the output file is only
//! written after all of them succeeded.

mod config;

use std::path::PathBuf;

use partmesh_core::{FaceLabels, PartId, PipelineError, Scene, SceneEntry, Solid, TriangleMesh};
use partmesh_gltf::{save_glb, PostProcessor};
use partmesh_segment::{
    classify, extract_all, normalize_orientation, package, tessellate_with, AxisThreshold,
    OrientationReport,
};
use tracing::info;

pub use config::PipelineConfig;

/// Result of running the in-memory stages on a solid.
#[derive(Debug, Clone)]
pub struct SegmentedScene {
    pub scene: Scene,
    /// The welded, oriented mesh the parts were cut from.
    pub mesh: TriangleMesh,
    pub labels: FaceLabels,
    pub orientation: OrientationReport,
}

/// Summary of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub solid: String,
    pub vertices: usize,
    pub faces: usize,
    pub orientation: OrientationReport,
    /// Face count per part, in scene order.
    pub parts: Vec<(PartId, usize)>,
    pub output: PathBuf,
    pub output_bytes: usize,
    pub shading_output: Option<PathBuf>,
}

/// Tessellate, orient, classify, extract and package a solid.
///
/// No file is read or written.
pub fn segment_solid<S>(solid: &S, config: &PipelineConfig) -> Result<SegmentedScene, PipelineError>
where
    S: Solid + ?Sized,
{
    let tolerance = config.tolerance()?;
    let threshold = config.threshold()?;
    let mut mesh = tessellate_with(solid, &tolerance)?;
    let orientation = normalize_orientation(&mut mesh);

    let predicate = AxisThreshold::lens_barrel_below_z(threshold);
    let labels = classify(&mesh, &predicate);

    let parts = extract_all(&mesh, &labels, &PartId::ALL)?;
    let name = config
        .scene_name
        .clone()
        .unwrap_or_else(|| solid.name().to_string());
    let scene = package(
        name,
        parts
            .into_iter()
            .map(|(part, sub)| SceneEntry::for_part(part, sub)),
    )?;

    Ok(SegmentedScene {
        scene,
        mesh,
        labels,
        orientation,
    })
}

/// Convert `config.input` to a segmented GLB at `config.output`.
///
/// The shading stage is not run; see [`run_with_post_process`].
pub fn run(config: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
    let config = named(config);
    config.tolerance()?;
    config.threshold()?;
    let solid = partmesh_step::import_step(&config.input)?;
    let segmented = segment_solid(&solid, &config)?;

    info!(
        solid = solid.name(),
        vertices = segmented.mesh.vertex_count(),
        faces = segmented.mesh.face_count(),
        "mesh ready"
    );
    let parts: Vec<(PartId, usize)> = PartId::ALL
        .into_iter()
        .filter_map(|part| {
            let entry = segmented.scene.get(part.as_str())?;
            Some((part, entry.mesh().face_count()))
        })
        .collect();
    for (part, faces) in &parts {
        info!(part = %part, faces, "part extracted");
    }

    let output_bytes = save_glb(&segmented.scene, &config.output, &config.export)?;

    Ok(PipelineReport {
        solid: solid.name().to_string(),
        vertices: segmented.mesh.vertex_count(),
        faces: segmented.mesh.face_count(),
        orientation: segmented.orientation,
        parts,
        output: config.output.clone(),
        output_bytes,
        shading_output: None,
    })
}

/// [`run`], then hand the written file to `post` when shading is configured.
///
/// The shading configuration is validated before anything is written.
pub fn run_with_post_process(
    config: &PipelineConfig,
    post: &dyn PostProcessor,
) -> Result<PipelineReport, PipelineError> {
    if let Some(shading) = &config.shading {
        shading.validate()?;
    }

    let mut report = run(config)?;

    if let Some(shading) = &config.shading {
        let shaded = config.resolved_shading_output();
        post.process(&config.output, &shaded, shading)?;
        report.shading_output = Some(shaded);
    }
    Ok(report)
}

/// Fill in the scene name from the input path when none is set.
fn named(config: &PipelineConfig) -> PipelineConfig {
    let mut config = config.clone();
    config.scene_name = config.resolved_scene_name();
    config
}
