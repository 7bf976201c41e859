//! Sub-mesh Extractor.

use partmesh_core::{ExtractError, FaceLabels, PartId, SubMesh, TriangleMesh};
use tracing::debug;

/// Extract the faces labelled `target` into a self-contained sub-mesh.
///
/// Faces keep their relative order. Referenced vertices are renumbered in
/// first-seen order and copied unchanged, so the result has no orphan
/// vertices. A label with no faces yields an empty sub-mesh.
pub fn extract(
    mesh: &TriangleMesh,
    labels: &FaceLabels,
    target: PartId,
) -> Result<SubMesh, ExtractError> {
    check_labels(mesh, labels)?;
    mesh.validate()?;
    build(mesh, labels, target)
}

/// Extract several parts, in the order given.
pub fn extract_all(
    mesh: &TriangleMesh,
    labels: &FaceLabels,
    parts: &[PartId],
) -> Result<Vec<(PartId, SubMesh)>, ExtractError> {
    check_labels(mesh, labels)?;
    mesh.validate()?;
    parts
        .iter()
        .map(|&part| Ok((part, build(mesh, labels, part)?)))
        .collect()
}

fn check_labels(mesh: &TriangleMesh, labels: &FaceLabels) -> Result<(), ExtractError> {
    if labels.len() != mesh.face_count() {
        return Err(ExtractError::LabelCountMismatch {
            labels: labels.len(),
            faces: mesh.face_count(),
        });
    }
    Ok(())
}

fn build(mesh: &TriangleMesh, labels: &FaceLabels, target: PartId) -> Result<SubMesh, ExtractError> {
    const UNMAPPED: u32 = u32::MAX;

    let mut remap = vec![UNMAPPED; mesh.vertex_count()];
    let mut sub = TriangleMesh::new();
    let mut source_faces = Vec::new();

    for face_idx in labels.faces_with(target) {
        let face = mesh.faces[face_idx].map(|i| {
            let slot = &mut remap[i as usize];
            if *slot == UNMAPPED {
                *slot = sub.positions.len() as u32;
                sub.positions.push(mesh.positions[i as usize]);
            }
            *slot
        });
        sub.faces.push(face);
        source_faces.push(face_idx);
    }

    debug!(
        part = %target,
        vertices = sub.vertex_count(),
        faces = sub.face_count(),
        "extracted sub-mesh"
    );
    Ok(SubMesh::new(sub, source_faces)?)
}
