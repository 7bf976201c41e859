//! Scene Packager.

use partmesh_core::{PackageError, Scene, SceneEntry};
use tracing::debug;

/// Compose entries into a named scene, keeping their order.
///
/// Node names must be unique; geometry names may repeat. The first repeated
/// node name is reported.
pub fn package(
    name: impl Into<String>,
    entries: impl IntoIterator<Item = SceneEntry>,
) -> Result<Scene, PackageError> {
    let scene = Scene::from_entries(name, entries)?;

    debug!(
        scene = scene.name(),
        nodes = scene.len(),
        faces = scene.face_count(),
        "packaged scene"
    );
    Ok(scene)
}
