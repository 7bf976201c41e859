//! Vertex welding.
//!
//! Per-face tessellation duplicates every vertex on a shared B-rep edge.
//! Welding merges those copies so neighbouring faces share indices.

use std::collections::HashMap;

use glam::Vec3;
use partmesh_core::TriangleMesh;

/// What a weld pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeldStats {
    /// Vertices merged into an earlier vertex.
    pub merged_vertices: usize,
    /// Faces dropped because two of their corners merged.
    pub removed_faces: usize,
    /// Vertices dropped because no face referenced them.
    pub removed_vertices: usize,
}

/// Merge vertices closer than `epsilon`, drop collapsed faces and compact
/// the vertex array.
///
/// The surviving vertex of each cluster is the one with the lowest index,
/// so kept positions are never moved.
pub fn weld_vertices(mesh: &mut TriangleMesh, epsilon: f64) -> WeldStats {
    let mut stats = WeldStats::default();

    if mesh.positions.is_empty() {
        return stats;
    }

    if epsilon.is_finite() && epsilon > 0.0 {
        let remap = merge_map(&mesh.positions, epsilon, &mut stats.merged_vertices);
        if stats.merged_vertices > 0 {
            for face in &mut mesh.faces {
                *face = face.map(|i| remap.get(i as usize).copied().unwrap_or(i));
            }
        }
    }

    // Remove degenerate faces created by welding
    let before = mesh.faces.len();
    mesh.faces
        .retain(|&[i0, i1, i2]| i0 != i1 && i1 != i2 && i0 != i2);
    stats.removed_faces = before - mesh.faces.len();

    stats.removed_vertices = remove_unreferenced_vertices(mesh);
    stats
}

fn merge_map(positions: &[Vec3], epsilon: f64, merged: &mut usize) -> Vec<u32> {
    let cell_size = epsilon * 2.0;

    // Build spatial hash
    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (idx, position) in positions.iter().enumerate() {
        spatial_hash
            .entry(pos_to_cell(*position, cell_size))
            .or_default()
            .push(idx as u32);
    }

    // Find canonical representatives
    let mut remap: Vec<u32> = (0..positions.len() as u32).collect();
    for (idx, position) in positions.iter().enumerate() {
        let idx = idx as u32;
        if remap[idx as usize] != idx {
            continue;
        }

        let cell = pos_to_cell(*position, cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = spatial_hash.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz))
                    else {
                        continue;
                    };
                    for &other in candidates {
                        if other <= idx || remap[other as usize] != other {
                            continue;
                        }
                        let dist = f64::from(position.distance(positions[other as usize]));
                        if dist < epsilon {
                            remap[other as usize] = idx;
                            *merged += 1;
                        }
                    }
                }
            }
        }
    }

    // Resolve transitive merges
    for i in 0..remap.len() {
        let mut target = remap[i];
        while remap[target as usize] != target {
            target = remap[target as usize];
        }
        remap[i] = target;
    }

    remap
}

/// Convert position to spatial hash cell.
fn pos_to_cell(pos: Vec3, cell_size: f64) -> (i64, i64, i64) {
    let p = pos.as_dvec3() / cell_size;
    (p.x.floor() as i64, p.y.floor() as i64, p.z.floor() as i64)
}

/// Remove unreferenced vertices, keeping the order of the survivors.
///
/// Returns the number of vertices removed.
pub fn remove_unreferenced_vertices(mesh: &mut TriangleMesh) -> usize {
    const UNUSED: u32 = u32::MAX;

    let original_count = mesh.positions.len();
    let mut remap = vec![UNUSED; original_count];
    for &i in mesh.faces.iter().flatten() {
        if let Some(slot) = remap.get_mut(i as usize) {
            *slot = 0;
        }
    }

    let mut positions = Vec::with_capacity(original_count);
    for (old, slot) in remap.iter_mut().enumerate() {
        if *slot != UNUSED {
            *slot = positions.len() as u32;
            positions.push(mesh.positions[old]);
        }
    }

    if positions.len() == original_count {
        return 0;
    }

    for face in &mut mesh.faces {
        *face = face.map(|i| remap.get(i as usize).copied().unwrap_or(i));
    }
    mesh.positions = positions;
    original_count - mesh.positions.len()
}
