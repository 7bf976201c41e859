//! STEP file import.

use std::borrow::Cow;
use std::path::Path;

use partmesh_core::ImportError;
use tracing::{debug, info};

use crate::entities::{EntityGraph, StepEntity};
use crate::p21::parse_data_section;
use crate::solid::StepSolid;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Check whether `data` looks like an ISO 10303-21 exchange file.
pub fn is_step(data: &[u8]) -> bool {
    // Only check the first 8KB for efficiency
    let head = &data[..data.len().min(8192)];
    let head = head.strip_prefix(UTF8_BOM).unwrap_or(head);

    let text = String::from_utf8_lossy(head);
    text.to_ascii_uppercase().contains("ISO-10303-21") || text.contains("FILE_DESCRIPTION")
}

/// Read and parse a STEP file from disk.
///
/// The file is read once, in full, before parsing starts.
pub fn import_step(path: impl AsRef<Path>) -> Result<StepSolid, ImportError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "solid".to_string());

    read_step(&data, &name)
}

/// Parse a STEP file held in memory.
///
/// `name` is used when the file names none of its solids.
pub fn read_step(data: &[u8], name: &str) -> Result<StepSolid, ImportError> {
    if !is_step(data) {
        return Err(ImportError::NotStep);
    }

    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    // Some CAD exporters write non-UTF-8 bytes inside strings
    let text: Cow<'_, str> = String::from_utf8_lossy(data);

    let (_, instances) = parse_data_section(&text).map_err(|e| {
        let (message, rest) = match &e {
            nom::Err::Error(inner) | nom::Err::Failure(inner) => {
                (format!("{:?}", inner.code), inner.input)
            }
            nom::Err::Incomplete(_) => ("unexpected end of input".to_string(), ""),
        };
        ImportError::Parse {
            message,
            offset: text.len() - rest.len(),
        }
    })?;

    let graph = EntityGraph::new(&instances);
    debug!(entities = graph.len(), "parsed STEP data section");

    let solids = graph.solids();
    let solid_name = solids
        .iter()
        .map(|(_, solid)| solid.name.trim())
        .find(|n| !n.is_empty())
        .unwrap_or(name)
        .to_string();

    let mut shells: Vec<u64> = solids
        .iter()
        .map(|(_, solid)| solid.outer)
        .filter(|id| matches!(graph.get(*id), Some(StepEntity::Shell(_))))
        .collect();
    if shells.is_empty() {
        shells = graph.shells();
    }
    if shells.is_empty() {
        return Err(ImportError::NoSolid {
            name: name.to_string(),
        });
    }
    shells.sort_unstable();
    shells.dedup();

    info!(
        solid = %solid_name,
        solids = solids.len(),
        shells = shells.len(),
        "imported STEP model"
    );
    Ok(StepSolid::new(solid_name, graph, shells))
}

#[cfg(test)]
mod tests {
    use super::*;
    use partmesh_core::{DeviationTolerance, Solid};

    const UNIT_BOX: &str = include_str!("../tests/fixtures/unit_box.step");

    #[test]
    fn test_is_step() {
        assert!(is_step(b"ISO-10303-21;\nHEADER;"));
        assert!(is_step(b"\xEF\xBB\xBFiso-10303-21;"));
        assert!(is_step(b"HEADER;\nFILE_DESCRIPTION(('x'),'2;1');"));
        assert!(!is_step(b"solid cube\nfacet normal 0 0 1"));
        assert!(!is_step(b""));
    }

    #[test]
    fn test_rejects_non_step() {
        assert!(matches!(
            read_step(b"glTF\x02\x00\x00\x00", "x"),
            Err(ImportError::NotStep)
        ));
    }

    #[test]
    fn test_reports_parse_offset() {
        let text = "ISO-10303-21;\nDATA;\n#1=CARTESIAN_POINT('',(0.,0.,0.));\n#2=VERTEX_POINT(;\nENDSEC;";
        let err = read_step(text.as_bytes(), "broken").unwrap_err();
        let ImportError::Parse { offset, .. } = err else {
            panic!("expected parse error, got {err:?}");
        };
        assert!(text[offset..].starts_with("#2"), "offset {offset}");
    }

    #[test]
    fn test_no_solid() {
        let text = "ISO-10303-21;\nDATA;\n#1=CARTESIAN_POINT('',(0.,0.,0.));\nENDSEC;";
        assert!(matches!(
            read_step(text.as_bytes(), "points"),
            Err(ImportError::NoSolid { name }) if name == "points"
        ));
    }

    #[test]
    fn test_unit_box_solid() {
        let solid = read_step(UNIT_BOX.as_bytes(), "fallback").unwrap();
        assert_eq!(solid.name(), "unit_box");
        assert_eq!(solid.shells().len(), 1);
        assert_eq!(solid.face_count(), 6);

        let mesh = solid.triangulate(&DeviationTolerance::default()).unwrap();
        mesh.validate().unwrap();
        // Two triangles per square face, four corners each
        assert_eq!(mesh.face_count(), 12);
        assert_eq!(mesh.vertex_count(), 24);
        assert!((mesh.signed_volume() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_import_step_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.step");
        std::fs::write(&path, UNIT_BOX).unwrap();

        let solid = import_step(&path).unwrap();
        assert_eq!(solid.face_count(), 6);

        let missing = dir.path().join("missing.step");
        assert!(matches!(
            import_step(&missing),
            Err(ImportError::Io { path, .. }) if path == missing
        ));
    }
}
