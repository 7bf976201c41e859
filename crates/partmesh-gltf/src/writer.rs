//! Binary glTF 2.0 scene writer.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use glam::Vec3;
use indexmap::IndexMap;
use partmesh_core::{ExportError, Scene, SubMesh};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::schema::{
    Accessor, Buffer, BufferTarget, BufferView, ComponentType, ElementType, Gltf, Mesh, Node,
    Primitive, Scene as GltfScene,
};

/// GLB magic number "glTF".
pub(crate) const GLB_MAGIC: u32 = 0x46546C67;
/// GLB version.
pub(crate) const GLB_VERSION: u32 = 2;
/// JSON chunk type.
pub(crate) const CHUNK_JSON: u32 = 0x4E4F534A;
/// Binary chunk type.
pub(crate) const CHUNK_BIN: u32 = 0x004E4942;

/// GLB header plus one chunk header.
const GLB_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// Options for encoding a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Write area-weighted vertex normals alongside positions.
    pub vertex_normals: bool,
    /// `asset.generator` string.
    pub generator: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            vertex_normals: true,
            generator: concat!("partmesh ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the NORMAL attribute.
    pub fn with_vertex_normals(mut self, enabled: bool) -> Self {
        self.vertex_normals = enabled;
        self
    }

    pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
        self.generator = generator.into();
        self
    }
}

/// Accumulates the JSON document and the single binary buffer behind it.
struct GltfBuilder {
    gltf: Gltf,
    bin: Vec<u8>,
}

impl GltfBuilder {
    fn new(options: &ExportOptions) -> Self {
        Self {
            gltf: Gltf::with_generator(options.generator.as_str()),
            bin: Vec::new(),
        }
    }

    /// Append a buffer view over the bytes written since `start`, then pad
    /// the buffer so the next view starts 4-byte aligned.
    fn push_view(&mut self, start: usize, target: BufferTarget) -> usize {
        let view = self.gltf.buffer_views.len();
        self.gltf.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: start,
            byte_length: self.bin.len() - start,
            byte_stride: None,
            target: Some(target),
        });
        self.bin.resize(self.bin.len().next_multiple_of(4), 0);
        view
    }

    fn push_accessor(&mut self, accessor: Accessor) -> usize {
        self.gltf.accessors.push(accessor);
        self.gltf.accessors.len() - 1
    }

    /// Float VEC3 data (positions, normals), optionally with min/max.
    fn add_vec3(&mut self, data: &[Vec3], bounds: bool) -> usize {
        let start = self.bin.len();
        for value in data.iter().flat_map(|v| v.to_array()) {
            self.bin.extend_from_slice(&value.to_le_bytes());
        }
        let view = self.push_view(start, BufferTarget::Vertices);

        let mut accessor =
            Accessor::packed(view, ComponentType::Float, ElementType::Vec3, data.len());
        if bounds {
            let (min, max) = data.iter().fold(
                (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
                |(min, max), &v| (min.min(v), max.max(v)),
            );
            accessor = accessor.with_bounds(to_f64(min), to_f64(max));
        }
        self.push_accessor(accessor)
    }

    /// Triangle indices, narrowed to u16 when every index fits.
    fn add_indices(&mut self, faces: &[[u32; 3]]) -> usize {
        let start = self.bin.len();
        let narrow = faces
            .iter()
            .flatten()
            .all(|&i| u16::try_from(i).is_ok());

        for &index in faces.iter().flatten() {
            if narrow {
                self.bin.extend_from_slice(&(index as u16).to_le_bytes());
            } else {
                self.bin.extend_from_slice(&index.to_le_bytes());
            }
        }
        let view = self.push_view(start, BufferTarget::Indices);

        let component_type = if narrow {
            ComponentType::UnsignedShort
        } else {
            ComponentType::UnsignedInt
        };
        self.push_accessor(Accessor::packed(
            view,
            component_type,
            ElementType::Scalar,
            faces.len() * 3,
        ))
    }

    /// One glTF mesh holding a single indexed triangle primitive.
    fn add_mesh(&mut self, name: &str, part: &SubMesh, normals: bool) -> usize {
        let mut attributes = IndexMap::new();
        attributes.insert(
            Primitive::POSITION.to_string(),
            self.add_vec3(part.positions(), true),
        );
        if normals {
            let normals = part.mesh().vertex_normals();
            attributes.insert(Primitive::NORMAL.to_string(), self.add_vec3(&normals, false));
        }
        let indices = self.add_indices(part.faces());

        self.gltf.meshes.push(Mesh {
            name: Some(name.to_string()),
            primitives: vec![Primitive::triangles(attributes, indices)],
        });
        self.gltf.meshes.len() - 1
    }

    /// One root node per scene entry, in scene order.
    fn build(&mut self, scene: &Scene, options: &ExportOptions) {
        let mut roots = Vec::with_capacity(scene.len());

        for entry in scene.entries() {
            // Zero-count accessors are invalid, so an empty part gets no mesh
            let mesh = (!entry.mesh().is_empty())
                .then(|| self.add_mesh(entry.geometry_name(), entry.mesh(), options.vertex_normals));

            roots.push(self.gltf.nodes.len());
            self.gltf.nodes.push(Node::named(entry.node_name(), mesh));
        }

        self.gltf.scenes.push(GltfScene {
            name: Some(scene.name().to_string()),
            nodes: roots,
        });
        self.gltf.scene = Some(0);

        if !self.bin.is_empty() {
            self.gltf.buffers.push(Buffer {
                byte_length: self.bin.len(),
                uri: None,
            });
        }
    }
}

fn to_f64(v: Vec3) -> Vec<f64> {
    v.to_array().iter().map(|&c| f64::from(c)).collect()
}

/// Encode a scene as a GLB container.
pub fn write_glb(scene: &Scene, options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    let mut builder = GltfBuilder::new(options);
    builder.build(scene, options);

    let json_bytes = serde_json::to_vec(&builder.gltf)?;

    // Pad JSON to 4-byte alignment
    let json_padding = (4 - (json_bytes.len() % 4)) % 4;
    let padded_json_len = json_bytes.len() + json_padding;

    // Pad binary to 4-byte alignment
    let bin_padding = (4 - (builder.bin.len() % 4)) % 4;
    let padded_bin_len = builder.bin.len() + bin_padding;

    let has_bin = !builder.bin.is_empty();
    let total_size = GLB_HEADER_LEN
        + CHUNK_HEADER_LEN
        + padded_json_len
        + if has_bin { CHUNK_HEADER_LEN + padded_bin_len } else { 0 };

    let mut output = Vec::with_capacity(total_size);

    // GLB header
    output.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    output.extend_from_slice(&GLB_VERSION.to_le_bytes());
    output.extend_from_slice(&(total_size as u32).to_le_bytes());

    // JSON chunk
    output.extend_from_slice(&(padded_json_len as u32).to_le_bytes());
    output.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    output.extend_from_slice(&json_bytes);
    output.extend(std::iter::repeat(b' ').take(json_padding));

    if has_bin {
        output.extend_from_slice(&(padded_bin_len as u32).to_le_bytes());
        output.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        output.extend_from_slice(&builder.bin);
        output.extend(std::iter::repeat(0u8).take(bin_padding));
    }

    Ok(output)
}

/// Encode a scene as glTF JSON with the buffer embedded as a data URI.
pub fn write_gltf_json(scene: &Scene, pretty: bool) -> Result<Vec<u8>, ExportError> {
    let options = ExportOptions::default();
    let mut builder = GltfBuilder::new(&options);
    builder.build(scene, &options);

    if let Some(buffer) = builder.gltf.buffers.first_mut() {
        let encoded = STANDARD.encode(&builder.bin);
        buffer.uri = Some(format!("data:application/octet-stream;base64,{encoded}"));
    }

    let json = if pretty {
        serde_json::to_vec_pretty(&builder.gltf)?
    } else {
        serde_json::to_vec(&builder.gltf)?
    };
    Ok(json)
}

/// Encode `scene` and write it to `path` in a single write.
///
/// Returns the number of bytes written. Nothing touches the file system
/// until encoding has succeeded.
pub fn save_glb(
    scene: &Scene,
    path: impl AsRef<Path>,
    options: &ExportOptions,
) -> Result<usize, ExportError> {
    let path = path.as_ref();
    let bytes = write_glb(scene, options)?;
    std::fs::write(path, &bytes).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        path = %path.display(),
        size_kb = bytes.len() as f64 / 1024.0,
        "wrote scene"
    );
    Ok(bytes.len())
}
