//! GLB container reader.
//!
//! Only as much as partmesh needs to check its own output and the input of
//! the shading stage: header and chunk validation, the JSON document and
//! float/index accessors.

use glam::Vec3;
use partmesh_core::{ExportError, TriangleMesh};

use crate::schema::{Accessor, ComponentType, ElementType, Gltf, Primitive};
use crate::writer::{CHUNK_BIN, CHUNK_JSON, GLB_MAGIC, GLB_VERSION};

/// A parsed GLB file.
#[derive(Debug, Clone)]
pub struct GlbDocument {
    pub gltf: Gltf,
    /// Contents of the BIN chunk, empty when there is none.
    pub bin: Vec<u8>,
}

fn invalid(message: impl Into<String>) -> ExportError {
    ExportError::InvalidContainer(message.into())
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

impl GlbDocument {
    /// Check whether `data` starts with the GLB magic.
    pub fn is_glb(data: &[u8]) -> bool {
        read_u32(data, 0) == Some(GLB_MAGIC)
    }

    /// Parse and validate a GLB container.
    pub fn parse(data: &[u8]) -> Result<Self, ExportError> {
        if data.len() < 12 {
            return Err(invalid("GLB file too short"));
        }

        let magic = read_u32(data, 0).unwrap_or_default();
        let version = read_u32(data, 4).unwrap_or_default();
        let length = read_u32(data, 8).unwrap_or_default() as usize;

        if magic != GLB_MAGIC {
            return Err(invalid("invalid GLB magic"));
        }
        if version != GLB_VERSION {
            return Err(invalid(format!("GLB version {version} not supported")));
        }
        if length != data.len() {
            return Err(invalid(format!(
                "header declares {length} bytes but the file has {}",
                data.len()
            )));
        }

        let mut offset = 12;
        let mut json: Option<&[u8]> = None;
        let mut bin: Option<&[u8]> = None;

        while offset < data.len() {
            let (Some(chunk_length), Some(chunk_type)) =
                (read_u32(data, offset), read_u32(data, offset + 4))
            else {
                return Err(invalid("truncated chunk header"));
            };
            let chunk_length = chunk_length as usize;
            offset += 8;

            if chunk_length % 4 != 0 {
                return Err(invalid("chunk length is not 4-byte aligned"));
            }
            let chunk = data
                .get(offset..offset + chunk_length)
                .ok_or_else(|| invalid("GLB chunk extends past end of file"))?;

            match chunk_type {
                CHUNK_JSON if json.is_none() && bin.is_none() => json = Some(chunk),
                CHUNK_JSON => return Err(invalid("JSON chunk must come first, once")),
                CHUNK_BIN if json.is_some() && bin.is_none() => bin = Some(chunk),
                CHUNK_BIN => return Err(invalid("unexpected BIN chunk")),
                // Unknown chunk types are skipped
                _ => {}
            }
            offset += chunk_length;
        }

        let json = json.ok_or_else(|| invalid("GLB missing JSON chunk"))?;
        let gltf: Gltf = serde_json::from_slice(json)?;

        Ok(Self {
            gltf,
            bin: bin.map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    /// Names of the nodes, in document order. Unnamed nodes are "".
    pub fn node_names(&self) -> Vec<&str> {
        self.gltf
            .nodes
            .iter()
            .map(|n| n.name.as_deref().unwrap_or(""))
            .collect()
    }

    /// Bytes of an accessor, checked against the BIN chunk.
    fn accessor_bytes(&self, accessor_idx: usize) -> Result<(&Accessor, &[u8]), ExportError> {
        let accessor = self
            .gltf
            .accessors
            .get(accessor_idx)
            .ok_or_else(|| invalid(format!("invalid accessor {accessor_idx}")))?;
        let view_idx = accessor
            .buffer_view
            .ok_or_else(|| invalid("accessor missing buffer view"))?;
        let view = self
            .gltf
            .buffer_views
            .get(view_idx)
            .ok_or_else(|| invalid(format!("invalid buffer view {view_idx}")))?;
        if view.buffer != 0 || view.byte_stride.is_some() {
            return Err(invalid("only tightly packed views of buffer 0 are supported"));
        }

        let start = view.byte_offset + accessor.byte_offset;
        let len = accessor.byte_len();
        let bytes = self
            .bin
            .get(start..start + len)
            .filter(|_| accessor.byte_offset + len <= view.byte_length)
            .ok_or_else(|| invalid("accessor data out of bounds"))?;
        Ok((accessor, bytes))
    }

    /// Read a float VEC3 accessor.
    pub fn read_vec3(&self, accessor_idx: usize) -> Result<Vec<Vec3>, ExportError> {
        let (accessor, bytes) = self.accessor_bytes(accessor_idx)?;
        if accessor.element_type != ElementType::Vec3
            || accessor.component_type != ComponentType::Float
        {
            return Err(invalid(format!(
                "expected float VEC3, got {} of {:?}",
                accessor.element_type, accessor.component_type
            )));
        }

        Ok(bytes
            .chunks_exact(12)
            .map(|c| {
                let f = |i: usize| f32::from_le_bytes([c[i], c[i + 1], c[i + 2], c[i + 3]]);
                Vec3::new(f(0), f(4), f(8))
            })
            .collect())
    }

    /// Read an index accessor of any unsigned width.
    pub fn read_indices(&self, accessor_idx: usize) -> Result<Vec<u32>, ExportError> {
        let (accessor, bytes) = self.accessor_bytes(accessor_idx)?;
        if accessor.element_type != ElementType::Scalar {
            return Err(invalid(format!(
                "expected SCALAR for indices, got {}",
                accessor.element_type
            )));
        }

        let indices = match accessor.component_type {
            ComponentType::UnsignedByte => bytes.iter().map(|&b| u32::from(b)).collect(),
            ComponentType::UnsignedShort => bytes
                .chunks_exact(2)
                .map(|c| u32::from(u16::from_le_bytes([c[0], c[1]])))
                .collect(),
            ComponentType::UnsignedInt => bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            other => return Err(invalid(format!("unsupported index component type: {other:?}"))),
        };
        Ok(indices)
    }

    /// Positions and triangles of the first primitive of a mesh.
    pub fn read_mesh(&self, mesh_idx: usize) -> Result<TriangleMesh, ExportError> {
        let primitive = self
            .gltf
            .meshes
            .get(mesh_idx)
            .and_then(|m| m.primitives.first())
            .ok_or_else(|| invalid(format!("mesh {mesh_idx} has no primitive")))?;

        let position = *primitive
            .attributes
            .get(Primitive::POSITION)
            .ok_or_else(|| invalid("primitive has no POSITION"))?;
        let positions = self.read_vec3(position)?;

        let indices = match primitive.indices {
            Some(accessor) => self.read_indices(accessor)?,
            None => (0..positions.len() as u32).collect(),
        };
        if indices.len() % 3 != 0 {
            return Err(invalid("index count is not a multiple of 3"));
        }
        let faces = indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();

        let mesh = TriangleMesh::from_parts(positions, faces);
        mesh.validate()
            .map_err(|e| invalid(format!("mesh {mesh_idx}: {e}")))?;
        Ok(mesh)
    }
}
