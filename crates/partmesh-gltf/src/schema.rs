//! The subset of the glTF 2.0 JSON schema that partmesh writes and reads.
//!
//! Numeric enums of the format (component types, buffer targets) are typed
//! here; everything partmesh does not touch is carried in [`Gltf::extra`].

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Root document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gltf {
    pub asset: Asset,
    /// Index of the scene shown by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<Mesh>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<Accessor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<BufferView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Buffer>,
    /// Materials, extensions and anything else a downstream tool added.
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl Gltf {
    /// An empty 2.0 document stamped with `generator`.
    pub fn with_generator(generator: impl Into<String>) -> Self {
        Self {
            asset: Asset {
                version: Asset::VERSION.to_string(),
                generator: Some(generator.into()),
            },
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

impl Asset {
    pub const VERSION: &'static str = "2.0";
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            version: Self::VERSION.to_string(),
            generator: None,
        }
    }
}

/// Root nodes of one scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<usize>,
}

/// A node. partmesh writes flat scenes: no transforms, no children.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
}

impl Node {
    pub fn named(name: impl Into<String>, mesh: Option<usize>) -> Self {
        Self {
            name: Some(name.into()),
            children: Vec::new(),
            mesh,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

/// One draw call of a mesh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Primitive {
    /// Attribute semantic to accessor index, in write order.
    pub attributes: IndexMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indices: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    #[serde(default = "triangles")]
    pub mode: u32,
}

pub const MODE_TRIANGLES: u32 = 4;

fn triangles() -> u32 {
    MODE_TRIANGLES
}

impl Primitive {
    pub const POSITION: &'static str = "POSITION";
    pub const NORMAL: &'static str = "NORMAL";

    /// An indexed triangle list.
    pub fn triangles(attributes: IndexMap<String, usize>, indices: usize) -> Self {
        Self {
            attributes,
            indices: Some(indices),
            material: None,
            mode: MODE_TRIANGLES,
        }
    }
}

/// Scalar type of accessor components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    UnsignedInt,
    Float,
}

impl ComponentType {
    pub fn size(self) -> usize {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::UnsignedInt | Self::Float => 4,
        }
    }
}

impl From<ComponentType> for u32 {
    fn from(ty: ComponentType) -> u32 {
        match ty {
            ComponentType::Byte => 5120,
            ComponentType::UnsignedByte => 5121,
            ComponentType::Short => 5122,
            ComponentType::UnsignedShort => 5123,
            ComponentType::UnsignedInt => 5125,
            ComponentType::Float => 5126,
        }
    }
}

impl TryFrom<u32> for ComponentType {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, String> {
        Ok(match code {
            5120 => Self::Byte,
            5121 => Self::UnsignedByte,
            5122 => Self::Short,
            5123 => Self::UnsignedShort,
            5125 => Self::UnsignedInt,
            5126 => Self::Float,
            other => return Err(format!("unknown accessor component type {other}")),
        })
    }
}

/// Shape of one accessor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl ElementType {
    pub fn components(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub count: usize,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    /// Per-component bounds. Required for POSITION.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f64>>,
}

impl Accessor {
    /// A tightly packed accessor starting at the beginning of `view`.
    pub fn packed(
        view: usize,
        component_type: ComponentType,
        element_type: ElementType,
        count: usize,
    ) -> Self {
        Self {
            buffer_view: Some(view),
            byte_offset: 0,
            component_type,
            count,
            element_type,
            min: None,
            max: None,
        }
    }

    pub fn with_bounds(mut self, min: Vec<f64>, max: Vec<f64>) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Bytes spanned by the accessor's elements.
    pub fn byte_len(&self) -> usize {
        self.count * self.element_type.components() * self.component_type.size()
    }
}

/// What a buffer view holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BufferTarget {
    Vertices,
    Indices,
}

impl From<BufferTarget> for u32 {
    fn from(target: BufferTarget) -> u32 {
        match target {
            BufferTarget::Vertices => 34962,
            BufferTarget::Indices => 34963,
        }
    }
}

impl TryFrom<u32> for BufferTarget {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, String> {
        match code {
            34962 => Ok(Self::Vertices),
            34963 => Ok(Self::Indices),
            other => Err(format!("unknown buffer view target {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<BufferTarget>,
}

/// A binary buffer. In a GLB, buffer 0 is the BIN chunk and has no URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    pub byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessor_json_shape() {
        let accessor = Accessor::packed(2, ComponentType::Float, ElementType::Vec3, 8)
            .with_bounds(vec![0.0; 3], vec![1.0; 3]);
        let json = serde_json::to_value(&accessor).unwrap();

        assert_eq!(json["componentType"], 5126);
        assert_eq!(json["type"], "VEC3");
        assert_eq!(json["bufferView"], 2);
        assert_eq!(accessor.byte_len(), 96);
    }

    #[test]
    fn test_unknown_codes_are_rejected() {
        let json = r#"{"componentType": 5124, "count": 1, "type": "SCALAR"}"#;
        assert!(serde_json::from_str::<Accessor>(json).is_err());

        let json = r#"{"buffer": 0, "byteLength": 4, "target": 1}"#;
        assert!(serde_json::from_str::<BufferView>(json).is_err());
    }

    #[test]
    fn test_primitive_mode_defaults_to_triangles() {
        let primitive: Primitive = serde_json::from_str(r#"{"attributes": {"POSITION": 0}}"#).unwrap();
        assert_eq!(primitive.mode, MODE_TRIANGLES);
        assert_eq!(primitive.attributes[Primitive::POSITION], 0);
    }
}
