//! Indexed triangle meshes.

use glam::Vec3;

use crate::errors::MeshError;

/// An indexed triangle mesh.
///
/// Faces carry no orientation guarantee until they have been through the
/// orientation normalizer.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TriangleMesh {
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Triangles as vertex index triples.
    pub faces: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh from positions and faces.
    pub fn from_parts(positions: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Self {
        Self { positions, faces }
    }

    /// Get the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Get the number of triangles.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// True when the mesh has no faces.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// The three corner positions of a face.
    ///
    /// Returns `None` if the face does not exist or references a vertex
    /// outside the mesh.
    pub fn triangle(&self, face: usize) -> Option<[Vec3; 3]> {
        let [a, b, c] = *self.faces.get(face)?;
        Some([
            *self.positions.get(a as usize)?,
            *self.positions.get(b as usize)?,
            *self.positions.get(c as usize)?,
        ])
    }

    /// Iterate over the corner positions of every valid face.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        (0..self.faces.len()).filter_map(move |f| self.triangle(f))
    }

    /// Check that every face index lies within the vertex range.
    pub fn validate(&self) -> Result<(), MeshError> {
        let vertex_count = self.positions.len();
        for (face, tri) in self.faces.iter().enumerate() {
            if let Some(&index) = tri.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshError::IndexOutOfRange {
                    face,
                    index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }

    /// Append another mesh, offsetting its indices.
    pub fn append(&mut self, other: &TriangleMesh) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.faces
            .extend(other.faces.iter().map(|f| [f[0] + base, f[1] + base, f[2] + base]));
    }

    /// Compute the bounding box of the vertex positions.
    pub fn compute_bounds(&self) -> BoundingBox {
        BoundingBox::from_points(&self.positions)
    }

    /// Area-weighted per-vertex normals.
    ///
    /// Vertices not referenced by any face get a zero normal.
    pub fn vertex_normals(&self) -> Vec<Vec3> {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];

        for [i0, i1, i2] in self.faces.iter().map(|f| f.map(|i| i as usize)) {
            let (Some(&v0), Some(&v1), Some(&v2)) = (
                self.positions.get(i0),
                self.positions.get(i1),
                self.positions.get(i2),
            ) else {
                continue;
            };

            let normal = (v1 - v0).cross(v2 - v0);
            normals[i0] += normal;
            normals[i1] += normal;
            normals[i2] += normal;
        }

        for normal in &mut normals {
            *normal = normal.normalize_or_zero();
        }

        normals
    }

    /// Signed volume enclosed by the faces, positive for outward winding.
    pub fn signed_volume(&self) -> f64 {
        let center = self.compute_bounds().center();
        self.triangles()
            .map(|[a, b, c]| signed_tetra_volume(center, a, b, c))
            .sum()
    }
}

/// Signed volume of the tetrahedron spanned by `apex` and a triangle.
pub fn signed_tetra_volume(apex: Vec3, a: Vec3, b: Vec3, c: Vec3) -> f64 {
    let a = (a - apex).as_dvec3();
    let b = (b - apex).as_dvec3();
    let c = (c - apex).as_dvec3();
    a.dot(b.cross(c)) / 6.0
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl BoundingBox {
    /// Create from a set of points.
    pub fn from_points(points: &[Vec3]) -> Self {
        let Some((&first, rest)) = points.split_first() else {
            return Self::default();
        };

        rest.iter().fold(Self { min: first, max: first }, |mut bounds, &p| {
            bounds.expand_point(p);
            bounds
        })
    }

    /// Get the center of the bounding box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) / 2.0
    }

    /// Get the size of the bounding box.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Length of the box diagonal.
    pub fn diagonal(&self) -> f32 {
        self.size().length()
    }

    /// Expand to include a point.
    pub fn expand_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }
}
