//! Render mesh for a generated body.

use glam::{Vec3, Vec4};

use crate::{IndexBuffer, MeshError, TerrainVertex};

/// Tangent derived from a normal by rotating it about the y axis.
///
/// Only good enough as shader input: `(-nz, 0, nx, 1)`.
pub fn approximate_tangents(normals: &[Vec3]) -> Vec<Vec4> {
    normals
        .iter()
        .map(|n| Vec4::new(-n.z, 0.0, n.x, 1.0))
        .collect()
}

/// Terrain mesh: positions, triangles and per-vertex derived attributes.
///
/// The mesh is refilled in place on every regeneration. Attributes are
/// either empty or sized to the vertex count.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TerrainMesh {
    positions: Vec<Vec3>,
    indices: IndexBuffer,
    normals: Vec<Vec3>,
    tangents: Vec<Vec4>,
    uv0: Vec<Vec4>,
}

impl TerrainMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all vertex data and indices.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.indices.clear();
        self.normals.clear();
        self.tangents.clear();
        self.uv0.clear();
    }

    /// Replace the vertex positions. Indices and attributes must be set again.
    pub fn set_vertices(&mut self, positions: Vec<Vec3>) -> Result<(), MeshError> {
        if u32::try_from(positions.len()).is_err() {
            return Err(MeshError::TooManyVertices {
                count: positions.len(),
            });
        }
        self.clear();
        self.positions = positions;
        Ok(())
    }

    /// Replace the triangle list. Index width follows the vertex count.
    pub fn set_triangles(&mut self, triangles: &[u32]) -> Result<(), MeshError> {
        self.indices = IndexBuffer::from_triangles(triangles, self.positions.len())?;
        Ok(())
    }

    /// Recompute area-weighted vertex normals from the current triangles.
    pub fn recalculate_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for [a, b, c] in self.indices.triangles() {
            let (a, b, c) = (a as usize, b as usize, c as usize);
            let face = (self.positions[b] - self.positions[a])
                .cross(self.positions[c] - self.positions[a]);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        for n in &mut normals {
            *n = n.normalize_or_zero();
        }
        self.normals = normals;
    }

    /// Set tangents, one per vertex.
    pub fn set_tangents(&mut self, tangents: Vec<Vec4>) -> Result<(), MeshError> {
        self.check_len("tangents", tangents.len())?;
        self.tangents = tangents;
        Ok(())
    }

    /// Set the shading payload in texture channel 0, one entry per vertex.
    pub fn set_uv0(&mut self, uv0: Vec<Vec4>) -> Result<(), MeshError> {
        self.check_len("uv0", uv0.len())?;
        self.uv0 = uv0;
        Ok(())
    }

    fn check_len(&self, attribute: &'static str, actual: usize) -> Result<(), MeshError> {
        if actual == self.positions.len() {
            Ok(())
        } else {
            Err(MeshError::AttributeLength {
                attribute,
                expected: self.positions.len(),
                actual,
            })
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn indices(&self) -> &IndexBuffer {
        &self.indices
    }

    pub fn index_format(&self) -> wgpu::IndexFormat {
        self.indices.format()
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn tangents(&self) -> &[Vec4] {
        &self.tangents
    }

    pub fn uv0(&self) -> &[Vec4] {
        &self.uv0
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Interleave the mesh into GPU vertices. Missing attributes are zero.
    pub fn to_vertices(&self) -> Vec<TerrainVertex> {
        (0..self.positions.len())
            .map(|i| TerrainVertex {
                position: self.positions[i].to_array(),
                normal: self.normals.get(i).copied().unwrap_or(Vec3::ZERO).to_array(),
                tangent: self.tangents.get(i).copied().unwrap_or(Vec4::ZERO).to_array(),
                uv0: self.uv0.get(i).copied().unwrap_or(Vec4::ZERO).to_array(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> TerrainMesh {
        let mut mesh = TerrainMesh::new();
        mesh.set_vertices(vec![
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(-1.0, 1.0, -1.0),
            Vec3::new(-1.0, -1.0, 1.0),
        ])
        .unwrap();
        mesh.set_triangles(&[0, 1, 2, 0, 3, 1, 0, 2, 3, 1, 3, 2])
            .unwrap();
        mesh
    }

    #[test]
    fn test_normals_point_outward() {
        let mut mesh = tetrahedron();
        mesh.recalculate_normals();
        for (p, n) in mesh.positions().iter().zip(mesh.normals()) {
            assert!((n.length() - 1.0).abs() < 1e-5);
            assert!(n.dot(p.normalize()) > 0.99);
        }
    }

    #[test]
    fn test_approximate_tangent_formula() {
        let tangents = approximate_tangents(&[Vec3::new(0.6, 0.0, 0.8), Vec3::Y]);
        assert_eq!(tangents[0], Vec4::new(-0.8, 0.0, 0.6, 1.0));
        assert_eq!(tangents[1], Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_attribute_length_checked() {
        let mut mesh = tetrahedron();
        assert_eq!(
            mesh.set_uv0(vec![Vec4::ZERO; 3]),
            Err(MeshError::AttributeLength {
                attribute: "uv0",
                expected: 4,
                actual: 3
            })
        );
        assert!(mesh.set_tangents(vec![Vec4::W; 4]).is_ok());
    }

    #[test]
    fn test_set_vertices_clears_dependent_data() {
        let mut mesh = tetrahedron();
        mesh.recalculate_normals();
        mesh.set_vertices(vec![Vec3::X, Vec3::Y, Vec3::Z]).unwrap();
        assert!(mesh.indices().is_empty());
        assert!(mesh.normals().is_empty());
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn test_to_vertices_interleaves() {
        let mut mesh = tetrahedron();
        mesh.recalculate_normals();
        mesh.set_uv0(vec![Vec4::splat(0.5); 4]).unwrap();
        let vertices = mesh.to_vertices();
        assert_eq!(vertices.len(), 4);
        assert_eq!(vertices[0].position, [1.0, 1.0, 1.0]);
        assert_eq!(vertices[0].uv0, [0.5; 4]);
        assert_eq!(vertices[0].tangent, [0.0; 4]);
    }
}
