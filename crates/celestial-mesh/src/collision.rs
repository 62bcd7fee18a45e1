use glam::Vec3;

use crate::{IndexBuffer, MeshError};

/// Positions and triangles handed to the physics engine. No attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionMesh {
    positions: Vec<Vec3>,
    indices: IndexBuffer,
}

impl CollisionMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the mesh contents.
    pub fn set(&mut self, positions: Vec<Vec3>, triangles: &[u32]) -> Result<(), MeshError> {
        let indices = IndexBuffer::from_triangles(triangles, positions.len())?;
        self.positions = positions;
        self.indices = indices;
        Ok(())
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn indices(&self) -> &IndexBuffer {
        &self.indices
    }

    pub fn triangles(&self) -> Vec<[u32; 3]> {
        self.indices.triangles()
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_keeps_previous_contents_on_error() {
        let mut mesh = CollisionMesh::new();
        mesh.set(vec![Vec3::X, Vec3::Y, Vec3::Z], &[0, 1, 2]).unwrap();
        assert!(mesh.set(vec![Vec3::X], &[0, 1, 2]).is_err());
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangles(), vec![[0, 1, 2]]);
    }
}
