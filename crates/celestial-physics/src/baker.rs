//! Collider baking for generated collision meshes.

use celestial_body::{BakeError, CollisionBaker};
use celestial_mesh::CollisionMesh;
use rapier3d::prelude::*;

/// Owns the Rapier sets holding the body's static terrain collider.
///
/// Each bake replaces the previous collider, so a body never has more than
/// one.
pub struct RapierBaker {
    /// Tracks sleeping/awake body islands.
    pub island_manager: IslandManager,
    /// Rigid bodies; terrain colliders are attached to none of them.
    pub rigid_body_set: RigidBodySet,
    /// All colliders, including the terrain collider.
    pub collider_set: ColliderSet,
    handle: Option<ColliderHandle>,
    friction: f32,
    bakes: usize,
}

impl RapierBaker {
    pub fn new() -> Self {
        Self {
            island_manager: IslandManager::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            handle: None,
            friction: 0.7,
            bakes: 0,
        }
    }

    /// Surface friction used for subsequent bakes.
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Handle of the current terrain collider.
    pub fn handle(&self) -> Option<ColliderHandle> {
        self.handle
    }

    /// The current terrain collider.
    pub fn collider(&self) -> Option<&Collider> {
        self.handle.and_then(|h| self.collider_set.get(h))
    }

    pub fn collider_count(&self) -> usize {
        self.collider_set.len()
    }

    /// Number of successful bakes.
    pub fn bake_count(&self) -> usize {
        self.bakes
    }

    /// Remove the terrain collider, if any.
    pub fn clear(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.collider_set.remove(
                handle,
                &mut self.island_manager,
                &mut self.rigid_body_set,
                true,
            );
        }
    }
}

impl Default for RapierBaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionBaker for RapierBaker {
    fn bake(&mut self, mesh: &CollisionMesh) -> Result<(), BakeError> {
        if mesh.is_empty() || mesh.triangle_count() == 0 {
            return Err(BakeError::EmptyMesh);
        }

        let vertices: Vec<Vector> = mesh
            .positions()
            .iter()
            .map(|p| Vector::new(p.x, p.y, p.z))
            .collect();
        let shape = SharedShape::trimesh(vertices, mesh.triangles())
            .map_err(|e| BakeError::Trimesh(format!("{e:?}")))?;

        self.clear();
        let collider = ColliderBuilder::new(shape)
            .friction(self.friction)
            .restitution(0.0)
            .build();
        self.handle = Some(self.collider_set.insert(collider));
        self.bakes += 1;

        tracing::debug!(
            "Baked terrain collider: {} vertices, {} triangles",
            mesh.vertex_count(),
            mesh.triangle_count()
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "baker_tests.rs"]
mod tests;
