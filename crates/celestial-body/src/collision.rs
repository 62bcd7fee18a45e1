//! Collision mesh generation and the physics hand-off.

use celestial_compute::DispatchScope;
use celestial_mesh::CollisionMesh;
use celestial_sphere::TessellationCache;

use crate::terrain::scaled_sphere;
use crate::{BakeError, GenerationError, ShapeModule};

/// Physics collaborator receiving finished collision meshes.
pub trait CollisionBaker {
    /// Bake `mesh` into a collider. Returns once the collider is ready.
    fn bake(&mut self, mesh: &CollisionMesh) -> Result<(), BakeError>;
}

/// Rebuild `mesh` at `resolution`: height-scaled positions and triangles only.
///
/// Perturbation is not applied to collision geometry.
pub fn generate_collision(
    scope: &mut DispatchScope<'_>,
    cache: &TessellationCache,
    resolution: u32,
    shape: &dyn ShapeModule,
    mesh: &mut CollisionMesh,
) -> Result<(), GenerationError> {
    let sphere = scaled_sphere(scope, cache, resolution, shape, None)?;
    mesh.set(sphere.positions, &sphere.triangles)?;
    Ok(())
}
