//! Hand-off of generated meshes to the renderer.

use celestial_mesh::TerrainMesh;
use rustc_hash::FxHashMap;

use crate::TerrainMaterial;

/// Name of the slot the terrain mesh is attached under.
pub const TERRAIN_MESH_SLOT: &str = "Terrain Mesh";

/// Receives meshes for display.
pub trait SceneSink {
    /// Attach or update the named mesh with its material.
    fn attach(&mut self, name: &str, mesh: &TerrainMesh, material: &TerrainMaterial);
}

/// A named mesh held by a [`SceneRegistry`].
#[derive(Clone, Debug)]
pub struct SceneSlot {
    pub mesh: TerrainMesh,
    pub material: TerrainMaterial,
    /// Number of times the slot was updated after creation.
    pub revision: u64,
}

/// In-memory scene: one slot per name, updated in place.
#[derive(Debug, Default)]
pub struct SceneRegistry {
    slots: FxHashMap<String, SceneSlot>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&SceneSlot> {
        self.slots.get(name)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl SceneSink for SceneRegistry {
    fn attach(&mut self, name: &str, mesh: &TerrainMesh, material: &TerrainMaterial) {
        match self.slots.get_mut(name) {
            Some(slot) => {
                slot.mesh.clone_from(mesh);
                slot.material = *material;
                slot.revision += 1;
            }
            None => {
                tracing::debug!("Creating scene slot '{}'", name);
                self.slots.insert(
                    name.to_string(),
                    SceneSlot {
                        mesh: mesh.clone(),
                        material: *material,
                        revision: 0,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_repeated_attach_updates_in_place() {
        let mut scene = SceneRegistry::new();
        let mut mesh = TerrainMesh::new();
        scene.attach(TERRAIN_MESH_SLOT, &mesh, &TerrainMaterial::default());

        mesh.set_vertices(vec![Vec3::X, Vec3::Y, Vec3::Z]).unwrap();
        scene.attach(TERRAIN_MESH_SLOT, &mesh, &TerrainMaterial::default());

        assert_eq!(scene.len(), 1);
        let slot = scene.get(TERRAIN_MESH_SLOT).unwrap();
        assert_eq!(slot.revision, 1);
        assert_eq!(slot.mesh.vertex_count(), 3);
    }

    #[test]
    fn test_distinct_names_get_distinct_slots() {
        let mut scene = SceneRegistry::new();
        let mesh = TerrainMesh::new();
        scene.attach("a", &mesh, &TerrainMaterial::default());
        scene.attach("b", &mesh, &TerrainMaterial::default());
        assert_eq!(scene.len(), 2);
        assert!(scene.get("c").is_none());
    }
}
