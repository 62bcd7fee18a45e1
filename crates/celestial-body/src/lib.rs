//! Celestial body generation.
//!
//! A [`CelestialBodyGenerator`] turns a shape module (heights) and a shading
//! module (per-vertex payload) into a render mesh and a collision mesh. Both
//! modules evaluate their fields through a [`celestial_compute::ComputeBackend`];
//! sphere templates come from a shared [`celestial_sphere::TessellationCache`].
//!
//! In edit mode the generator is ticked with [`CelestialBodyGenerator::update`]
//! and regenerates incrementally: a shape change rebuilds everything, a
//! shading change only recomputes the payload channel.

mod collision;
mod dirty;
mod error;
mod generator;
mod material;
mod modules;
mod scene;
mod terrain;

pub use collision::{CollisionBaker, generate_collision};
pub use dirty::{DirtyState, DirtyTracker, Regeneration};
pub use error::{BakeError, GenerationError};
pub use generator::{CelestialBodyGenerator, GenerationOutcome, GenerationStats, TickReport};
pub use material::TerrainMaterial;
pub use modules::{KernelShading, KernelShape, Perturbation, ShadingModule, ShapeModule};
pub use scene::{SceneRegistry, SceneSink, SceneSlot, TERRAIN_MESH_SLOT};
pub use terrain::{generate_terrain, refresh_shading};
