//! Physics integration: bakes body collision meshes into Rapier trimesh colliders.

mod baker;

pub use baker::RapierBaker;
