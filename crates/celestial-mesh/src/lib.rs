//! Mesh data produced by body generation: the render mesh with its derived
//! per-vertex attributes, the collision mesh, and height extrema.

mod collision;
mod error;
mod height;
mod index;
mod terrain;
mod vertex;

pub use collision::CollisionMesh;
pub use error::MeshError;
pub use height::HeightRange;
pub use index::{IndexBuffer, U16_INDEX_LIMIT, select_index_format};
pub use terrain::{TerrainMesh, approximate_tangents};
pub use vertex::TerrainVertex;
