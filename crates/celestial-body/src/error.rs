//! Generation error types.

use celestial_compute::ComputeError;
use celestial_mesh::MeshError;
use thiserror::Error;

/// Failure of the physics collaborator to bake a collision mesh.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BakeError {
    #[error("collision mesh has no triangles")]
    EmptyMesh,

    #[error("trimesh construction failed: {0}")]
    Trimesh(String),
}

/// Errors that end a generation attempt.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("compute dispatch failed: {0}")]
    Compute(#[from] ComputeError),

    #[error("mesh assembly failed: {0}")]
    Mesh(#[from] MeshError),

    #[error("collision bake failed: {0}")]
    Bake(#[from] BakeError),

    #[error("no {0} kernel is bound")]
    MissingKernel(&'static str),

    #[error("height kernel returned {actual} heights for {expected} vertices")]
    HeightCountMismatch { expected: usize, actual: usize },

    #[error("shading kernel returned {actual} entries for {expected} vertices")]
    ShadingCountMismatch { expected: usize, actual: usize },
}
