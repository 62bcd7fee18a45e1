use thiserror::Error;

/// Errors raised while assembling mesh data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("triangle index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    #[error("{count} vertices exceed the 32-bit index budget")]
    TooManyVertices { count: usize },

    #[error("index list of length {len} is not a whole number of triangles")]
    IncompleteTriangle { len: usize },

    #[error("{attribute} has {actual} entries, mesh has {expected} vertices")]
    AttributeLength {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
}
