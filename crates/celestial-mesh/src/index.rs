//! Index storage with width chosen from the vertex count.

use crate::MeshError;

/// Meshes with fewer vertices than this use 16-bit indices.
pub const U16_INDEX_LIMIT: usize = 65_535;

/// Pick the index format for a mesh with `vertex_count` vertices.
pub fn select_index_format(vertex_count: usize) -> wgpu::IndexFormat {
    if vertex_count < U16_INDEX_LIMIT {
        wgpu::IndexFormat::Uint16
    } else {
        wgpu::IndexFormat::Uint32
    }
}

/// Triangle indices in either 16-bit or 32-bit form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexBuffer {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Default for IndexBuffer {
    fn default() -> Self {
        IndexBuffer::U16(Vec::new())
    }
}

impl IndexBuffer {
    /// Build an index buffer for a mesh of `vertex_count` vertices.
    ///
    /// Every index must refer to an existing vertex and the list must hold
    /// whole triangles.
    pub fn from_triangles(triangles: &[u32], vertex_count: usize) -> Result<Self, MeshError> {
        if u32::try_from(vertex_count).is_err() {
            return Err(MeshError::TooManyVertices {
                count: vertex_count,
            });
        }
        if triangles.len() % 3 != 0 {
            return Err(MeshError::IncompleteTriangle {
                len: triangles.len(),
            });
        }
        if let Some(&index) = triangles.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertex_count,
            });
        }

        Ok(match select_index_format(vertex_count) {
            wgpu::IndexFormat::Uint16 => {
                IndexBuffer::U16(triangles.iter().map(|&i| i as u16).collect())
            }
            wgpu::IndexFormat::Uint32 => IndexBuffer::U32(triangles.to_vec()),
        })
    }

    /// The wgpu index format of this data.
    pub fn format(&self) -> wgpu::IndexFormat {
        match self {
            IndexBuffer::U16(_) => wgpu::IndexFormat::Uint16,
            IndexBuffer::U32(_) => wgpu::IndexFormat::Uint32,
        }
    }

    /// Number of indices.
    pub fn len(&self) -> usize {
        match self {
            IndexBuffer::U16(data) => data.len(),
            IndexBuffer::U32(data) => data.len(),
        }
    }

    /// Returns `true` if there are no indices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index at position `i`, widened to `u32`.
    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            IndexBuffer::U16(data) => data.get(i).map(|&v| u32::from(v)),
            IndexBuffer::U32(data) => data.get(i).copied(),
        }
    }

    /// All indices widened to `u32`.
    pub fn to_u32(&self) -> Vec<u32> {
        match self {
            IndexBuffer::U16(data) => data.iter().map(|&v| u32::from(v)).collect(),
            IndexBuffer::U32(data) => data.clone(),
        }
    }

    /// Indices grouped per triangle.
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        self.to_u32()
            .chunks_exact(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect()
    }

    /// Raw bytes for GPU upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            IndexBuffer::U16(data) => bytemuck::cast_slice(data),
            IndexBuffer::U32(data) => bytemuck::cast_slice(data),
        }
    }

    pub(crate) fn clear(&mut self) {
        *self = IndexBuffer::default();
    }
}
