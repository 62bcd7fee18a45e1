//! Terrain material parameters handed to the renderer.

use bytemuck::{Pod, Zeroable};
use celestial_mesh::HeightRange;

/// GPU uniform for terrain shading.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable, PartialEq)]
pub struct TerrainMaterial {
    /// Lowest generated height.
    pub height_min: f32,
    /// Highest generated height.
    pub height_max: f32,
    /// Ocean level in [0, 1].
    pub ocean_level: f32,
    /// Uniform body scale.
    pub body_scale: f32,
    /// Ocean sphere radius in world units, 0 without an ocean.
    pub ocean_radius: f32,
    /// 1 when the body has an ocean.
    pub has_ocean: u32,
    /// Padding for 16-byte alignment.
    pub _padding: [u32; 2],
}

impl TerrainMaterial {
    /// Build the uniform from the current height extrema and body settings.
    pub fn new(range: HeightRange, body_scale: f32, ocean_level: f32, has_ocean: bool) -> Self {
        Self {
            height_min: range.min,
            height_max: range.max,
            ocean_level,
            body_scale,
            ocean_radius: range.ocean_radius(ocean_level, body_scale, has_ocean),
            has_ocean: u32::from(has_ocean),
            _padding: [0; 2],
        }
    }

    /// Height extrema the material was built from.
    pub fn height_range(&self) -> HeightRange {
        HeightRange::new(self.height_min, self.height_max)
    }
}
