//! Terrain mesh generation: full rebuilds and shading-only refreshes.

use celestial_compute::{DispatchScope, KernelParams};
use celestial_mesh::{HeightRange, TerrainMesh, approximate_tangents};
use celestial_sphere::TessellationCache;
use glam::{Vec3, Vec4};

use crate::{GenerationError, Perturbation, ShadingModule, ShapeModule};

/// Template positions scaled by their heights.
pub(crate) struct ScaledSphere {
    pub positions: Vec<Vec3>,
    pub triangles: Vec<u32>,
    pub range: HeightRange,
}

/// Tessellate at `resolution`, optionally perturb, evaluate heights and scale.
pub(crate) fn scaled_sphere(
    scope: &mut DispatchScope<'_>,
    cache: &TessellationCache,
    resolution: u32,
    shape: &dyn ShapeModule,
    perturbation: Option<Perturbation>,
) -> Result<ScaledSphere, GenerationError> {
    let template = cache.get(resolution);
    let edge_length = template.first_edge_length();
    let mut positions = template.vertices;
    let count = positions.len();

    let buffer = scope.upload_positions(&positions)?;

    if let Some(Perturbation { kernel, strength }) = perturbation {
        let max_strength = strength * edge_length / 2.0;
        let params = KernelParams::new(count)
            .with("numPoints", count as f32)
            .with("maxStrength", max_strength);
        scope.dispatch(&kernel, &[buffer], &params)?;
        positions = scope.read_positions(buffer)?;
        tracing::debug!("Perturbed {} vertices (max strength {:.5})", count, max_strength);
    }

    let heights = shape.calculate_heights(scope, buffer, count)?;
    if heights.len() != count {
        return Err(GenerationError::HeightCountMismatch {
            expected: count,
            actual: heights.len(),
        });
    }

    for (position, &height) in positions.iter_mut().zip(&heights) {
        *position *= height;
    }
    let range = HeightRange::from_heights(&heights).unwrap_or_default();

    Ok(ScaledSphere {
        positions,
        triangles: template.triangles,
        range,
    })
}

fn shading_payload(
    scope: &mut DispatchScope<'_>,
    shading: Option<&dyn ShadingModule>,
    positions: &[Vec3],
) -> Result<Vec<Vec4>, GenerationError> {
    let count = positions.len();
    let payload = match shading {
        Some(shading) => {
            let buffer = scope.upload_positions(positions)?;
            shading.generate_shading_data(scope, buffer, count)?
        }
        None => {
            tracing::debug!("No shading module bound, using zero payload");
            vec![Vec4::ZERO; count]
        }
    };
    if payload.len() != count {
        return Err(GenerationError::ShadingCountMismatch {
            expected: count,
            actual: payload.len(),
        });
    }
    Ok(payload)
}

/// Rebuild `mesh` in place at `resolution` and return the new height range.
///
/// On error the mesh is left empty, never partially rebuilt.
pub fn generate_terrain(
    scope: &mut DispatchScope<'_>,
    cache: &TessellationCache,
    resolution: u32,
    shape: &dyn ShapeModule,
    shading: Option<&mut (dyn ShadingModule + '_)>,
    mesh: &mut TerrainMesh,
) -> Result<HeightRange, GenerationError> {
    let result = rebuild_terrain(scope, cache, resolution, shape, shading, mesh);
    if result.is_err() {
        mesh.clear();
    }
    result
}

fn rebuild_terrain(
    scope: &mut DispatchScope<'_>,
    cache: &TessellationCache,
    resolution: u32,
    shape: &dyn ShapeModule,
    shading: Option<&mut (dyn ShadingModule + '_)>,
    mesh: &mut TerrainMesh,
) -> Result<HeightRange, GenerationError> {
    let sphere = scaled_sphere(scope, cache, resolution, shape, shape.perturbation())?;

    mesh.set_vertices(sphere.positions)?;
    mesh.set_triangles(&sphere.triangles)?;
    mesh.recalculate_normals();

    let shading = shading.map(|s| {
        s.initialize(shape);
        &*s
    });
    let payload = shading_payload(scope, shading, mesh.positions())?;
    mesh.set_uv0(payload)?;

    let tangents = approximate_tangents(mesh.normals());
    mesh.set_tangents(tangents)?;

    Ok(sphere.range)
}

/// Recompute only the shading payload of an existing mesh.
///
/// Positions, indices, normals and tangents are left untouched.
pub fn refresh_shading(
    scope: &mut DispatchScope<'_>,
    shape: &dyn ShapeModule,
    shading: Option<&mut (dyn ShadingModule + '_)>,
    mesh: &mut TerrainMesh,
) -> Result<(), GenerationError> {
    let shading = shading.map(|s| {
        s.initialize(shape);
        &*s
    });
    let payload = shading_payload(scope, shading, mesh.positions())?;
    mesh.set_uv0(payload)?;
    Ok(())
}
