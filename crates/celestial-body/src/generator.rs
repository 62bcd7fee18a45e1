//! Per-body generator: owns the meshes and drives regeneration.

use std::sync::Arc;
use std::time::Instant;

use celestial_compute::{ComputeBackend, DispatchScope};
use celestial_config::{Config, GenerationConfig};
use celestial_mesh::{CollisionMesh, HeightRange, TerrainMesh};
use celestial_sphere::TessellationCache;
use glam::Vec3;
use tracing::{debug, error, info, warn};

use crate::collision::generate_collision;
use crate::terrain::{generate_terrain, refresh_shading};
use crate::{
    CollisionBaker, DirtyState, DirtyTracker, GenerationError, KernelShading, KernelShape,
    Regeneration, SceneSink, ShadingModule, ShapeModule, TERRAIN_MESH_SLOT, TerrainMaterial,
};

/// Result of a game-mode generation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GenerationOutcome {
    /// Meshes were built; carries the terrain height extrema.
    Generated(HeightRange),
    /// The guard failed and nothing was touched.
    Skipped,
}

/// Passes run by one edit-mode tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub full_regenerations: usize,
    pub partial_regenerations: usize,
}

impl TickReport {
    /// Whether any pass changed the terrain mesh.
    pub fn regenerated(&self) -> bool {
        self.full_regenerations + self.partial_regenerations > 0
    }
}

/// Lifetime counters of a generator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenerationStats {
    pub full_regenerations: usize,
    pub partial_regenerations: usize,
    pub collision_builds: usize,
    pub warmups: usize,
    pub skipped: usize,
    pub buffer_releases: usize,
}

/// Generates the terrain and collision meshes of one celestial body.
///
/// Game mode calls [`generate_for_play`](Self::generate_for_play) once. Edit
/// mode calls [`update`](Self::update) every tick; it regenerates only what
/// changed since the last tick.
pub struct CelestialBodyGenerator<S = KernelShape, H = KernelShading> {
    config: GenerationConfig,
    body_scale: f32,
    cache: Arc<TessellationCache>,
    shape: Option<S>,
    shading: Option<H>,
    terrain: Option<TerrainMesh>,
    collision: Option<CollisionMesh>,
    height_range: HeightRange,
    material: Option<TerrainMaterial>,
    dirty: DirtyTracker,
    stats: GenerationStats,
}

impl<S: ShapeModule, H: ShadingModule> CelestialBodyGenerator<S, H> {
    pub fn new(config: GenerationConfig, body_scale: f32, cache: Arc<TessellationCache>) -> Self {
        let dirty = DirtyTracker::new(config.double_shading_pass);
        Self {
            config,
            body_scale,
            cache,
            shape: None,
            shading: None,
            terrain: None,
            collision: None,
            height_range: HeightRange::default(),
            material: None,
            dirty,
            stats: GenerationStats::default(),
        }
    }

    /// Generator using the `generation` section and body scale of `config`.
    pub fn from_config(config: &Config, cache: Arc<TessellationCache>) -> Self {
        Self::new(config.generation.clone(), config.body.scale, cache)
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Replace the generation settings. Any change invalidates the shape.
    pub fn set_config(&mut self, config: GenerationConfig) {
        self.dirty.set_double_pass(config.double_shading_pass);
        self.config = config;
        self.dirty.notify_shape_changed();
    }

    pub fn body_scale(&self) -> f32 {
        self.body_scale
    }

    pub fn set_body_scale(&mut self, body_scale: f32) {
        self.body_scale = body_scale;
    }

    /// Attach a shape module. Marks the shape dirty.
    pub fn set_shape(&mut self, shape: S) {
        self.shape = Some(shape);
        self.modules_replaced();
    }

    /// Attach a shading module. Marks the shape dirty.
    pub fn set_shading(&mut self, shading: H) {
        self.shading = Some(shading);
        self.modules_replaced();
    }

    pub fn shape(&self) -> Option<&S> {
        self.shape.as_ref()
    }

    /// Mutable access to the shape; setting changes are picked up next tick.
    pub fn shape_mut(&mut self) -> Option<&mut S> {
        self.shape.as_mut()
    }

    pub fn shading(&self) -> Option<&H> {
        self.shading.as_ref()
    }

    pub fn shading_mut(&mut self) -> Option<&mut H> {
        self.shading.as_mut()
    }

    fn modules_replaced(&mut self) {
        let (shape, shading) = self.revisions();
        self.dirty.reset_revisions(shape, shading);
        self.dirty.notify_shape_changed();
    }

    fn revisions(&self) -> (Option<u64>, Option<u64>) {
        (
            self.shape.as_ref().map(|s| s.revision()),
            self.shading.as_ref().map(|s| s.revision()),
        )
    }

    pub fn on_shape_setting_changed(&mut self) {
        self.dirty.notify_shape_changed();
    }

    pub fn on_shading_setting_changed(&mut self) {
        self.dirty.notify_shading_changed();
    }

    pub fn dirty_state(&self) -> DirtyState {
        self.dirty.state()
    }

    /// Whether the backend can run kernels and a height kernel is bound.
    pub fn can_generate(&self, backend: &dyn ComputeBackend) -> bool {
        backend.is_usable()
            && self
                .shape
                .as_ref()
                .is_some_and(|shape| shape.height_kernel().is_some())
    }

    /// Build both meshes, bake the collider and attach the terrain to `scene`.
    pub fn generate_for_play(
        &mut self,
        backend: &mut dyn ComputeBackend,
        baker: &mut dyn CollisionBaker,
        scene: &mut dyn SceneSink,
    ) -> Result<GenerationOutcome, GenerationError> {
        if !self.can_generate(backend) {
            warn!("Could not generate mesh");
            self.stats.skipped += 1;
            return Ok(GenerationOutcome::Skipped);
        }

        let result = self.play_pass(backend, baker, scene);
        if let Err(e) = &result {
            error!("Body generation failed: {}", e);
        }
        self.release_all_buffers(backend);
        result
    }

    fn play_pass(
        &mut self,
        backend: &mut dyn ComputeBackend,
        baker: &mut dyn CollisionBaker,
        scene: &mut dyn SceneSink,
    ) -> Result<GenerationOutcome, GenerationError> {
        self.warm_up(backend)?;
        self.full_terrain(backend)?;
        self.build_collision(backend)?;

        if let Some(mesh) = &self.collision {
            let start = Instant::now();
            baker.bake(mesh)?;
            self.log_timer(start, "Mesh collider");
        }

        let material = self.refresh_material();
        if let Some(mesh) = &self.terrain {
            scene.attach(TERRAIN_MESH_SLOT, mesh, &material);
        }

        self.dirty.clear();
        Ok(GenerationOutcome::Generated(self.height_range))
    }

    /// Edit-mode tick: regenerate whatever changed, then refresh the material.
    pub fn update(
        &mut self,
        backend: &mut dyn ComputeBackend,
        scene: &mut dyn SceneSink,
    ) -> Result<TickReport, GenerationError> {
        if !self.config.show {
            return Ok(TickReport::default());
        }

        let (shape, shading) = self.revisions();
        self.dirty.observe_revisions(shape, shading);

        if !self.can_generate(backend) {
            if self.dirty.state() != DirtyState::Clean {
                warn!("Could not generate mesh");
                self.stats.skipped += 1;
            }
            return Ok(TickReport::default());
        }

        let mut report = TickReport::default();
        let result = self.run_pending_passes(backend, &mut report);

        if self.shading.is_some() {
            self.refresh_material();
        }
        if result.is_ok() && report.regenerated() {
            let material = self.material.unwrap_or_default();
            if let Some(mesh) = &self.terrain {
                scene.attach(TERRAIN_MESH_SLOT, mesh, &material);
            }
        }

        self.release_all_buffers(backend);
        result.map(|()| report)
    }

    fn run_pending_passes(
        &mut self,
        backend: &mut dyn ComputeBackend,
        report: &mut TickReport,
    ) -> Result<(), GenerationError> {
        while let Some(pass) = self.dirty.next_pass() {
            let ran = match pass {
                Regeneration::Partial if self.has_terrain() => self
                    .partial_terrain(backend)
                    .map(|()| Regeneration::Partial),
                Regeneration::Partial => {
                    debug!("No terrain mesh yet, running a full regeneration");
                    self.warm_up(backend)
                        .and_then(|()| self.full_terrain(backend))
                        .map(|()| Regeneration::Full)
                }
                Regeneration::Full => self
                    .warm_up(backend)
                    .and_then(|()| self.full_terrain(backend))
                    .map(|()| Regeneration::Full),
            };

            match ran {
                Ok(Regeneration::Full) => report.full_regenerations += 1,
                Ok(Regeneration::Partial) => {
                    report.partial_regenerations += 1;
                    self.dirty.partial_finished();
                }
                Err(e) => {
                    self.dirty.pass_failed();
                    error!("Terrain regeneration failed: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn has_terrain(&self) -> bool {
        self.terrain.as_ref().is_some_and(|mesh| !mesh.is_empty())
    }

    /// Prime the height kernel with a single-vertex dispatch.
    fn warm_up(&mut self, backend: &mut dyn ComputeBackend) -> Result<(), GenerationError> {
        let shape = self
            .shape
            .as_ref()
            .ok_or(GenerationError::MissingKernel("height"))?;
        let mut scope = DispatchScope::new(backend);
        let buffer = scope.upload_positions(&[Vec3::ZERO])?;
        shape.calculate_heights(&mut scope, buffer, 1)?;
        drop(scope);
        self.stats.warmups += 1;
        Ok(())
    }

    fn full_terrain(&mut self, backend: &mut dyn ComputeBackend) -> Result<(), GenerationError> {
        let start = Instant::now();
        let shape = self
            .shape
            .as_ref()
            .ok_or(GenerationError::MissingKernel("height"))?;
        let mesh = self.terrain.get_or_insert_with(TerrainMesh::new);
        let shading = self
            .shading
            .as_mut()
            .map(|s| s as &mut dyn ShadingModule);

        let mut scope = DispatchScope::new(backend);
        let range = generate_terrain(
            &mut scope,
            &self.cache,
            self.config.resolution,
            shape,
            shading,
            mesh,
        )?;
        drop(scope);

        self.height_range = range;
        self.stats.full_regenerations += 1;
        debug!(
            "Terrain r={} rebuilt: {} vertices, heights {:.4}..{:.4}",
            self.config.resolution,
            self.terrain.as_ref().map_or(0, TerrainMesh::vertex_count),
            range.min,
            range.max
        );
        self.log_timer(start, "Generate terrain mesh");
        Ok(())
    }

    fn partial_terrain(&mut self, backend: &mut dyn ComputeBackend) -> Result<(), GenerationError> {
        let shape = self
            .shape
            .as_ref()
            .ok_or(GenerationError::MissingKernel("height"))?;
        let Some(mesh) = self.terrain.as_mut() else {
            return Ok(());
        };
        let shading = self
            .shading
            .as_mut()
            .map(|s| s as &mut dyn ShadingModule);

        let mut scope = DispatchScope::new(backend);
        refresh_shading(&mut scope, shape, shading, mesh)?;
        drop(scope);

        self.stats.partial_regenerations += 1;
        Ok(())
    }

    fn build_collision(&mut self, backend: &mut dyn ComputeBackend) -> Result<(), GenerationError> {
        let shape = self
            .shape
            .as_ref()
            .ok_or(GenerationError::MissingKernel("height"))?;
        let mesh = self.collision.get_or_insert_with(CollisionMesh::new);

        let mut scope = DispatchScope::new(backend);
        generate_collision(
            &mut scope,
            &self.cache,
            self.config.collision_resolution,
            shape,
            mesh,
        )?;
        drop(scope);

        self.stats.collision_builds += 1;
        Ok(())
    }

    /// Re-initialize the shading module and rebuild the material uniforms.
    fn refresh_material(&mut self) -> TerrainMaterial {
        let material = match (&self.shape, &mut self.shading) {
            (shape, Some(shading)) => {
                if let Some(shape) = shape {
                    shading.initialize(shape);
                }
                shading.terrain_material(self.height_range, self.body_scale)
            }
            (_, None) => TerrainMaterial::new(self.height_range, self.body_scale, 0.0, false),
        };
        self.material = Some(material);
        material
    }

    fn log_timer(&self, start: Instant, label: &str) {
        if self.config.log_timers {
            info!("{} {} ms.", label, start.elapsed().as_millis());
        }
    }

    /// Radius of the ocean sphere, or 0 when the body has none.
    pub fn ocean_radius(&self) -> f32 {
        match &self.shading {
            Some(shading) => self.height_range.ocean_radius(
                shading.ocean_level(),
                self.body_scale,
                shading.has_ocean(),
            ),
            None => 0.0,
        }
    }

    pub fn height_range(&self) -> HeightRange {
        self.height_range
    }

    pub fn terrain_mesh(&self) -> Option<&TerrainMesh> {
        self.terrain.as_ref()
    }

    pub fn collision_mesh(&self) -> Option<&CollisionMesh> {
        self.collision.as_ref()
    }

    pub fn material(&self) -> Option<&TerrainMaterial> {
        self.material.as_ref()
    }

    pub fn stats(&self) -> GenerationStats {
        self.stats
    }

    /// Release buffers held by the shape and shading modules.
    pub fn release_all_buffers(&mut self, backend: &mut dyn ComputeBackend) {
        if let Some(shape) = &mut self.shape {
            shape.release_buffers(backend);
        }
        if let Some(shading) = &mut self.shading {
            shading.release_buffers(backend);
        }
        self.stats.buffer_releases += 1;
    }

    /// Release everything and drop the generator.
    pub fn teardown(mut self, backend: &mut dyn ComputeBackend) {
        self.release_all_buffers(backend);
    }
}

#[cfg(test)]
#[path = "generator_tests.rs"]
mod tests;
