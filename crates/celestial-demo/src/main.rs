//! Celestial body generator demo.
//!
//! Generates a body once the way game mode does, then runs a few edit-mode
//! ticks with shading and shape edits in between.

mod kernels;

use std::path::PathBuf;
use std::sync::Arc;

use celestial_body::{
    CelestialBodyGenerator, GenerationOutcome, KernelShading, KernelShape, SceneRegistry,
    TERRAIN_MESH_SLOT,
};
use celestial_compute::{ComputeBackend, GpuBackend, HostBackend};
use celestial_config::{BackendPreference, CliArgs, Config, default_config_dir};
use celestial_physics::RapierBaker;
use celestial_sphere::TessellationCache;
use clap::Parser;
use tracing::{error, info, warn};

fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(|| default_config_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config
        .debug
        .log_dir
        .clone()
        .unwrap_or_else(|| config_dir.join("logs"));
    celestial_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let mut backend = create_backend(&config);
    let cache = TessellationCache::shared();

    let mut generator: CelestialBodyGenerator =
        CelestialBodyGenerator::from_config(&config, Arc::clone(&cache));
    generator.set_shape(
        KernelShape::new(kernels::HEIGHT)
            .with_body_config(&config.body)
            .with_perturb_kernel(kernels::PERTURB)
            .with_param("amplitude", 0.08)
            .with_param("frequency", 3.0),
    );
    generator.set_shading(
        KernelShading::new(kernels::SHADING)
            .with_body_config(&config.body)
            .with_param("seed", 1.0),
    );

    demonstrate_play_generation(&mut generator, backend.as_mut());
    demonstrate_edit_ticks(&mut generator, backend.as_mut(), &config, &config_dir);

    let stats = generator.stats();
    info!(
        "Generator stats: {} full, {} partial, {} collision builds, {} warm-ups, {} skipped",
        stats.full_regenerations,
        stats.partial_regenerations,
        stats.collision_builds,
        stats.warmups,
        stats.skipped
    );
    info!("Cached tessellations: {}", cache.len());

    generator.teardown(backend.as_mut());
}

/// Pick the compute backend named by the config.
///
/// A required GPU that cannot be created yields an unusable backend, so
/// generation is skipped instead of silently running on the CPU.
fn create_backend(config: &Config) -> Box<dyn ComputeBackend> {
    let preference = config.compute.backend;
    if preference == BackendPreference::Host {
        info!("Using host compute backend");
        return Box::new(kernels::host_backend());
    }

    match GpuBackend::new_blocking(config.compute.high_performance) {
        Ok(mut gpu) => {
            kernels::load_gpu_kernels(&mut gpu);
            Box::new(gpu)
        }
        Err(e) if preference == BackendPreference::Auto => {
            warn!("GPU compute unavailable ({}), falling back to host", e);
            Box::new(kernels::host_backend())
        }
        Err(e) => {
            error!("GPU compute unavailable: {}", e);
            let mut unusable = HostBackend::new();
            unusable.set_usable(false);
            Box::new(unusable)
        }
    }
}

fn demonstrate_play_generation(
    generator: &mut CelestialBodyGenerator,
    backend: &mut dyn ComputeBackend,
) {
    info!("Starting game-mode generation");

    let mut baker = RapierBaker::new();
    let mut scene = SceneRegistry::new();
    match generator.generate_for_play(backend, &mut baker, &mut scene) {
        Ok(GenerationOutcome::Generated(range)) => {
            info!(
                "Generated body: heights {:.4}..{:.4}, ocean radius {:.4}",
                range.min,
                range.max,
                generator.ocean_radius()
            );
            if let Some(mesh) = generator.terrain_mesh() {
                info!(
                    "Terrain mesh: {} vertices, {} triangles, {:?} indices",
                    mesh.vertex_count(),
                    mesh.triangle_count(),
                    mesh.index_format()
                );
            }
            if let Some(mesh) = generator.collision_mesh() {
                info!(
                    "Collision mesh: {} vertices, {} colliders baked",
                    mesh.vertex_count(),
                    baker.collider_count()
                );
            }
            if let Some(slot) = scene.get(TERRAIN_MESH_SLOT) {
                info!(
                    "Scene slot '{}' holds {} vertices",
                    TERRAIN_MESH_SLOT,
                    slot.mesh.vertex_count()
                );
            }
        }
        Ok(GenerationOutcome::Skipped) => warn!("Game-mode generation skipped"),
        Err(e) => error!("Game-mode generation failed: {}", e),
    }
}

fn demonstrate_edit_ticks(
    generator: &mut CelestialBodyGenerator,
    backend: &mut dyn ComputeBackend,
    config: &Config,
    config_dir: &std::path::Path,
) {
    info!("Starting edit-mode ticks");
    let mut scene = SceneRegistry::new();

    let mut tick = |generator: &mut CelestialBodyGenerator, label: &str| {
        match generator.update(backend, &mut scene) {
            Ok(report) => info!(
                "Tick '{}': {} full, {} partial",
                label, report.full_regenerations, report.partial_regenerations
            ),
            Err(e) => error!("Tick '{}' failed: {}", label, e),
        }
    };

    tick(generator, "initial");
    tick(generator, "idle");

    if let Some(shading) = generator.shading_mut() {
        shading.set_param("seed", 2.0);
    }
    tick(generator, "shading seed");

    if let Some(shape) = generator.shape_mut() {
        shape.set_param("amplitude", 0.12);
    }
    if let Some(shading) = generator.shading_mut() {
        shading.set_param("seed", 3.0);
    }
    tick(generator, "shape and shading");

    let mut edited = config.clone();
    edited.body.ocean_level = (config.body.ocean_level + 0.2).min(1.0);
    apply_config_change(generator, config, &edited);
    tick(generator, "ocean level");
    info!("Ocean radius now {:.4}", generator.ocean_radius());

    match config.reload(config_dir) {
        Ok(Some(reloaded)) => {
            apply_config_change(generator, &edited, &reloaded);
            tick(generator, "config reload");
        }
        Ok(None) => info!("Config file unchanged"),
        Err(e) => warn!("Config reload failed: {}", e),
    }
}

/// Route a config change to the shape or shading side of the generator.
fn apply_config_change(generator: &mut CelestialBodyGenerator, old: &Config, new: &Config) {
    if old.shape_changed(new) {
        generator.set_config(new.generation.clone());
        if let Some(shape) = generator.shape_mut() {
            shape.set_perturb(new.body.perturb_vertices, new.body.perturb_strength);
        }
    }
    if old.shading_changed(new)
        && let Some(shading) = generator.shading_mut()
    {
        shading.set_ocean(new.body.ocean_level, new.body.has_ocean);
    }
    generator.set_body_scale(new.body.scale);
}
