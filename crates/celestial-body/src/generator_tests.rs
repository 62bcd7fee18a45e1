//! Tests for the body generator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use celestial_compute::{BufferHandle, ComputeError, HostBackend, KernelId};
use celestial_config::BodyConfig;
use celestial_mesh::IndexBuffer;
use celestial_sphere::template_counts;
use glam::Vec4;

use super::*;
use crate::{BakeError, SceneRegistry};

fn host_backend() -> HostBackend {
    let mut backend = HostBackend::new();
    backend.register_kernel("height", |inv| {
        let amplitude = inv.param("amplitude").unwrap_or(0.0);
        let heights: Vec<f32> = inv
            .positions(0)?
            .iter()
            .map(|p| 1.0 + amplitude * p.x)
            .collect();
        inv.write_scalars(1, &heights)
    });
    backend.register_kernel("unit", |inv| {
        let count = inv.num_elements();
        inv.write_scalars(1, &vec![1.0; count])
    });
    backend.register_kernel("shading", |inv| {
        let seed = inv.param("seed").unwrap_or(0.0);
        let payload: Vec<Vec4> = inv
            .positions(0)?
            .iter()
            .map(|p| Vec4::new(p.length(), seed, p.y, 1.0))
            .collect();
        inv.write_vec4(1, &payload)
    });
    backend.register_kernel("nudge", |inv| {
        let max_strength = inv.param("maxStrength").unwrap_or(0.0);
        let moved: Vec<Vec3> = inv
            .positions(0)?
            .iter()
            .map(|p| *p + Vec3::X * max_strength)
            .collect();
        inv.write_positions(0, &moved)
    });
    backend.register_kernel("broken", |_| {
        Err(ComputeError::KernelFailed {
            kernel: KernelId::from("broken"),
            message: "device fault".to_string(),
        })
    });
    backend
}

fn small_config() -> GenerationConfig {
    GenerationConfig {
        resolution: 6,
        collision_resolution: 4,
        ..GenerationConfig::default()
    }
}

fn generator() -> CelestialBodyGenerator {
    let mut generator = CelestialBodyGenerator::new(small_config(), 1.0, TessellationCache::shared());
    generator.set_shape(KernelShape::new("height").with_param("amplitude", 0.1));
    generator.set_shading(KernelShading::new("shading"));
    generator
}

#[derive(Default)]
struct RecordingBaker {
    baked_vertices: Vec<usize>,
    fail: bool,
}

impl CollisionBaker for RecordingBaker {
    fn bake(&mut self, mesh: &CollisionMesh) -> Result<(), BakeError> {
        if self.fail {
            return Err(BakeError::Trimesh("degenerate".to_string()));
        }
        self.baked_vertices.push(mesh.vertex_count());
        Ok(())
    }
}

fn play(
    generator: &mut CelestialBodyGenerator,
    backend: &mut HostBackend,
) -> (GenerationOutcome, RecordingBaker, SceneRegistry) {
    let mut baker = RecordingBaker::default();
    let mut scene = SceneRegistry::new();
    let outcome = generator
        .generate_for_play(backend, &mut baker, &mut scene)
        .unwrap();
    (outcome, baker, scene)
}

// --- Game mode ---

#[test]
fn test_play_builds_both_meshes_and_bakes() {
    let mut backend = host_backend();
    let mut generator = generator();
    let (outcome, baker, scene) = play(&mut generator, &mut backend);

    assert!(matches!(outcome, GenerationOutcome::Generated(_)));
    let terrain = generator.terrain_mesh().unwrap();
    let collision = generator.collision_mesh().unwrap();
    assert_eq!(terrain.vertex_count(), template_counts(6).0);
    assert_eq!(terrain.triangle_count(), template_counts(6).1);
    assert_eq!(collision.vertex_count(), template_counts(4).0);
    assert_eq!(baker.baked_vertices, vec![template_counts(4).0]);
    assert_eq!(scene.get(TERRAIN_MESH_SLOT).unwrap().mesh, *terrain);
    assert!(generator.material().is_some());
    assert_eq!(generator.dirty_state(), DirtyState::Clean);
}

#[test]
fn test_play_runs_warm_up_before_generation() {
    let mut backend = host_backend();
    let mut generator = generator();
    play(&mut generator, &mut backend);

    // warm-up, terrain, collision
    assert_eq!(backend.dispatch_count("height"), 3);
    assert_eq!(backend.dispatch_count("shading"), 1);
    assert_eq!(generator.stats().warmups, 1);
}

#[test]
fn test_unit_heights_reproduce_template() {
    let cache = TessellationCache::shared();
    let mut backend = host_backend();
    let mut generator: CelestialBodyGenerator = CelestialBodyGenerator::new(
        GenerationConfig {
            resolution: 42,
            collision_resolution: 42,
            ..GenerationConfig::default()
        },
        1.0,
        Arc::clone(&cache),
    );
    generator.set_shape(KernelShape::new("unit"));
    generator.set_shading(KernelShading::new("shading"));
    let (outcome, _, _) = play(&mut generator, &mut backend);

    let template = cache.get(42);
    assert_eq!(outcome, GenerationOutcome::Generated(HeightRange::new(1.0, 1.0)));
    assert_eq!(generator.terrain_mesh().unwrap().positions(), template.vertices.as_slice());
    assert_eq!(generator.collision_mesh().unwrap().positions(), template.vertices.as_slice());
    assert_eq!(generator.terrain_mesh().unwrap().indices().to_u32(), template.triangles);
    assert_eq!(cache.build_count(), 1);
}

#[test]
fn test_heights_lie_within_range() {
    let cache = TessellationCache::shared();
    let mut backend = host_backend();
    let mut generator: CelestialBodyGenerator =
        CelestialBodyGenerator::new(small_config(), 1.0, Arc::clone(&cache));
    generator.set_shape(KernelShape::new("height").with_param("amplitude", 0.25));
    play(&mut generator, &mut backend);

    let range = generator.height_range();
    assert!(range.min < range.max);
    let template = cache.get(6);
    let positions = generator.terrain_mesh().unwrap().positions();
    for (unit, scaled) in template.vertices.iter().zip(positions) {
        let height = scaled.length() / unit.length();
        assert!(range.min - 1e-5 <= height && height <= range.max + 1e-5);
    }
    assert!((range.min - 0.75).abs() < 1e-5);
    assert!((range.max - 1.25).abs() < 1e-5);
}

#[test]
fn test_derived_attributes_sized_to_vertices() {
    let mut backend = host_backend();
    let mut generator = generator();
    play(&mut generator, &mut backend);

    let mesh = generator.terrain_mesh().unwrap();
    assert_eq!(mesh.normals().len(), mesh.vertex_count());
    assert_eq!(mesh.uv0().len(), mesh.vertex_count());
    for (n, t) in mesh.normals().iter().zip(mesh.tangents()) {
        assert_eq!(*t, Vec4::new(-n.z, 0.0, n.x, 1.0));
    }
    assert!(matches!(mesh.indices(), IndexBuffer::U16(_)));
}

#[test]
fn test_perturbation_applies_to_terrain_only() {
    let cache = TessellationCache::shared();
    let mut backend = host_backend();
    let mut generator: CelestialBodyGenerator = CelestialBodyGenerator::new(
        GenerationConfig {
            resolution: 5,
            collision_resolution: 5,
            ..GenerationConfig::default()
        },
        1.0,
        Arc::clone(&cache),
    );
    let body = BodyConfig {
        perturb_vertices: true,
        perturb_strength: 0.5,
        ..BodyConfig::default()
    };
    generator.set_shape(
        KernelShape::new("unit")
            .with_body_config(&body)
            .with_perturb_kernel("nudge"),
    );
    play(&mut generator, &mut backend);

    let template = cache.get(5);
    let max_strength = 0.5 * template.first_edge_length() / 2.0;
    let terrain = generator.terrain_mesh().unwrap().positions();
    for (unit, moved) in template.vertices.iter().zip(terrain) {
        assert!((*moved - (*unit + Vec3::X * max_strength)).length() < 1e-6);
    }
    assert_eq!(
        generator.collision_mesh().unwrap().positions(),
        template.vertices.as_slice()
    );
    assert_eq!(backend.dispatch_count("nudge"), 1);
}

#[test]
fn test_ocean_radius_follows_level_and_scale() {
    let mut backend = host_backend();
    let mut generator: CelestialBodyGenerator =
        CelestialBodyGenerator::new(small_config(), 2.0, TessellationCache::shared());
    generator.set_shape(KernelShape::new("height").with_param("amplitude", 0.2));
    let low = BodyConfig {
        ocean_level: 0.0,
        ..BodyConfig::default()
    };
    generator.set_shading(KernelShading::new("shading").with_body_config(&low));
    play(&mut generator, &mut backend);

    let min = generator.height_range().min;
    assert!((generator.ocean_radius() - min * 2.0).abs() < 1e-5);
    assert!((generator.material().unwrap().ocean_radius - min * 2.0).abs() < 1e-5);

    generator.shading_mut().unwrap().set_ocean(1.0, true);
    assert!((generator.ocean_radius() - 2.0).abs() < 1e-5);

    generator.shading_mut().unwrap().set_ocean(0.5, false);
    assert_eq!(generator.ocean_radius(), 0.0);
}

#[test]
fn test_guard_without_height_kernel_touches_nothing() {
    let mut backend = host_backend();
    let mut generator: CelestialBodyGenerator =
        CelestialBodyGenerator::new(small_config(), 1.0, TessellationCache::shared());
    generator.set_shape(KernelShape::unbound());
    generator.set_shading(KernelShading::new("shading"));

    let (outcome, baker, scene) = play(&mut generator, &mut backend);
    assert_eq!(outcome, GenerationOutcome::Skipped);
    assert!(generator.terrain_mesh().is_none());
    assert!(generator.collision_mesh().is_none());
    assert!(baker.baked_vertices.is_empty());
    assert!(scene.is_empty());
    assert_eq!(backend.release_calls(), 0);
    assert_eq!(backend.total_dispatches(), 0);

    let report = generator.update(&mut backend, &mut SceneRegistry::new()).unwrap();
    assert_eq!(report, TickReport::default());
    assert_eq!(generator.dirty_state(), DirtyState::ShapeDirty);
    assert_eq!(backend.release_calls(), 0);
}

#[test]
fn test_guard_with_unusable_backend_keeps_previous_mesh() {
    let mut backend = host_backend();
    let mut generator = generator();
    play(&mut generator, &mut backend);
    let before = generator.terrain_mesh().cloned();
    let calls = backend.release_calls();

    backend.set_usable(false);
    generator.on_shape_setting_changed();
    let report = generator.update(&mut backend, &mut SceneRegistry::new()).unwrap();

    assert_eq!(report, TickReport::default());
    assert_eq!(generator.terrain_mesh().cloned(), before);
    assert_eq!(backend.release_calls(), calls);
    assert_eq!(generator.dirty_state(), DirtyState::ShapeDirty);
}

#[test]
fn test_failed_dispatch_releases_every_buffer() {
    let mut backend = host_backend();
    let mut generator: CelestialBodyGenerator =
        CelestialBodyGenerator::new(small_config(), 1.0, TessellationCache::shared());
    generator.set_shape(KernelShape::new("height"));
    generator.set_shading(KernelShading::new("broken"));

    let result = generator.generate_for_play(
        &mut backend,
        &mut RecordingBaker::default(),
        &mut SceneRegistry::new(),
    );
    assert!(matches!(
        result,
        Err(GenerationError::Compute(ComputeError::KernelFailed { .. }))
    ));
    assert_eq!(backend.live_buffers(), 0);
    assert!(backend.release_calls() > 0);
}

#[test]
fn test_bake_failure_is_reported() {
    let mut backend = host_backend();
    let mut generator = generator();
    let mut baker = RecordingBaker {
        fail: true,
        ..RecordingBaker::default()
    };
    let mut scene = SceneRegistry::new();
    let result = generator.generate_for_play(&mut backend, &mut baker, &mut scene);
    assert!(matches!(result, Err(GenerationError::Bake(_))));
    assert_eq!(backend.live_buffers(), 0);
    assert!(scene.get(TERRAIN_MESH_SLOT).is_none());
}

#[test]
fn test_successful_generation_leaves_no_live_buffers() {
    let mut backend = host_backend();
    let mut generator = generator();
    play(&mut generator, &mut backend);
    assert_eq!(backend.live_buffers(), 0);
    assert_eq!(backend.release_calls(), backend.releases());
}

// --- Edit mode ---

#[test]
fn test_first_tick_runs_full_regeneration() {
    let mut backend = host_backend();
    let mut scene = SceneRegistry::new();
    let mut generator = generator();

    let report = generator.update(&mut backend, &mut scene).unwrap();
    assert_eq!(report.full_regenerations, 1);
    assert_eq!(report.partial_regenerations, 0);
    assert_eq!(generator.dirty_state(), DirtyState::Clean);
    assert_eq!(scene.get(TERRAIN_MESH_SLOT).unwrap().revision, 0);

    let idle = generator.update(&mut backend, &mut scene).unwrap();
    assert_eq!(idle, TickReport::default());
}

#[test]
fn test_shading_change_runs_exactly_two_partial_passes() {
    let mut backend = host_backend();
    let mut scene = SceneRegistry::new();
    let mut generator = generator();
    generator.update(&mut backend, &mut scene).unwrap();
    let shading_dispatches = backend.dispatch_count("shading");

    generator.shading_mut().unwrap().set_param("seed", 3.0);
    let report = generator.update(&mut backend, &mut scene).unwrap();

    assert_eq!(report.full_regenerations, 0);
    assert_eq!(report.partial_regenerations, 2);
    assert_eq!(backend.dispatch_count("shading"), shading_dispatches + 2);
    assert_eq!(generator.dirty_state(), DirtyState::Clean);

    let idle = generator.update(&mut backend, &mut scene).unwrap();
    assert_eq!(idle, TickReport::default());
}

#[test]
fn test_single_partial_pass_when_double_pass_disabled() {
    let mut backend = host_backend();
    let mut scene = SceneRegistry::new();
    let mut generator = generator();
    generator.set_config(GenerationConfig {
        double_shading_pass: false,
        ..small_config()
    });
    generator.update(&mut backend, &mut scene).unwrap();

    for _ in 0..3 {
        generator.on_shading_setting_changed();
        let report = generator.update(&mut backend, &mut scene).unwrap();
        assert_eq!(report.partial_regenerations, 1);
    }
}

#[test]
fn test_partial_regeneration_only_changes_shading_channel() {
    let mut backend = host_backend();
    let mut scene = SceneRegistry::new();
    let mut generator = generator();
    generator.update(&mut backend, &mut scene).unwrap();
    let before = generator.terrain_mesh().unwrap().clone();
    let range = generator.height_range();

    generator.shading_mut().unwrap().set_param("seed", 9.0);
    generator.update(&mut backend, &mut scene).unwrap();
    let after = generator.terrain_mesh().unwrap();

    assert_eq!(after.positions(), before.positions());
    assert_eq!(after.indices(), before.indices());
    assert_eq!(after.normals(), before.normals());
    assert_eq!(after.tangents(), before.tangents());
    assert_ne!(after.uv0(), before.uv0());
    assert!(after.uv0().iter().all(|uv| uv.y == 9.0));
    assert_eq!(generator.height_range(), range);
    assert_eq!(scene.get(TERRAIN_MESH_SLOT).unwrap().mesh.uv0(), after.uv0());
}

#[test]
fn test_shape_and_shading_change_same_tick_runs_one_full_pass() {
    let mut backend = host_backend();
    let mut scene = SceneRegistry::new();
    let mut generator = generator();
    generator.update(&mut backend, &mut scene).unwrap();

    generator.shape_mut().unwrap().set_param("amplitude", 0.3);
    generator.shading_mut().unwrap().set_param("seed", 1.0);
    let report = generator.update(&mut backend, &mut scene).unwrap();
    assert_eq!(report.full_regenerations, 1);
    assert_eq!(report.partial_regenerations, 0);

    generator.on_shape_setting_changed();
    generator.on_shading_setting_changed();
    let report = generator.update(&mut backend, &mut scene).unwrap();
    assert_eq!(report.full_regenerations, 1);
    assert_eq!(report.partial_regenerations, 0);
    assert_eq!(generator.dirty_state(), DirtyState::Clean);
}

#[test]
fn test_shape_revision_triggers_full_regeneration() {
    let mut backend = host_backend();
    let mut scene = SceneRegistry::new();
    let mut generator = generator();
    generator.update(&mut backend, &mut scene).unwrap();
    let before = generator.height_range();

    generator.shape_mut().unwrap().set_param("amplitude", 0.4);
    let report = generator.update(&mut backend, &mut scene).unwrap();
    assert_eq!(report.full_regenerations, 1);
    assert!(generator.height_range().max > before.max);
}

#[test]
fn test_partial_request_without_mesh_escalates_to_full() {
    let failing = Arc::new(AtomicBool::new(true));
    let mut backend = host_backend();
    let flag = Arc::clone(&failing);
    backend.register_kernel("flaky", move |inv| {
        if flag.load(Ordering::SeqCst) {
            return Err(ComputeError::KernelFailed {
                kernel: KernelId::from("flaky"),
                message: "not ready".to_string(),
            });
        }
        let count = inv.num_elements();
        inv.write_scalars(1, &vec![1.0; count])
    });

    let mut scene = SceneRegistry::new();
    let mut generator: CelestialBodyGenerator =
        CelestialBodyGenerator::new(small_config(), 1.0, TessellationCache::shared());
    generator.set_shape(KernelShape::new("flaky"));
    generator.set_shading(KernelShading::new("shading"));

    assert!(generator.update(&mut backend, &mut scene).is_err());
    assert_eq!(generator.dirty_state(), DirtyState::Clean);
    assert_eq!(backend.live_buffers(), 0);

    failing.store(false, Ordering::SeqCst);
    generator.on_shading_setting_changed();
    let report = generator.update(&mut backend, &mut scene).unwrap();
    assert_eq!(report.full_regenerations, 1);
    assert_eq!(report.partial_regenerations, 0);
    assert!(generator.terrain_mesh().is_some_and(|m| !m.is_empty()));
}

#[test]
fn test_failed_full_pass_recovers_on_next_shading_tick() {
    let failing = Arc::new(AtomicBool::new(false));
    let mut backend = host_backend();
    let flag = Arc::clone(&failing);
    backend.register_kernel("flaky_shading", move |inv| {
        if flag.load(Ordering::SeqCst) {
            return Err(ComputeError::KernelFailed {
                kernel: KernelId::from("flaky_shading"),
                message: "lost".to_string(),
            });
        }
        let count = inv.num_elements();
        inv.write_vec4(1, &vec![Vec4::ONE; count])
    });

    let mut scene = SceneRegistry::new();
    let mut generator: CelestialBodyGenerator =
        CelestialBodyGenerator::new(small_config(), 1.0, TessellationCache::shared());
    generator.set_shape(KernelShape::new("height").with_param("amplitude", 0.1));
    generator.set_shading(KernelShading::new("flaky_shading"));
    generator.update(&mut backend, &mut scene).unwrap();
    let attached = scene.get(TERRAIN_MESH_SLOT).unwrap().mesh.clone();

    failing.store(true, Ordering::SeqCst);
    generator.shape_mut().unwrap().set_param("amplitude", 0.5);
    assert!(generator.update(&mut backend, &mut scene).is_err());
    assert!(generator.terrain_mesh().is_some_and(TerrainMesh::is_empty));
    assert_eq!(scene.get(TERRAIN_MESH_SLOT).unwrap().mesh, attached);

    failing.store(false, Ordering::SeqCst);
    generator.shading_mut().unwrap().set_param("seed", 1.0);
    let report = generator.update(&mut backend, &mut scene).unwrap();
    assert_eq!(report.full_regenerations, 1);
    assert_eq!(report.partial_regenerations, 0);

    let mesh = generator.terrain_mesh().unwrap();
    assert_eq!(mesh.vertex_count(), template_counts(6).0);
    assert_eq!(mesh.tangents().len(), mesh.vertex_count());
    assert_eq!(mesh.uv0().len(), mesh.vertex_count());
    let range = generator.height_range();
    assert!((range.max - 1.5).abs() < 1e-5);
    for p in mesh.positions() {
        assert!(range.min - 1e-5 <= p.length() && p.length() <= range.max + 1e-5);
    }
    assert_eq!(scene.get(TERRAIN_MESH_SLOT).unwrap().mesh, *mesh);
}

#[test]
fn test_hidden_generator_does_nothing() {
    let mut backend = host_backend();
    let mut generator = generator();
    generator.set_config(GenerationConfig {
        show: false,
        ..small_config()
    });
    let report = generator.update(&mut backend, &mut SceneRegistry::new()).unwrap();
    assert_eq!(report, TickReport::default());
    assert_eq!(backend.total_dispatches(), 0);
    assert!(generator.terrain_mesh().is_none());
}

#[test]
fn test_resolution_change_rebuilds_at_new_resolution() {
    let mut backend = host_backend();
    let mut scene = SceneRegistry::new();
    let mut generator = generator();
    generator.update(&mut backend, &mut scene).unwrap();

    generator.set_config(GenerationConfig {
        resolution: 10,
        ..small_config()
    });
    let report = generator.update(&mut backend, &mut scene).unwrap();
    assert_eq!(report.full_regenerations, 1);
    assert_eq!(
        generator.terrain_mesh().unwrap().vertex_count(),
        template_counts(10).0
    );
    assert_eq!(scene.get(TERRAIN_MESH_SLOT).unwrap().revision, 1);
}

// --- Module buffers ---

struct CountingShape {
    inner: KernelShape,
    releases: Arc<AtomicUsize>,
}

impl ShapeModule for CountingShape {
    fn height_kernel(&self) -> Option<&KernelId> {
        self.inner.height_kernel()
    }

    fn calculate_heights(
        &self,
        scope: &mut DispatchScope<'_>,
        positions: BufferHandle,
        count: usize,
    ) -> Result<Vec<f32>, GenerationError> {
        self.inner.calculate_heights(scope, positions, count)
    }

    fn revision(&self) -> u64 {
        self.inner.revision()
    }

    fn release_buffers(&mut self, _backend: &mut dyn ComputeBackend) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_module_buffers_released_every_tick_and_on_teardown() {
    let releases = Arc::new(AtomicUsize::new(0));
    let mut backend = host_backend();
    let mut scene = SceneRegistry::new();
    let mut generator: CelestialBodyGenerator<CountingShape, KernelShading> =
        CelestialBodyGenerator::new(small_config(), 1.0, TessellationCache::shared());
    generator.set_shape(CountingShape {
        inner: KernelShape::new("height"),
        releases: Arc::clone(&releases),
    });

    generator.update(&mut backend, &mut scene).unwrap();
    generator.update(&mut backend, &mut scene).unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 2);

    generator.release_all_buffers(&mut backend);
    generator.teardown(&mut backend);
    assert_eq!(releases.load(Ordering::SeqCst), 4);
    assert_eq!(backend.live_buffers(), 0);
}

#[test]
fn test_generators_share_template_cache() {
    let cache = TessellationCache::shared();
    let mut backend = host_backend();
    let mut first: CelestialBodyGenerator =
        CelestialBodyGenerator::new(small_config(), 1.0, Arc::clone(&cache));
    let mut second: CelestialBodyGenerator =
        CelestialBodyGenerator::new(small_config(), 3.0, Arc::clone(&cache));
    first.set_shape(KernelShape::new("unit"));
    second.set_shape(KernelShape::new("unit"));

    play(&mut first, &mut backend);
    play(&mut second, &mut backend);

    // resolutions 6 and 4, each built once
    assert_eq!(cache.build_count(), 2);
}
