//! Resolution-keyed cache of sphere templates.
//!
//! Templates are expensive to build at high resolutions and never change, so
//! each distinct resolution is built once and kept for the lifetime of the
//! cache. Callers receive an owned copy they are free to mutate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use crate::TessellationTemplate;

type Slot = Arc<OnceLock<Arc<TessellationTemplate>>>;

/// Shared cache of [`TessellationTemplate`]s keyed by resolution.
///
/// The slot map lock is only held long enough to find or insert a slot. The
/// slot itself is a [`OnceLock`], so exactly one caller builds a given
/// resolution while concurrent callers for the same resolution wait for it.
/// Callers for other resolutions are never blocked by a build.
#[derive(Default)]
pub struct TessellationCache {
    slots: Mutex<HashMap<u32, Slot>>,
    builds: AtomicUsize,
}

impl TessellationCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache ready to be shared between generators.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Return a copy of the template for `resolution`, building it on first use.
    pub fn get(&self, resolution: u32) -> TessellationTemplate {
        self.get_shared(resolution).as_ref().clone()
    }

    /// Return the cached template itself, for read-only use.
    pub fn get_shared(&self, resolution: u32) -> Arc<TessellationTemplate> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(resolution).or_default())
        };

        Arc::clone(slot.get_or_init(|| {
            let start = Instant::now();
            let template = TessellationTemplate::build(resolution);
            self.builds.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "Built sphere template r={} ({} vertices, {} triangles) in {:.2} ms",
                resolution,
                template.vertex_count(),
                template.triangle_count(),
                start.elapsed().as_secs_f64() * 1000.0
            );
            Arc::new(template)
        }))
    }

    /// Returns `true` if a template for `resolution` has been built.
    pub fn contains(&self, resolution: u32) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(&resolution)
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Total number of templates built since creation.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Number of resolutions with a slot.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing has been requested yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
