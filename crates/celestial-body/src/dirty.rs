//! Dirty-state tracking: decides between full and shading-only regeneration.

/// What the coordinator currently owes the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirtyState {
    Clean,
    ShapeDirty,
    ShadingDirty,
}

/// A regeneration pass to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Regeneration {
    /// Re-tessellate, recompute heights and shading.
    Full,
    /// Recompute the shading payload only.
    Partial,
}

/// Tracks shape and shading staleness for one generator.
///
/// A shape change dominates: it clears both flags and runs one full pass.
/// A shading-only change runs the partial pass twice in the same tick when
/// `double_pass` is set, never more.
#[derive(Clone, Debug)]
pub struct DirtyTracker {
    shape_dirty: bool,
    shading_dirty: bool,
    double_pass: bool,
    partial_passes: u32,
    shape_revision: Option<u64>,
    shading_revision: Option<u64>,
}

impl DirtyTracker {
    pub fn new(double_pass: bool) -> Self {
        Self {
            shape_dirty: false,
            shading_dirty: false,
            double_pass,
            partial_passes: 0,
            shape_revision: None,
            shading_revision: None,
        }
    }

    pub fn state(&self) -> DirtyState {
        if self.shape_dirty {
            DirtyState::ShapeDirty
        } else if self.shading_dirty {
            DirtyState::ShadingDirty
        } else {
            DirtyState::Clean
        }
    }

    pub fn set_double_pass(&mut self, double_pass: bool) {
        self.double_pass = double_pass;
    }

    pub fn notify_shape_changed(&mut self) {
        self.shape_dirty = true;
    }

    pub fn notify_shading_changed(&mut self) {
        self.shading_dirty = true;
    }

    /// Compare module revisions with the last observed ones and raise the
    /// matching notifications. A module seen for the first time only records
    /// its revision.
    pub fn observe_revisions(&mut self, shape: Option<u64>, shading: Option<u64>) {
        if changed(&mut self.shape_revision, shape) {
            self.notify_shape_changed();
        }
        if changed(&mut self.shading_revision, shading) {
            self.notify_shading_changed();
        }
    }

    /// Forget observed revisions, e.g. after a module was replaced.
    pub fn reset_revisions(&mut self, shape: Option<u64>, shading: Option<u64>) {
        self.shape_revision = shape;
        self.shading_revision = shading;
    }

    /// Take the next pass to run this tick, clearing the flags it consumes.
    pub fn next_pass(&mut self) -> Option<Regeneration> {
        if self.shape_dirty {
            self.shape_dirty = false;
            self.shading_dirty = false;
            Some(Regeneration::Full)
        } else if self.shading_dirty {
            self.shading_dirty = false;
            Some(Regeneration::Partial)
        } else {
            None
        }
    }

    /// Record a finished partial pass. Re-arms the second pass when needed.
    pub fn partial_finished(&mut self) {
        self.partial_passes += 1;
        if self.double_pass && self.partial_passes < 2 {
            self.shading_dirty = true;
        }
        if self.partial_passes >= 2 {
            self.partial_passes = 0;
        }
    }

    /// Mark everything up to date without running a pass.
    pub fn clear(&mut self) {
        self.shape_dirty = false;
        self.shading_dirty = false;
        self.partial_passes = 0;
    }

    /// Drop the repeat counter after a failed pass.
    pub fn pass_failed(&mut self) {
        self.partial_passes = 0;
    }
}

fn changed(seen: &mut Option<u64>, current: Option<u64>) -> bool {
    let previous = std::mem::replace(seen, current);
    matches!((previous, current), (Some(a), Some(b)) if a != b)
}
