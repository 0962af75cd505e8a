use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tessera_chunk::RegionSnapshot;
use tessera_geom::Vec3;

use crate::compiled::CompiledResult;
use crate::section::Section;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    Successful,
    Cancelled,
}

/// Cancellation handle shared between a task and the section that issued it.
pub(crate) struct TaskControl {
    cancelled: AtomicBool,
    snapshot: Mutex<Option<RegionSnapshot>>,
    /// Issue order among the section's rebuilds; 0 for resorts.
    generation: u64,
    /// Escalated rebuilds survive being superseded and only stop on a hard cancel.
    uncancellable: bool,
}

impl TaskControl {
    pub(crate) fn new(snapshot: Option<RegionSnapshot>) -> Arc<Self> {
        Self::rebuild(snapshot, 0, false)
    }

    pub(crate) fn rebuild(
        snapshot: Option<RegionSnapshot>,
        generation: u64,
        uncancellable: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            snapshot: Mutex::new(snapshot),
            generation,
            uncancellable,
        })
    }

    #[inline]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub(crate) fn is_uncancellable(&self) -> bool {
        self.uncancellable
    }

    #[inline]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Sets the flag and drops the snapshot. Returns true only for the first call.
    pub(crate) fn cancel(&self) -> bool {
        let first = !self.cancelled.swap(true, Ordering::AcqRel);
        if first {
            self.snapshot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
        first
    }

    pub(crate) fn take_snapshot(&self) -> Option<RegionSnapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[derive(Clone)]
pub(crate) enum TaskKind {
    Rebuild,
    /// Reorders the translucent layer of `base`, which must still be published on completion.
    Resort { base: Arc<CompiledResult> },
}

/// One unit of build work for a section.
pub struct CompileTask {
    pub(crate) section: Arc<Section>,
    pub(crate) control: Arc<TaskControl>,
    pub(crate) kind: TaskKind,
    pub(crate) camera: Vec3,
    priority_key: f64,
    high_priority: bool,
}

impl CompileTask {
    pub(crate) fn new(
        section: Arc<Section>,
        control: Arc<TaskControl>,
        kind: TaskKind,
        camera: Vec3,
        high_priority: bool,
    ) -> Self {
        let priority_key = section.distance_sq(camera);
        Self {
            section,
            control,
            kind,
            camera,
            priority_key,
            high_priority,
        }
    }

    /// Squared distance from the camera to the section centre when the task was made.
    #[inline]
    pub fn priority_key(&self) -> f64 {
        self.priority_key
    }

    #[inline]
    pub fn is_high_priority(&self) -> bool {
        self.high_priority
    }

    /// True for an escalated rebuild that a newer rebuild will not supersede.
    #[inline]
    pub fn is_uncancellable(&self) -> bool {
        self.control.is_uncancellable()
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.control.is_cancelled()
    }

    pub fn is_rebuild(&self) -> bool {
        matches!(self.kind, TaskKind::Rebuild)
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            TaskKind::Rebuild => "rebuild",
            TaskKind::Resort { .. } => "resort",
        }
    }

    pub fn section(&self) -> &Arc<Section> {
        &self.section
    }

    pub fn cancel(&self) {
        self.section.cancel_task(&self.control, self.is_rebuild());
    }
}

impl fmt::Debug for CompileTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileTask")
            .field("kind", &self.name())
            .field("section", &self.section.index())
            .field("priority_key", &self.priority_key)
            .field("high_priority", &self.high_priority)
            .field("uncancellable", &self.is_uncancellable())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_chunk::SectionPos;

    #[test]
    fn cancel_is_idempotent_and_drops_snapshot() {
        let snap = RegionSnapshot::from_blocks_local(SectionPos::new(0, 0, 0), Vec::new(), Vec::new());
        let ctl = TaskControl::new(Some(snap));
        assert!(!ctl.is_cancelled());
        assert!(ctl.cancel());
        assert!(!ctl.cancel());
        assert!(ctl.is_cancelled());
        assert!(ctl.take_snapshot().is_none());
    }
}
