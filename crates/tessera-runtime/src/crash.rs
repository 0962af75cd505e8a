use std::fmt;
use std::sync::{Mutex, PoisonError};

use tessera_chunk::SectionPos;

/// An unexpected build failure, handed to the application instead of unwinding through it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrashReport {
    pub section: SectionPos,
    pub task: &'static str,
    pub message: String,
}

impl fmt::Display for CrashReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of section ({},{},{}) failed: {}",
            self.task, self.section.sx, self.section.sy, self.section.sz, self.message
        )
    }
}

pub trait CrashSink: Send + Sync {
    fn report(&self, report: CrashReport);
}

/// Keeps the first report until the main loop polls it; later ones are only logged.
#[derive(Default)]
pub struct DeferredCrashSink {
    first: Mutex<Option<CrashReport>>,
}

impl DeferredCrashSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Option<CrashReport> {
        self.first
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn has_report(&self) -> bool {
        self.first
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl CrashSink for DeferredCrashSink {
    fn report(&self, report: CrashReport) {
        let mut slot = self.first.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(report);
        } else {
            log::warn!(target: "scheduler", "dropping follow-up crash report: {}", report);
        }
    }
}
