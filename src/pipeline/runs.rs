//! Recent pipeline runs
//!
//! Snapshots of runs for status queries. Bounded; the oldest runs fall off.
//! A run dropped before it finishes (the request went away) is recorded as
//! abandoned so it never lingers as in flight.

use std::num::NonZeroUsize;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use uuid::Uuid;

use super::types::{PipelineRun, RunState, Stage};

const DEFAULT_CAPACITY: usize = 256;

pub const ABANDONED: &str = "abandoned before completion";

#[derive(Clone)]
pub struct RunTracker {
    runs: Arc<Mutex<LruCache<Uuid, PipelineRun>>>,
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl RunTracker {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            runs: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Record the latest snapshot of a run
    pub fn record(&self, run: &PipelineRun) {
        self.runs.lock().put(run.id, run.clone());
    }

    pub fn get(&self, id: &Uuid) -> Option<PipelineRun> {
        self.runs.lock().peek(id).cloned()
    }

    /// Start tracking a run; the returned handle records it on drop
    pub fn track(&self, run: PipelineRun) -> TrackedRun<'_> {
        self.record(&run);
        TrackedRun { tracker: self, run }
    }

    /// Runs that have not reached a terminal state
    pub fn active(&self) -> Vec<PipelineRun> {
        self.runs
            .lock()
            .iter()
            .filter(|(_, run)| !run.state.is_terminal())
            .map(|(_, run)| run.clone())
            .collect()
    }
}

/// A run in progress, owned by the task executing it
pub struct TrackedRun<'a> {
    tracker: &'a RunTracker,
    run: PipelineRun,
}

impl Deref for TrackedRun<'_> {
    type Target = PipelineRun;

    fn deref(&self) -> &PipelineRun {
        &self.run
    }
}

impl DerefMut for TrackedRun<'_> {
    fn deref_mut(&mut self) -> &mut PipelineRun {
        &mut self.run
    }
}

impl Drop for TrackedRun<'_> {
    fn drop(&mut self) {
        if self.run.state.is_terminal() {
            return;
        }
        let stage = self.run.state.active_stage().unwrap_or(Stage::Hashing);
        let abandoned = RunState::Failed {
            stage,
            cause: ABANDONED.to_string(),
        };
        if self.run.advance(abandoned).is_ok() {
            tracing::warn!(run_id = %self.run.id, stage = %stage, "Run abandoned");
            self.tracker.record(&self.run);
        }
    }
}
