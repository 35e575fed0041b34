//! Submission lock
//!
//! At most one in-flight registration per (account, fingerprint). The guard
//! releases its key on drop, whichever way the run ends.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::fingerprint::Fingerprint;
use crate::ledger::AccountAddress;

type LockKey = (AccountAddress, Fingerprint);

#[derive(Clone, Default)]
pub struct SubmissionLock {
    held: Arc<Mutex<HashMap<LockKey, Uuid>>>,
}

/// Holds a key until dropped
pub struct SubmissionGuard {
    held: Arc<Mutex<HashMap<LockKey, Uuid>>>,
    key: LockKey,
    run_id: Uuid,
}

impl SubmissionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the key for `run_id`; `None` if another run holds it
    pub fn try_acquire(
        &self,
        account: &AccountAddress,
        fingerprint: &Fingerprint,
        run_id: Uuid,
    ) -> Option<SubmissionGuard> {
        let key = (account.clone(), fingerprint.clone());
        let mut held = self.held.lock();
        if let Some(holder) = held.get(&key) {
            tracing::debug!(run_id = %run_id, holder = %holder, "Submission already in flight");
            return None;
        }
        held.insert(key.clone(), run_id);
        Some(SubmissionGuard {
            held: self.held.clone(),
            key,
            run_id,
        })
    }

    pub fn in_flight(&self) -> usize {
        self.held.lock().len()
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        let mut held = self.held.lock();
        if held.get(&self.key) == Some(&self.run_id) {
            held.remove(&self.key);
        }
    }
}
