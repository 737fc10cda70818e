//! Outstanding-operation registry.
//!
//! Maps assigned sequence numbers to pending operations and bounds in-flight
//! concurrency with a counting semaphore. The submission path acquires a
//! permit, then the send lock, then inserts here; the receive task removes
//! entries by `ack_sequence`; the sweeper removes expired entries. Permits
//! travel inside the pending entry, so releasing is automatic on resolution.
//!
//! # Invariants
//!
//! - At no time do more than `capacity` entries exist: insertion requires a
//!   permit, and the permit lives exactly as long as the entry.
//! - Each sequence is registered at most once (sequences are never reused
//!   within a session).

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{
    sync::{OwnedSemaphorePermit, Semaphore},
    time::{self, Instant},
};

use crate::{
    error::{KineticError, Result},
    operation::Completion,
};

/// A registered operation awaiting its response.
pub(crate) struct Pending {
    /// Resolution handle (gate or closure).
    pub completion: Completion,
    /// When the sweeper should expire this operation.
    pub deadline: Instant,
    /// Concurrency permit; released when this entry drops.
    #[allow(dead_code)]
    permit: OwnedSemaphorePermit,
}

impl Pending {
    pub(crate) fn new(
        completion: Completion,
        deadline: Instant,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self { completion, deadline, permit }
    }
}

/// Sequence → pending-operation map bounded by a counting semaphore.
pub(crate) struct OperationRegistry {
    pending: Mutex<HashMap<u64, Pending>>,
    permits: Arc<Semaphore>,
}

impl OperationRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(HashMap::with_capacity(capacity)),
            permits: Arc::new(Semaphore::new(capacity)),
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<u64, Pending>> {
        // The registry's own methods never panic while holding the lock, but
        // a resolved completion callback elsewhere might; recover the data.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquire one in-flight permit, waiting up to `wait`.
    ///
    /// # Errors
    ///
    /// - [`KineticError::DeviceBusy`] if no permit frees up within `wait`
    /// - [`KineticError::ConnectionError`] if the registry is closed
    ///   (session teardown)
    pub(crate) async fn acquire(&self, wait: Duration) -> Result<OwnedSemaphorePermit> {
        match time::timeout(wait, Arc::clone(&self.permits).acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_closed)) => Err(KineticError::ConnectionError),
            Err(_elapsed) => Err(KineticError::DeviceBusy),
        }
    }

    /// Insert a pending operation under its assigned sequence.
    pub(crate) fn register(&self, sequence: u64, pending: Pending) {
        let previous = self.map().insert(sequence, pending);
        debug_assert!(previous.is_none(), "sequence {sequence} registered twice");
    }

    /// Remove and return the operation matching a response's `ack_sequence`.
    /// `None` means unknown or already expired; the caller discards the
    /// response.
    pub(crate) fn complete(&self, ack_sequence: u64) -> Option<Pending> {
        self.map().remove(&ack_sequence)
    }

    /// Remove every operation whose deadline has passed.
    pub(crate) fn take_expired(&self, now: Instant) -> Vec<(u64, Pending)> {
        let mut map = self.map();
        let expired: Vec<u64> =
            map.iter().filter(|(_, p)| p.deadline <= now).map(|(seq, _)| *seq).collect();
        expired.into_iter().filter_map(|seq| map.remove(&seq).map(|p| (seq, p))).collect()
    }

    /// Remove every pending operation (session teardown).
    pub(crate) fn drain(&self) -> Vec<(u64, Pending)> {
        self.map().drain().collect()
    }

    /// Stop admitting new operations; subsequent [`Self::acquire`] calls fail
    /// with `ConnectionError`.
    pub(crate) fn close(&self) {
        self.permits.close();
    }

    pub(crate) fn len(&self) -> usize {
        self.map().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}
