//! In-flight request tracking for cancellable operations.
//!
//! Each [`crate::engine::Engine`] owns its own registry, so independent
//! engines (tests, multiple servers in one process) never see each other's
//! requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Default)]
struct Slots {
    next_seq: u64,
    active: HashMap<String, (u64, CancellationToken)>,
}

#[derive(Debug, Default)]
pub struct RequestRegistry {
    slots: Mutex<Slots>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track `id` until the returned guard is dropped.
    ///
    /// Registering an id that is already active cancels the earlier request.
    pub fn register(self: &Arc<Self>, id: impl Into<String>) -> RequestGuard {
        let id = id.into();
        let token = CancellationToken::new();

        let mut slots = self.lock();
        let seq = slots.next_seq;
        slots.next_seq += 1;
        if let Some((_, previous)) = slots.active.insert(id.clone(), (seq, token.clone())) {
            debug!("Request {id} re-registered; cancelling previous run");
            previous.cancel();
        }
        drop(slots);

        RequestGuard {
            registry: Arc::clone(self),
            id,
            seq,
            token,
        }
    }

    /// Cancel an active request. Returns `false` if `id` is unknown.
    pub fn cancel(&self, id: &str) -> bool {
        match self.lock().active.get(id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// IDs of all active requests, sorted.
    pub fn active(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().active.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Deregisters its request on drop.
#[derive(Debug)]
pub struct RequestGuard {
    registry: Arc<RequestRegistry>,
    id: String,
    seq: u64,
    token: CancellationToken,
}

impl RequestGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let mut slots = self.registry.lock();
        // A newer registration under the same id owns the slot now
        if slots
            .active
            .get(&self.id)
            .is_some_and(|(seq, _)| *seq == self.seq)
        {
            slots.active.remove(&self.id);
        }
    }
}
