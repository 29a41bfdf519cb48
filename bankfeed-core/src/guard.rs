//! Per-message mutual exclusion between the live and backfill paths.
//!
//! The marker check is read-then-act against the chat platform. Holding a
//! claim for the whole parse -> ledger -> mark sequence stops this process from
//! ingesting one message twice; separate processes are not covered.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::chat::MessageId;

#[derive(Debug, Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<MessageId>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or `None` if another task holds it. Released on drop.
    pub fn claim(&self, id: MessageId) -> Option<InFlightClaim> {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(id) {
            return None;
        }
        Some(InFlightClaim {
            id,
            ids: Arc::clone(&self.ids),
        })
    }

    pub fn is_claimed(&self, id: MessageId) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }
}

#[derive(Debug)]
pub struct InFlightClaim {
    id: MessageId,
    ids: Arc<Mutex<HashSet<MessageId>>>,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
