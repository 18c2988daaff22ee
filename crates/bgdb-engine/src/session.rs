//! Supersession of in-flight searches.
//!
//! Every search takes a ticket. Starting a new search makes all older tickets
//! stale; a stale search stops at its next cancellation check and never
//! touches history or the last result set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{EngineError, Result};

/// Identifies one search attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
}

impl SearchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Issues tickets and serializes the commit step of searches.
#[derive(Debug, Default)]
pub struct SearchSession {
    generation: AtomicU64,
    commit: Mutex<()>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new search, superseding every earlier ticket.
    pub fn begin(&self) -> SearchTicket {
        // Held even if poisoned.
        let _guard = self.commit.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        SearchTicket { generation }
    }

    /// Whether no newer search has started since `ticket` was issued.
    pub fn is_current(&self, ticket: &SearchTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Run `f` only if `ticket` is still current.
    ///
    /// The check and `f` happen under one lock, so a search started during the
    /// commit cannot interleave with it.
    pub fn commit<T>(&self, ticket: &SearchTicket, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self
            .commit
            .lock()
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        if !self.is_current(ticket) {
            return Err(EngineError::Superseded);
        }
        f()
    }
}
