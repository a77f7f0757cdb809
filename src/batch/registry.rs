//! Per-actor admission control.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::error::ConfigurationError;

/// Identifies whoever initiated a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    running: DashMap<ActorId, u64>,
    next_batch_id: AtomicU64,
}

/// Tracks which actors have a running batch. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ActorRegistry {
    inner: Arc<RegistryInner>,
}

impl ActorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `actor` has a running batch.
    #[must_use]
    pub fn is_running(&self, actor: ActorId) -> bool {
        self.inner.running.contains_key(&actor)
    }

    /// Number of running batches.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.inner.running.len()
    }

    /// Fails if `actor` already has a running batch.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::AlreadyRunning`].
    pub fn ensure_idle(&self, actor: ActorId) -> Result<(), ConfigurationError> {
        if self.is_running(actor) {
            return Err(ConfigurationError::AlreadyRunning { actor: actor.0 });
        }
        Ok(())
    }

    /// Marks `actor` as running and assigns a batch id.
    ///
    /// The entry is released when the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::AlreadyRunning`] if the actor is taken.
    pub fn try_acquire(&self, actor: ActorId) -> Result<ActorGuard, ConfigurationError> {
        match self.inner.running.entry(actor) {
            Entry::Occupied(_) => Err(ConfigurationError::AlreadyRunning { actor: actor.0 }),
            Entry::Vacant(slot) => {
                let batch_id = self.inner.next_batch_id.fetch_add(1, Ordering::Relaxed) + 1;
                slot.insert(batch_id);
                debug!(%actor, batch_id, "actor acquired");
                Ok(ActorGuard {
                    registry: self.clone(),
                    actor,
                    batch_id,
                })
            }
        }
    }
}

/// Holds an actor's running slot until dropped.
#[derive(Debug)]
pub struct ActorGuard {
    registry: ActorRegistry,
    actor: ActorId,
    batch_id: u64,
}

impl ActorGuard {
    /// The actor holding the slot.
    #[must_use]
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// The batch id assigned on acquisition.
    #[must_use]
    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }
}

impl Drop for ActorGuard {
    fn drop(&mut self) {
        self.registry.inner.running.remove(&self.actor);
        debug!(actor = %self.actor, batch_id = self.batch_id, "actor released");
    }
}
