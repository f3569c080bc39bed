use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::error::{EngineError, Result};

use super::store::ChunkStore;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Reference to one installed corpus generation.
///
/// Cloning is cheap. The snapshot stays alive for as long as any handle
/// refers to it, even after a newer generation has been installed.
#[derive(Debug, Clone)]
pub struct CorpusHandle {
    registry_id: u64,
    generation: u64,
    store: Arc<ChunkStore>,
}

impl CorpusHandle {
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn store(&self) -> &ChunkStore {
        &self.store
    }
}

/// Holds the live chunk store and swaps it atomically.
///
/// New stores are always built outside the lock; installing one replaces a
/// single `Arc` under a short write lock.
#[derive(Debug)]
pub struct CorpusRegistry {
    id: u64,
    next_generation: AtomicU64,
    live: RwLock<Option<CorpusHandle>>,
}

impl Default for CorpusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            next_generation: AtomicU64::new(1),
            live: RwLock::new(None),
        }
    }

    /// Make `store` the live corpus and return its handle. Returns the
    /// handle of the generation it replaced, if any.
    pub fn install(&self, store: ChunkStore) -> (CorpusHandle, Option<CorpusHandle>) {
        let store = Arc::new(store);
        // The slot only ever holds a complete handle, so a poisoned lock is still consistent
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        // Allocated under the lock so generations are installed in order
        let handle = CorpusHandle {
            registry_id: self.id,
            generation: self.next_generation.fetch_add(1, Ordering::SeqCst),
            store,
        };
        let previous = live.replace(handle.clone());
        drop(live);

        info!(
            "Installed corpus generation {} ({} chunks)",
            handle.generation,
            handle.store.len()
        );
        (handle, previous)
    }

    /// Handle of the live corpus.
    pub fn current(&self) -> Result<CorpusHandle> {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(EngineError::CorpusUnavailable)
    }

    #[must_use]
    pub fn is_built(&self) -> bool {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Check that `handle` was issued here and is still the live generation.
    pub fn validate(&self, handle: &CorpusHandle) -> Result<()> {
        if handle.registry_id != self.id {
            return Err(EngineError::ForeignCorpus);
        }
        let current = self.current()?;
        if current.generation != handle.generation {
            return Err(EngineError::StaleCorpus {
                handle: handle.generation,
                current: current.generation,
            });
        }
        Ok(())
    }
}
