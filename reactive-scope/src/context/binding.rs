//! Thread-keyed binding of the current store.

use super::store::ScopeStore;
use dashmap::DashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// One slot per thread holding that thread's current store.
///
/// Only the owning context manager touches this table. A slot lives until its
/// thread clears it: a thread that exits while bound leaves its slot, and the
/// store it references, behind.
#[derive(Debug, Default)]
pub(crate) struct ThreadBindings {
    slots: DashMap<ThreadId, Arc<ScopeStore>>,
}

impl ThreadBindings {
    /// Returns the calling thread's store.
    pub(crate) fn current(&self) -> Option<Arc<ScopeStore>> {
        self.slots
            .get(&thread::current().id())
            .map(|store| Arc::clone(store.value()))
    }

    /// Binds `store` to the calling thread, returning what was bound before.
    pub(crate) fn bind(&self, store: Arc<ScopeStore>) -> Option<Arc<ScopeStore>> {
        self.slots.insert(thread::current().id(), store)
    }

    /// Clears the calling thread's slot, returning what was bound before.
    pub(crate) fn clear(&self) -> Option<Arc<ScopeStore>> {
        self.slots
            .remove(&thread::current().id())
            .map(|(_, store)| store)
    }

    /// Number of threads with a bound store.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
