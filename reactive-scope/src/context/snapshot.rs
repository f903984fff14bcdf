//! Immutable captures of a thread's current store.

use super::manager::ContextManager;
use super::store::ScopeStore;
use crate::errors::ScopeError;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::ThreadId;
use uuid::Uuid;

/// A transferable capture of which store (if any) was bound to a thread.
///
/// Snapshots are cheap to clone and may move to any thread. Pushing one
/// installs its store on the calling thread; resetting one restores the
/// state it describes.
#[derive(Clone)]
pub struct Snapshot {
    manager: ContextManager,
    store: Option<Arc<ScopeStore>>,
    clear_on_reset: bool,
    origin: ThreadId,
}

impl Snapshot {
    pub(crate) fn new(
        manager: ContextManager,
        store: Option<Arc<ScopeStore>>,
        clear_on_reset: bool,
        origin: ThreadId,
    ) -> Self {
        Self {
            manager,
            store,
            clear_on_reset,
            origin,
        }
    }

    /// Returns true if the snapshot references a store.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.store.is_some()
    }

    /// Returns true if resetting this snapshot clears the origin thread's
    /// binding. Such snapshots may only be reset on their origin thread.
    #[must_use]
    pub const fn is_thread_bound(&self) -> bool {
        self.clear_on_reset
    }

    /// Returns the thread that produced the snapshot.
    #[must_use]
    pub const fn origin_thread(&self) -> ThreadId {
        self.origin
    }

    /// Returns the referenced store's id.
    #[must_use]
    pub fn store_id(&self) -> Option<Uuid> {
        self.store.as_ref().map(|store| store.id())
    }

    /// Returns the referenced store.
    #[must_use]
    pub fn store(&self) -> Option<&Arc<ScopeStore>> {
        self.store.as_ref()
    }

    /// Returns the manager that produced the snapshot.
    #[must_use]
    pub const fn manager(&self) -> &ContextManager {
        &self.manager
    }

    /// Resets the calling thread to the state this snapshot describes.
    pub fn release(&self) -> Result<(), ScopeError> {
        self.manager.reset(self)
    }

    /// Returns true if both snapshots reference the same store (or none).
    #[must_use]
    pub fn same_store(&self, other: &Self) -> bool {
        match (&self.store, &other.store) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Converts to a dictionary representation for diagnostics.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert(
            "scope".to_string(),
            serde_json::json!(self.manager.config().scope_name),
        );
        map.insert("thread_bound".to_string(), serde_json::json!(self.clear_on_reset));
        map.insert(
            "origin_thread".to_string(),
            serde_json::json!(format!("{:?}", self.origin)),
        );
        if let Some(ref store) = self.store {
            map.insert("store_id".to_string(), serde_json::json!(store.id().to_string()));
            map.insert(
                "started_at".to_string(),
                serde_json::json!(store.created_at().to_rfc3339()),
            );
            map.insert("instances".to_string(), serde_json::json!(store.len()));
        }
        map
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("store_id", &self.store_id())
            .field("thread_bound", &self.clear_on_reset)
            .field("origin", &self.origin)
            .finish()
    }
}
