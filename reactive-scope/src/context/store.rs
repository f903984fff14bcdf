//! The per-activation instance store.

use super::bag::InstanceBag;
use crate::component::{ComponentKey, CreationToken};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Cache of the instances created during one activation.
///
/// Shared by every snapshot that references it. Concurrent first lookups of
/// the same key converge on a single bag.
#[derive(Debug)]
pub struct ScopeStore {
    id: Uuid,
    created_at: DateTime<Utc>,
    bags: DashMap<ComponentKey, Arc<InstanceBag>>,
}

impl ScopeStore {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            bags: DashMap::new(),
        }
    }

    /// Returns the store id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns when the activation started.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the number of bags, created or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bags.len()
    }

    /// Returns true if the store holds no bags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bags.is_empty()
    }

    /// Returns true if `key` has a created, live instance.
    #[must_use]
    pub fn contains(&self, key: &ComponentKey) -> bool {
        self.bags
            .get(key)
            .is_some_and(|bag| bag.instance().is_some())
    }

    /// Returns the names of the components with a bag in this store.
    #[must_use]
    pub fn component_names(&self) -> Vec<String> {
        self.bags.iter().map(|entry| entry.key().name().to_string()).collect()
    }

    /// Returns the bag for `key`, inserting an empty one if absent.
    ///
    /// On a race the first insert wins and every caller gets that bag.
    pub(crate) fn bag<F>(&self, key: &ComponentKey, token: F) -> Arc<InstanceBag>
    where
        F: FnOnce() -> CreationToken,
    {
        if let Some(bag) = self.bags.get(key) {
            return Arc::clone(bag.value());
        }

        let entry = self
            .bags
            .entry(key.clone())
            .or_insert_with(|| Arc::new(InstanceBag::new(token())));
        Arc::clone(entry.value())
    }

    pub(crate) fn lookup(&self, key: &ComponentKey) -> Option<Arc<InstanceBag>> {
        self.bags.get(key).map(|bag| Arc::clone(bag.value()))
    }

    /// Removes `key` only if it still maps to `bag`.
    pub(crate) fn detach(&self, key: &ComponentKey, bag: &Arc<InstanceBag>) -> bool {
        self.bags
            .remove_if(key, |_, current| Arc::ptr_eq(current, bag))
            .is_some()
    }

    /// Removes and returns the bag for `key`.
    pub(crate) fn take(&self, key: &ComponentKey) -> Option<Arc<InstanceBag>> {
        self.bags.remove(key).map(|(_, bag)| bag)
    }

    pub(crate) fn keys(&self) -> Vec<ComponentKey> {
        self.bags.iter().map(|entry| entry.key().clone()).collect()
    }
}
