//! The context manager: activation lifecycle and registry operations.

use super::binding::ThreadBindings;
use super::snapshot::Snapshot;
use super::store::ScopeStore;
use crate::component::{ComponentKey, CreationToken, Instance};
use crate::config::{RestoreCheck, ScopeConfig, TeardownPolicy};
use crate::errors::{ScopeError, TeardownError};
use std::any::Any;
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace, warn};

#[derive(Debug, Default)]
struct ManagerInner {
    config: ScopeConfig,
    bindings: ThreadBindings,
}

/// Owns the per-thread binding of the current store.
///
/// Cloning is cheap; clones share the same bindings. Registry operations
/// always act on whatever store is bound to the calling thread.
///
/// A thread must reset its binding before it exits. Bindings are keyed by
/// thread id, so a thread that exits while bound keeps its store reachable
/// until the manager is dropped. [`Snapshot::run`] and every propagated
/// wrapper restore the prior binding on return; only direct
/// [`start`](Self::start) and [`push`](Self::push) calls need a matching
/// [`reset`](Self::reset).
#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    inner: Arc<ManagerInner>,
}

impl ContextManager {
    /// Creates a manager with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager with the given configuration.
    #[must_use]
    pub fn with_config(config: ScopeConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                config,
                bindings: ThreadBindings::default(),
            }),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ScopeConfig {
        &self.inner.config
    }

    fn scope_name(&self) -> &str {
        &self.inner.config.scope_name
    }

    /// Begins an activation on the calling thread.
    ///
    /// Binds a new empty store and returns a thread-bound snapshot of it:
    /// resetting the snapshot clears the thread's binding, finishing it
    /// destroys the store's instances.
    pub fn start(&self) -> Snapshot {
        let store = Arc::new(ScopeStore::new());
        debug!(scope = %self.scope_name(), store_id = %store.id(), "activation started");

        self.inner.bindings.bind(Arc::clone(&store));
        Snapshot::new(self.clone(), Some(store), true, thread::current().id())
    }

    /// Destroys every instance in the snapshot's store and empties it.
    ///
    /// Does nothing if the snapshot has no store or the store is already
    /// empty. Destroyer failures are handled per the configured
    /// [`TeardownPolicy`].
    pub fn finish(&self, snapshot: &Snapshot) -> Result<(), ScopeError> {
        let Some(store) = snapshot.store() else {
            return Ok(());
        };

        let policy = self.inner.config.teardown_policy;
        let mut failures = Vec::new();
        let mut destroyed = 0_usize;

        for key in store.keys() {
            let Some(bag) = store.take(&key) else {
                continue;
            };
            match bag.destroy(&key) {
                Ok(true) => destroyed += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        scope = %self.scope_name(),
                        store_id = %store.id(),
                        component = %key.name(),
                        error = %err,
                        "component teardown failed"
                    );
                    failures.push(err);
                    if policy == TeardownPolicy::AbortOnFirstFailure {
                        break;
                    }
                }
            }
        }

        debug!(
            scope = %self.scope_name(),
            store_id = %store.id(),
            destroyed,
            failed = failures.len(),
            remaining = store.len(),
            "activation finished"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TeardownError::new(store.id(), failures).into())
        }
    }

    /// Captures the calling thread's current store without changing it.
    ///
    /// With no store bound the result is a thread-bound placeholder.
    pub fn current(&self) -> Snapshot {
        let origin = thread::current().id();
        match self.inner.bindings.current() {
            Some(store) => Snapshot::new(self.clone(), Some(store), false, origin),
            None => Snapshot::new(self.clone(), None, true, origin),
        }
    }

    /// Installs the snapshot's store on the calling thread (or clears the
    /// binding if it has none) and returns a snapshot of the prior binding.
    pub fn push(&self, snapshot: &Snapshot) -> Snapshot {
        let previous = match snapshot.store() {
            Some(store) => self.inner.bindings.bind(Arc::clone(store)),
            None => self.inner.bindings.clear(),
        };
        trace!(
            scope = %self.scope_name(),
            pushed = ?snapshot.store_id(),
            previous = ?previous.as_ref().map(|s| s.id()),
            "snapshot pushed"
        );

        Snapshot::new(self.clone(), previous, false, thread::current().id())
    }

    /// Restores the calling thread to the state the snapshot describes.
    ///
    /// Fails with [`ScopeError::CrossThreadRestore`] if a thread-bound
    /// snapshot is reset away from its origin thread.
    pub fn reset(&self, snapshot: &Snapshot) -> Result<(), ScopeError> {
        let checked = snapshot.is_thread_bound()
            || self.inner.config.restore_check == RestoreCheck::Always;
        if checked && thread::current().id() != snapshot.origin_thread() {
            return Err(ScopeError::cross_thread_restore(snapshot.origin_thread()));
        }

        if snapshot.is_thread_bound() {
            self.inner.bindings.clear();
        } else {
            match snapshot.store() {
                Some(store) => {
                    self.inner.bindings.bind(Arc::clone(store));
                }
                None => {
                    self.inner.bindings.clear();
                }
            }
        }
        trace!(scope = %self.scope_name(), restored = ?snapshot.store_id(), "snapshot reset");
        Ok(())
    }

    /// Returns true if the calling thread has a bound store.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.bindings.current().is_some()
    }

    /// Number of threads that currently have a store bound.
    #[must_use]
    pub fn bound_threads(&self) -> usize {
        self.inner.bindings.len()
    }

    fn require_store(&self) -> Result<Arc<ScopeStore>, ScopeError> {
        self.inner
            .bindings
            .current()
            .ok_or_else(|| ScopeError::not_active(self.scope_name()))
    }

    /// Returns the instance for `key`, creating it on first access.
    ///
    /// Concurrent first accesses from different threads converge on a single
    /// instance; the factory runs at most once per activation unless it
    /// fails, in which case nothing is cached and a later call retries.
    pub fn get_or_create(&self, key: &ComponentKey) -> Result<Instance, ScopeError> {
        self.get_or_create_with(key, CreationToken::new)
    }

    /// Like [`get_or_create`](Self::get_or_create), supplying the creation
    /// token used if this call allocates the component's bag.
    pub fn get_or_create_with<F>(&self, key: &ComponentKey, token: F) -> Result<Instance, ScopeError>
    where
        F: FnOnce() -> CreationToken,
    {
        let store = self.require_store()?;
        let mut token = Some(token);

        loop {
            let bag = store.bag(key, || token.take().map_or_else(CreationToken::new, |f| f()));
            if let Some(instance) = bag.get_or_create(key)? {
                return Ok(instance);
            }
            // Destroyed under us; drop the stale bag and allocate a fresh one.
            store.detach(key, &bag);
        }
    }

    /// Typed variant of [`get_or_create`](Self::get_or_create).
    pub fn get_or_create_as<T>(&self, key: &ComponentKey) -> Result<Arc<T>, ScopeError>
    where
        T: Any + Send + Sync,
    {
        let instance = self.get_or_create(key)?;
        downcast(key, instance)
    }

    /// Returns the cached instance for `key` without creating it.
    ///
    /// Absent when nothing is cached or no store is bound.
    #[must_use]
    pub fn get(&self, key: &ComponentKey) -> Option<Instance> {
        self.inner
            .bindings
            .current()
            .and_then(|store| store.lookup(key))
            .and_then(|bag| bag.instance())
    }

    /// Typed variant of [`get`](Self::get).
    pub fn get_as<T>(&self, key: &ComponentKey) -> Result<Option<Arc<T>>, ScopeError>
    where
        T: Any + Send + Sync,
    {
        self.get(key).map(|instance| downcast(key, instance)).transpose()
    }

    /// Destroys and evicts the calling thread's instance of `key`.
    ///
    /// Does nothing if no store is bound or no instance was created, so it is
    /// safe to call repeatedly.
    pub fn destroy(&self, key: &ComponentKey) -> Result<(), ScopeError> {
        let Some(store) = self.inner.bindings.current() else {
            return Ok(());
        };
        let Some(bag) = store.lookup(key) else {
            return Ok(());
        };
        if bag.instance().is_none() {
            return Ok(());
        }

        store.detach(key, &bag);
        bag.destroy(key)?;
        Ok(())
    }
}

fn downcast<T>(key: &ComponentKey, instance: Instance) -> Result<Arc<T>, ScopeError>
where
    T: Any + Send + Sync,
{
    instance
        .downcast::<T>()
        .map_err(|_| ScopeError::TypeMismatch {
            component: key.name().to_string(),
            expected: std::any::type_name::<T>(),
        })
}
