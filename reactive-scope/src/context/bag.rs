//! Per-component instance holders.

use crate::component::{ComponentKey, CreationToken, Instance};
use crate::errors::{CreationError, DestructionError};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// Lazy, idempotent holder for one cached instance.
///
/// Creation and destruction serialize on the bag's own guard, so bags for
/// different keys never contend.
#[derive(Debug)]
pub(crate) struct InstanceBag {
    token: CreationToken,
    instance: RwLock<Option<Instance>>,
    guard: Mutex<()>,
    destroyed: AtomicBool,
}

impl InstanceBag {
    pub(crate) fn new(token: CreationToken) -> Self {
        Self {
            token,
            instance: RwLock::new(None),
            guard: Mutex::new(()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Returns the instance if it has been created and not destroyed.
    pub(crate) fn instance(&self) -> Option<Instance> {
        self.instance.read().clone()
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Returns the cached instance, creating it on first call.
    ///
    /// Returns `Ok(None)` if the bag was destroyed; the caller must look up a
    /// fresh bag. A failed creation leaves the bag empty.
    pub(crate) fn get_or_create(&self, key: &ComponentKey) -> Result<Option<Instance>, CreationError> {
        if let Some(instance) = self.instance() {
            return Ok(Some(instance));
        }

        let _guard = self.guard.lock();
        if self.is_destroyed() {
            return Ok(None);
        }
        if let Some(instance) = self.instance() {
            return Ok(Some(instance));
        }

        let created = key
            .create(&self.token)
            .map_err(|source| CreationError::new(key.name(), source))?;
        trace!(component = %key.name(), token = %self.token.id(), "instance created");

        *self.instance.write() = Some(created.clone());
        Ok(Some(created))
    }

    /// Destroys the instance, at most once.
    ///
    /// Returns `Ok(true)` if a destroyer ran. A bag that never held an
    /// instance is still marked destroyed.
    pub(crate) fn destroy(&self, key: &ComponentKey) -> Result<bool, DestructionError> {
        let _guard = self.guard.lock();
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        let Some(instance) = self.instance.write().take() else {
            return Ok(false);
        };

        key.destroy(instance, &self.token)
            .map_err(|source| DestructionError::new(key.name(), source))?;
        trace!(component = %key.name(), token = %self.token.id(), "instance destroyed");
        Ok(true)
    }
}
