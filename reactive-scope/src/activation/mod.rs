//! Activation boundaries for a request-processing layer.
//!
//! An [`Activation`] brackets one logical unit of work: `begin` starts a
//! store on the calling thread, `end` finishes and unbinds it. Work that
//! outlives the calling thread is handled with [`Activation::suspend`],
//! which unbinds without finishing and hands back an [`AsyncCompletion`]
//! that finishes the store exactly once, whichever of complete, timeout or
//! error arrives first.

mod completion;

pub use completion::{AsyncCompletion, CompletionOutcome};

use crate::context::{ContextManager, Snapshot};
use crate::errors::ScopeError;
use crate::propagation::Propagated;
use tracing::warn;

/// One begun activation.
///
/// Dropping an activation that was neither ended nor suspended ends it,
/// logging any failure.
#[derive(Debug)]
#[must_use = "an activation ends when dropped"]
pub struct Activation {
    manager: ContextManager,
    root: Option<Snapshot>,
}

impl Activation {
    /// Starts a new store on the calling thread.
    pub fn begin(manager: &ContextManager) -> Self {
        Self {
            manager: manager.clone(),
            root: Some(manager.start()),
        }
    }

    /// Runs `f` inside a fresh activation, ending it afterwards.
    ///
    /// If `f` panics the activation is still ended during unwinding.
    pub fn run<R, F>(manager: &ContextManager, f: F) -> Result<R, ScopeError>
    where
        F: FnOnce() -> R,
    {
        let activation = Self::begin(manager);
        let value = f();
        activation.end()?;
        Ok(value)
    }

    /// Returns the root snapshot.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.root.as_ref()
    }

    /// Returns the owning manager.
    pub const fn manager(&self) -> &ContextManager {
        &self.manager
    }

    /// Binds `f` to this activation's store.
    pub fn wrap<F>(&self, f: F) -> Propagated<F> {
        match &self.root {
            Some(root) => root.wrap(f),
            None => self.manager.propagate(f),
        }
    }

    /// Finishes the store, then unbinds it from the calling thread.
    ///
    /// The binding is cleared even if finishing fails; the first error is
    /// returned.
    pub fn end(mut self) -> Result<(), ScopeError> {
        match self.root.take() {
            Some(root) => self.close(&root),
            None => Ok(()),
        }
    }

    /// Unbinds the store without finishing it.
    ///
    /// The returned handle finishes the store once the asynchronous work
    /// settles. If the store cannot be unbound (the call is made away from
    /// the thread that began the activation) an error is returned and the
    /// activation is ended when dropped.
    pub fn suspend(mut self) -> Result<AsyncCompletion, ScopeError> {
        let Some(root) = self.root.take() else {
            return Err(ScopeError::not_active(self.manager.config().scope_name.clone()));
        };
        if let Err(err) = self.manager.reset(&root) {
            self.root = Some(root);
            return Err(err);
        }
        Ok(AsyncCompletion::new(root))
    }

    fn close(&self, root: &Snapshot) -> Result<(), ScopeError> {
        let finished = self.manager.finish(root);
        let reset = self.manager.reset(root);
        finished.and(reset)
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        if let Some(root) = self.root.take() {
            if let Err(err) = self.close(&root) {
                warn!(
                    store_id = ?root.store_id(),
                    error = %err,
                    "activation dropped without ending cleanly"
                );
            }
        }
    }
}
