//! Creation tokens and their dependent release callbacks.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// A release callback registered against a token, with optional name.
struct Dependent {
    /// The callback function.
    release: Box<dyn FnOnce() + Send>,
    /// Optional name for the callback.
    name: Option<String>,
}

struct TokenInner {
    id: Uuid,
    dependents: Mutex<Vec<Dependent>>,
}

/// Opaque creation context handed to a component's factory and destroyer.
///
/// A factory can register dependents: release callbacks that run in LIFO
/// order when the instance is destroyed. Clones share the same dependents.
#[derive(Clone)]
pub struct CreationToken {
    inner: Arc<TokenInner>,
}

impl CreationToken {
    /// Creates a new token with no dependents.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                id: Uuid::new_v4(),
                dependents: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the token id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Registers a release callback.
    ///
    /// If a name is provided, it's stored with the callback for diagnostics.
    pub fn push_dependent<F>(&self, release: F, name: Option<&str>)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.dependents.lock().push(Dependent {
            release: Box::new(release),
            name: name.map(String::from),
        });
    }

    /// Returns the number of pending release callbacks.
    #[must_use]
    pub fn pending_dependents(&self) -> usize {
        self.inner.dependents.lock().len()
    }

    /// Runs all release callbacks in LIFO order.
    ///
    /// Panicking callbacks are logged and collected but don't stop the others.
    /// The token is empty afterwards, so a second release does nothing.
    pub fn release(&self) -> Vec<(String, String)> {
        let dependents: Vec<Dependent> = std::mem::take(&mut *self.inner.dependents.lock());
        let mut failures = Vec::new();

        for dependent in dependents.into_iter().rev() {
            let name = dependent.name.unwrap_or_else(|| "<unnamed>".to_string());
            let release = dependent.release;

            if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(release)) {
                let msg = format!("Dependent release panicked: {panic:?}");
                warn!(token = %self.inner.id, "{}: {}", name, msg);
                failures.push((name, msg));
            }
        }

        failures
    }
}

impl Default for CreationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CreationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreationToken")
            .field("id", &self.inner.id)
            .field("pending_dependents", &self.pending_dependents())
            .finish()
    }
}
