//! Tracked components for lifecycle tests.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::component::{Component, CreationToken, Instance};
use crate::errors::BoxError;

/// Construction and destruction counts shared by a [`TrackedComponent`].
#[derive(Debug, Default)]
pub struct Counters {
    attempts: AtomicUsize,
    constructed: AtomicUsize,
    destroyed: AtomicUsize,
}

impl Counters {
    /// Returns the number of factory invocations, failed ones included.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Returns the number of successfully constructed instances.
    #[must_use]
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    /// Returns the number of successfully destroyed instances.
    #[must_use]
    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// The instance produced by a [`TrackedComponent`].
#[derive(Debug)]
pub struct Tracked {
    serial: usize,
    label: Mutex<String>,
}

impl Tracked {
    /// Returns the instance's construction serial, starting at 1.
    #[must_use]
    pub const fn serial(&self) -> usize {
        self.serial
    }

    /// Replaces the label.
    pub fn set_label(&self, label: &str) {
        *self.label.lock() = label.to_string();
    }

    /// Returns the label.
    #[must_use]
    pub fn label(&self) -> String {
        self.label.lock().clone()
    }
}

/// A component that counts its lifecycle events.
#[derive(Debug)]
pub struct TrackedComponent {
    name: String,
    counters: Arc<Counters>,
    creation_delay: Option<Duration>,
    failing_creations: AtomicUsize,
    fail_destroy: bool,
}

impl TrackedComponent {
    /// Creates a component that always succeeds.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            counters: Arc::new(Counters::default()),
            creation_delay: None,
            failing_creations: AtomicUsize::new(0),
            fail_destroy: false,
        }
    }

    /// Sleeps for `delay` inside every factory call.
    #[must_use]
    pub const fn with_creation_delay(mut self, delay: Duration) -> Self {
        self.creation_delay = Some(delay);
        self
    }

    /// Fails the first `count` factory calls.
    #[must_use]
    pub fn failing_creations(self, count: usize) -> Self {
        self.failing_creations.store(count, Ordering::SeqCst);
        self
    }

    /// Fails every destroy call.
    #[must_use]
    pub const fn failing_destroy(mut self) -> Self {
        self.fail_destroy = true;
        self
    }

    /// Returns the shared counters.
    #[must_use]
    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }
}

impl Component for TrackedComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, _token: &CreationToken) -> Result<Instance, BoxError> {
        self.counters.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.creation_delay {
            std::thread::sleep(delay);
        }

        let failing = self
            .failing_creations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(format!("{} refused to construct", self.name).into());
        }

        let serial = self.counters.constructed.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(Tracked {
            serial,
            label: Mutex::new(String::new()),
        }))
    }

    fn destroy(&self, instance: Instance, token: &CreationToken) -> Result<(), BoxError> {
        if self.fail_destroy {
            return Err(format!("{} refused to tear down", self.name).into());
        }
        drop(instance);
        token.release();
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
