//! Exactly-once completion of a suspended activation.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::context::Snapshot;
use crate::errors::ScopeError;
use crate::executor::Executor;
use crate::propagation::Propagated;

/// How a suspended activation settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum CompletionOutcome {
    /// The work completed.
    Completed,
    /// The work timed out.
    TimedOut,
    /// The work failed.
    Failed(String),
}

#[derive(Debug)]
struct CompletionInner {
    root: Snapshot,
    settled: AtomicBool,
    outcome: RwLock<Option<CompletionOutcome>>,
}

/// Finishes a suspended activation's store exactly once.
///
/// Clones share state. The first of [`complete`](Self::complete),
/// [`time_out`](Self::time_out) or [`fail`](Self::fail) finishes the store
/// and returns `Ok(true)`; every later call returns `Ok(false)`.
#[derive(Debug, Clone)]
pub struct AsyncCompletion {
    inner: Arc<CompletionInner>,
}

impl AsyncCompletion {
    pub(crate) fn new(root: Snapshot) -> Self {
        Self {
            inner: Arc::new(CompletionInner {
                root,
                settled: AtomicBool::new(false),
                outcome: RwLock::new(None),
            }),
        }
    }

    /// Returns the activation's root snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.inner.root
    }

    /// Settles as completed.
    pub fn complete(&self) -> Result<bool, ScopeError> {
        self.settle(CompletionOutcome::Completed)
    }

    /// Settles as timed out.
    pub fn time_out(&self) -> Result<bool, ScopeError> {
        self.settle(CompletionOutcome::TimedOut)
    }

    /// Settles as failed.
    pub fn fail(&self, reason: impl Into<String>) -> Result<bool, ScopeError> {
        self.settle(CompletionOutcome::Failed(reason.into()))
    }

    fn settle(&self, outcome: CompletionOutcome) -> Result<bool, ScopeError> {
        if self
            .inner
            .settled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(false);
        }

        debug!(store_id = ?self.inner.root.store_id(), ?outcome, "async activation settled");
        *self.inner.outcome.write() = Some(outcome);
        let root = &self.inner.root;
        root.manager().finish(root)?;
        Ok(true)
    }

    /// Returns true once settled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.settled.load(Ordering::SeqCst)
    }

    /// Returns how the activation settled.
    #[must_use]
    pub fn outcome(&self) -> Option<CompletionOutcome> {
        self.inner.outcome.read().clone()
    }

    /// Binds `f` to the activation's store.
    pub fn wrap<F>(&self, f: F) -> Propagated<F> {
        self.inner.root.wrap(f)
    }

    /// Runs `task` on `executor` under the activation's store.
    pub fn start_on<E, F>(&self, executor: &E, task: F)
    where
        E: Executor + ?Sized,
        F: FnOnce() + Send + 'static,
    {
        let wrapped = self.wrap(task);
        executor.execute(Box::new(move || wrapped.call_once()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextManager;
    use crate::testing::InlineExecutor;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn suspended(manager: &ContextManager) -> AsyncCompletion {
        let root = manager.start();
        manager.reset(&root).unwrap();
        AsyncCompletion::new(root)
    }

    #[test]
    fn test_settles_once_under_race() {
        let manager = ContextManager::new();
        let completion = suspended(&manager);
        let barrier = Arc::new(Barrier::new(6));

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let completion = completion.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    match i % 3 {
                        0 => completion.complete(),
                        1 => completion.time_out(),
                        _ => completion.fail("listener error"),
                    }
                    .unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(completion.is_finished());
        assert!(completion.outcome().is_some());
    }

    #[test]
    fn test_outcome_recorded() {
        let manager = ContextManager::new();
        let completion = suspended(&manager);
        assert_eq!(completion.outcome(), None);

        assert!(completion.time_out().unwrap());
        assert!(!completion.fail("late").unwrap());
        assert_eq!(completion.outcome(), Some(CompletionOutcome::TimedOut));
    }

    #[test]
    fn test_start_on_runs_under_store() {
        let manager = ContextManager::new();
        let completion = suspended(&manager);
        let expected = completion.snapshot().store_id();
        let (tx, rx) = std::sync::mpsc::channel();

        let m = manager.clone();
        completion.start_on(&InlineExecutor, move || tx.send(m.current().store_id()).unwrap());

        assert_eq!(rx.recv().unwrap(), expected);
        assert!(!manager.is_active());
    }

    #[test]
    fn test_outcome_serializes() {
        let json = serde_json::to_string(&CompletionOutcome::Failed("io".to_string())).unwrap();
        assert_eq!(json, r#"{"outcome":"failed","reason":"io"}"#);
    }
}
