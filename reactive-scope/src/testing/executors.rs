//! Executors for driving tasks in tests.

use parking_lot::Mutex;
use std::thread::JoinHandle;

use crate::executor::{Executor, Task};

/// Runs each task immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

/// Runs each task on a fresh OS thread.
#[derive(Debug, Default)]
pub struct ThreadExecutor {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadExecutor {
    /// Creates an executor with no threads yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins every thread spawned so far. Returns how many tasks panicked.
    pub fn join(&self) -> usize {
        let handles = std::mem::take(&mut *self.handles.lock());
        handles
            .into_iter()
            .map(JoinHandle::join)
            .filter(Result::is_err)
            .count()
    }
}

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) {
        let handle = std::thread::spawn(task);
        self.handles.lock().push(handle);
    }
}
