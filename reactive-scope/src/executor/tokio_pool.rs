//! A [`TaskPool`] over a tokio runtime's blocking threads.

use super::{Executor, Job, Task, TaskFuture, TaskPool};
use crate::errors::TaskError;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct TaskSlot {
    started: AtomicBool,
    done: AtomicBool,
}

#[derive(Debug, Default)]
struct PoolState {
    shutdown: AtomicBool,
    active: AtomicUsize,
    next_id: AtomicU64,
    pending: DashMap<u64, (AbortHandle, Arc<TaskSlot>)>,
    idle: Notify,
}

impl PoolState {
    fn is_terminated(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst) && self.active.load(Ordering::SeqCst) == 0
    }
}

/// Tracks one accepted job; dropped when the job finishes or is aborted
/// before it starts.
struct ActiveGuard {
    state: Arc<PoolState>,
    id: u64,
    slot: Arc<TaskSlot>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.slot.done.store(true, Ordering::SeqCst);
        self.state.pending.remove(&self.id);
        let remaining = self.state.active.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && self.state.shutdown.load(Ordering::SeqCst) {
            self.state.idle.notify_waiters();
        }
    }
}

/// Runs jobs on a tokio runtime's blocking pool.
///
/// The pool owns no threads. It adds shutdown semantics on top of the
/// runtime: rejection after shutdown, in-flight accounting, and cancellation
/// of jobs that have not started yet. A job that has started cannot be
/// interrupted.
#[derive(Debug, Clone)]
pub struct TokioTaskPool {
    handle: Handle,
    state: Arc<PoolState>,
}

impl TokioTaskPool {
    /// Creates a pool over the given runtime.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            state: Arc::new(PoolState::default()),
        }
    }

    /// Creates a pool over the runtime the caller is running in.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Returns the number of accepted jobs that have not finished.
    #[must_use]
    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    fn spawn<T, F>(&self, job: F) -> Result<JoinHandle<T>, TaskError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.state.shutdown.load(Ordering::SeqCst) {
            warn!("task rejected: pool is shut down");
            return Err(TaskError::rejected("pool is shut down"));
        }

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let slot = Arc::new(TaskSlot::default());
        self.state.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard {
            state: Arc::clone(&self.state),
            id,
            slot: Arc::clone(&slot),
        };

        let handle = self.handle.spawn_blocking(move || {
            let guard = guard;
            guard.slot.started.store(true, Ordering::SeqCst);
            job()
        });

        self.state
            .pending
            .insert(id, (handle.abort_handle(), Arc::clone(&slot)));
        if slot.done.load(Ordering::SeqCst) {
            self.state.pending.remove(&id);
        }
        Ok(handle)
    }
}

fn join_error(err: JoinError) -> TaskError {
    if err.is_cancelled() {
        return TaskError::Cancelled;
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked".to_string());
    TaskError::panicked(message)
}

impl Executor for TokioTaskPool {
    /// Runs `task` on the blocking pool. After shutdown the task is dropped
    /// unrun and only a warning is logged.
    fn execute(&self, task: Task) {
        if let Ok(handle) = self.spawn(task) {
            drop(handle);
        }
    }
}

#[async_trait]
impl TaskPool for TokioTaskPool {
    fn submit<T: Send + 'static>(&self, job: Job<T>) -> TaskFuture<T> {
        match self.spawn(job) {
            Ok(handle) => handle.map(|joined| joined.map_err(join_error)).boxed(),
            Err(err) => futures::future::ready(Err(err)).boxed(),
        }
    }

    fn shutdown(&self) {
        if !self.state.shutdown.swap(true, Ordering::SeqCst) {
            debug!(active = self.active(), "pool shutting down");
        }
        if self.state.active.load(Ordering::SeqCst) == 0 {
            self.state.idle.notify_waiters();
        }
    }

    fn shutdown_now(&self) -> usize {
        self.shutdown();
        let mut cancelled = 0;
        for entry in &self.state.pending {
            let (abort, slot) = entry.value();
            if !slot.started.load(Ordering::SeqCst) {
                abort.abort();
                cancelled += 1;
            }
        }
        debug!(cancelled, "pool shut down immediately");
        cancelled
    }

    fn is_shutdown(&self) -> bool {
        self.state.shutdown.load(Ordering::SeqCst)
    }

    fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }

    async fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let idle = self.state.idle.notified();
            if self.state.is_terminated() {
                return true;
            }
            if tokio::time::timeout_at(deadline, idle).await.is_err() {
                return self.state.is_terminated();
            }
        }
    }
}
