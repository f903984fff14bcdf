//! Task runners and the reactive decorators that propagate the submitter's
//! store into every task.
//!
//! This module provides:
//! - [`Executor`]: run a single fire-and-forget task
//! - [`TaskPool`]: submit jobs for results, run batches, manage shutdown
//! - [`ReactiveExecutor`] / [`ReactiveTaskPool`]: capture at submission,
//!   restore on whichever thread runs the task
//! - [`TokioTaskPool`]: a pool over a tokio runtime's blocking threads

mod reactive;
mod tokio_pool;

pub use reactive::{ReactiveExecutor, ReactiveTaskPool};
pub use tokio_pool::TokioTaskPool;

use crate::context::ContextManager;
use crate::errors::TaskError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;

/// A fire-and-forget unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work producing a value.
pub type Job<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// The eventual result of a submitted job.
pub type TaskFuture<T> = BoxFuture<'static, Result<T, TaskError>>;

/// Runs tasks somewhere, at some point.
pub trait Executor: Send + Sync {
    /// Hands `task` off for execution.
    ///
    /// There is no feedback channel: an executor that refuses the task (for
    /// example a [`TaskPool`] after shutdown) drops it without running it.
    /// Use [`TaskPool::submit`] to observe rejection.
    fn execute(&self, task: Task);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, task: Task) {
        (**self).execute(task);
    }
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, task: Task) {
        (**self).execute(task);
    }
}

impl Executor for tokio::runtime::Handle {
    fn execute(&self, task: Task) {
        drop(self.spawn_blocking(task));
    }
}

/// A managed pool of workers.
///
/// Only [`submit`](Self::submit) and the lifecycle operations are required;
/// the batch operations are expressed in terms of `submit`. Batch operations
/// submit every job before returning; the returned future only collects
/// results.
#[async_trait]
pub trait TaskPool: Executor {
    /// Submits a job. The job starts running whether or not the returned
    /// future is polled.
    fn submit<T: Send + 'static>(&self, job: Job<T>) -> TaskFuture<T>;

    /// Runs every job and waits for all of them, returning results in
    /// submission order.
    fn invoke_all<T: Send + 'static>(
        &self,
        jobs: Vec<Job<T>>,
    ) -> BoxFuture<'static, Vec<Result<T, TaskError>>> {
        let pending: Vec<_> = jobs.into_iter().map(|job| self.submit(job)).collect();
        futures::future::join_all(pending).boxed()
    }

    /// Like [`invoke_all`](Self::invoke_all), with one deadline shared by the
    /// whole batch. Jobs still running at the deadline report
    /// [`TaskError::TimedOut`].
    fn invoke_all_timeout<T: Send + 'static>(
        &self,
        jobs: Vec<Job<T>>,
        timeout: Duration,
    ) -> BoxFuture<'static, Vec<Result<T, TaskError>>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let pending: Vec<_> = jobs.into_iter().map(|job| self.submit(job)).collect();

        async move {
            let mut results = Vec::with_capacity(pending.len());
            for fut in pending {
                let result = tokio::time::timeout_at(deadline, fut)
                    .await
                    .unwrap_or(Err(TaskError::TimedOut { after: timeout }));
                results.push(result);
            }
            results
        }
        .boxed()
    }

    /// Runs every job and returns the first successful result. If all fail,
    /// returns the last failure.
    ///
    /// The losing jobs are not cancelled: they run to completion and their
    /// results are discarded.
    fn invoke_any<T: Send + 'static>(&self, jobs: Vec<Job<T>>) -> TaskFuture<T> {
        if jobs.is_empty() {
            return futures::future::ready(Err(TaskError::NoTasks)).boxed();
        }
        let pending: Vec<_> = jobs.into_iter().map(|job| self.submit(job)).collect();
        futures::future::select_ok(pending)
            .map(|won| won.map(|(value, _rest)| value))
            .boxed()
    }

    /// Like [`invoke_any`](Self::invoke_any), giving up after `timeout`.
    fn invoke_any_timeout<T: Send + 'static>(
        &self,
        jobs: Vec<Job<T>>,
        timeout: Duration,
    ) -> TaskFuture<T> {
        let any = self.invoke_any(jobs);
        async move {
            tokio::time::timeout(timeout, any)
                .await
                .unwrap_or(Err(TaskError::TimedOut { after: timeout }))
        }
        .boxed()
    }

    /// Stops accepting work; already submitted jobs still run.
    fn shutdown(&self);

    /// Stops accepting work and cancels jobs that have not started.
    /// Returns how many were cancelled.
    fn shutdown_now(&self) -> usize;

    /// Returns true once shutdown was requested.
    fn is_shutdown(&self) -> bool;

    /// Returns true once shut down and every job has finished.
    fn is_terminated(&self) -> bool;

    /// Waits up to `timeout` for termination. Returns whether the pool
    /// terminated.
    async fn await_termination(&self, timeout: Duration) -> bool;
}

impl ContextManager {
    /// Decorates `delegate` so every task runs under the submitter's store.
    pub fn wrap_executor<E: Executor>(&self, delegate: E) -> ReactiveExecutor<E> {
        ReactiveExecutor::new(self.clone(), delegate)
    }

    /// Decorates `delegate` so every job runs under the submitter's store.
    pub fn wrap_task_pool<P: TaskPool>(&self, delegate: P) -> ReactiveTaskPool<P> {
        ReactiveTaskPool::new(self.clone(), delegate)
    }
}
