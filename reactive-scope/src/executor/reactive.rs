//! Decorators that capture the submitter's snapshot at submission time.

use super::{Executor, Job, Task, TaskFuture, TaskPool};
use crate::context::{ContextManager, Snapshot};
use crate::errors::TaskError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::time::Duration;

fn bind_job<T: Send + 'static>(snapshot: &Snapshot, job: Job<T>) -> Job<T> {
    let wrapped = snapshot.wrap(job);
    Box::new(move || wrapped.call_once())
}

fn bind_batch<T: Send + 'static>(snapshot: &Snapshot, jobs: Vec<Job<T>>) -> Vec<Job<T>> {
    jobs.into_iter().map(|job| bind_job(snapshot, job)).collect()
}

/// An [`Executor`] whose tasks run under the store current at `execute`.
#[derive(Debug, Clone)]
pub struct ReactiveExecutor<E> {
    manager: ContextManager,
    delegate: E,
}

impl<E: Executor> ReactiveExecutor<E> {
    /// Decorates `delegate`.
    pub const fn new(manager: ContextManager, delegate: E) -> Self {
        Self { manager, delegate }
    }

    /// Returns the decorated executor.
    pub const fn delegate(&self) -> &E {
        &self.delegate
    }
}

impl<E: Executor> Executor for ReactiveExecutor<E> {
    fn execute(&self, task: Task) {
        let wrapped = self.manager.propagate(task);
        self.delegate.execute(Box::new(move || wrapped.call_once()));
    }
}

/// A [`TaskPool`] whose jobs run under the store current at submission.
///
/// Batch operations capture one snapshot for the whole batch when they are
/// called. Lifecycle operations pass straight through.
#[derive(Debug, Clone)]
pub struct ReactiveTaskPool<P> {
    manager: ContextManager,
    delegate: P,
}

impl<P: TaskPool> ReactiveTaskPool<P> {
    /// Decorates `delegate`.
    pub const fn new(manager: ContextManager, delegate: P) -> Self {
        Self { manager, delegate }
    }

    /// Returns the decorated pool.
    pub const fn delegate(&self) -> &P {
        &self.delegate
    }
}

impl<P: TaskPool> Executor for ReactiveTaskPool<P> {
    fn execute(&self, task: Task) {
        let wrapped = self.manager.propagate(task);
        self.delegate.execute(Box::new(move || wrapped.call_once()));
    }
}

#[async_trait]
impl<P: TaskPool> TaskPool for ReactiveTaskPool<P> {
    fn submit<T: Send + 'static>(&self, job: Job<T>) -> TaskFuture<T> {
        let snapshot = self.manager.current();
        self.delegate.submit(bind_job(&snapshot, job))
    }

    fn invoke_all<T: Send + 'static>(
        &self,
        jobs: Vec<Job<T>>,
    ) -> BoxFuture<'static, Vec<Result<T, TaskError>>> {
        let jobs = bind_batch(&self.manager.current(), jobs);
        self.delegate.invoke_all(jobs)
    }

    fn invoke_all_timeout<T: Send + 'static>(
        &self,
        jobs: Vec<Job<T>>,
        timeout: Duration,
    ) -> BoxFuture<'static, Vec<Result<T, TaskError>>> {
        let jobs = bind_batch(&self.manager.current(), jobs);
        self.delegate.invoke_all_timeout(jobs, timeout)
    }

    fn invoke_any<T: Send + 'static>(&self, jobs: Vec<Job<T>>) -> TaskFuture<T> {
        let jobs = bind_batch(&self.manager.current(), jobs);
        self.delegate.invoke_any(jobs)
    }

    fn invoke_any_timeout<T: Send + 'static>(
        &self,
        jobs: Vec<Job<T>>,
        timeout: Duration,
    ) -> TaskFuture<T> {
        let jobs = bind_batch(&self.manager.current(), jobs);
        self.delegate.invoke_any_timeout(jobs, timeout)
    }

    fn shutdown(&self) {
        self.delegate.shutdown();
    }

    fn shutdown_now(&self) -> usize {
        self.delegate.shutdown_now()
    }

    fn is_shutdown(&self) -> bool {
        self.delegate.is_shutdown()
    }

    fn is_terminated(&self) -> bool {
        self.delegate.is_terminated()
    }

    async fn await_termination(&self, timeout: Duration) -> bool {
        self.delegate.await_termination(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentKey;
    use crate::executor::TokioTaskPool;
    use crate::testing::{Tracked, TrackedComponent};
    use mockall::mock;
    use std::sync::mpsc;
    use std::sync::Arc;

    mock! {
        Runner {}
        impl Executor for Runner {
            fn execute(&self, task: Task);
        }
    }

    #[test]
    fn test_executor_wraps_at_submission() {
        let manager = ContextManager::new();
        let key = ComponentKey::new(TrackedComponent::new("request"));
        let root = manager.start();
        let created = manager.get_or_create_as::<Tracked>(&key).unwrap();

        let mut runner = MockRunner::new();
        runner
            .expect_execute()
            .times(1)
            .returning(|task| std::thread::spawn(task).join().unwrap());
        let executor = manager.wrap_executor(runner);

        let (tx, rx) = mpsc::channel();
        let task = {
            let manager = manager.clone();
            let key = key.clone();
            move || {
                let seen = manager.get_as::<Tracked>(&key).unwrap();
                tx.send(seen).unwrap();
            }
        };
        executor.execute(Box::new(task));

        let seen = rx.recv().unwrap().unwrap();
        assert!(Arc::ptr_eq(&seen, &created));

        manager.finish(&root).unwrap();
        manager.reset(&root).unwrap();
    }

    #[test]
    fn test_executor_captures_inactive_state() {
        let manager = ContextManager::new();
        let mut runner = MockRunner::new();
        runner.expect_execute().times(1).returning(|task| task());
        let executor = manager.wrap_executor(runner);

        let root = manager.start();
        let (tx, rx) = mpsc::channel();
        let active_at_submit = manager.is_active();
        manager.reset(&root).unwrap();

        let m = manager.clone();
        executor.execute(Box::new(move || tx.send(m.is_active()).unwrap()));
        assert!(active_at_submit);
        assert!(!rx.recv().unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pool_batches_share_snapshot() {
        let manager = ContextManager::new();
        let pool = manager.wrap_task_pool(TokioTaskPool::current());
        let root = manager.start();
        let expected = root.store_id();

        let jobs: Vec<Job<_>> = (0..4)
            .map(|_| {
                let manager = manager.clone();
                Box::new(move || manager.current().store_id()) as Job<_>
            })
            .collect();
        let results = pool.invoke_all(jobs).await;
        manager.reset(&root).unwrap();

        assert_eq!(results.len(), 4);
        assert!(results.into_iter().all(|r| r.unwrap() == expected));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pool_submit_and_any() {
        let manager = ContextManager::new();
        let pool = manager.wrap_task_pool(TokioTaskPool::current());
        let key = ComponentKey::new(TrackedComponent::new("pooled"));
        let root = manager.start();
        manager.get_or_create(&key).unwrap();

        let submitted = {
            let manager = manager.clone();
            let key = key.clone();
            pool.submit(Box::new(move || manager.get(&key).is_some()))
        };
        let any = {
            let manager = manager.clone();
            let key = key.clone();
            pool.invoke_any(vec![Box::new(move || manager.get(&key).is_some()) as Job<bool>])
        };
        manager.reset(&root).unwrap();

        assert!(submitted.await.unwrap());
        assert!(any.await.unwrap());

        pool.shutdown();
        assert!(pool.is_shutdown());
        assert!(pool.await_termination(Duration::from_secs(5)).await);
        assert!(pool.is_terminated());
    }

    fn store_id_jobs(manager: &ContextManager, count: usize) -> Vec<Job<Option<uuid::Uuid>>> {
        (0..count)
            .map(|_| {
                let manager = manager.clone();
                Box::new(move || manager.current().store_id()) as Job<_>
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_batches_capture_when_called() {
        let manager = ContextManager::new();
        let pool = manager.wrap_task_pool(TokioTaskPool::current());
        let root = manager.start();
        let expected = root.store_id();

        let all = pool.invoke_all(store_id_jobs(&manager, 2));
        let all_timed = pool.invoke_all_timeout(store_id_jobs(&manager, 2), Duration::from_secs(5));
        let any = pool.invoke_any(store_id_jobs(&manager, 2));
        let any_timed = pool.invoke_any_timeout(store_id_jobs(&manager, 2), Duration::from_secs(5));
        let single = pool.submit(store_id_jobs(&manager, 1).remove(0));
        manager.reset(&root).unwrap();
        assert!(!manager.is_active());

        for seen in all.await.into_iter().chain(all_timed.await) {
            assert_eq!(seen.unwrap(), expected);
        }
        assert_eq!(any.await.unwrap(), expected);
        assert_eq!(any_timed.await.unwrap(), expected);
        assert_eq!(single.await.unwrap(), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_batches_report_stragglers() {
        let manager = ContextManager::new();
        let pool = manager.wrap_task_pool(TokioTaskPool::current());
        let root = manager.start();
        let expected = root.store_id();
        let gate = Arc::new(std::sync::Barrier::new(2));

        let slow: Job<Option<uuid::Uuid>> = {
            let gate = Arc::clone(&gate);
            Box::new(move || {
                gate.wait();
                None
            })
        };
        let mut jobs = store_id_jobs(&manager, 1);
        jobs.push(slow);
        let all_timed = pool.invoke_all_timeout(jobs, Duration::from_millis(50));

        let stuck: Job<Option<uuid::Uuid>> = Box::new(|| {
            std::thread::sleep(Duration::from_millis(200));
            None
        });
        let any_timed = pool.invoke_any_timeout(vec![stuck], Duration::from_millis(20));
        manager.reset(&root).unwrap();

        let results = all_timed.await;
        gate.wait();
        assert_eq!(results[0], Ok(expected));
        assert_eq!(
            results[1],
            Err(TaskError::TimedOut {
                after: Duration::from_millis(50)
            })
        );
        assert_eq!(
            any_timed.await,
            Err(TaskError::TimedOut {
                after: Duration::from_millis(20)
            })
        );
    }
}
