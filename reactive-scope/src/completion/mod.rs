//! Continuation chains that carry the attaching thread's store.
//!
//! A [`ReactiveFuture`] completes exactly when the future it decorates
//! completes. Every continuation attached to it captures the store current
//! at attach time and runs its closure under that store, on whichever thread
//! polls the chain to completion.

use crate::context::ContextManager;
use futures::future::{self, BoxFuture, Either};
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future decorated with store-propagating continuations.
#[must_use = "futures do nothing unless polled"]
pub struct ReactiveFuture<T> {
    manager: ContextManager,
    inner: BoxFuture<'static, T>,
}

impl<T> Future for ReactiveFuture<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        self.inner.poll_unpin(cx)
    }
}

impl<T> std::fmt::Debug for ReactiveFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveFuture")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> ReactiveFuture<T> {
    /// Decorates `fut`.
    pub fn new<Fut>(manager: ContextManager, fut: Fut) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            manager,
            inner: fut.boxed(),
        }
    }

    /// A future already completed with `value`.
    pub fn completed(manager: ContextManager, value: T) -> Self {
        Self::new(manager, future::ready(value))
    }

    /// Returns the manager continuations capture from.
    #[must_use]
    pub const fn manager(&self) -> &ContextManager {
        &self.manager
    }

    /// Strips the decoration.
    pub fn into_inner(self) -> BoxFuture<'static, T> {
        self.inner
    }

    fn chain<U, Fut>(manager: ContextManager, fut: Fut) -> ReactiveFuture<U>
    where
        U: Send + 'static,
        Fut: Future<Output = U> + Send + 'static,
    {
        ReactiveFuture::new(manager, fut)
    }

    /// Transforms the value.
    pub fn then_apply<U, F>(self, f: F) -> ReactiveFuture<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let f = self.manager.propagate(f);
        Self::chain(self.manager, self.inner.map(move |value| f.apply_once(value)))
    }

    /// Consumes the value.
    pub fn then_accept<F>(self, f: F) -> ReactiveFuture<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.then_apply(f)
    }

    /// Runs `f` after completion, discarding the value.
    pub fn then_run<F>(self, f: F) -> ReactiveFuture<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let f = self.manager.propagate(f);
        Self::chain(self.manager, self.inner.map(move |_| f.call_once()))
    }

    /// Combines this value with `other`'s once both complete.
    pub fn then_combine<U, V, Fut, F>(self, other: Fut, f: F) -> ReactiveFuture<V>
    where
        U: Send + 'static,
        V: Send + 'static,
        Fut: Future<Output = U> + Send + 'static,
        F: FnOnce(T, U) -> V + Send + 'static,
    {
        let f = self.manager.propagate(f);
        let both = future::join(self.inner, other);
        Self::chain(self.manager, both.map(move |(a, b)| f.apply2_once(a, b)))
    }

    /// Consumes both values once both complete.
    pub fn then_accept_both<U, Fut, F>(self, other: Fut, f: F) -> ReactiveFuture<()>
    where
        U: Send + 'static,
        Fut: Future<Output = U> + Send + 'static,
        F: FnOnce(T, U) + Send + 'static,
    {
        self.then_combine(other, f)
    }

    /// Runs `f` once both complete.
    pub fn run_after_both<U, Fut, F>(self, other: Fut, f: F) -> ReactiveFuture<()>
    where
        U: Send + 'static,
        Fut: Future<Output = U> + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let f = self.manager.propagate(f);
        let both = future::join(self.inner, other);
        Self::chain(self.manager, both.map(move |_| f.call_once()))
    }

    fn either<Fut>(self, other: Fut) -> (ContextManager, impl Future<Output = T> + Send)
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let race = future::select(self.inner, other.boxed()).map(|won| match won {
            Either::Left((value, _)) | Either::Right((value, _)) => value,
        });
        (self.manager, race)
    }

    /// Transforms whichever of this and `other` completes first.
    pub fn apply_to_either<U, Fut, F>(self, other: Fut, f: F) -> ReactiveFuture<U>
    where
        U: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let f = self.manager.propagate(f);
        let (manager, race) = self.either(other);
        Self::chain(manager, race.map(move |value| f.apply_once(value)))
    }

    /// Consumes whichever of this and `other` completes first.
    pub fn accept_either<Fut, F>(self, other: Fut, f: F) -> ReactiveFuture<()>
    where
        Fut: Future<Output = T> + Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        self.apply_to_either(other, f)
    }

    /// Runs `f` once either this or `other` completes.
    pub fn run_after_either<Fut, F>(self, other: Fut, f: F) -> ReactiveFuture<()>
    where
        Fut: Future<Output = T> + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        let f = self.manager.propagate(f);
        let (manager, race) = self.either(other);
        Self::chain(manager, race.map(move |_| f.call_once()))
    }

    /// Chains a dependent future produced from this value.
    pub fn then_compose<U, Fut, F>(self, f: F) -> ReactiveFuture<U>
    where
        U: Send + 'static,
        Fut: Future<Output = U> + Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
    {
        let f = self.manager.propagate(f);
        Self::chain(self.manager, self.inner.then(move |value| f.apply_once(value)))
    }
}

impl<V, E> ReactiveFuture<Result<V, E>>
where
    V: Send + 'static,
    E: Send + 'static,
{
    /// Maps the outcome, success or failure.
    pub fn handle<U, F>(self, f: F) -> ReactiveFuture<U>
    where
        U: Send + 'static,
        F: FnOnce(Result<V, E>) -> U + Send + 'static,
    {
        self.then_apply(f)
    }

    /// Observes the outcome and passes it through unchanged.
    pub fn when_complete<F>(self, f: F) -> Self
    where
        F: FnOnce(&Result<V, E>) + Send + 'static,
    {
        let f = self.manager.propagate(f);
        Self::chain(
            self.manager,
            self.inner.map(move |outcome| {
                f.apply_once(&outcome);
                outcome
            }),
        )
    }

    /// Recovers from a failure. Successful values pass through.
    pub fn exceptionally<F>(self, f: F) -> Self
    where
        F: FnOnce(E) -> V + Send + 'static,
    {
        let f = self.manager.propagate(f);
        Self::chain(
            self.manager,
            self.inner.map(move |outcome| outcome.or_else(|err| Ok(f.apply_once(err)))),
        )
    }
}

impl ContextManager {
    /// Decorates `fut` so continuations attached to it carry the attaching
    /// thread's store.
    pub fn wrap_future<Fut>(&self, fut: Fut) -> ReactiveFuture<Fut::Output>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        ReactiveFuture::new(self.clone(), fut)
    }
}
