//! Decorators running every callback under a captured snapshot.

use super::{Publisher, Subscriber, Subscription};
use crate::context::{ContextManager, Snapshot};
use std::sync::Arc;

/// A [`Subscription`] whose `request` and `cancel` run under a snapshot.
#[derive(Debug, Clone)]
pub struct ReactiveSubscription<S> {
    delegate: S,
    snapshot: Snapshot,
}

impl<S> ReactiveSubscription<S> {
    /// Decorates `delegate` with `snapshot`.
    pub const fn new(delegate: S, snapshot: Snapshot) -> Self {
        Self { delegate, snapshot }
    }
}

impl<S: Subscription> Subscription for ReactiveSubscription<S> {
    fn request(&self, n: u64) {
        self.snapshot.run(|| self.delegate.request(n));
    }

    fn cancel(&self) {
        self.snapshot.run(|| self.delegate.cancel());
    }
}

/// A [`Subscriber`] whose callbacks run under a snapshot.
#[derive(Debug, Clone)]
pub struct ReactiveSubscriber<S> {
    delegate: S,
    snapshot: Snapshot,
}

impl<S> ReactiveSubscriber<S> {
    /// Decorates `delegate` with `snapshot`.
    pub const fn new(delegate: S, snapshot: Snapshot) -> Self {
        Self { delegate, snapshot }
    }
}

impl<T, S: Subscriber<T>> Subscriber<T> for ReactiveSubscriber<S> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.snapshot.run(|| self.delegate.on_subscribe(subscription));
    }

    fn on_next(&self, item: T) {
        self.snapshot.run(|| self.delegate.on_next(item));
    }

    fn on_error(&self, error: anyhow::Error) {
        self.snapshot.run(|| self.delegate.on_error(error));
    }

    fn on_complete(&self) {
        self.snapshot.run(|| self.delegate.on_complete());
    }
}

/// A [`Publisher`] whose `subscribe` runs under a snapshot.
#[derive(Debug, Clone)]
pub struct ReactivePublisher<P> {
    delegate: P,
    snapshot: Snapshot,
}

impl<P> ReactivePublisher<P> {
    /// Decorates `delegate` with `snapshot`.
    pub const fn new(delegate: P, snapshot: Snapshot) -> Self {
        Self { delegate, snapshot }
    }
}

impl<T, P: Publisher<T>> Publisher<T> for ReactivePublisher<P> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        self.snapshot.run(|| self.delegate.subscribe(subscriber));
    }
}

/// A processor decorated on both its subscriber and publisher sides.
#[derive(Debug, Clone)]
pub struct ReactiveProcessor<P> {
    delegate: P,
    snapshot: Snapshot,
}

impl<P> ReactiveProcessor<P> {
    /// Decorates `delegate` with `snapshot`.
    pub const fn new(delegate: P, snapshot: Snapshot) -> Self {
        Self { delegate, snapshot }
    }
}

impl<T, P: Subscriber<T>> Subscriber<T> for ReactiveProcessor<P> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.snapshot.run(|| self.delegate.on_subscribe(subscription));
    }

    fn on_next(&self, item: T) {
        self.snapshot.run(|| self.delegate.on_next(item));
    }

    fn on_error(&self, error: anyhow::Error) {
        self.snapshot.run(|| self.delegate.on_error(error));
    }

    fn on_complete(&self) {
        self.snapshot.run(|| self.delegate.on_complete());
    }
}

impl<R, P: Publisher<R>> Publisher<R> for ReactiveProcessor<P> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<R>>) {
        self.snapshot.run(|| self.delegate.subscribe(subscriber));
    }
}

impl ContextManager {
    /// Decorates a subscription with the calling thread's current snapshot.
    pub fn wrap_subscription<S: Subscription>(&self, delegate: S) -> ReactiveSubscription<S> {
        ReactiveSubscription::new(delegate, self.current())
    }

    /// Decorates a subscriber with the calling thread's current snapshot.
    pub fn wrap_subscriber<S>(&self, delegate: S) -> ReactiveSubscriber<S> {
        ReactiveSubscriber::new(delegate, self.current())
    }

    /// Decorates a publisher with the calling thread's current snapshot.
    pub fn wrap_publisher<P>(&self, delegate: P) -> ReactivePublisher<P> {
        ReactivePublisher::new(delegate, self.current())
    }

    /// Decorates a processor with the calling thread's current snapshot.
    pub fn wrap_processor<P>(&self, delegate: P) -> ReactiveProcessor<P> {
        ReactiveProcessor::new(delegate, self.current())
    }
}
