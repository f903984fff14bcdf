//! Publish-subscribe contracts and their store-propagating decorators.
//!
//! The contracts follow the usual demand-driven shape: a [`Publisher`]
//! hands each [`Subscriber`] a [`Subscription`] through which it requests
//! items. A [`Processor`] is both a subscriber and a publisher.

mod reactive;

pub use reactive::{ReactiveProcessor, ReactivePublisher, ReactiveSubscriber, ReactiveSubscription};

use std::sync::Arc;

/// The link between one publisher and one subscriber.
pub trait Subscription: Send + Sync {
    /// Adds `n` to the outstanding demand.
    fn request(&self, n: u64);

    /// Stops delivery. Items may still arrive while the cancellation lands.
    fn cancel(&self);
}

/// Receives items from a publisher.
pub trait Subscriber<T>: Send + Sync {
    /// Called once, before any other callback.
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>);

    /// Called for each item, never more often than requested.
    fn on_next(&self, item: T);

    /// Terminal failure.
    fn on_error(&self, error: anyhow::Error);

    /// Terminal success.
    fn on_complete(&self);
}

/// Produces items for subscribers.
pub trait Publisher<T>: Send + Sync {
    /// Attaches `subscriber`.
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>);
}

/// A pipeline stage: subscribes to `T`, publishes `R`.
pub trait Processor<T, R>: Subscriber<T> + Publisher<R> {}

impl<T, R, P> Processor<T, R> for P where P: Subscriber<T> + Publisher<R> + ?Sized {}

impl<S: Subscription + ?Sized> Subscription for Arc<S> {
    fn request(&self, n: u64) {
        (**self).request(n);
    }

    fn cancel(&self) {
        (**self).cancel();
    }
}

impl<T, S: Subscriber<T> + ?Sized> Subscriber<T> for Arc<S> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        (**self).on_subscribe(subscription);
    }

    fn on_next(&self, item: T) {
        (**self).on_next(item);
    }

    fn on_error(&self, error: anyhow::Error) {
        (**self).on_error(error);
    }

    fn on_complete(&self) {
        (**self).on_complete();
    }
}

impl<T, P: Publisher<T> + ?Sized> Publisher<T> for Arc<P> {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        (**self).subscribe(subscriber);
    }
}
