//! A vector-backed publisher and a recording subscriber.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::context::ContextManager;
use crate::flow::{Publisher, Subscriber, Subscription};

/// Publishes a fixed list of items, synchronously, on the requesting thread.
#[derive(Debug, Clone)]
pub struct VecPublisher<T> {
    items: Vec<T>,
}

impl<T> VecPublisher<T> {
    /// Creates a publisher of `items`.
    #[must_use]
    pub const fn new(items: Vec<T>) -> Self {
        Self { items }
    }
}

impl<T> Publisher<T> for VecPublisher<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<T>>) {
        let subscription = Arc::new(VecSubscription {
            remaining: Mutex::new(self.items.iter().cloned().collect()),
            subscriber: Mutex::new(Some(Arc::clone(&subscriber))),
            cancelled: AtomicBool::new(false),
        });
        subscriber.on_subscribe(subscription);
    }
}

struct VecSubscription<T> {
    remaining: Mutex<VecDeque<T>>,
    subscriber: Mutex<Option<Arc<dyn Subscriber<T>>>>,
    cancelled: AtomicBool,
}

impl<T: Send + Sync> Subscription for VecSubscription<T> {
    fn request(&self, n: u64) {
        for _ in 0..n {
            if self.cancelled.load(Ordering::SeqCst) {
                return;
            }
            let Some(subscriber) = self.subscriber.lock().clone() else {
                return;
            };
            let next = self.remaining.lock().pop_front();
            match next {
                Some(item) => subscriber.on_next(item),
                None => {
                    // Taking the subscriber breaks the reference cycle.
                    if self.subscriber.lock().take().is_some() {
                        subscriber.on_complete();
                    }
                    return;
                }
            }
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.subscriber.lock().take();
    }
}

/// Records everything it receives.
///
/// Requests unbounded demand on subscribe. When built with
/// [`observing`](Self::observing), also records the store id current at
/// every callback.
pub struct RecordingSubscriber<T> {
    items: Mutex<Vec<T>>,
    errors: Mutex<Vec<String>>,
    completed: AtomicBool,
    store_ids: Mutex<Vec<Option<Uuid>>>,
    observer: Option<ContextManager>,
}

impl<T> Default for RecordingSubscriber<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            completed: AtomicBool::new(false),
            store_ids: Mutex::new(Vec::new()),
            observer: None,
        }
    }
}

impl<T> RecordingSubscriber<T> {
    /// Creates a recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recorder that also notes `manager`'s current store id at
    /// every callback.
    #[must_use]
    pub fn observing(manager: ContextManager) -> Self {
        Self {
            observer: Some(manager),
            ..Self::default()
        }
    }

    fn observe(&self) {
        if let Some(manager) = &self.observer {
            self.store_ids.lock().push(manager.current().store_id());
        }
    }

    /// Returns true once `on_complete` arrived.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the error messages received.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Returns the store ids observed, one per callback.
    #[must_use]
    pub fn store_ids(&self) -> Vec<Option<Uuid>> {
        self.store_ids.lock().clone()
    }
}

impl<T: Clone> RecordingSubscriber<T> {
    /// Returns the items received.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.items.lock().clone()
    }
}

impl<T: Send> Subscriber<T> for RecordingSubscriber<T> {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        self.observe();
        subscription.request(u64::MAX);
    }

    fn on_next(&self, item: T) {
        self.observe();
        self.items.lock().push(item);
    }

    fn on_error(&self, error: anyhow::Error) {
        self.observe();
        self.errors.lock().push(error.to_string());
    }

    fn on_complete(&self) {
        self.observe();
        self.completed.store(true, Ordering::SeqCst);
    }
}

impl<T> std::fmt::Debug for RecordingSubscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSubscriber")
            .field("items", &self.items.lock().len())
            .field("completed", &self.is_complete())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publishes_all_then_completes() {
        let recorder = Arc::new(RecordingSubscriber::new());
        VecPublisher::new(vec![1, 2, 3]).subscribe(recorder.clone());

        assert_eq!(recorder.items(), vec![1, 2, 3]);
        assert!(recorder.is_complete());
        assert!(recorder.store_ids().is_empty());
    }

    #[test]
    fn test_empty_publisher_completes() {
        let recorder = Arc::new(RecordingSubscriber::<u8>::new());
        VecPublisher::new(Vec::new()).subscribe(recorder.clone());

        assert!(recorder.items().is_empty());
        assert!(recorder.is_complete());
    }
}
