//! The propagation primitive.
//!
//! Every adapter in this crate reduces to [`Snapshot::run`]: push the
//! captured snapshot, run the closure, restore whatever the thread had
//! before. [`Propagated`] binds a closure to a snapshot once and adapts the
//! common call shapes onto `run`.

mod future;

pub use future::{PropagatedFuture, PropagatedStream};

use crate::context::{ContextManager, Snapshot};
use tracing::warn;

/// Restores the previous binding when dropped, including during unwinding.
struct RestoreGuard {
    previous: Snapshot,
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if let Err(err) = self.previous.release() {
            warn!(error = %err, "failed to restore previous context");
        }
    }
}

impl Snapshot {
    /// Runs `f` on the calling thread with this snapshot's store installed,
    /// then restores the thread's previous binding.
    pub fn run<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _restore = RestoreGuard {
            previous: self.manager().push(self),
        };
        f()
    }

    /// Binds `f` to this snapshot.
    ///
    /// Every later invocation, on any thread, runs under this same snapshot.
    #[must_use]
    pub fn wrap<F>(&self, f: F) -> Propagated<F> {
        Propagated {
            snapshot: self.clone(),
            inner: f,
        }
    }
}

impl ContextManager {
    /// Binds `f` to the calling thread's current snapshot.
    #[must_use]
    pub fn propagate<F>(&self, f: F) -> Propagated<F> {
        self.current().wrap(f)
    }
}

/// A closure bound to a captured snapshot.
///
/// The snapshot is captured once; each call pushes it and restores the
/// calling thread's previous binding afterwards.
#[derive(Clone, Debug)]
pub struct Propagated<F> {
    snapshot: Snapshot,
    inner: F,
}

impl<F> Propagated<F> {
    /// Returns the captured snapshot.
    #[must_use]
    pub const fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Unwraps into the captured snapshot and the original closure.
    pub fn into_parts(self) -> (Snapshot, F) {
        (self.snapshot, self.inner)
    }

    /// Calls a one-shot closure under the snapshot.
    pub fn call_once<R>(self) -> R
    where
        F: FnOnce() -> R,
    {
        let Self { snapshot, inner } = self;
        snapshot.run(inner)
    }

    /// Calls a reusable closure under the snapshot.
    pub fn call<R>(&self) -> R
    where
        F: Fn() -> R,
    {
        self.snapshot.run(&self.inner)
    }

    /// Calls a mutable closure under the snapshot.
    pub fn call_mut<R>(&mut self) -> R
    where
        F: FnMut() -> R,
    {
        let inner = &mut self.inner;
        self.snapshot.run(inner)
    }

    /// Calls a one-argument closure under the snapshot.
    pub fn apply<A, R>(&self, arg: A) -> R
    where
        F: Fn(A) -> R,
    {
        self.snapshot.run(|| (self.inner)(arg))
    }

    /// Calls a one-shot one-argument closure under the snapshot.
    pub fn apply_once<A, R>(self, arg: A) -> R
    where
        F: FnOnce(A) -> R,
    {
        let Self { snapshot, inner } = self;
        snapshot.run(move || inner(arg))
    }

    /// Calls a two-argument closure under the snapshot.
    pub fn apply2<A, B, R>(&self, a: A, b: B) -> R
    where
        F: Fn(A, B) -> R,
    {
        self.snapshot.run(|| (self.inner)(a, b))
    }

    /// Calls a one-shot two-argument closure under the snapshot.
    pub fn apply2_once<A, B, R>(self, a: A, b: B) -> R
    where
        F: FnOnce(A, B) -> R,
    {
        let Self { snapshot, inner } = self;
        snapshot.run(move || inner(a, b))
    }

    /// Converts into a plain one-shot closure.
    pub fn into_fn_once<R>(self) -> impl FnOnce() -> R
    where
        F: FnOnce() -> R,
    {
        move || self.call_once()
    }

    /// Converts into a plain reusable closure.
    pub fn into_fn<R>(self) -> impl Fn() -> R
    where
        F: Fn() -> R,
    {
        move || self.call()
    }

    /// Converts into a plain one-argument closure.
    pub fn into_fn1<A, R>(self) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
    {
        move |arg| self.apply(arg)
    }

    /// Converts into a plain two-argument closure.
    pub fn into_fn2<A, B, R>(self) -> impl Fn(A, B) -> R
    where
        F: Fn(A, B) -> R,
    {
        move |a, b| self.apply2(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentKey;
    use crate::testing::{Tracked, TrackedComponent};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_run_restores_previous_binding() {
        let manager = ContextManager::new();
        let root = manager.start();
        let captured = manager.current();
        manager.reset(&root).unwrap();

        assert!(!manager.is_active());
        let inside = captured.run(|| manager.is_active());
        assert!(inside);
        assert!(!manager.is_active());
    }

    #[test]
    fn test_run_restores_on_panic() {
        let manager = ContextManager::new();
        let root = manager.start();
        let captured = manager.current();
        manager.reset(&root).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            captured.run(|| panic!("boom"));
        }));

        assert!(result.is_err());
        assert!(!manager.is_active());
    }

    #[test]
    fn test_wrap_captures_at_wrap_time() {
        let manager = ContextManager::new();
        let root = manager.start();
        let wrapped = manager.propagate(|| 1);
        manager.reset(&root).unwrap();

        let next = manager.start();
        let seen = manager.propagate(|| ()).snapshot().store_id();
        assert_ne!(wrapped.snapshot().store_id(), seen);
        manager.reset(&next).unwrap();
    }

    #[test]
    fn test_call_shapes_share_the_snapshot() {
        let manager = ContextManager::new();
        let root = manager.start();
        let key = ComponentKey::new(TrackedComponent::new("shared"));
        let instance = manager.get_or_create_as::<Tracked>(&key).unwrap();
        instance.set_label("seen");

        let lookup = {
            let manager = manager.clone();
            let key = key.clone();
            move || {
                manager
                    .get_as::<Tracked>(&key)
                    .ok()
                    .flatten()
                    .map(|t| t.label())
            }
        };
        let zero = manager.propagate(lookup.clone());
        let one = manager.propagate({
            let lookup = lookup.clone();
            move |suffix: &str| lookup().map(|l| format!("{l}{suffix}"))
        });
        let two = manager.propagate(move |a: &str, b: &str| lookup().map(|l| format!("{a}{l}{b}")));
        manager.reset(&root).unwrap();

        let (z, o, t) = thread::spawn(move || (zero.call(), one.apply("!"), two.apply2("<", ">")))
            .join()
            .unwrap();

        assert_eq!(z.as_deref(), Some("seen"));
        assert_eq!(o.as_deref(), Some("seen!"));
        assert_eq!(t.as_deref(), Some("<seen>"));

        manager.finish(&root).unwrap();
    }

    #[test]
    fn test_call_mut_and_conversions() {
        let manager = ContextManager::new();
        let root = manager.start();
        let counter = Arc::new(AtomicUsize::new(0));

        let mut hits = 0;
        let mut counting = manager.propagate(|| {
            hits += 1;
            hits
        });
        assert_eq!(counting.call_mut(), 1);
        assert_eq!(counting.call_mut(), 2);

        let c = counter.clone();
        let plain = manager
            .propagate(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .into_fn();
        manager.reset(&root).unwrap();

        let m = manager.clone();
        let active = manager.propagate(move || m.is_active()).into_fn_once();
        thread::spawn(move || {
            plain();
            plain();
            assert!(!active());
        })
        .join()
        .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        let double = manager.propagate(|x: u32| x * 2).into_fn1();
        let sum = manager.propagate(|a: u32, b: u32| a + b).into_fn2();
        assert_eq!(double(21), 42);
        assert_eq!(sum(40, 2), 42);
    }

    #[test]
    fn test_concurrent_invocations_are_isolated() {
        let manager = ContextManager::new();
        let root = manager.start();
        let key = ComponentKey::new(TrackedComponent::new("iso"));
        manager.get_or_create(&key).unwrap();
        let wrapped = Arc::new(manager.propagate({
            let manager = manager.clone();
            let key = key.clone();
            move || manager.get(&key).is_some()
        }));
        manager.reset(&root).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let wrapped = wrapped.clone();
                let manager = manager.clone();
                thread::spawn(move || {
                    let before = manager.is_active();
                    let inside = wrapped.call();
                    let after = manager.is_active();
                    (before, inside, after)
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), (false, true, false));
        }
        manager.finish(&root).unwrap();
    }
}
