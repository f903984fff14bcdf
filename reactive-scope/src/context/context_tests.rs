//! Concurrency and lifecycle tests for the context module.

#[cfg(test)]
mod tests {
    use crate::config::{ScopeConfig, TeardownPolicy};
    use crate::context::ContextManager;
    use crate::errors::ScopeError;
    use crate::testing::{Tracked, TrackedComponent};
    use crate::component::ComponentKey;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_single_creation_under_race() {
        let manager = ContextManager::new();
        let root = manager.start();
        let component = TrackedComponent::new("raced").with_creation_delay(Duration::from_millis(20));
        let counters = component.counters();
        let key = ComponentKey::new(component);
        let snapshot = manager.current();
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                let snapshot = snapshot.clone();
                let key = key.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let previous = manager.push(&snapshot);
                    barrier.wait();
                    let instance = manager.get_or_create_as::<Tracked>(&key).unwrap();
                    manager.reset(&previous).unwrap();
                    instance
                })
            })
            .collect();

        let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
        assert_eq!(counters.constructed(), 1);

        manager.finish(&root).unwrap();
        manager.reset(&root).unwrap();
        assert_eq!(counters.destroyed(), 1);
    }

    #[test]
    fn test_unrelated_keys_create_independently() {
        let manager = ContextManager::new();
        let root = manager.start();
        let slow = TrackedComponent::new("slow").with_creation_delay(Duration::from_millis(200));
        let slow_key = ComponentKey::new(slow);
        let fast_key = ComponentKey::new(TrackedComponent::new("fast"));
        let snapshot = manager.current();

        let slow_handle = {
            let manager = manager.clone();
            let snapshot = snapshot.clone();
            thread::spawn(move || snapshot.run(|| manager.get_or_create(&slow_key).map(|_| ())))
        };

        thread::sleep(Duration::from_millis(20));
        let started = std::time::Instant::now();
        manager.get_or_create(&fast_key).unwrap();
        assert!(started.elapsed() < Duration::from_millis(150));

        slow_handle.join().unwrap().unwrap();
        manager.finish(&root).unwrap();
        manager.reset(&root).unwrap();
    }

    #[test]
    fn test_push_reset_round_trip() {
        let manager = ContextManager::new();
        let root = manager.start();
        let outer = manager.current();

        let other_root = {
            let other = manager.clone();
            thread::spawn(move || {
                let r = other.start();
                let captured = other.current();
                other.reset(&r).unwrap();
                captured
            })
            .join()
            .unwrap()
        };

        let previous = manager.push(&other_root);
        assert!(manager.current().same_store(&other_root));
        manager.reset(&previous).unwrap();
        assert!(manager.current().same_store(&outer));

        manager.reset(&root).unwrap();

        // Round trip from an unbound thread returns to unbound.
        let previous = manager.push(&outer);
        assert!(manager.is_active());
        manager.reset(&previous).unwrap();
        assert!(!manager.is_active());
    }

    #[test]
    fn test_push_empty_snapshot_clears() {
        let manager = ContextManager::new();
        let root = manager.start();
        let empty = thread::spawn({
            let manager = manager.clone();
            move || manager.current()
        })
        .join()
        .unwrap();

        let previous = manager.push(&empty);
        assert!(!manager.is_active());
        manager.reset(&previous).unwrap();
        assert!(manager.is_active());

        manager.reset(&root).unwrap();
    }

    #[test]
    fn test_cross_thread_restore_rejected() {
        let manager = ContextManager::new();
        let placeholder = manager.current();
        assert!(placeholder.is_thread_bound());

        let result = thread::spawn({
            let manager = manager.clone();
            move || manager.reset(&placeholder)
        })
        .join()
        .unwrap();

        assert!(matches!(result, Err(ScopeError::CrossThreadRestore { .. })));
    }

    #[test]
    fn test_root_snapshot_reset_elsewhere_rejected() {
        let manager = ContextManager::new();
        let root = manager.start();

        let result = thread::scope(|s| s.spawn(|| root.release()).join().unwrap());
        assert!(result.unwrap_err().is_cross_thread_restore());
        assert!(manager.is_active());

        root.release().unwrap();
        assert!(!manager.is_active());
    }

    #[test]
    fn test_finish_continues_after_failure() {
        let manager = ContextManager::new();
        let root = manager.start();
        let failing = TrackedComponent::new("failing").failing_destroy();
        let healthy = TrackedComponent::new("healthy");
        let healthy_counters = healthy.counters();
        let failing_key = ComponentKey::new(failing);
        let healthy_key = ComponentKey::new(healthy);
        manager.get_or_create(&failing_key).unwrap();
        manager.get_or_create(&healthy_key).unwrap();

        let err = manager.finish(&root).unwrap_err();
        match err {
            ScopeError::Teardown(teardown) => {
                assert_eq!(teardown.components(), vec!["failing".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(healthy_counters.destroyed(), 1);
        assert!(root.store().unwrap().is_empty());

        // The failed bag was consumed; a second finish has nothing left to do.
        manager.finish(&root).unwrap();
        manager.reset(&root).unwrap();
    }

    #[test]
    fn test_finish_abort_leaves_remaining() {
        let manager = ContextManager::with_config(
            ScopeConfig::new().with_teardown_policy(TeardownPolicy::AbortOnFirstFailure),
        );
        let root = manager.start();
        let keys: Vec<_> = (0..4)
            .map(|i| ComponentKey::new(TrackedComponent::new(format!("c{i}")).failing_destroy()))
            .collect();
        for key in &keys {
            manager.get_or_create(key).unwrap();
        }

        let err = manager.finish(&root).unwrap_err();
        match err {
            ScopeError::Teardown(teardown) => assert_eq!(teardown.failures.len(), 1),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(root.store().unwrap().len(), 3);

        manager.reset(&root).unwrap();
    }

    #[test]
    fn test_creation_retry_after_failure() {
        let manager = ContextManager::new();
        let root = manager.start();
        let component = TrackedComponent::new("flaky").failing_creations(1);
        let counters = component.counters();
        let key = ComponentKey::new(component);

        assert!(matches!(manager.get_or_create(&key), Err(ScopeError::Creation(_))));
        assert_eq!(counters.constructed(), 0);

        manager.get_or_create(&key).unwrap();
        assert_eq!(counters.constructed(), 1);

        manager.finish(&root).unwrap();
        manager.reset(&root).unwrap();
    }

    #[test]
    fn test_managers_are_isolated() {
        let first = ContextManager::new();
        let second = ContextManager::new();
        let root = first.start();

        assert!(first.is_active());
        assert!(!second.is_active());

        first.reset(&root).unwrap();
    }
}
