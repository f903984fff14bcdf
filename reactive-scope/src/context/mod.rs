//! Scope state and its per-thread binding.
//!
//! This module provides:
//! - Thread-safe instance stores, one per activation
//! - Immutable snapshots for capturing and restoring a thread's store
//! - The context manager owning the per-thread bindings

mod bag;
mod binding;
#[cfg(test)]
mod context_tests;
mod manager;
mod snapshot;
mod store;

pub use manager::ContextManager;
pub use snapshot::Snapshot;
pub use store::ScopeStore;
