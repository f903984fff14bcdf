//! # Reactive Scope
//!
//! Activation-scoped component instances that stay visible when work hops
//! threads.
//!
//! A request-processing layer begins an activation, components created
//! during it are cached in the activation's store, and any work handed off
//! to another thread (a pool task, a future continuation, a subscriber
//! callback) can be wrapped so it sees the same store when it runs:
//!
//! - **Snapshots**: immutable captures of a thread's current store
//! - **Propagation**: `Snapshot::run` and `Propagated` restore a snapshot
//!   around any closure, then put back whatever the thread had
//! - **Lazy lifecycle**: each component is created at most once and
//!   destroyed at most once per activation, even under racing threads
//! - **Adapters**: executors, task pools, continuation futures,
//!   publish-subscribe stages and poll-scoped futures and streams
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reactive_scope::prelude::*;
//!
//! let manager = ContextManager::new();
//! let key = FnComponent::new("request-state", |_| Ok(RequestState::default())).into_key();
//!
//! let activation = Activation::begin(&manager);
//! let state = manager.get_or_create_as::<RequestState>(&key)?;
//!
//! let task = manager.propagate(move || {
//!     // Same instance, different thread.
//!     let same = manager.get_as::<RequestState>(&key);
//! });
//! std::thread::spawn(move || task.call_once()).join().unwrap();
//!
//! activation.end()?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod activation;
pub mod completion;
pub mod component;
pub mod config;
pub mod context;
pub mod errors;
pub mod executor;
pub mod flow;
pub mod propagation;
pub mod telemetry;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::activation::{Activation, AsyncCompletion, CompletionOutcome};
    pub use crate::completion::ReactiveFuture;
    pub use crate::component::{Component, ComponentKey, CreationToken, FnComponent, Instance};
    pub use crate::config::{RestoreCheck, ScopeConfig, TeardownPolicy};
    pub use crate::context::{ContextManager, ScopeStore, Snapshot};
    pub use crate::errors::{
        BoxError, CreationError, DestructionError, ScopeError, TaskError, TeardownError,
    };
    pub use crate::executor::{
        Executor, Job, ReactiveExecutor, ReactiveTaskPool, Task, TaskPool, TokioTaskPool,
    };
    pub use crate::flow::{
        Processor, Publisher, ReactiveProcessor, ReactivePublisher, ReactiveSubscriber,
        ReactiveSubscription, Subscriber, Subscription,
    };
    pub use crate::propagation::{Propagated, PropagatedFuture, PropagatedStream};
    pub use crate::telemetry::{init_tracing, LogFormat};
}

pub use context::{ContextManager, Snapshot};
pub use errors::ScopeError;
