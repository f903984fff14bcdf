//! Testing utilities for scoped components and propagation adapters.
//!
//! This module provides:
//! - A tracked component counting constructions and destructions
//! - Configurable creation delays and failures
//! - A vector-backed publisher and a recording subscriber
//! - Executors that run tasks inline or on a fresh thread

mod components;
mod executors;
mod flow;

pub use components::{Counters, Tracked, TrackedComponent};
pub use executors::{InlineExecutor, ThreadExecutor};
pub use flow::{RecordingSubscriber, VecPublisher};
