//! Error types for scope management and propagation.
//!
//! Registry failures, activation misuse and task pool failures each get their
//! own type so callers can react differently to "start an activation first"
//! and "this snapshot was restored on the wrong thread".

use std::collections::HashMap;
use std::thread::ThreadId;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Boxed error returned by component factories and destroyers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for scope operations.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// A registry operation needed an active store but none is bound.
    #[error("scope '{scope}' is not active on thread {thread:?}")]
    NotActive {
        /// The configured scope name.
        scope: String,
        /// The calling thread.
        thread: ThreadId,
    },

    /// A thread-bound snapshot was reset from a thread other than its origin.
    #[error("cannot restore a context captured on thread {origin:?} from thread {current:?}")]
    CrossThreadRestore {
        /// The thread that produced the snapshot.
        origin: ThreadId,
        /// The thread attempting the reset.
        current: ThreadId,
    },

    /// A component factory failed.
    #[error(transparent)]
    Creation(#[from] CreationError),

    /// A component destroyer failed.
    #[error(transparent)]
    Destruction(#[from] DestructionError),

    /// One or more destroyers failed while finishing a store.
    #[error(transparent)]
    Teardown(#[from] TeardownError),

    /// A cached instance is not of the requested type.
    #[error("component '{component}' does not hold an instance of {expected}")]
    TypeMismatch {
        /// The component name.
        component: String,
        /// The requested type name.
        expected: &'static str,
    },
}

impl ScopeError {
    /// Creates a not-active error for the calling thread.
    #[must_use]
    pub fn not_active(scope: impl Into<String>) -> Self {
        Self::NotActive {
            scope: scope.into(),
            thread: std::thread::current().id(),
        }
    }

    /// Creates a cross-thread restore error for the calling thread.
    #[must_use]
    pub fn cross_thread_restore(origin: ThreadId) -> Self {
        Self::CrossThreadRestore {
            origin,
            current: std::thread::current().id(),
        }
    }

    /// Returns true if this is a not-active error.
    #[must_use]
    pub const fn is_not_active(&self) -> bool {
        matches!(self, Self::NotActive { .. })
    }

    /// Returns true if this is a cross-thread restore error.
    #[must_use]
    pub const fn is_cross_thread_restore(&self) -> bool {
        matches!(self, Self::CrossThreadRestore { .. })
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();

        let kind = match self {
            Self::NotActive { scope, .. } => {
                map.insert("scope".to_string(), serde_json::json!(scope));
                "NotActive"
            }
            Self::CrossThreadRestore { .. } => "CrossThreadRestore",
            Self::Creation(err) => {
                map.insert("component".to_string(), serde_json::json!(err.component));
                "CreationFailure"
            }
            Self::Destruction(err) => {
                map.insert("component".to_string(), serde_json::json!(err.component));
                "DestructionFailure"
            }
            Self::Teardown(err) => {
                map.insert("store_id".to_string(), serde_json::json!(err.store_id.to_string()));
                map.insert(
                    "components".to_string(),
                    serde_json::json!(err.components()),
                );
                "TeardownFailure"
            }
            Self::TypeMismatch { component, expected } => {
                map.insert("component".to_string(), serde_json::json!(component));
                map.insert("expected".to_string(), serde_json::json!(expected));
                "TypeMismatch"
            }
        };

        map.insert("type".to_string(), serde_json::json!(kind));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Error raised when a component factory fails.
///
/// The bag is left empty so a later lookup may retry creation.
#[derive(Debug, Error)]
#[error("failed to create component '{component}': {source}")]
pub struct CreationError {
    /// The component name.
    pub component: String,
    /// The factory error.
    #[source]
    pub source: BoxError,
}

impl CreationError {
    /// Creates a new creation error.
    #[must_use]
    pub fn new(component: impl Into<String>, source: BoxError) -> Self {
        Self {
            component: component.into(),
            source,
        }
    }
}

/// Error raised when a component destroyer fails.
#[derive(Debug, Error)]
#[error("failed to destroy component '{component}': {source}")]
pub struct DestructionError {
    /// The component name.
    pub component: String,
    /// The destroyer error.
    #[source]
    pub source: BoxError,
}

impl DestructionError {
    /// Creates a new destruction error.
    #[must_use]
    pub fn new(component: impl Into<String>, source: BoxError) -> Self {
        Self {
            component: component.into(),
            source,
        }
    }
}

/// Error raised when finishing a store hit destroyer failures.
#[derive(Debug, Error)]
#[error("{} component(s) failed to tear down in store {store_id}", .failures.len())]
pub struct TeardownError {
    /// The store being finished.
    pub store_id: Uuid,
    /// Every destroyer failure, in the order encountered.
    pub failures: Vec<DestructionError>,
}

impl TeardownError {
    /// Creates a new teardown error.
    #[must_use]
    pub fn new(store_id: Uuid, failures: Vec<DestructionError>) -> Self {
        Self { store_id, failures }
    }

    /// Returns the names of the components that failed to tear down.
    #[must_use]
    pub fn components(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.component.clone()).collect()
    }
}

/// Errors reported by task pools.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The pool refused the task.
    #[error("Task rejected: {reason}")]
    Rejected {
        /// Why the task was refused.
        reason: String,
    },

    /// The task panicked.
    #[error("Task panicked: {message}")]
    Panicked {
        /// The panic payload, if it was a string.
        message: String,
    },

    /// The task was cancelled before it completed.
    #[error("Task cancelled")]
    Cancelled,

    /// The task did not complete in time.
    #[error("Task timed out after {after:?}")]
    TimedOut {
        /// The timeout that elapsed.
        after: Duration,
    },

    /// A batch operation received no tasks.
    #[error("No tasks to invoke")]
    NoTasks,
}

impl TaskError {
    /// Creates a rejected error.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates a panicked error.
    #[must_use]
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::Panicked {
            message: message.into(),
        }
    }
}
