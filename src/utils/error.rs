//! The `error` module defines the error types returned by the hub and the
//! chat server built on it.
//!
//! Every hub operation returns [`HubError`]. Subscriber hooks and publish
//! actions report failures as a [`BoxError`], which the hub wraps together with
//! the identity of the subscriber involved so callers can tell which one broke.

use thiserror::Error;

/// Boxed error produced by subscriber hooks and publish actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum HubError {
    /// `activate()` failed while subscribing; the subscriber was not registered.
    #[error("failed to activate subscriber {id}")]
    Activation {
        id: String,
        #[source]
        source: BoxError,
    },

    /// `deactivate()` failed; the registry is left as described by the operation.
    #[error("failed to deactivate subscriber {id}")]
    Deactivation {
        id: String,
        #[source]
        source: BoxError,
    },

    /// A publish action returned an error for this subscriber.
    #[error("failed to deliver to subscriber {id}")]
    Delivery {
        id: String,
        #[source]
        source: BoxError,
    },

    #[error("publish worker panicked")]
    WorkerPanicked,

    #[error("failed to spawn publish worker")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("concurrency must be a positive integer, got {0}")]
    InvalidConcurrency(usize),
}

impl HubError {
    pub(crate) fn activation(id: &impl std::fmt::Debug, source: BoxError) -> Self {
        Self::Activation {
            id: format!("{id:?}"),
            source,
        }
    }

    pub(crate) fn deactivation(id: &impl std::fmt::Debug, source: BoxError) -> Self {
        Self::Deactivation {
            id: format!("{id:?}"),
            source,
        }
    }

    pub(crate) fn delivery(id: &impl std::fmt::Debug, source: BoxError) -> Self {
        Self::Delivery {
            id: format!("{id:?}"),
            source,
        }
    }
}

/// Errors raised by the chat server and its subscriber streams.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Hub(#[from] HubError),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid username: {0}")]
    InvalidUsername(String),

    #[error("connection {0} is closed")]
    Disconnected(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking hub task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Renders an error followed by its sources, separated by `": "`.
pub fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
