//! The `utils` module provides the pieces shared by the hub and the chat
//! example: the error types and the logging setup.

pub mod error;
pub mod logging;

pub use error::{BoxError, HubError, TransportError, describe};
