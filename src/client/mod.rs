//! The `client` module defines how a connected chat client takes part in the
//! hub.
//!
//! It provides the `ChatStream` struct, the hub subscriber wrapping a single
//! connection's identity (its username) and the channel used to push
//! messages to it.

pub mod chat_stream;
pub use chat_stream::ChatStream;

#[cfg(test)]
mod tests;
