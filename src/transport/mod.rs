//! The `transport` module serves the chat example over WebSockets.
//!
//! It defines the JSON protocol spoken between clients and the server, and
//! the server itself, which turns every connection into a hub subscriber and
//! maps client requests onto hub operations.

pub mod message;
pub mod websocket;

pub use message::{ChatMessage, ClientMessage, ServerMessage};
pub use websocket::{ChatServer, serve, start_chat_server};
