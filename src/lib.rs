//! # PubHub
//!
//! `pubhub` is a small in-process publish/subscribe hub. Subscribers are
//! grouped by an identity, get lifecycle hooks when they enter and leave the
//! hub, and receive actions either fanned out concurrently to everyone or
//! applied serially to a chosen set of identities.
//!
//! ## Core Modules
//!
//! - `hub`: the subscriber trait, the hub itself and its options.
//! - `client`: `ChatStream`, the subscriber behind one chat connection.
//! - `config`: loading the server configuration from files and environment.
//! - `transport`: the chat protocol and the WebSocket server built on the hub.
//! - `utils`: shared error types and logging setup.

pub mod client;
pub mod config;
pub mod hub;
pub mod transport;
pub mod utils;
