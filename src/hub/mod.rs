//! The `hub` module is the publish/subscribe dispatch core: a registry of
//! subscribers keyed by id, plus the broadcast and targeted publish operations.

pub mod engine;
pub mod options;
pub mod subscriber;

pub use engine::Hub;
pub use options::{HubBuilder, HubOptions};
pub use subscriber::Subscriber;
