//! Subscriber capability
//!
//! A `Subscriber` is anything the hub can hold and deliver to. The hub keys
//! subscribers by [`Subscriber::id`] and tells handles apart by pointer
//! identity (`Arc::ptr_eq`), so two subscribers may share an id without being
//! confused with each other on removal.
//!
//! Subscribers are `'static` because `publish` hands them to worker threads
//! that may outlive the call.

use std::fmt::Debug;
use std::hash::Hash;

use crate::utils::error::BoxError;

pub trait Subscriber: Send + Sync + 'static {
    /// Registry key. Several subscribers may share one when the hub allows it.
    type Id: Eq + Hash + Clone + Debug + Send + Sync;

    fn id(&self) -> Self::Id;

    /// Called once before the subscriber is appended to the hub.
    ///
    /// Not called when the subscriber overrides existing ones (duplicate ids
    /// disallowed). Runs outside the hub lock, so it may call back into the hub.
    fn activate(&self) -> Result<(), BoxError>;

    /// Called once when the subscriber leaves the hub through
    /// `unsubscribe`, `terminate`, or displacement by a newer subscriber.
    fn deactivate(&self) -> Result<(), BoxError>;
}
