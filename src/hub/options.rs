//! Hub construction options
//!
//! Both knobs are fixed when the hub is built:
//! - `concurrency`: number of workers `publish` may run at once (default 5)
//! - `allow_duplicate_ids`: append subscribers sharing an id (default) or let
//!   the newest one replace the others

use std::marker::PhantomData;

use crate::config::HubSettings;
use crate::hub::engine::Hub;
use crate::hub::subscriber::Subscriber;
use crate::utils::error::HubError;

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_ALLOW_DUPLICATE_IDS: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubOptions {
    pub concurrency: usize,
    pub allow_duplicate_ids: bool,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            allow_duplicate_ids: DEFAULT_ALLOW_DUPLICATE_IDS,
        }
    }
}

impl HubOptions {
    /// Rejects a zero worker count instead of clamping it.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.concurrency == 0 {
            return Err(HubError::InvalidConcurrency(self.concurrency));
        }
        Ok(())
    }
}

impl From<&HubSettings> for HubOptions {
    fn from(settings: &HubSettings) -> Self {
        Self {
            concurrency: settings.concurrency,
            allow_duplicate_ids: settings.allow_duplicate_ids,
        }
    }
}

/// Builder returned by [`Hub::builder`].
#[derive(Debug)]
pub struct HubBuilder<S> {
    options: HubOptions,
    _subscriber: PhantomData<fn() -> S>,
}

impl<S: Subscriber> HubBuilder<S> {
    pub(crate) fn new() -> Self {
        Self {
            options: HubOptions::default(),
            _subscriber: PhantomData,
        }
    }

    /// Number of workers used by `publish`. Must be positive.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.options.concurrency = n;
        self
    }

    /// When false, subscribing under a taken id deactivates and replaces
    /// every subscriber registered under it.
    pub fn allow_duplicate_ids(mut self, allow: bool) -> Self {
        self.options.allow_duplicate_ids = allow;
        self
    }

    pub fn build(self) -> Result<Hub<S>, HubError> {
        Hub::with_options(self.options)
    }
}
