use serde::Deserialize;

use crate::hub::options::{DEFAULT_ALLOW_DUPLICATE_IDS, DEFAULT_CONCURRENCY};

/// Top-level configuration settings for the application.
///
/// Includes settings for the chat server, the hub it dispatches through and
/// the log output.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub hub: HubSettings,
    pub log: LogSettings,
}

/// Address the chat server binds to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Options the hub is constructed with.
///
/// `concurrency` bounds how many deliveries a broadcast runs at once and must
/// be positive. `allow_duplicate_ids` selects whether subscribers sharing an id
/// are appended or replace each other.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct HubSettings {
    pub concurrency: usize,
    pub allow_duplicate_ids: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every field is optional; missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub hub: Option<PartialHubSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialHubSettings {
    pub concurrency: Option<usize>,
    pub allow_duplicate_ids: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            hub: HubSettings::default(),
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            allow_duplicate_ids: DEFAULT_ALLOW_DUPLICATE_IDS,
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge(self, defaults: Settings) -> Settings {
        let server = self.server;
        let hub = self.hub;
        let log = self.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(defaults.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(defaults.server.port),
            },
            hub: HubSettings {
                concurrency: hub
                    .as_ref()
                    .and_then(|h| h.concurrency)
                    .unwrap_or(defaults.hub.concurrency),
                allow_duplicate_ids: hub
                    .as_ref()
                    .and_then(|h| h.allow_duplicate_ids)
                    .unwrap_or(defaults.hub.allow_duplicate_ids),
            },
            log: LogSettings {
                level: log
                    .and_then(|l| l.level)
                    .unwrap_or(defaults.log.level),
            },
        }
    }
}
