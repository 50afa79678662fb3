mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{HubSettings, LogSettings, ServerSettings, Settings};

/// Prefix of the environment variables read by [`load_config`],
/// e.g. `PUBHUB__HUB__CONCURRENCY=10`.
pub const ENV_PREFIX: &str = "PUBHUB";

/// Loads the configuration from the default file and environment variables.
///
/// Sources, later ones winning: `config/default.{toml,yaml,json,...}` when
/// present, then `PUBHUB__<SECTION>__<KEY>` environment variables. Whatever is
/// missing falls back to `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}

#[cfg(test)]
mod tests;
