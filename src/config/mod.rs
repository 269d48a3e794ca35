pub mod container_config;
pub mod loader;

use serde::Deserialize;

pub use container_config::{ContainerConfig, KeyedLookupPolicy, PartialContainerConfig};
pub use loader::ConfigLoader;

pub const CONFIG_FILE_NAME: &str = "keyed-di.toml";

/// Logging section of the configuration file
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// development / testing / production
    pub environment: Option<String>,
    /// tracing level or env-filter directive, overrides the preset level
    pub level: Option<String>,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedDiConfig {
    pub container: ContainerConfig,
    pub logging: LoggingSettings,
}

/// Partial top-level configuration as read from TOML
#[derive(Deserialize, Debug, Default)]
pub struct PartialKeyedDiConfig {
    pub container: Option<PartialContainerConfig>,
    pub logging: Option<LoggingSettings>,
}

impl KeyedDiConfig {
    pub fn from_partial(partial: Option<PartialKeyedDiConfig>) -> Self {
        let partial = partial.unwrap_or_default();
        Self {
            container: ContainerConfig::from_partial(partial.container),
            logging: partial.logging.unwrap_or_default(),
        }
    }
}
