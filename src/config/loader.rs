use std::{collections::HashMap, env, fs, path::{Path, PathBuf}};
use crate::errors::ConfigError;

use super::{KeyedDiConfig, KeyedLookupPolicy, PartialKeyedDiConfig, CONFIG_FILE_NAME};

const ENV_VALIDATE_SCOPES: &str = "KEYED_DI_VALIDATE_SCOPES";
const ENV_DETECT_CIRCULAR: &str = "KEYED_DI_DETECT_CIRCULAR_DEPENDENCIES";
const ENV_KEYED_LOOKUP: &str = "KEYED_DI_KEYED_LOOKUP";
const ENV_LOG_ENVIRONMENT: &str = "KEYED_DI_LOG_ENVIRONMENT";
const ENV_LOG_LEVEL: &str = "KEYED_DI_LOG_LEVEL";

/// Configuration loader responsible for loading config from files and environment
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader for `keyed-di.toml` in the current directory
    pub fn new() -> Self {
        Self {
            config_path: PathBuf::from(CONFIG_FILE_NAME),
        }
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration: file values (if the file exists), then environment overrides
    pub fn load_config(&self) -> Result<KeyedDiConfig, ConfigError> {
        let partial = self.load_partial_config()?;
        let config = KeyedDiConfig::from_partial(partial);
        Self::apply_env(config, &Self::collect_env_vars())
    }

    /// Parse configuration from TOML text, without environment overrides
    pub fn from_toml_str(content: &str, origin: &str) -> Result<KeyedDiConfig, ConfigError> {
        let partial: PartialKeyedDiConfig = toml::from_str(content)
            .map_err(|e| ConfigError::TomlParse(origin.to_string(), e))?;
        Ok(KeyedDiConfig::from_partial(Some(partial)))
    }

    fn load_partial_config(&self) -> Result<Option<PartialKeyedDiConfig>, ConfigError> {
        if !self.config_path.exists() {
            tracing::debug!(path = ?self.config_path, "配置文件不存在，使用默认配置");
            return Ok(None);
        }

        let origin = self.config_path.to_string_lossy().to_string();
        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::FileRead(origin.clone(), e))?;

        let partial: PartialKeyedDiConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::TomlParse(origin, e))?;

        tracing::debug!(path = ?self.config_path, "已加载配置文件");
        Ok(Some(partial))
    }

    /// Collect relevant environment variables
    fn collect_env_vars() -> HashMap<String, String> {
        let env_keys = [
            ENV_VALIDATE_SCOPES,
            ENV_DETECT_CIRCULAR,
            ENV_KEYED_LOOKUP,
            ENV_LOG_ENVIRONMENT,
            ENV_LOG_LEVEL,
        ];

        let mut env_map = HashMap::new();
        for key in &env_keys {
            if let Ok(value) = env::var(key) {
                env_map.insert(key.to_string(), value);
            }
        }
        env_map
    }

    /// Apply `KEYED_DI_*` overrides on top of a loaded configuration
    pub fn apply_env(
        mut config: KeyedDiConfig,
        env_map: &HashMap<String, String>,
    ) -> Result<KeyedDiConfig, ConfigError> {
        if let Some(value) = env_map.get(ENV_VALIDATE_SCOPES) {
            config.container.validate_scopes = parse_bool(ENV_VALIDATE_SCOPES, value)?;
        }
        if let Some(value) = env_map.get(ENV_DETECT_CIRCULAR) {
            config.container.detect_circular_dependencies = parse_bool(ENV_DETECT_CIRCULAR, value)?;
        }
        if let Some(value) = env_map.get(ENV_KEYED_LOOKUP) {
            config.container.keyed_lookup = value.parse::<KeyedLookupPolicy>()?;
        }
        if let Some(value) = env_map.get(ENV_LOG_ENVIRONMENT) {
            config.logging.environment = Some(value.clone());
        }
        if let Some(value) = env_map.get(ENV_LOG_LEVEL) {
            config.logging.level = Some(value.clone());
        }
        Ok(config)
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}
