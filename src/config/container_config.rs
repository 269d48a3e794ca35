use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// 键控查找未匹配时的处理方式
///
/// TOML 与环境变量共用同一解析规则，大小写不敏感。
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "String")]
pub enum KeyedLookupPolicy {
    /// 返回 `LookupFailed` 错误
    #[default]
    Strict,
    /// 返回 `None`
    Lenient,
}

impl FromStr for KeyedLookupPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(KeyedLookupPolicy::Strict),
            "lenient" => Ok(KeyedLookupPolicy::Lenient),
            _ => Err(ConfigError::InvalidValue {
                field: "keyed_lookup".to_string(),
                value: value.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for KeyedLookupPolicy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for KeyedLookupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyedLookupPolicy::Strict => f.write_str("strict"),
            KeyedLookupPolicy::Lenient => f.write_str("lenient"),
        }
    }
}

/// Configuration for the service container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Reject scoped services resolved from the root container
    pub validate_scopes: bool,

    /// Track the resolution stack and fail on cycles
    pub detect_circular_dependencies: bool,

    pub keyed_lookup: KeyedLookupPolicy,
}

/// Partial container configuration as read from TOML
#[derive(Deserialize, Debug, Default)]
pub struct PartialContainerConfig {
    pub validate_scopes: Option<bool>,
    pub detect_circular_dependencies: Option<bool>,
    pub keyed_lookup: Option<KeyedLookupPolicy>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            validate_scopes: default_validate_scopes(),
            detect_circular_dependencies: default_detect_circular_dependencies(),
            keyed_lookup: KeyedLookupPolicy::default(),
        }
    }
}

impl ContainerConfig {
    /// Create ContainerConfig from partial config with defaults
    pub fn from_partial(partial: Option<PartialContainerConfig>) -> Self {
        let partial = partial.unwrap_or_default();

        Self {
            validate_scopes: partial.validate_scopes.unwrap_or_else(default_validate_scopes),
            detect_circular_dependencies: partial
                .detect_circular_dependencies
                .unwrap_or_else(default_detect_circular_dependencies),
            keyed_lookup: partial.keyed_lookup.unwrap_or_default(),
        }
    }

    pub fn strict_scopes() -> Self {
        Self {
            validate_scopes: true,
            ..Self::default()
        }
    }
}

fn default_validate_scopes() -> bool {
    false
}

fn default_detect_circular_dependencies() -> bool {
    true
}
