use thiserror::Error;

/// 容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 服务描述符不完整（例如没有实例、工厂或实现类型）
    #[error("Invalid service descriptor for '{service_type}': {reason}")]
    InvalidDescriptor { service_type: String, reason: String },

    /// 服务未注册 - 包含可用服务和建议
    #[error(
        "Service '{}' is not registered{}",
        .type_name,
        describe_missing(.available_services, .suggestion)
    )]
    ServiceNotRegistered {
        type_name: String,
        available_services: Vec<String>,
        suggestion: Option<String>,
    },

    /// 循环依赖检测 - 包含依赖链
    #[error("Circular dependency detected in chain: {}. Cycle at: {}", .service_chain.join(" -> "), .cycle_point)]
    CircularDependency {
        service_chain: Vec<String>,
        cycle_point: String,
    },

    /// 服务创建失败
    #[error("Failed to create service '{service_type}': {reason}")]
    ServiceCreationFailed {
        service_type: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// 类型转换失败
    #[error("Type cast failed: expected '{expected_type}' in {context}")]
    TypeCastFailed {
        expected_type: String,
        context: String,
    },

    /// 作用域错误
    #[error("Scope '{scope_name}' error during '{operation}': {reason}")]
    ScopeError {
        scope_name: String,
        operation: String,
        reason: String,
    },
}

impl ContainerError {
    /// Wraps an arbitrary error raised by a user factory.
    pub fn creation_failed<E>(service_type: &str, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ContainerError::ServiceCreationFailed {
            service_type: service_type.to_string(),
            reason: error.to_string(),
            source: Some(Box::new(error)),
        }
    }
}

fn describe_missing(available: &[String], suggestion: &Option<String>) -> String {
    let mut out = String::new();
    if !available.is_empty() {
        out.push_str(". Available services: ");
        out.push_str(&available.join(", "));
    }
    if let Some(suggestion) = suggestion {
        out.push_str(". Did you mean: ");
        out.push_str(suggestion);
        out.push('?');
    }
    out
}

/// 键控服务错误
#[derive(Debug, Error)]
pub enum KeyedServiceError {
    /// 键控注册无法被改写（构建期致命错误）
    #[error("Invalid keyed registration for '{service_type}': {reason}")]
    Configuration { service_type: String, reason: String },

    /// 没有与请求键匹配的键控注册
    #[error("No keyed service '{service_type}' registered for key {key}")]
    LookupFailed { service_type: String, key: String },

    #[error(transparent)]
    Container(#[from] ContainerError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid value '{value}' for '{field}'")]
    InvalidValue { field: String, value: String },
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_not_registered_message() {
        let err = ContainerError::ServiceNotRegistered {
            type_name: "app::Cache".to_string(),
            available_services: vec!["app::Config".to_string()],
            suggestion: Some("resolve it with a key".to_string()),
        };
        let message = err.to_string();
        assert!(message.starts_with("Service 'app::Cache' is not registered"));
        assert!(message.contains("Available services: app::Config"));
        assert!(message.contains("Did you mean: resolve it with a key?"));
    }

    #[test]
    fn test_service_not_registered_without_hints() {
        let err = ContainerError::ServiceNotRegistered {
            type_name: "app::Cache".to_string(),
            available_services: Vec::new(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "Service 'app::Cache' is not registered");
    }

    #[test]
    fn test_circular_dependency_message() {
        let err = ContainerError::CircularDependency {
            service_chain: vec!["A".to_string(), "B".to_string()],
            cycle_point: "A".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Circular dependency detected in chain: A -> B. Cycle at: A"
        );
    }

    #[test]
    fn test_keyed_error_wraps_container_error() {
        let err: KeyedServiceError = ContainerError::TypeCastFailed {
            expected_type: "u32".to_string(),
            context: "test".to_string(),
        }
        .into();
        assert!(matches!(err, KeyedServiceError::Container(_)));
        assert_eq!(err.to_string(), "Type cast failed: expected 'u32' in test");
    }
}
