use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;
use crate::errors::ConfigError;

/// 日志环境配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingEnvironment {
    Development,
    Testing,
    Production,
}

/// 日志格式配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 人类可读格式
    Pretty,
    /// 紧凑格式
    Compact,
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub environment: LoggingEnvironment,
    /// 默认级别；`RUST_LOG` 存在时以它为准
    pub level: Level,
    /// 额外的 env-filter 指令（例如 `keyed_di=trace`）
    pub directive: Option<String>,
    pub format: LogFormat,
    pub show_target: bool,
    pub show_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl LoggingConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        Self {
            environment: LoggingEnvironment::Development,
            level: Level::DEBUG,
            directive: None,
            format: LogFormat::Pretty,
            show_target: true,
            show_thread_ids: true,
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        Self {
            environment: LoggingEnvironment::Production,
            level: Level::INFO,
            directive: None,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
        }
    }

    /// 创建测试环境配置
    pub fn testing() -> Self {
        Self {
            environment: LoggingEnvironment::Testing,
            level: Level::ERROR,
            directive: None,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
        }
    }

    /// 由配置文件中的 `[logging]` 段构建
    pub fn from_settings(settings: &LoggingSettings) -> Result<Self, ConfigError> {
        let mut config = match settings.environment.as_deref().map(str::to_ascii_lowercase) {
            None => Self::default(),
            Some(env) => match env.as_str() {
                "development" | "dev" => Self::development(),
                "testing" | "test" => Self::testing(),
                "production" | "prod" => Self::production(),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "logging.environment".to_string(),
                        value: env,
                    })
                }
            },
        };

        if let Some(level) = settings.level.as_deref() {
            match level.parse::<Level>() {
                Ok(level) => config.level = level,
                Err(_) => config.directive = Some(level.to_string()),
            }
        }
        Ok(config)
    }

    fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        let directive = self
            .directive
            .clone()
            .unwrap_or_else(|| self.level.to_string().to_lowercase());
        let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(from_env) if !from_env.trim().is_empty() => EnvFilter::try_new(from_env),
            _ => EnvFilter::try_new(directive),
        };
        filter.map_err(|e| ConfigError::Logging(e.to_string()))
    }
}

/// 初始化日志系统；已安装全局 subscriber 时返回错误
pub fn init_logging(config: LoggingConfig) -> Result<(), ConfigError> {
    let filter = config.env_filter()?;
    let ansi = config.environment != LoggingEnvironment::Production;

    let result = match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(ansi);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids)
                .with_ansi(ansi);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
    };
    result.map_err(|e| ConfigError::Logging(e.to_string()))?;

    tracing::info!(
        environment = ?config.environment,
        level = ?config.level,
        format = ?config.format,
        "Logging system initialized"
    );

    Ok(())
}

/// 操作性能计时器
pub struct OperationTimer {
    start: Instant,
    operation: String,
    metadata: HashMap<String, String>,
    finished: bool,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            start: Instant::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
            finished: false,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// 完成计时并记录日志
    pub fn finish(mut self) {
        self.finished = true;
        let duration = self.start.elapsed();

        tracing::debug!(
            operation = %self.operation,
            duration_us = duration.as_micros(),
            metadata = ?self.metadata,
            "Operation completed"
        );
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // 未调用 finish：操作提前失败返回
        tracing::debug!(
            operation = %self.operation,
            duration_us = self.start.elapsed().as_micros(),
            metadata = ?self.metadata,
            "Operation aborted"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(LoggingConfig::development().level, Level::DEBUG);
        assert_eq!(LoggingConfig::testing().level, Level::ERROR);
        assert_eq!(LoggingConfig::production().format, LogFormat::Compact);
    }

    #[test]
    fn test_from_settings() {
        let settings = LoggingSettings {
            environment: Some("production".to_string()),
            level: Some("warn".to_string()),
        };
        let config = LoggingConfig::from_settings(&settings).unwrap();
        assert_eq!(config.environment, LoggingEnvironment::Production);
        assert_eq!(config.level, Level::WARN);
        assert!(config.directive.is_none());

        let settings = LoggingSettings {
            environment: None,
            level: Some("keyed_di=trace".to_string()),
        };
        let config = LoggingConfig::from_settings(&settings).unwrap();
        assert_eq!(config.directive.as_deref(), Some("keyed_di=trace"));
    }

    #[test]
    fn test_unknown_environment_is_rejected() {
        let settings = LoggingSettings {
            environment: Some("staging".to_string()),
            level: None,
        };
        assert!(matches!(
            LoggingConfig::from_settings(&settings),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("unit").with_metadata("k", "v");
        assert!(timer.elapsed() < Duration::from_secs(5));
        timer.finish();
    }
}
