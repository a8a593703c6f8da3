use crate::constants::{ENV_LOG_FILTER, ENV_LOG_FORMAT, ENV_LOG_LEVEL};
use crate::error::{ContainerError, ContainerResult};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 紧凑格式（默认）
    #[default]
    Compact,
    /// 完整格式
    Full,
    Json,
    /// 美化格式（适合开发）
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// 日志配置
///
/// 可以写在设置文件的 `[logging]` 表中，也可以从环境变量读取。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// 是否显示目标（模块路径）
    pub show_target: bool,
    pub show_thread_ids: bool,
    /// 自定义过滤器，例如 "wirebox_core=debug,my_app=info"
    pub filter: Option<String>,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn show_thread_ids(mut self, show: bool) -> Self {
        self.show_thread_ids = show;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// 从环境变量读取配置，无法解析的值保留默认
    pub fn from_env() -> Self {
        Self::default().apply(|key| std::env::var(key).ok())
    }

    fn apply(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(filter) = lookup(ENV_LOG_FILTER) {
            self.filter = Some(filter);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).and_then(|v| v.parse().ok()) {
            self.level = level;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT).and_then(|v| v.parse().ok()) {
            self.format = format;
        }
        self
    }

    fn env_filter(&self) -> EnvFilter {
        self.filter
            .as_deref()
            .and_then(|filter| EnvFilter::try_new(filter).ok())
            .unwrap_or_else(|| EnvFilter::new(self.level.as_str()))
    }

    /// 安装全局订阅者；已经安装过时返回 `LoggingInit`
    pub fn init(&self) -> ContainerResult<()> {
        let builder = subscriber_fmt()
            .with_env_filter(self.env_filter())
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids);

        let installed = match self.format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Full => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };
        installed.map_err(|e| ContainerError::LoggingInit(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_apply_env_values() {
        let config = LoggingConfig::new().apply(|key| match key {
            ENV_LOG_LEVEL => Some("trace".to_string()),
            ENV_LOG_FORMAT => Some("bogus".to_string()),
            _ => None,
        });
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Compact);
        assert!(config.filter.is_none());
    }

    #[test]
    fn test_deserialize() {
        let config: LoggingConfig = toml::from_str(
            r#"
level = "warn"
format = "json"
show-target = true
"#,
        )
        .unwrap();
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.show_target);
    }
}
