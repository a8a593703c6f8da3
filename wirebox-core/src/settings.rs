use crate::constants::{DEFAULT_CONFIG_DIR, ENV_CONFIG_DIR, ENV_CONFIG_PREFIX, ENV_STRICT_WIRING};
use crate::error::{ContainerError, ContainerResult};
use crate::logging::LoggingConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// 容器自身的设置
///
/// ```toml
/// config-dir = "config"
/// env-prefix = "APP_"
/// strict-wiring = true
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ContextSettings {
    /// 组件配置目录
    pub config_dir: PathBuf,
    /// 设置后允许环境变量覆盖配置值
    pub env_prefix: Option<String>,
    /// 静态注入找不到或找到多个候选时报错，而不是留空
    pub strict_wiring: bool,
    pub logging: LoggingConfig,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            env_prefix: None,
            strict_wiring: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl ContextSettings {
    pub fn from_toml_str(content: &str) -> ContainerResult<Self> {
        toml::from_str(content).map_err(|e| ContainerError::Settings(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ContainerError::ConfigurationLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// 默认设置叠加环境变量
    pub fn from_env() -> Self {
        Self {
            logging: LoggingConfig::from_env(),
            ..Self::default()
        }
        .with_env()
    }

    /// 以环境变量覆盖当前设置
    pub fn with_env(self) -> Self {
        self.apply(|key| std::env::var(key).ok())
    }

    fn apply(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_CONFIG_DIR) {
            self.config_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = lookup(ENV_CONFIG_PREFIX) {
            self.env_prefix = (!prefix.is_empty()).then_some(prefix);
        }
        if let Some(strict) = lookup(ENV_STRICT_WIRING) {
            match strict.trim().parse::<bool>() {
                Ok(strict) => self.strict_wiring = strict,
                Err(_) => tracing::warn!("Ignoring {}={}, expected true or false", ENV_STRICT_WIRING, strict),
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;

    #[test]
    fn test_defaults() {
        let settings = ContextSettings::default();
        assert_eq!(settings.config_dir, PathBuf::from("config"));
        assert!(settings.env_prefix.is_none());
        assert!(!settings.strict_wiring);
    }

    #[test]
    fn test_from_toml() {
        let settings = ContextSettings::from_toml_str(
            r#"
config-dir = "etc/app"
strict-wiring = true

[logging]
level = "debug"
"#,
        )
        .unwrap();
        assert_eq!(settings.config_dir, PathBuf::from("etc/app"));
        assert!(settings.strict_wiring);
        assert_eq!(settings.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_toml() {
        let err = ContextSettings::from_toml_str("strict-wiring = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ContainerError::Settings(_)));
    }

    #[test]
    fn test_apply_env() {
        let settings = ContextSettings::default().apply(|key| match key {
            ENV_CONFIG_DIR => Some("/srv/config".to_string()),
            ENV_CONFIG_PREFIX => Some("APP_".to_string()),
            ENV_STRICT_WIRING => Some("yes".to_string()),
            _ => None,
        });
        assert_eq!(settings.config_dir, PathBuf::from("/srv/config"));
        assert_eq!(settings.env_prefix.as_deref(), Some("APP_"));
        assert!(!settings.strict_wiring);
    }
}
