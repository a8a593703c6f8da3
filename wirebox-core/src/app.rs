use crate::context::Context;
use crate::error::ContainerResult;
use crate::logging::LoggingConfig;
use crate::settings::ContextSettings;
use std::path::PathBuf;
use std::sync::Arc;

/// 默认的容器设置文件
pub const DEFAULT_SETTINGS_FILE: &str = "wirebox.toml";

/// Wirebox 应用
///
/// 提供便捷的启动方式：初始化日志、读取设置文件、启动上下文并记录启动耗时
///
/// ```ignore
/// #[derive(ManagedApplication)]
/// #[packages("my_app::*")]
/// struct MyApp;
///
/// let context = Application::new("my-app").run::<MyApp>()?;
/// ```
pub struct Application {
    /// 应用名称
    name: String,

    /// 设置文件路径，不存在时使用默认设置
    settings_file: PathBuf,

    /// 直接给定的设置，优先于设置文件
    settings: Option<ContextSettings>,

    /// 日志配置，优先于设置中的 `[logging]`
    logging_config: Option<LoggingConfig>,

    show_banner: bool,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings_file: PathBuf::from(DEFAULT_SETTINGS_FILE),
            settings: None,
            logging_config: None,
            show_banner: true,
        }
    }

    /// 设置文件路径
    pub fn settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_file = path.into();
        self
    }

    pub fn settings(mut self, settings: ContextSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// 设置日志配置
    ///
    /// 如果不设置，使用设置文件中的 `[logging]`，再叠加环境变量
    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = Some(config);
        self
    }

    /// 设置是否显示 banner
    pub fn banner(mut self, show: bool) -> Self {
        self.show_banner = show;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 以应用标记 `A` 启动
    pub fn run<A: 'static>(self) -> ContainerResult<Arc<Context>> {
        let settings = self.resolve_settings()?;

        // 日志只能安装一次，重复安装不影响启动
        let logging_config = self.logging_config.clone().unwrap_or_else(|| settings.logging.clone());
        if let Err(e) = logging_config.init() {
            tracing::warn!("Logging not initialized: {}", e);
        }

        let start_time = std::time::Instant::now();
        if self.show_banner {
            self.print_banner();
        }
        tracing::info!("Starting {} application", self.name);
        tracing::debug!("Configuration directory: {}", settings.config_dir.display());

        let context = Context::builder().application::<A>().settings(settings).build()?;

        let elapsed_ms = start_time.elapsed().as_millis();
        tracing::info!("Started {} in {}ms", self.name, elapsed_ms);
        Ok(context)
    }

    /// 显式设置 > 设置文件 > 默认设置，最后叠加环境变量
    fn resolve_settings(&self) -> ContainerResult<ContextSettings> {
        let settings = match &self.settings {
            Some(settings) => settings.clone(),
            None if self.settings_file.exists() => ContextSettings::from_file(&self.settings_file)?,
            None => ContextSettings {
                logging: LoggingConfig::from_env(),
                ..ContextSettings::default()
            },
        };
        Ok(settings.with_env())
    }

    fn print_banner(&self) {
        println!();
        println!(r" __      __ _            _               ");
        println!(r" \ \    / /(_) _ _  ___ | |__  ___ __ __ ");
        println!(r"  \ \/\/ / | || '_|/ -_)| '_ \/ _ \\ \ / ");
        println!(r"   \_/\_/  |_||_|  \___||_.__/\___//_\_\ ");
        println!();
        println!("  :: Wirebox ::        (v{})", env!("CARGO_PKG_VERSION"));
        println!();
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new("WireboxApplication")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_settings_win() {
        let app = Application::new("test")
            .settings_file("does-not-exist.toml")
            .settings(ContextSettings {
                strict_wiring: true,
                ..ContextSettings::default()
            });
        assert!(app.resolve_settings().unwrap().strict_wiring);
    }

    #[test]
    fn test_settings_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "config-dir = \"conf\"").unwrap();
        let app = Application::new("test").settings_file(file.path());
        let settings = app.resolve_settings().unwrap();
        assert_eq!(settings.config_dir, PathBuf::from("conf"));
    }
}
