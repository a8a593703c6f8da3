use crate::constants::{PROPERTIES_EXTENSION, TOML_EXTENSION};
use crate::error::{ContainerError, ContainerResult};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// 命名的扁平键值配置
///
/// 通过组件的注册名（或类型简单名）与组件关联。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationSource {
    name: String,
    properties: HashMap<String, String>,
}

impl ConfigurationSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// 是否包含 `key == value`
    pub fn matches(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// 解析 `.properties` 文本
    pub fn from_properties_str(name: impl Into<String>, content: &str) -> Self {
        Self {
            name: name.into(),
            properties: parse_properties(content),
        }
    }

    /// 解析 TOML 文本，嵌套表展平为点分键
    pub fn from_toml_str(name: impl Into<String>, content: &str) -> Result<Self, String> {
        let value: toml::Value =
            toml::from_str(content).map_err(|e| format!("Failed to parse TOML: {}", e))?;
        let mut properties = HashMap::new();
        flatten_toml(&value, String::new(), &mut properties);
        Ok(Self {
            name: name.into(),
            properties,
        })
    }

    fn merge(&mut self, other: ConfigurationSource) {
        self.properties.extend(other.properties);
    }
}

/// 配置仓库：从外部环境加载全部命名配置
pub trait ConfigurationStore: Send + Sync {
    /// 按发现顺序返回全部配置源
    fn load_all(&self) -> ContainerResult<Vec<ConfigurationSource>>;

    fn get(&self, name: &str) -> ContainerResult<Option<ConfigurationSource>> {
        Ok(self
            .load_all()?
            .into_iter()
            .find(|source| source.name() == name))
    }
}

/// 目录配置仓库
///
/// 每个 `*.properties` 或 `*.toml` 文件是一个配置源，名称为去掉扩展名的文件名，
/// 按名称排序。同名的两种文件合并，TOML 中的键覆盖 properties 中的键。
/// 目录不存在时没有任何配置源。
#[derive(Debug, Clone)]
pub struct DirectoryConfigurationStore {
    dir: PathBuf,
}

impl DirectoryConfigurationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read(path: &Path) -> ContainerResult<String> {
        fs::read_to_string(path).map_err(|e| ContainerError::ConfigurationLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn load_file(path: &Path, stem: &str, extension: &str) -> ContainerResult<ConfigurationSource> {
        let content = Self::read(path)?;
        if extension == TOML_EXTENSION {
            ConfigurationSource::from_toml_str(stem, &content).map_err(|reason| {
                ContainerError::ConfigurationLoad {
                    path: path.to_path_buf(),
                    reason,
                }
            })
        } else {
            Ok(ConfigurationSource::from_properties_str(stem, &content))
        }
    }
}

impl ConfigurationStore for DirectoryConfigurationStore {
    fn load_all(&self) -> ContainerResult<Vec<ConfigurationSource>> {
        if !self.dir.is_dir() {
            tracing::debug!("Configuration directory {:?} not found, no sources loaded", self.dir);
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| ContainerError::ConfigurationLoad {
            path: self.dir.clone(),
            reason: e.to_string(),
        })?;

        // properties 排在 toml 之前，合并时后者覆盖前者
        let mut files: Vec<(String, u8, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ContainerError::ConfigurationLoad {
                path: self.dir.clone(),
                reason: e.to_string(),
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let rank = match path.extension().and_then(|e| e.to_str()) {
                Some(PROPERTIES_EXTENSION) => 0,
                Some(TOML_EXTENSION) => 1,
                _ => continue,
            };
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                files.push((stem.to_string(), rank, path.clone()));
            }
        }
        files.sort();

        let mut sources: BTreeMap<String, ConfigurationSource> = BTreeMap::new();
        for (stem, rank, path) in files {
            let extension = if rank == 0 { PROPERTIES_EXTENSION } else { TOML_EXTENSION };
            let loaded = Self::load_file(&path, &stem, extension)?;
            tracing::debug!("Loaded configuration '{}' from {:?} ({} key(s))", stem, path, loaded.len());
            match sources.get_mut(&stem) {
                Some(existing) => existing.merge(loaded),
                None => {
                    sources.insert(stem, loaded);
                }
            }
        }
        Ok(sources.into_values().collect())
    }
}

/// 内存配置仓库（用于测试或嵌入式使用）
#[derive(Debug, Clone, Default)]
pub struct MapConfigurationStore {
    sources: Vec<ConfigurationSource>,
}

impl MapConfigurationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: ConfigurationSource) -> Self {
        self.sources.push(source);
        self
    }

    /// 便捷写法：`store.with("Foo", [("port", "8080")])`
    pub fn with<I, K, V>(self, name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source = properties
            .into_iter()
            .fold(ConfigurationSource::new(name), |source, (k, v)| {
                source.with_property(k, v)
            });
        self.with_source(source)
    }
}

impl ConfigurationStore for MapConfigurationStore {
    fn load_all(&self) -> ContainerResult<Vec<ConfigurationSource>> {
        Ok(self.sources.clone())
    }
}

/// 已加载的配置源集合，保持发现顺序
#[derive(Debug, Clone, Default)]
pub struct Configurations {
    sources: Vec<ConfigurationSource>,
    index: HashMap<String, usize>,
}

impl Configurations {
    /// 同名配置源合并到第一次出现的位置
    pub fn new(sources: Vec<ConfigurationSource>) -> Self {
        let mut configurations = Self::default();
        for source in sources {
            match configurations.index.get(source.name()) {
                Some(&idx) => configurations.sources[idx].merge(source),
                None => {
                    configurations
                        .index
                        .insert(source.name().to_string(), configurations.sources.len());
                    configurations.sources.push(source);
                }
            }
        }
        configurations
    }

    pub fn load(store: &dyn ConfigurationStore) -> ContainerResult<Self> {
        let configurations = Self::new(store.load_all()?);
        tracing::info!("Loaded {} configuration source(s)", configurations.len());
        Ok(configurations)
    }

    pub fn get(&self, name: &str) -> Option<&ConfigurationSource> {
        self.index.get(name).map(|&idx| &self.sources[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigurationSource> {
        self.sources.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(ConfigurationSource::name)
    }

    /// 以 `prefix` 开头的配置源名称，保持发现顺序
    pub fn names_starting_with(&self, prefix: &str) -> Vec<&str> {
        self.names().filter(|name| name.starts_with(prefix)).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// 用环境变量覆盖已有的键
    ///
    /// 变量名为 `{PREFIX}{SOURCE}_{KEY}`，大写，`.` 与 `-` 换成 `_`。
    /// 例如前缀 `APP_` 下 `Foo_prod` 的 `db.url` 对应 `APP_FOO_PROD_DB_URL`。
    pub fn with_env_overrides(self, prefix: &str) -> Self {
        self.with_overrides(prefix, |key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, prefix: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        for source in &mut self.sources {
            let source_part = env_segment(&source.name);
            for (key, value) in source.properties.iter_mut() {
                let variable = format!("{}{}_{}", prefix, source_part, env_segment(key));
                if let Some(overridden) = lookup(&variable) {
                    tracing::debug!("Configuration '{}.{}' overridden by {}", source.name, key, variable);
                    *value = overridden;
                }
            }
        }
        self
    }
}

fn env_segment(raw: &str) -> String {
    raw.replace(['.', '-'], "_").to_uppercase()
}

/// 解析 properties 格式
///
/// 支持 `=` 或 `:` 分隔、`#`/`!` 注释行、行尾反斜杠续行；键和值去掉首尾空白。
fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    let mut logical = String::new();

    for raw_line in content.lines() {
        let line = raw_line.trim_start();
        if logical.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }

        let trailing = line.len() - line.trim_end_matches('\\').len();
        if trailing % 2 == 1 {
            logical.push_str(&line[..line.len() - 1]);
            continue;
        }

        logical.push_str(line);
        insert_property(&mut properties, &logical);
        logical.clear();
    }

    if !logical.is_empty() {
        insert_property(&mut properties, &logical);
    }
    properties
}

fn insert_property(properties: &mut HashMap<String, String>, line: &str) {
    let (key, value) = match line.find(['=', ':']) {
        Some(idx) => (&line[..idx], &line[idx + 1..]),
        None => (line, ""),
    };
    let key = key.trim();
    if key.is_empty() {
        return;
    }
    properties.insert(key.to_string(), value.trim().to_string());
}

/// 展平 TOML 结构
/// 例如: { database: { url: "xxx" } } -> { "database.url": "xxx" }
fn flatten_toml(value: &toml::Value, prefix: String, result: &mut HashMap<String, String>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let new_prefix = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_toml(val, new_prefix, result);
            }
        }
        other => {
            result.insert(prefix, toml_scalar(other));
        }
    }
}

/// 数组以逗号连接
fn toml_scalar(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::Array(items) => items.iter().map(toml_scalar).collect::<Vec<_>>().join(","),
        toml::Value::Table(_) => value.to_string(),
    }
}
