/// 容器保留名称与环境变量
///
/// 宏、容器与配置加载共用这些标识符，避免各处硬编码

/// 上下文自身在注册表中的保留名称
pub const CONTEXT_COMPONENT_NAME: &str = "Context";

/// 默认配置目录
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// 目录配置仓库识别的扩展名
pub const PROPERTIES_EXTENSION: &str = "properties";
pub const TOML_EXTENSION: &str = "toml";

/// 过滤表达式中键与值的分隔符
pub const FILTER_SEPARATOR: char = '=';

/// 递归扫描命名空间的后缀
pub const RECURSIVE_NAMESPACE_SUFFIX: &str = "::*";

/// 容器设置相关环境变量
pub const ENV_CONFIG_DIR: &str = "WIREBOX_CONFIG_DIR";
pub const ENV_CONFIG_PREFIX: &str = "WIREBOX_ENV_PREFIX";
pub const ENV_STRICT_WIRING: &str = "WIREBOX_STRICT_WIRING";

/// 日志相关环境变量
pub const ENV_LOG_FILTER: &str = "WIREBOX_LOG";
pub const ENV_LOG_LEVEL: &str = "WIREBOX_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "WIREBOX_LOG_FORMAT";

/// 检查名称是否为容器保留名称
pub fn is_reserved_name(name: &str) -> bool {
    name == CONTEXT_COMPONENT_NAME
}
