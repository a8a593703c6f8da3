use std::path::PathBuf;
use thiserror::Error;

/// 容器统一结果类型
pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

/// 容器错误
///
/// 初始化阶段的任何错误都会中止 `init`，调用方不会拿到半初始化的上下文。
/// 错误信息尽量携带出错的组件名与字段名。
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 找不到应用标记，或标记未声明扫描包
    #[error("application initialization failed: {0}")]
    ApplicationInitialization(String),

    /// 单个组件构造失败
    #[error("failed to instantiate component '{component}': {source}")]
    Instantiation {
        component: String,
        #[source]
        source: anyhow::Error,
    },

    /// 首选构造器之间存在循环依赖
    #[error("cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// 字段赋值时类型不匹配
    #[error("cannot wire field '{field}' of component '{component}': {reason}")]
    DependencyWiring {
        component: String,
        field: String,
        reason: String,
    },

    /// 按访问作用域的目标既不是接口也不是受管组件
    #[error("illegal wiring target '{target}': neither an interface nor a managed component")]
    IllegalWiring { target: String },

    #[error("no matching component for '{target}'{}", .name.as_ref().map(|n| format!(" named '{n}'")).unwrap_or_default())]
    MatchingDependencyNotFound {
        target: String,
        name: Option<String>,
    },

    #[error("ambiguous dependency '{target}': candidates {}", .candidates.join(", "))]
    AmbiguousDependency {
        target: String,
        candidates: Vec<String>,
    },

    /// 配置值转换失败
    #[error("cannot configure field '{field}' of component '{component}': {source}")]
    Configuration {
        component: String,
        field: String,
        #[source]
        source: ConversionError,
    },

    /// 生命周期回调失败
    #[error("lifecycle hook '{hook}' of component '{component}' failed: {source}")]
    LifecycleHook {
        component: String,
        hook: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("component name '{0}' is already registered")]
    DuplicateComponent(String),

    /// 上下文已关闭
    #[error("context has been closed")]
    ContextClosed,

    /// 最近一次重建失败，注册表已清空
    #[error("context failed to initialize, register a component to rebuild it")]
    ContextFailed,

    /// 注入点尚未被容器装配
    #[error("injection point for '{0}' has not been wired")]
    UnboundInjectionPoint(String),

    #[error("failed to load configuration from {path:?}: {reason}")]
    ConfigurationLoad { path: PathBuf, reason: String },

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}

impl ContainerError {
    /// 包装为实例化错误，循环依赖保持原样向上传播
    pub fn instantiation(component: impl Into<String>, source: ContainerError) -> Self {
        match source {
            cycle @ ContainerError::CyclicDependency { .. } => cycle,
            other => ContainerError::Instantiation {
                component: component.into(),
                source: anyhow::Error::new(other),
            },
        }
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(self, ContainerError::CyclicDependency { .. })
    }
}

/// 字符串到目标类型的转换失败
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot convert '{value}' to {target}: {reason}")]
pub struct ConversionError {
    pub target: String,
    pub value: String,
    pub reason: String,
}

impl ConversionError {
    pub fn new(target: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(target: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(target, value, "no converter registered for this type")
    }
}
