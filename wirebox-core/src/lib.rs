// wirebox-core: 轻量级控制反转微内核
//
// 发现带标记的组件声明，按依赖顺序构造并装配它们，
// 绑定外部配置值，并在启动与关闭时执行生命周期回调。支持：
// - 静态作用域与访问作用域注入
// - 首选构造器注入（带循环依赖检测）
// - 按配置源创建同一类型的多个命名实例
// - 可插拔的类型转换
// - 自动装配（通过宏）

extern crate self as wirebox_core;

pub mod app;
pub(crate) mod binder;
pub mod binding;
pub mod component;
pub mod config;
pub mod constants;
pub mod context;
pub mod converter;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod injection;
pub mod lifecycle;
pub mod logging;
pub(crate) mod registry;
pub mod resolver;
pub mod scanner;
pub mod scope;
pub mod settings;
pub mod utils;

// Helper trait for lifecycle hooks
// Allows both () and Result<(), E> return types
pub trait IntoResult {
    fn into_result(self) -> anyhow::Result<()>;
}

impl IntoResult for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E: Into<anyhow::Error>> IntoResult for Result<(), E> {
    fn into_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

// 重新导出常用类型
pub use app::Application;
pub use binding::{ConfigurationBinder, ConfigurationSlot, ConfigurationTarget, Setting};
pub use component::{Managed, ManagedComponent, ManagedInstance, ManagedObject};
pub use config::{
    ConfigurationSource, ConfigurationStore, Configurations, DirectoryConfigurationStore,
    MapConfigurationStore,
};
pub use constants::*;
pub use context::{Context, ContextBuilder};
pub use converter::{ConverterFactory, ConverterRegistry, DefaultTypeConverter, TypeConverter};
pub use descriptor::{
    ComponentDescriptor, Constructor, ConstructorArgs, ConstructorParam, DescriptorBuilder,
    TargetKind, TargetType,
};
pub use error::{ContainerError, ContainerResult, ConversionError};
pub use factory::ComponentFactory;
pub use injection::{AccessBinding, InjectionPoint, InjectionSlot, OnAccess, WireTarget, Wired};
pub use lifecycle::LifecycleState;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use resolver::NameResolver;
pub use scanner::{
    ApplicationRegistration, ComponentCatalog, ComponentRegistration, ComponentScanner,
    InventoryScanner, Namespace, StaticScanner,
};
pub use scope::Scope;
pub use settings::ContextSettings;

// 导出 inventory 与派生宏，供宏生成的代码使用
pub use inventory;
pub use wirebox_core_macros::{Managed, ManagedApplication};

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::app::Application;
    pub use crate::binding::Setting;
    pub use crate::component::Managed;
    pub use crate::config::{ConfigurationStore, DirectoryConfigurationStore, MapConfigurationStore};
    pub use crate::context::Context;
    pub use crate::converter::{ConverterFactory, TypeConverter};
    pub use crate::descriptor::TargetType;
    pub use crate::error::{ContainerError, ContainerResult, ConversionError};
    pub use crate::injection::{OnAccess, Wired};
    pub use crate::lifecycle::LifecycleState;
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::settings::ContextSettings;
    pub use wirebox_core_macros::{Managed, ManagedApplication};
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, bail};
}
