use crate::constants::RECURSIVE_NAMESPACE_SUFFIX;
use crate::descriptor::{ComponentDescriptor, TargetType};
use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

/// 组件注册项 - 由 `#[derive(Managed)]` 通过 inventory 提交
pub struct ComponentRegistration {
    describe: fn() -> ComponentDescriptor,
}

impl ComponentRegistration {
    pub const fn new(describe: fn() -> ComponentDescriptor) -> Self {
        Self { describe }
    }

    pub fn describe(&self) -> ComponentDescriptor {
        (self.describe)()
    }
}

inventory::collect!(ComponentRegistration);

/// 应用标记注册项 - 由 `#[derive(ManagedApplication)]` 提交，声明扫描的根命名空间
pub struct ApplicationRegistration {
    type_id: fn() -> TypeId,
    type_name: &'static str,
    packages: &'static [&'static str],
}

impl ApplicationRegistration {
    pub const fn new(
        type_id: fn() -> TypeId,
        type_name: &'static str,
        packages: &'static [&'static str],
    ) -> Self {
        Self {
            type_id,
            type_name,
            packages,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn packages(&self) -> &'static [&'static str] {
        self.packages
    }

    /// 查找类型 `id` 的应用标记
    pub fn find(id: TypeId) -> Option<&'static ApplicationRegistration> {
        inventory::iter::<ApplicationRegistration>().find(|app| (app.type_id)() == id)
    }
}

inventory::collect!(ApplicationRegistration);

/// 扫描根命名空间
///
/// - `a::b` 只匹配模块 `a::b`
/// - `a::b::*` 匹配 `a::b` 及其全部子模块
/// - `*` 或空字符串匹配全部
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    path: String,
    recursive: bool,
}

impl Namespace {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == "*" {
            return Self {
                path: String::new(),
                recursive: true,
            };
        }
        match raw.strip_suffix(RECURSIVE_NAMESPACE_SUFFIX) {
            Some(path) => Self {
                path: path.to_string(),
                recursive: true,
            },
            None => Self {
                path: raw.to_string(),
                recursive: false,
            },
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn matches(&self, module_path: &str) -> bool {
        if !self.recursive {
            return module_path == self.path;
        }
        if self.path.is_empty() || module_path == self.path {
            return true;
        }
        module_path
            .strip_prefix(self.path.as_str())
            .is_some_and(|rest| rest.starts_with("::"))
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.path.is_empty(), self.recursive) {
            (true, _) => write!(f, "*"),
            (false, true) => write!(f, "{}{}", self.path, RECURSIVE_NAMESPACE_SUFFIX),
            (false, false) => write!(f, "{}", self.path),
        }
    }
}

/// 元数据扫描器
pub trait ComponentScanner: Send + Sync {
    fn scan(&self, namespaces: &[Namespace]) -> ComponentCatalog;
}

/// 扫描 inventory 中注册的全部组件
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryScanner;

impl ComponentScanner for InventoryScanner {
    fn scan(&self, namespaces: &[Namespace]) -> ComponentCatalog {
        let descriptors = inventory::iter::<ComponentRegistration>().map(ComponentRegistration::describe);
        ComponentCatalog::collect(descriptors, namespaces)
    }
}

/// 显式描述符表
#[derive(Debug, Clone, Default)]
pub struct StaticScanner {
    descriptors: Vec<ComponentDescriptor>,
}

impl StaticScanner {
    pub fn new(descriptors: Vec<ComponentDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn with(mut self, descriptor: ComponentDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }
}

impl ComponentScanner for StaticScanner {
    fn scan(&self, namespaces: &[Namespace]) -> ComponentCatalog {
        ComponentCatalog::collect(self.descriptors.iter().cloned(), namespaces)
    }
}

/// 扫描结果：去重后的可发现组件描述符
#[derive(Debug, Clone, Default)]
pub struct ComponentCatalog {
    descriptors: Vec<Arc<ComponentDescriptor>>,
}

impl ComponentCatalog {
    fn collect(
        descriptors: impl IntoIterator<Item = ComponentDescriptor>,
        namespaces: &[Namespace],
    ) -> Self {
        let mut seen = HashSet::new();
        let descriptors = descriptors
            .into_iter()
            .filter(|d| d.is_discoverable())
            .filter(|d| namespaces.iter().any(|ns| ns.matches(d.module_path())))
            .filter(|d| seen.insert(d.type_id()))
            .map(Arc::new)
            .collect();
        Self { descriptors }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ComponentDescriptor>> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptor_of(&self, id: TypeId) -> Option<&Arc<ComponentDescriptor>> {
        self.descriptors.iter().find(|d| d.type_id() == id)
    }

    /// 可赋值给目标类型的具体组件类型
    pub fn find_implementers(&self, target: &TargetType) -> Vec<Arc<ComponentDescriptor>> {
        self.descriptors
            .iter()
            .filter(|d| d.provides(target))
            .cloned()
            .collect()
    }
}
