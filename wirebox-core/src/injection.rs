use crate::context::Context;
use crate::descriptor::TargetType;
use crate::error::{ContainerError, ContainerResult};
use crate::scope::Scope;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

/// 一个依赖注入点：字段或首选构造器参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPoint {
    field: String,
    target: TargetType,
    name: Option<String>,
    filter: Option<String>,
    scope: Scope,
    optional: bool,
}

impl InjectionPoint {
    pub fn new(field: impl Into<String>, target: TargetType) -> Self {
        Self {
            field: field.into(),
            target,
            name: None,
            filter: None,
            scope: Scope::Static,
            optional: false,
        }
    }

    /// 显式组件名；空字符串等同于未指定
    pub fn named(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.is_empty() { None } else { Some(name) };
        self
    }

    /// `key=value` 过滤表达式
    pub fn filtered(mut self, expression: impl Into<String>) -> Self {
        let expression = expression.into();
        self.filter = if expression.is_empty() { None } else { Some(expression) };
        self
    }

    pub fn scoped(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn target(&self) -> &TargetType {
        &self.target
    }

    pub fn explicit_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// 可被容器赋值的注入字段
pub trait WireTarget: Send + Sync {
    fn scope(&self) -> Scope;

    /// 绑定静态依赖；`view` 的类型与字段不符时返回 false
    fn bind(&self, view: &(dyn Any + Send + Sync)) -> bool;

    /// 安装按访问解析的间接层；作用域不符时返回 false
    fn install(&self, binding: AccessBinding) -> bool;

    fn is_bound(&self) -> bool;
}

/// 注入点描述与字段本身
pub struct InjectionSlot<'a> {
    point: InjectionPoint,
    target: &'a dyn WireTarget,
}

impl<'a> InjectionSlot<'a> {
    /// 作用域由字段类型决定
    pub fn new(point: InjectionPoint, target: &'a dyn WireTarget) -> Self {
        let point = point.scoped(target.scope());
        Self { point, target }
    }

    pub fn point(&self) -> &InjectionPoint {
        &self.point
    }

    pub fn target(&self) -> &'a dyn WireTarget {
        self.target
    }
}

impl fmt::Debug for InjectionSlot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionSlot")
            .field("point", &self.point)
            .field("bound", &self.target.is_bound())
            .finish()
    }
}

/// 静态作用域字段：装配时绑定一次，之后一直指向同一个组件
///
/// 注入上下文自身时只保存弱引用，组件不会反过来延长上下文的生命周期；
/// 上下文释放后 [`get`](Wired::get) 返回 `None`。
pub struct Wired<T: ?Sized> {
    value: RwLock<Option<Bound<T>>>,
}

enum Bound<T: ?Sized> {
    Shared(Arc<T>),
    Weak(Weak<T>),
}

impl<T: ?Sized> Bound<T> {
    fn upgrade(&self) -> Option<Arc<T>> {
        match self {
            Bound::Shared(value) => Some(Arc::clone(value)),
            Bound::Weak(value) => value.upgrade(),
        }
    }
}

impl<T: ?Sized> Default for Wired<T> {
    fn default() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }
}

impl<T: ?Sized> Wired<T> {
    /// 已绑定的依赖；未匹配到组件时为 `None`
    pub fn get(&self) -> Option<Arc<T>> {
        self.value.read().as_ref().and_then(Bound::upgrade)
    }

    pub fn require(&self) -> ContainerResult<Arc<T>> {
        self.get()
            .ok_or_else(|| ContainerError::UnboundInjectionPoint(std::any::type_name::<T>().to_string()))
    }
}

impl<T: ?Sized + Send + Sync + 'static> WireTarget for Wired<T> {
    fn scope(&self) -> Scope {
        Scope::Static
    }

    fn bind(&self, view: &(dyn Any + Send + Sync)) -> bool {
        let bound = if let Some(value) = view.downcast_ref::<Arc<T>>() {
            Bound::Shared(Arc::clone(value))
        } else if let Some(value) = view.downcast_ref::<Weak<T>>() {
            Bound::Weak(value.clone())
        } else {
            return false;
        };
        *self.value.write() = Some(bound);
        true
    }

    fn install(&self, _binding: AccessBinding) -> bool {
        false
    }

    fn is_bound(&self) -> bool {
        self.value.read().is_some()
    }
}

impl<T: ?Sized> fmt::Debug for Wired<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wired")
            .field("target", &std::any::type_name::<T>())
            .field("bound", &self.value.read().is_some())
            .finish()
    }
}

/// 访问作用域间接层的解析参数
#[derive(Debug, Clone)]
pub struct AccessBinding {
    pub(crate) context: Weak<Context>,
    pub(crate) point: InjectionPoint,
    pub(crate) key: String,
}

impl AccessBinding {
    pub(crate) fn new(context: Weak<Context>, point: InjectionPoint, key: String) -> Self {
        Self { context, point, key }
    }

    pub fn point(&self) -> &InjectionPoint {
        &self.point
    }

    /// 装配时计算出的组件键
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// 访问作用域字段
///
/// 每次 [`resolve`](OnAccess::resolve) 或 [`invoke`](OnAccess::invoke) 都会重新解析实现类型，
/// 构造一个全新实例并完成装配与配置；不做任何缓存。
///
/// ```ignore
/// #[wire]
/// reports: OnAccess<dyn ReportBuilder>,
///
/// let first = self.reports.invoke(|r| r.build())?;
/// let second = self.reports.invoke(|r| r.build())?; // 另一个实例
/// ```
pub struct OnAccess<T: ?Sized> {
    binding: RwLock<Option<AccessBinding>>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized> Default for OnAccess<T> {
    fn default() -> Self {
        Self {
            binding: RwLock::new(None),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized + 'static> OnAccess<T> {
    /// 构造一个新实例
    pub fn resolve(&self) -> ContainerResult<Arc<T>> {
        let binding = self
            .binding
            .read()
            .clone()
            .ok_or_else(|| ContainerError::UnboundInjectionPoint(std::any::type_name::<T>().to_string()))?;
        let context = binding.context.upgrade().ok_or(ContainerError::ContextClosed)?;
        let instance = context.construct_on_access(&binding)?;
        instance.get::<T>().ok_or_else(|| ContainerError::DependencyWiring {
            component: binding.key.clone(),
            field: binding.point.field().to_string(),
            reason: format!("resolved instance is not assignable to {}", binding.point.target()),
        })
    }

    /// 在新实例上执行调用
    pub fn invoke<R>(&self, call: impl FnOnce(&T) -> R) -> ContainerResult<R> {
        let instance = self.resolve()?;
        Ok(call(&instance))
    }

    pub fn binding(&self) -> Option<AccessBinding> {
        self.binding.read().clone()
    }
}

impl<T: ?Sized + 'static> WireTarget for OnAccess<T> {
    fn scope(&self) -> Scope {
        Scope::Access
    }

    fn bind(&self, _view: &(dyn Any + Send + Sync)) -> bool {
        false
    }

    fn install(&self, binding: AccessBinding) -> bool {
        *self.binding.write() = Some(binding);
        true
    }

    fn is_bound(&self) -> bool {
        self.binding.read().is_some()
    }
}

impl<T: ?Sized> fmt::Debug for OnAccess<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnAccess")
            .field("target", &std::any::type_name::<T>())
            .field("key", &self.binding.read().as_ref().map(|b| b.key.clone()))
            .finish()
    }
}
