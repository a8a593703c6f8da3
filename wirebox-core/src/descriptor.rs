use crate::component::{Managed, ManagedInstance, ManagedObject};
use crate::error::{ContainerError, ContainerResult};
use crate::injection::InjectionPoint;
use crate::utils::naming::{simple_name, strip_dyn};
use crate::IntoResult;
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 类型擦除后的共享实例
pub type AnyArc = Arc<dyn Any + Send + Sync>;

type ViewCaster = Arc<dyn Fn(AnyArc) -> Option<AnyArc> + Send + Sync>;
type ConstructFn = Arc<dyn Fn(&mut ConstructorArgs) -> anyhow::Result<AnyArc> + Send + Sync>;
type HookFn = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync>;
type Upcast = fn(AnyArc) -> Option<Arc<dyn ManagedObject>>;

/// 注入目标的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// 具体的组件类型
    Concrete,
    /// 接口（trait object）
    Interface,
}

/// 注入或配置目标的类型信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetType {
    id: TypeId,
    name: &'static str,
    kind: TargetKind,
}

impl TargetType {
    pub fn concrete<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: TargetKind::Concrete,
        }
    }

    /// `T` 应为 `dyn Trait`
    pub fn interface<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: TargetKind::Interface,
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TargetKind::Interface
    }

    /// 全限定名（去掉 `dyn ` 前缀）
    pub fn name(&self) -> &'static str {
        strip_dyn(self.name)
    }

    pub fn simple_name(&self) -> &'static str {
        simple_name(self.name)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 组件对外提供的一个类型视图（自身类型或声明实现的接口）
#[derive(Clone)]
pub struct InterfaceView {
    target: TargetType,
    cast: ViewCaster,
}

impl InterfaceView {
    pub fn target(&self) -> &TargetType {
        &self.target
    }

    pub(crate) fn cast(&self, instance: AnyArc) -> Option<AnyArc> {
        (self.cast)(instance)
    }
}

impl fmt::Debug for InterfaceView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InterfaceView").field(&self.target.name()).finish()
    }
}

/// 命名的无参生命周期回调
#[derive(Clone)]
pub struct LifecycleHook {
    name: String,
    invoke: HookFn,
}

impl LifecycleHook {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn invoke(&self, instance: &(dyn Any + Send + Sync)) -> anyhow::Result<()> {
        (self.invoke)(instance)
    }
}

impl fmt::Debug for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LifecycleHook").field(&self.name).finish()
    }
}

/// 组件的构造策略
#[derive(Clone)]
pub enum Constructor {
    /// 无参构造
    Default(ConstructFn),
    /// 首选构造器，参数本身就是注入点
    Preferred {
        parameters: Vec<InjectionPoint>,
        construct: ConstructFn,
    },
    /// 既无无参构造也无首选构造器，只能通过 `Context::register` 提供实例
    Missing,
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constructor::Default(_) => f.write_str("Default"),
            Constructor::Preferred { parameters, .. } => f
                .debug_struct("Preferred")
                .field("parameters", parameters)
                .finish(),
            Constructor::Missing => f.write_str("Missing"),
        }
    }
}

/// 组件描述符
///
/// 由 `#[derive(Managed)]` 生成，或通过 [`ComponentDescriptor::builder`] 手工构建。
/// 一经构建不可修改；身份是组件类型的全限定名。
#[derive(Clone)]
pub struct ComponentDescriptor {
    target: TargetType,
    module_path: &'static str,
    name: Option<String>,
    discoverable: bool,
    constructor: Constructor,
    /// 第一个视图总是组件自身类型
    views: Vec<InterfaceView>,
    upcast: Upcast,
    initializers: Vec<LifecycleHook>,
    clean_ups: Vec<LifecycleHook>,
}

impl ComponentDescriptor {
    /// 开始构建 `T` 的描述符，`module_path` 用于命名空间扫描
    pub fn builder<T: Managed>(module_path: &'static str) -> DescriptorBuilder<T> {
        DescriptorBuilder::new(module_path)
    }

    pub fn target(&self) -> &TargetType {
        &self.target
    }

    pub fn type_id(&self) -> TypeId {
        self.target.id()
    }

    /// 全限定类型名
    pub fn type_name(&self) -> &'static str {
        self.target.name()
    }

    pub fn simple_name(&self) -> &'static str {
        self.target.simple_name()
    }

    pub fn module_path(&self) -> &'static str {
        self.module_path
    }

    pub fn explicit_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 默认组件名：显式名称，否则为全限定类型名
    pub fn base_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.type_name().to_string(),
        }
    }

    /// 是否参与扫描
    pub fn is_discoverable(&self) -> bool {
        self.discoverable
    }

    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    /// 首选构造器的参数，默认构造时为空
    pub fn parameters(&self) -> &[InjectionPoint] {
        match &self.constructor {
            Constructor::Preferred { parameters, .. } => parameters,
            _ => &[],
        }
    }

    /// 声明实现的接口
    pub fn interfaces(&self) -> impl Iterator<Item = &TargetType> {
        self.views.iter().skip(1).map(InterfaceView::target)
    }

    /// 组件是否可以赋值给目标类型
    pub fn provides(&self, target: &TargetType) -> bool {
        self.views.iter().any(|view| view.target.id() == target.id())
    }

    pub fn initializers(&self) -> &[LifecycleHook] {
        &self.initializers
    }

    pub fn clean_ups(&self) -> &[LifecycleHook] {
        &self.clean_ups
    }

    /// 把构造出的实例包装为 [`ManagedInstance`]，计算全部类型视图
    pub(crate) fn wrap(&self, instance: AnyArc) -> Option<ManagedInstance> {
        let object = (self.upcast)(instance.clone())?;
        let views = self
            .views
            .iter()
            .filter_map(|view| {
                view.cast(instance.clone())
                    .map(|erased| (view.target.id(), erased))
            })
            .collect();
        Some(ManagedInstance::new(object, instance, views))
    }

    /// 调用构造策略得到新实例
    pub(crate) fn construct(&self, args: &mut ConstructorArgs) -> anyhow::Result<ManagedInstance> {
        let construct = match &self.constructor {
            Constructor::Default(construct) => construct,
            Constructor::Preferred { construct, .. } => construct,
            Constructor::Missing => anyhow::bail!(
                "type {} declares neither a zero-argument nor a preferred constructor",
                self.type_name()
            ),
        };
        let instance = construct(args)?;
        self.wrap(instance)
            .ok_or_else(|| anyhow::anyhow!("constructor did not produce a {}", self.type_name()))
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("type_name", &self.type_name())
            .field("module_path", &self.module_path)
            .field("name", &self.name)
            .field("constructor", &self.constructor)
            .field("interfaces", &self.views.iter().skip(1).collect::<Vec<_>>())
            .field("initializers", &self.initializers)
            .field("clean_ups", &self.clean_ups)
            .finish()
    }
}

fn upcast<T: Managed>(instance: AnyArc) -> Option<Arc<dyn ManagedObject>> {
    instance
        .downcast::<T>()
        .ok()
        .map(|typed| typed as Arc<dyn ManagedObject>)
}

/// [`ComponentDescriptor`] 构建器
pub struct DescriptorBuilder<T> {
    module_path: &'static str,
    name: Option<String>,
    discoverable: bool,
    constructor: Constructor,
    views: Vec<InterfaceView>,
    initializers: Vec<LifecycleHook>,
    clean_ups: Vec<LifecycleHook>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Managed> DescriptorBuilder<T> {
    fn new(module_path: &'static str) -> Self {
        let own = InterfaceView {
            target: TargetType::concrete::<T>(),
            cast: Arc::new(|instance: AnyArc| {
                instance
                    .downcast::<T>()
                    .ok()
                    .map(|typed| Arc::new(typed) as AnyArc)
            }),
        };
        Self {
            module_path,
            name: None,
            discoverable: true,
            constructor: Constructor::Missing,
            views: vec![own],
            initializers: Vec::new(),
            clean_ups: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// 显式组件名；空字符串等同于未指定
    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.is_empty() { None } else { Some(name) };
        self
    }

    /// 不参与扫描，只能通过 `Context::register` 进入注册表
    pub fn manual(mut self) -> Self {
        self.discoverable = false;
        self
    }

    /// 声明实现的接口，`cast` 负责把具体类型转换为 trait object
    pub fn implements<I>(mut self, cast: fn(Arc<T>) -> Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let target = TargetType::interface::<I>();
        if self.views.iter().any(|view| view.target.id() == target.id()) {
            return self;
        }
        self.views.push(InterfaceView {
            target,
            cast: Arc::new(move |instance: AnyArc| {
                instance
                    .downcast::<T>()
                    .ok()
                    .map(|typed| Arc::new(cast(typed)) as AnyArc)
            }),
        });
        self
    }

    /// 无参构造
    pub fn constructor<F>(mut self, construct: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.constructor = Constructor::Default(Arc::new(move |_args: &mut ConstructorArgs| {
            construct().map(|instance| Arc::new(instance) as AnyArc)
        }));
        self
    }

    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(|| Ok(T::default()))
    }

    /// 首选构造器，`parameters` 的顺序即 [`ConstructorArgs::take`] 的下标
    pub fn preferred_constructor<F>(mut self, parameters: Vec<InjectionPoint>, construct: F) -> Self
    where
        F: Fn(&mut ConstructorArgs) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.constructor = Constructor::Preferred {
            parameters,
            construct: Arc::new(move |args: &mut ConstructorArgs| {
                construct(args).map(|instance| Arc::new(instance) as AnyArc)
            }),
        };
        self
    }

    /// 初始化回调，所有组件装配和配置完成后调用
    pub fn on_initialize<F, R>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.initializers.push(Self::hook(name.into(), hook));
        self
    }

    /// 清理回调，上下文关闭时调用
    pub fn on_clean_up<F, R>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        self.clean_ups.push(Self::hook(name.into(), hook));
        self
    }

    fn hook<F, R>(name: String, hook: F) -> LifecycleHook
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
        R: IntoResult,
    {
        LifecycleHook {
            name,
            invoke: Arc::new(move |instance: &(dyn Any + Send + Sync)| {
                match instance.downcast_ref::<T>() {
                    Some(typed) => hook(typed).into_result(),
                    None => anyhow::bail!("instance is not a {}", std::any::type_name::<T>()),
                }
            }),
        }
    }

    pub fn build(self) -> ComponentDescriptor {
        ComponentDescriptor {
            target: TargetType::concrete::<T>(),
            module_path: self.module_path,
            name: self.name,
            discoverable: self.discoverable,
            constructor: self.constructor,
            views: self.views,
            upcast: upcast::<T>,
            initializers: self.initializers,
            clean_ups: self.clean_ups,
        }
    }
}

/// 可作为首选构造器参数的类型：`Arc<T>` 或 `Option<Arc<T>>`
pub trait ConstructorParam: Sized + 'static {
    /// 解析不到依赖时是否仍可构造
    const OPTIONAL: bool;

    fn from_view(view: Option<AnyArc>) -> Option<Self>;
}

impl<T: ?Sized + 'static> ConstructorParam for Arc<T> {
    const OPTIONAL: bool = false;

    fn from_view(view: Option<AnyArc>) -> Option<Self> {
        view?.downcast_ref::<Arc<T>>().cloned()
    }
}

impl<T: ?Sized + 'static> ConstructorParam for Option<Arc<T>> {
    const OPTIONAL: bool = true;

    fn from_view(view: Option<AnyArc>) -> Option<Self> {
        match view {
            None => Some(None),
            Some(view) => view.downcast_ref::<Arc<T>>().cloned().map(Some),
        }
    }
}

/// 已解析的首选构造器实参
pub struct ConstructorArgs {
    component: String,
    values: Vec<(String, Option<AnyArc>)>,
}

impl ConstructorArgs {
    pub(crate) fn new(component: impl Into<String>, values: Vec<(String, Option<AnyArc>)>) -> Self {
        Self {
            component: component.into(),
            values,
        }
    }

    pub(crate) fn empty(component: impl Into<String>) -> Self {
        Self::new(component, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 取出第 `index` 个实参，每个实参只能取一次
    pub fn take<P: ConstructorParam>(&mut self, index: usize) -> ContainerResult<P> {
        let component = &self.component;
        let (field, value) = self.values.get_mut(index).ok_or_else(|| {
            ContainerError::DependencyWiring {
                component: component.clone(),
                field: format!("#{index}"),
                reason: "constructor parameter index out of range".to_string(),
            }
        })?;
        P::from_view(value.take()).ok_or_else(|| ContainerError::DependencyWiring {
            component: component.clone(),
            field: field.clone(),
            reason: format!("argument is not assignable to {}", std::any::type_name::<P>()),
        })
    }
}

impl fmt::Debug for ConstructorArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorArgs")
            .field("component", &self.component)
            .field(
                "parameters",
                &self.values.iter().map(|(field, _)| field).collect::<Vec<_>>(),
            )
            .finish()
    }
}
