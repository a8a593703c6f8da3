use crate::binding::ConfigurationSlot;
use crate::context::Context;
use crate::descriptor::{AnyArc, ComponentDescriptor};
use crate::injection::InjectionSlot;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// 受管组件
///
/// 通过 `#[derive(Managed)]` 自动实现，也可以手工实现。
///
/// # 示例
///
/// ```ignore
/// use wirebox_core::prelude::*;
///
/// #[derive(Managed)]
/// #[managed(name = "userService")]
/// #[initialize("warm_up")]
/// struct UserService {
///     #[wire]
///     repository: Wired<dyn UserRepository>,
///
///     #[configurable(name = "page.size")]
///     page_size: Setting<u32>,
/// }
/// ```
pub trait Managed: Any + Send + Sync + Sized {
    /// 组件描述符
    fn descriptor() -> ComponentDescriptor;

    /// 字段注入点，装配阶段逐个解析
    fn injection_points(&self) -> Vec<InjectionSlot<'_>> {
        Vec::new()
    }

    /// 配置注入点，配置阶段逐个绑定
    fn configuration_points(&self) -> Vec<ConfigurationSlot<'_>> {
        Vec::new()
    }
}

/// [`Managed`] 的对象安全版本，供容器在类型擦除后访问实例
pub trait ManagedObject: Send + Sync {
    fn injection_points(&self) -> Vec<InjectionSlot<'_>>;

    fn configuration_points(&self) -> Vec<ConfigurationSlot<'_>>;
}

impl<T: Managed> ManagedObject for T {
    fn injection_points(&self) -> Vec<InjectionSlot<'_>> {
        <T as Managed>::injection_points(self)
    }

    fn configuration_points(&self) -> Vec<ConfigurationSlot<'_>> {
        <T as Managed>::configuration_points(self)
    }
}

/// 一个已构造的实例及其全部类型视图
#[derive(Clone)]
pub struct ManagedInstance {
    object: Arc<dyn ManagedObject>,
    any: AnyArc,
    views: HashMap<TypeId, AnyArc>,
}

impl ManagedInstance {
    pub(crate) fn new(
        object: Arc<dyn ManagedObject>,
        any: AnyArc,
        views: HashMap<TypeId, AnyArc>,
    ) -> Self {
        Self { object, any, views }
    }

    pub fn object(&self) -> &dyn ManagedObject {
        self.object.as_ref()
    }

    pub(crate) fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self.any.as_ref()
    }

    /// 按类型取出视图，值为 `Arc<T>` 的擦除形式
    pub(crate) fn view(&self, id: TypeId) -> Option<AnyArc> {
        self.views.get(&id).cloned()
    }

    /// 以具体类型或接口类型取出实例
    pub fn get<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.views
            .get(&TypeId::of::<T>())
            .and_then(|view| view.downcast_ref::<Arc<T>>())
            .cloned()
    }

    /// 两个句柄是否指向同一个对象
    pub fn same_instance(&self, other: &ManagedInstance) -> bool {
        Arc::ptr_eq(&self.any, &other.any)
    }
}

impl fmt::Debug for ManagedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedInstance")
            .field("views", &self.views.len())
            .finish()
    }
}

/// 实例句柄；上下文自身只持有弱引用，避免注册表与上下文互相持有
pub(crate) enum InstanceHandle {
    Owned(ManagedInstance),
    Context(Weak<Context>),
}

/// 注册表中的一个组件
pub struct ManagedComponent {
    name: String,
    descriptor: Arc<ComponentDescriptor>,
    handle: InstanceHandle,
}

impl ManagedComponent {
    pub(crate) fn owned(
        name: impl Into<String>,
        descriptor: Arc<ComponentDescriptor>,
        instance: ManagedInstance,
    ) -> Self {
        Self {
            name: name.into(),
            descriptor,
            handle: InstanceHandle::Owned(instance),
        }
    }

    pub(crate) fn context(
        name: impl Into<String>,
        descriptor: Arc<ComponentDescriptor>,
        context: Weak<Context>,
    ) -> Self {
        Self {
            name: name.into(),
            descriptor,
            handle: InstanceHandle::Context(context),
        }
    }

    /// 注册名，在上下文内唯一
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    pub(crate) fn shared_descriptor(&self) -> Arc<ComponentDescriptor> {
        Arc::clone(&self.descriptor)
    }

    pub fn type_name(&self) -> &'static str {
        self.descriptor.type_name()
    }

    /// 由上下文构造或注册、持有所有权的实例
    pub(crate) fn owned_instance(&self) -> Option<&ManagedInstance> {
        match &self.handle {
            InstanceHandle::Owned(instance) => Some(instance),
            InstanceHandle::Context(_) => None,
        }
    }

    /// 上下文自身的弱引用；其余组件为 `None`
    pub(crate) fn context_ref(&self) -> Option<&Weak<Context>> {
        match &self.handle {
            InstanceHandle::Owned(_) => None,
            InstanceHandle::Context(context) => Some(context),
        }
    }

    /// 实例是否仍然可用
    pub fn is_live(&self) -> bool {
        match &self.handle {
            InstanceHandle::Owned(_) => true,
            InstanceHandle::Context(context) => context.strong_count() > 0,
        }
    }

    pub(crate) fn view(&self, id: TypeId) -> Option<AnyArc> {
        match &self.handle {
            InstanceHandle::Owned(instance) => instance.view(id),
            InstanceHandle::Context(context) => {
                let context: AnyArc = context.upgrade()?;
                self.descriptor.wrap(context)?.view(id)
            }
        }
    }

    /// 以具体类型或接口类型取出实例
    pub fn get<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.view(TypeId::of::<T>())
            .and_then(|view| view.downcast_ref::<Arc<T>>().cloned())
    }
}

impl fmt::Debug for ManagedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedComponent")
            .field("name", &self.name)
            .field("type_name", &self.type_name())
            .field("live", &self.is_live())
            .finish()
    }
}
