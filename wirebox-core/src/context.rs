//! 上下文：组件注册表的持有者与初始化流程的编排者
//!
//! 初始化依次经历 发现 → 规划工厂 → 按依赖顺序实例化 → 装配 → 配置 → 初始化回调，
//! 任一阶段失败都会中止并返回错误，调用方拿不到半初始化的上下文。

use crate::binder::InjectionBinder;
use crate::binding::ConfigurationBinder;
use crate::component::{Managed, ManagedComponent, ManagedInstance};
use crate::config::{
    ConfigurationSource, ConfigurationStore, Configurations, DirectoryConfigurationStore,
};
use crate::constants::{is_reserved_name, CONTEXT_COMPONENT_NAME};
use crate::converter::ConverterRegistry;
use crate::descriptor::{AnyArc, ComponentDescriptor, TargetType};
use crate::error::{ContainerError, ContainerResult};
use crate::factory::ComponentFactory;
use crate::injection::AccessBinding;
use crate::lifecycle::{run_hooks, HookPhase, LifecycleState};
use crate::registry::Registry;
use crate::resolver::NameResolver;
use crate::scanner::{
    ApplicationRegistration, ComponentCatalog, ComponentScanner, InventoryScanner, Namespace,
};
use crate::settings::ContextSettings;
use crate::utils::dependency::CreationTracker;
use parking_lot::{Mutex, RwLock};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

/// 应用上下文
///
/// 每次 [`Context::init`] 或 [`ContextBuilder::build`] 都得到一个全新的上下文，
/// 不存在进程级单例。上下文以保留名称 `"Context"` 把自己注册为组件，因此可以被注入。
///
/// 初始化完成后注册表不再修改，查询只需要读锁；
/// [`register`](Context::register) 会清空并重建整个注册表。
pub struct Context {
    self_ref: Weak<Context>,
    namespaces: Vec<Namespace>,
    scanner: Box<dyn ComponentScanner>,
    catalog: RwLock<Arc<ComponentCatalog>>,
    configurations: Configurations,
    settings: ContextSettings,
    binder: ConfigurationBinder,
    registry: RwLock<Arc<Registry>>,
    state: RwLock<LifecycleState>,
    rebuild: Mutex<()>,
}

impl Managed for Context {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Context>(module_path!())
            .name(CONTEXT_COMPONENT_NAME)
            .manual()
            .build()
    }
}

impl Context {
    /// 以应用标记 `A` 启动上下文
    ///
    /// 设置取自环境变量，配置源取自 `config_dir` 目录。
    /// `A` 必须带有 `#[derive(ManagedApplication)]` 并声明 `#[packages(..)]`。
    pub fn init<A: 'static>() -> ContainerResult<Arc<Context>> {
        Self::builder()
            .application::<A>()
            .settings(ContextSettings::from_env())
            .build()
    }

    /// 以应用标记 `A` 启动上下文，并把 `fixture` 按类型的简单名称注册进去
    ///
    /// 用于测试：`fixture` 与扫描得到的组件一起参与装配、配置与初始化回调。
    ///
    /// ```ignore
    /// let context = Context::init_with::<App, _>(Arc::new(OrderServiceTest::default()))?;
    /// let test = context.get_instance::<OrderServiceTest>("OrderServiceTest").unwrap();
    /// ```
    pub fn init_with<A: 'static, T: Managed>(fixture: Arc<T>) -> ContainerResult<Arc<Context>> {
        Self::builder()
            .application::<A>()
            .settings(ContextSettings::from_env())
            .build_with(fixture)
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// 注册一个外部构造的实例
    ///
    /// **注意：这不是增量操作。** 现有注册表会被整体丢弃（被丢弃的组件执行清理回调），
    /// 然后重新执行发现、实例化、装配、配置与初始化回调，新实例作为普通组件参与装配。
    /// 之前通过 `register` 注册的实例不会保留；被丢弃组件持有的引用也不会更新。
    ///
    /// 同名的扫描组件会被这个实例取代。
    pub fn register<T: Managed>(&self, instance: Arc<T>, name: impl Into<String>) -> ContainerResult<()> {
        let component = external_component(instance, name.into())?;
        tracing::info!(
            "Registering external component '{}' ({}), rebuilding context",
            component.name(),
            component.descriptor().type_name()
        );
        self.initialize(Some(component))
    }

    /// 按名称取出组件实例，可以用具体类型或接口类型
    pub fn get_instance<T: ?Sized + 'static>(&self, name: &str) -> Option<Arc<T>> {
        let registry = self.registry.read().clone();
        registry.get(name)?.get::<T>()
    }

    pub fn get_component(&self, name: &str) -> Option<Arc<ManagedComponent>> {
        self.registry.read().get(name).cloned()
    }

    /// 注册顺序的组件名
    pub fn component_names(&self) -> Vec<String> {
        self.registry.read().names().map(str::to_string).collect()
    }

    pub fn contains_component(&self, name: &str) -> bool {
        self.registry.read().contains(name)
    }

    pub fn configuration(&self, name: &str) -> Option<&ConfigurationSource> {
        self.configurations.get(name)
    }

    pub fn configurations(&self) -> &Configurations {
        &self.configurations
    }

    /// 可赋值给目标类型的已发现组件类型
    pub fn find_implementers(&self, target: &TargetType) -> Vec<Arc<ComponentDescriptor>> {
        self.catalog.read().find_implementers(target)
    }

    pub fn catalog(&self) -> Arc<ComponentCatalog> {
        self.catalog.read().clone()
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    /// 关闭上下文
    ///
    /// 按注册顺序的逆序执行清理回调，第一个失败的回调中止其余回调并返回错误。
    /// 重复调用直接返回成功。
    pub fn close(&self) -> ContainerResult<()> {
        let _guard = self.rebuild.lock();
        {
            let mut state = self.state.write();
            if *state == LifecycleState::Closed {
                tracing::debug!("Context already closed");
                return Ok(());
            }
            *state = LifecycleState::Closed;
        }

        let registry = std::mem::take(&mut *self.registry.write());
        tracing::info!("Closing context, cleaning up {} component(s)", registry.len());
        let invoked = run_hooks(registry.iter().rev(), HookPhase::CleanUp)?;
        tracing::info!("Context closed, {} clean-up hook(s) invoked", invoked);
        Ok(())
    }

    fn set_state(&self, state: LifecycleState) {
        tracing::debug!("Context state -> {}", state);
        *self.state.write() = state;
    }

    /// 构建注册表；`external` 为调用方注册的实例
    ///
    /// 失败时已发布的组件执行清理回调，注册表清空，状态变为 [`LifecycleState::Failed`]。
    fn initialize(&self, external: Option<ManagedComponent>) -> ContainerResult<()> {
        let _guard = self.rebuild.lock();
        if self.state() == LifecycleState::Closed {
            return Err(ContainerError::ContextClosed);
        }

        let result = self.rebuild_registry(external);
        if let Err(e) = &result {
            tracing::error!("Context initialization failed: {}", e);
            let published = std::mem::take(&mut *self.registry.write());
            if !published.is_empty() {
                tracing::info!("Cleaning up {} published component(s)", published.len());
                if let Err(cleanup) = run_hooks(published.iter().rev(), HookPhase::CleanUp) {
                    tracing::warn!("Clean-up after failed initialization did not complete: {}", cleanup);
                }
            }
            self.set_state(LifecycleState::Failed);
        }
        result
    }

    fn rebuild_registry(&self, external: Option<ManagedComponent>) -> ContainerResult<()> {
        let previous = std::mem::take(&mut *self.registry.write());
        if !previous.is_empty() {
            tracing::info!("Discarding {} component(s) before rebuild", previous.len());
            let kept = external.as_ref().and_then(ManagedComponent::owned_instance);
            let discarded = previous.iter().rev().filter(|component| {
                match (component.owned_instance(), kept) {
                    (Some(old), Some(new)) => !old.same_instance(new),
                    _ => true,
                }
            });
            run_hooks(discarded, HookPhase::CleanUp)?;
        }

        self.set_state(LifecycleState::Discovering);
        let catalog = Arc::new(self.scanner.scan(&self.namespaces));
        tracing::info!(
            "Found {} component type(s) in {} namespace(s)",
            catalog.len(),
            self.namespaces.len()
        );
        *self.catalog.write() = Arc::clone(&catalog);

        let mut registry = Registry::default();
        registry.insert(ManagedComponent::context(
            CONTEXT_COMPONENT_NAME,
            Arc::new(<Context as Managed>::descriptor()),
            self.self_ref.clone(),
        ))?;
        if let Some(external) = external {
            registry.insert(external)?;
        }

        let factories = self.plan(&catalog, &registry)?;
        tracing::debug!("Planned {} component factory(ies)", factories.len());

        self.set_state(LifecycleState::Instantiating);
        let resolver = NameResolver::new(&self.configurations);
        let registry = BuildSession::new(registry, factories, resolver).run()?;

        self.set_state(LifecycleState::Wiring);
        let injector = InjectionBinder::new(
            &registry,
            resolver,
            self.self_ref.clone(),
            self.settings.strict_wiring,
        );
        for component in registry.iter() {
            if let Some(instance) = component.owned_instance() {
                injector.wire(component.name(), instance.object())?;
            }
        }

        self.set_state(LifecycleState::Configuring);
        for component in registry.iter() {
            if let Some(instance) = component.owned_instance() {
                let source = self.source_for(component.name(), component.descriptor());
                self.binder.configure(component.name(), instance.object(), source)?;
            }
        }

        let registry = Arc::new(registry);
        *self.registry.write() = Arc::clone(&registry);
        let invoked = run_hooks(registry.iter(), HookPhase::Initialize)?;

        self.set_state(LifecycleState::Initialized);
        tracing::info!(
            "Context initialized with {} component(s), {} initialize hook(s) invoked",
            registry.len(),
            invoked
        );
        Ok(())
    }

    /// 为每个组件类型确定实例名
    ///
    /// 存在以默认名开头的配置源时，每个配置源对应一个实例；否则只有默认名一个实例。
    fn plan(&self, catalog: &ComponentCatalog, registry: &Registry) -> ContainerResult<Vec<ComponentFactory>> {
        let mut planned = HashSet::new();
        let mut factories = Vec::new();
        for descriptor in catalog.iter() {
            for name in self.instance_names(descriptor, catalog) {
                if registry.contains(&name) {
                    tracing::debug!(
                        "Component '{}' already registered, skipping {}",
                        name,
                        descriptor.type_name()
                    );
                    continue;
                }
                if !planned.insert(name.clone()) {
                    return Err(ContainerError::DuplicateComponent(name));
                }
                tracing::trace!("Planning '{}' ({})", name, descriptor.type_name());
                factories.push(ComponentFactory::new(name, Arc::clone(descriptor)));
            }
        }
        Ok(factories)
    }

    fn instance_names(&self, descriptor: &ComponentDescriptor, catalog: &ComponentCatalog) -> Vec<String> {
        let base = descriptor.base_name();
        let mut names = self.owned_sources(descriptor, &base, catalog);
        if names.is_empty() && descriptor.explicit_name().is_none() {
            names = self.owned_sources(descriptor, descriptor.simple_name(), catalog);
        }
        if names.is_empty() {
            return vec![base];
        }
        if names.len() > 1 {
            tracing::debug!("{} has {} configured instance(s): {:?}", descriptor.type_name(), names.len(), names);
        }
        names.into_iter().map(str::to_string).collect()
    }

    /// 以 `prefix` 开头的配置源，去掉属于其他组件类型的
    ///
    /// 另一个类型的名称前缀更长且同样匹配时，配置源归那个类型：
    /// `Server` 不会认领 `ServerStats` 与 `ServerStats_eu`。
    fn owned_sources(
        &self,
        descriptor: &ComponentDescriptor,
        prefix: &str,
        catalog: &ComponentCatalog,
    ) -> Vec<&str> {
        self.configurations
            .names_starting_with(prefix)
            .into_iter()
            .filter(|name| {
                let claimed = catalog
                    .iter()
                    .filter(|other| !std::ptr::eq(Arc::as_ptr(other), descriptor))
                    .flat_map(|other| source_prefixes(other))
                    .find(|longer| longer.len() > prefix.len() && name.starts_with(longer.as_str()));
                if let Some(longer) = &claimed {
                    tracing::trace!(
                        "Configuration '{}' belongs to '{}', not {}",
                        name,
                        longer,
                        descriptor.type_name()
                    );
                }
                claimed.is_none()
            })
            .collect()
    }

    /// 组件的配置源：注册名优先，其次是类型的简单名称
    fn source_for(&self, name: &str, descriptor: &ComponentDescriptor) -> Option<&ConfigurationSource> {
        self.configurations
            .get(name)
            .or_else(|| self.configurations.get(descriptor.simple_name()))
    }

    /// 访问作用域：解析实现类型并构造、装配、配置一个新实例
    ///
    /// 不执行初始化回调，不缓存，也不写入注册表。
    pub(crate) fn construct_on_access(&self, binding: &AccessBinding) -> ContainerResult<ManagedInstance> {
        match self.state() {
            LifecycleState::Closed => return Err(ContainerError::ContextClosed),
            LifecycleState::Failed => return Err(ContainerError::ContextFailed),
            _ => {}
        }

        let point = binding.point();
        let descriptor = self.access_target(binding)?;
        tracing::trace!(
            "Constructing access-scope instance of {} for '{}'",
            descriptor.type_name(),
            binding.key()
        );

        let registry = self.registry.read().clone();
        let resolver = NameResolver::new(&self.configurations);
        let factory = ComponentFactory::new(binding.key(), descriptor);
        let args = factory.arguments(&registry, &resolver)?;
        let instance = factory.build(args)?;

        InjectionBinder::new(&registry, resolver, self.self_ref.clone(), self.settings.strict_wiring)
            .wire(binding.key(), instance.object())?;

        let source = self
            .configurations
            .get(binding.key())
            .or_else(|| point.explicit_name().and_then(|name| self.configurations.get(name)))
            .or_else(|| self.configurations.get(factory.descriptor().simple_name()));
        self.binder.configure(binding.key(), instance.object(), source)?;
        Ok(instance)
    }

    fn access_target(&self, binding: &AccessBinding) -> ContainerResult<Arc<ComponentDescriptor>> {
        let point = binding.point();
        let target = point.target();
        let catalog = self.catalog.read().clone();

        if !target.is_interface() {
            return catalog
                .descriptor_of(target.id())
                .cloned()
                .ok_or_else(|| ContainerError::IllegalWiring {
                    target: target.name().to_string(),
                });
        }

        let mut candidates = catalog.find_implementers(target);
        if let Some(name) = point.explicit_name() {
            candidates.retain(|d| name.starts_with(&d.base_name()) || name.starts_with(d.simple_name()));
        }
        match candidates.len() {
            0 => Err(ContainerError::MatchingDependencyNotFound {
                target: target.name().to_string(),
                name: point.explicit_name().map(str::to_string),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(ContainerError::AmbiguousDependency {
                target: target.name().to_string(),
                candidates: candidates.iter().map(|d| d.type_name().to_string()).collect(),
            }),
        }
    }
}

/// 把外部实例包装成组件
fn external_component<T: Managed>(instance: Arc<T>, name: String) -> ContainerResult<ManagedComponent> {
    if is_reserved_name(&name) {
        return Err(ContainerError::DuplicateComponent(name));
    }
    let descriptor = Arc::new(T::descriptor());
    let erased: AnyArc = instance;
    let wrapped = descriptor.wrap(erased).ok_or_else(|| ContainerError::Instantiation {
        component: name.clone(),
        source: anyhow::anyhow!("descriptor does not describe {}", std::any::type_name::<T>()),
    })?;
    Ok(ManagedComponent::owned(name, descriptor, wrapped))
}

/// 组件类型可以认领的配置源名称前缀
fn source_prefixes(descriptor: &ComponentDescriptor) -> Vec<String> {
    let mut prefixes = vec![descriptor.base_name()];
    if descriptor.explicit_name().is_none() {
        prefixes.push(descriptor.simple_name().to_string());
    }
    prefixes
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("state", &self.state())
            .field("namespaces", &self.namespaces)
            .field("components", &self.component_names())
            .finish()
    }
}

/// 一次实例化过程
///
/// 深度优先构造，按组件名记忆化。首选构造器引用的组件若尚未构造，先递归构造它。
struct BuildSession<'a> {
    registry: Registry,
    order: Vec<String>,
    pending: HashMap<String, ComponentFactory>,
    failed: HashSet<String>,
    tracker: CreationTracker,
    resolver: NameResolver<'a>,
}

impl<'a> BuildSession<'a> {
    fn new(registry: Registry, factories: Vec<ComponentFactory>, resolver: NameResolver<'a>) -> Self {
        let order = factories.iter().map(|f| f.name().to_string()).collect();
        let pending = factories
            .into_iter()
            .map(|f| (f.name().to_string(), f))
            .collect();
        Self {
            registry,
            order,
            pending,
            failed: HashSet::new(),
            tracker: CreationTracker::default(),
            resolver,
        }
    }

    /// 构造全部组件；单个组件失败不影响兄弟组件，结束后返回第一个错误
    fn run(mut self) -> ContainerResult<Registry> {
        let mut errors = Vec::new();
        for name in std::mem::take(&mut self.order) {
            if let Err(e) = self.build(&name) {
                tracing::error!("Failed to instantiate '{}': {}", name, e);
                errors.push(e);
            }
        }
        match errors.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(self.registry),
        }
    }

    fn build(&mut self, name: &str) -> ContainerResult<()> {
        if self.registry.contains(name) {
            return Ok(());
        }
        if self.failed.contains(name) {
            return Err(ContainerError::Instantiation {
                component: name.to_string(),
                source: anyhow::anyhow!("component could not be instantiated"),
            });
        }
        let Some(factory) = self.pending.get(name).cloned() else {
            return Ok(());
        };

        self.tracker
            .start_creating(name)
            .map_err(|cycle| ContainerError::CyclicDependency { cycle })?;
        let result = self.instantiate(&factory);
        self.tracker.finish_creating(name);

        match result {
            Ok(instance) => {
                self.pending.remove(name);
                tracing::debug!("Instantiated '{}' ({})", name, factory.descriptor().type_name());
                self.registry.insert(ManagedComponent::owned(
                    name,
                    Arc::clone(factory.descriptor()),
                    instance,
                ))
            }
            Err(e) => {
                self.pending.remove(name);
                self.failed.insert(name.to_string());
                Err(e)
            }
        }
    }

    fn instantiate(&mut self, factory: &ComponentFactory) -> ContainerResult<ManagedInstance> {
        for (point, key) in factory.dependencies(&self.resolver) {
            for dependency in self.dependency_names(&key, point.target()) {
                self.build(&dependency)
                    .map_err(|e| ContainerError::instantiation(factory.name(), e))?;
            }
        }
        let args = factory
            .arguments(&self.registry, &self.resolver)
            .map_err(|e| ContainerError::instantiation(factory.name(), e))?;
        factory.build(args)
    }

    /// 参数需要先构造的组件：同名组件，否则所有可赋值的待构造组件
    fn dependency_names(&self, key: &str, target: &TargetType) -> Vec<String> {
        if self.pending.contains_key(key) || self.failed.contains(key) || self.registry.contains(key) {
            return vec![key.to_string()];
        }
        let mut names: Vec<String> = self
            .pending
            .values()
            .filter(|factory| factory.descriptor().provides(target))
            .map(|factory| factory.name().to_string())
            .collect();
        names.sort();
        names
    }
}

/// [`Context`] 构建器
///
/// ```ignore
/// let context = Context::builder()
///     .application::<App>()
///     .configuration_store(MapConfigurationStore::new().with("Foo", [("size", "3")]))
///     .strict_wiring(true)
///     .build()?;
/// ```
pub struct ContextBuilder {
    application: Option<(TypeId, &'static str)>,
    packages: Vec<String>,
    scanner: Option<Box<dyn ComponentScanner>>,
    store: Option<Box<dyn ConfigurationStore>>,
    settings: ContextSettings,
    converters: ConverterRegistry,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            application: None,
            packages: Vec::new(),
            scanner: None,
            store: None,
            settings: ContextSettings::default(),
            converters: ConverterRegistry::with_defaults(),
        }
    }

    /// 应用标记，提供扫描的根命名空间
    pub fn application<A: 'static>(mut self) -> Self {
        self.application = Some((TypeId::of::<A>(), std::any::type_name::<A>()));
        self
    }

    /// 追加根命名空间
    pub fn packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages.extend(packages.into_iter().map(Into::into));
        self
    }

    pub fn scanner(mut self, scanner: impl ComponentScanner + 'static) -> Self {
        self.scanner = Some(Box::new(scanner));
        self
    }

    pub fn configuration_store(mut self, store: impl ConfigurationStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn settings(mut self, settings: ContextSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn strict_wiring(mut self, strict: bool) -> Self {
        self.settings.strict_wiring = strict;
        self
    }

    /// 注册上下文范围的额外转换器
    pub fn converter<T, F, E>(mut self, parse: F) -> Self
    where
        T: std::any::Any + Send + Sync,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        self.converters.register::<T, F, E>(parse);
        self
    }

    fn namespaces(&self) -> ContainerResult<Vec<Namespace>> {
        let mut roots = self.packages.clone();
        match self.application {
            Some((id, type_name)) => {
                let registration = ApplicationRegistration::find(id).ok_or_else(|| {
                    ContainerError::ApplicationInitialization(format!(
                        "{} is not an application marker, derive ManagedApplication on it",
                        type_name
                    ))
                })?;
                tracing::debug!("Application marker {} found", registration.type_name());
                roots.extend(registration.packages().iter().map(|p| p.to_string()));
            }
            None if roots.is_empty() => {
                return Err(ContainerError::ApplicationInitialization(
                    "no application marker given".to_string(),
                ));
            }
            None => {}
        }
        if roots.is_empty() {
            return Err(ContainerError::ApplicationInitialization(
                "application marker declares no packages to scan".to_string(),
            ));
        }
        Ok(roots.iter().map(|root| Namespace::parse(root)).collect())
    }

    pub fn build(self) -> ContainerResult<Arc<Context>> {
        let context = self.assemble()?;
        context.initialize(None)?;
        Ok(context)
    }

    /// 构建上下文，`fixture` 以类型的简单名称作为组件参与第一次初始化
    pub fn build_with<T: Managed>(self, fixture: Arc<T>) -> ContainerResult<Arc<Context>> {
        let component = external_component(fixture, T::descriptor().simple_name().to_string())?;
        let context = self.assemble()?;
        tracing::debug!("Initializing with fixture '{}'", component.name());
        context.initialize(Some(component))?;
        Ok(context)
    }

    fn assemble(self) -> ContainerResult<Arc<Context>> {
        let namespaces = self.namespaces()?;
        tracing::info!(
            "Building context for namespace(s): {}",
            namespaces.iter().map(|ns| ns.to_string()).collect::<Vec<_>>().join(", ")
        );

        let store = self
            .store
            .unwrap_or_else(|| Box::new(DirectoryConfigurationStore::new(self.settings.config_dir.clone())));
        let mut configurations = Configurations::load(&*store)?;
        if let Some(prefix) = &self.settings.env_prefix {
            configurations = configurations.with_env_overrides(prefix);
        }

        let scanner = self.scanner.unwrap_or_else(|| Box::new(InventoryScanner));
        let binder = ConfigurationBinder::new(Arc::new(self.converters));
        let settings = self.settings;

        let context = Arc::new_cyclic(|self_ref| Context {
            self_ref: self_ref.clone(),
            namespaces,
            scanner,
            catalog: RwLock::new(Arc::new(ComponentCatalog::default())),
            configurations,
            settings,
            binder,
            registry: RwLock::new(Arc::new(Registry::default())),
            state: RwLock::new(LifecycleState::Uninitialized),
            rebuild: Mutex::new(()),
        });
        Ok(context)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{ConfigurationSlot, Setting};
    use crate::config::MapConfigurationStore;
    use crate::injection::{InjectionPoint, InjectionSlot, OnAccess, Wired};
    use crate::injection::WireTarget;
    use crate::scanner::StaticScanner;
    use crate::descriptor::ConstructorArgs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Repository: Send + Sync {
        fn id(&self) -> usize;
    }

    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

    struct MemoryRepository {
        id: usize,
    }

    impl Default for MemoryRepository {
        fn default() -> Self {
            Self {
                id: NEXT_ID.fetch_add(1, Ordering::SeqCst),
            }
        }
    }

    impl Repository for MemoryRepository {
        fn id(&self) -> usize {
            self.id
        }
    }

    impl Managed for MemoryRepository {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<MemoryRepository>(module_path!())
                .implements::<dyn Repository>(|c: Arc<MemoryRepository>| -> Arc<dyn Repository> { c })
                .default_constructor()
                .build()
        }
    }

    #[derive(Default)]
    struct Service {
        repository: Wired<dyn Repository>,
        fresh: OnAccess<dyn Repository>,
        context: Wired<Context>,
        size: Setting<u32>,
    }

    impl Managed for Service {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<Service>(module_path!())
                .name("service")
                .default_constructor()
                .build()
        }

        fn injection_points(&self) -> Vec<InjectionSlot<'_>> {
            vec![
                InjectionSlot::new(
                    InjectionPoint::new("repository", TargetType::interface::<dyn Repository>()),
                    &self.repository,
                ),
                InjectionSlot::new(
                    InjectionPoint::new("fresh", TargetType::interface::<dyn Repository>()),
                    &self.fresh,
                ),
                InjectionSlot::new(
                    InjectionPoint::new("context", TargetType::concrete::<Context>())
                        .named(CONTEXT_COMPONENT_NAME),
                    &self.context,
                ),
            ]
        }

        fn configuration_points(&self) -> Vec<ConfigurationSlot<'_>> {
            vec![ConfigurationSlot::new("size", &self.size)]
        }
    }

    struct Head;
    struct Tail;

    impl Managed for Head {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<Head>(module_path!())
                .name("head")
                .preferred_constructor(
                    vec![InjectionPoint::new("tail", TargetType::concrete::<Tail>()).named("tail")],
                    |args: &mut ConstructorArgs| {
                        let _tail: Arc<Tail> = args.take(0)?;
                        Ok(Head)
                    },
                )
                .build()
        }
    }

    impl Managed for Tail {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<Tail>(module_path!())
                .name("tail")
                .preferred_constructor(
                    vec![InjectionPoint::new("head", TargetType::concrete::<Head>()).named("head")],
                    |args: &mut ConstructorArgs| {
                        let _head: Arc<Head> = args.take(0)?;
                        Ok(Tail)
                    },
                )
                .build()
        }
    }

    fn build(scanner: StaticScanner, store: MapConfigurationStore) -> ContainerResult<Arc<Context>> {
        Context::builder()
            .packages(["*"])
            .scanner(scanner)
            .configuration_store(store)
            .build()
    }

    fn scanner() -> StaticScanner {
        StaticScanner::new(vec![MemoryRepository::descriptor(), Service::descriptor()])
    }

    #[test]
    fn test_requires_application_or_packages() {
        let err = Context::builder().build().unwrap_err();
        assert!(matches!(err, ContainerError::ApplicationInitialization(_)));

        struct Unmarked;
        let err = Context::builder().application::<Unmarked>().build().unwrap_err();
        assert!(matches!(err, ContainerError::ApplicationInitialization(_)));
    }

    #[test]
    fn test_initializes_and_wires() {
        let store = MapConfigurationStore::new().with("service", [("size", "42")]);
        let context = build(scanner(), store).unwrap();
        assert_eq!(context.state(), LifecycleState::Initialized);

        let names = context.component_names();
        assert_eq!(names[0], CONTEXT_COMPONENT_NAME);
        assert!(context.contains_component("service"));

        let service = context.get_instance::<Service>("service").unwrap();
        let repository_name = std::any::type_name::<MemoryRepository>();
        let registered = context.get_instance::<dyn Repository>(repository_name).unwrap();
        assert_eq!(service.repository.get().unwrap().id(), registered.id());
        assert_eq!(service.size.get(), 42);

        let own = service.context.get().unwrap();
        assert!(Arc::ptr_eq(&own, &context));
    }

    #[test]
    fn test_access_scope_builds_fresh_instances() {
        let context = build(scanner(), MapConfigurationStore::new()).unwrap();
        let service = context.get_instance::<Service>("service").unwrap();
        let first = service.fresh.resolve().unwrap();
        let second = service.fresh.resolve().unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_cycle_is_reported() {
        let scanner = StaticScanner::new(vec![Head::descriptor(), Tail::descriptor()]);
        let err = build(scanner, MapConfigurationStore::new()).unwrap_err();
        match err {
            ContainerError::CyclicDependency { cycle } => {
                assert_eq!(cycle, vec!["head", "tail", "head"]);
            }
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let context = build(scanner(), MapConfigurationStore::new()).unwrap();
        context.close().unwrap();
        context.close().unwrap();
        assert_eq!(context.state(), LifecycleState::Closed);
        assert!(context.component_names().is_empty());

        let err = context.register(Arc::new(MemoryRepository::default()), "late").unwrap_err();
        assert!(matches!(err, ContainerError::ContextClosed));
    }

    #[test]
    fn test_register_rebuilds() {
        let context = build(scanner(), MapConfigurationStore::new()).unwrap();
        let external = Arc::new(MemoryRepository::default());
        context.register(Arc::clone(&external), "external").unwrap();

        let registered = context.get_instance::<MemoryRepository>("external").unwrap();
        assert!(Arc::ptr_eq(&registered, &external));

        // 两个仓库实现后，按类型装配出现歧义，字段留空
        let service = context.get_instance::<Service>("service").unwrap();
        assert!(service.repository.get().is_none());
    }

    #[test]
    fn test_injected_context_is_held_weakly() {
        let context = build(scanner(), MapConfigurationStore::new()).unwrap();
        let service = context.get_instance::<Service>("service").unwrap();
        assert!(service.context.is_bound());

        let weak = Arc::downgrade(&context);
        drop(context);
        assert!(weak.upgrade().is_none());
        assert!(service.context.get().is_none());
    }

    struct Faulty;

    impl Managed for Faulty {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<Faulty>(module_path!())
                .manual()
                .on_initialize("start", |_: &Faulty| -> anyhow::Result<()> {
                    anyhow::bail!("refusing to start")
                })
                .build()
        }
    }

    #[test]
    fn test_failed_rebuild_leaves_failed_state() {
        let context = build(scanner(), MapConfigurationStore::new()).unwrap();
        let service = context.get_instance::<Service>("service").unwrap();

        let err = context.register(Arc::new(Faulty), "faulty").unwrap_err();
        assert!(matches!(err, ContainerError::LifecycleHook { ref hook, .. } if hook == "start"));
        assert_eq!(context.state(), LifecycleState::Failed);
        assert!(context.component_names().is_empty());
        assert!(!context.contains_component("faulty"));

        // 旧组件仍持有访问作用域绑定，但上下文已拒绝构造
        let err = service.fresh.resolve().err().unwrap();
        assert!(matches!(err, ContainerError::ContextFailed));

        // 再次注册可以恢复
        context.register(Arc::new(MemoryRepository::default()), "recovered").unwrap();
        assert_eq!(context.state(), LifecycleState::Initialized);
        assert!(context.contains_component("recovered"));
    }

    struct Server;
    struct ServerStats;

    impl Managed for Server {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<Server>(module_path!())
                .constructor(|| Ok(Server))
                .build()
        }
    }

    impl Managed for ServerStats {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<ServerStats>(module_path!())
                .constructor(|| Ok(ServerStats))
                .build()
        }
    }

    #[test]
    fn test_longer_type_name_owns_its_sources() {
        let scanner = StaticScanner::new(vec![Server::descriptor(), ServerStats::descriptor()]);
        let store = MapConfigurationStore::new()
            .with("Server", [("port", "1")])
            .with("ServerStats", [("window", "5")])
            .with("ServerStats_eu", [("window", "7")]);
        let context = build(scanner, store).unwrap();

        assert!(context.get_instance::<Server>("Server").is_some());
        assert!(context.get_instance::<ServerStats>("ServerStats").is_some());
        assert!(context.get_instance::<ServerStats>("ServerStats_eu").is_some());
        assert!(context.get_instance::<Server>("ServerStats").is_none());
    }

    #[test]
    fn test_reserved_name_rejected() {
        let context = build(scanner(), MapConfigurationStore::new()).unwrap();
        let err = context
            .register(Arc::new(MemoryRepository::default()), CONTEXT_COMPONENT_NAME)
            .unwrap_err();
        assert!(matches!(err, ContainerError::DuplicateComponent(_)));
    }
}
