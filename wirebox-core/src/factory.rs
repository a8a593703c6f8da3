use crate::component::ManagedInstance;
use crate::descriptor::{ComponentDescriptor, ConstructorArgs};
use crate::error::{ContainerError, ContainerResult};
use crate::injection::InjectionPoint;
use crate::registry::{Lookup, Registry};
use crate::resolver::NameResolver;
use std::sync::Arc;

/// 绑定到一个组件名的延迟构造策略
#[derive(Debug, Clone)]
pub struct ComponentFactory {
    name: String,
    descriptor: Arc<ComponentDescriptor>,
}

impl ComponentFactory {
    pub fn new(name: impl Into<String>, descriptor: Arc<ComponentDescriptor>) -> Self {
        Self {
            name: name.into(),
            descriptor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &Arc<ComponentDescriptor> {
        &self.descriptor
    }

    /// 首选构造器参数及其组件键
    pub fn dependencies(&self, resolver: &NameResolver<'_>) -> Vec<(InjectionPoint, String)> {
        self.descriptor
            .parameters()
            .iter()
            .map(|point| (point.clone(), resolver.resolve(point)))
            .collect()
    }

    /// 从注册表解析全部实参
    ///
    /// 必需参数解析不到时报错；可选参数解析不到时为 `None`。
    pub(crate) fn arguments(
        &self,
        registry: &Registry,
        resolver: &NameResolver<'_>,
    ) -> ContainerResult<ConstructorArgs> {
        let mut values = Vec::with_capacity(self.descriptor.parameters().len());
        for (point, key) in self.dependencies(resolver) {
            let target = point.target();
            let view = match registry.lookup(&key, target) {
                Lookup::Named(component) | Lookup::Unique(component) => {
                    match component.view(target.id()) {
                        Some(view) => Some(view),
                        None if point.is_optional() => None,
                        None => {
                            return Err(ContainerError::DependencyWiring {
                                component: self.name.clone(),
                                field: point.field().to_string(),
                                reason: format!(
                                    "component '{}' ({}) is not assignable to {}",
                                    component.name(),
                                    component.type_name(),
                                    target
                                ),
                            })
                        }
                    }
                }
                _ if point.is_optional() => None,
                Lookup::Missing => {
                    return Err(ContainerError::MatchingDependencyNotFound {
                        target: target.name().to_string(),
                        name: point.explicit_name().map(str::to_string),
                    })
                }
                Lookup::Ambiguous(candidates) => {
                    return Err(ContainerError::AmbiguousDependency {
                        target: target.name().to_string(),
                        candidates,
                    })
                }
            };
            values.push((point.field().to_string(), view));
        }
        Ok(ConstructorArgs::new(self.name.clone(), values))
    }

    /// 构造实例，失败时标记组件名
    pub(crate) fn build(&self, mut args: ConstructorArgs) -> ContainerResult<ManagedInstance> {
        tracing::trace!("Constructing '{}' ({})", self.name, self.descriptor.type_name());
        self.descriptor
            .construct(&mut args)
            .map_err(|source| ContainerError::Instantiation {
                component: self.name.clone(),
                source,
            })
    }
}
