use crate::component::{ManagedComponent, ManagedObject};
use crate::context::Context;
use crate::error::{ContainerError, ContainerResult};
use crate::injection::{AccessBinding, InjectionSlot};
use crate::registry::{Lookup, Registry};
use crate::resolver::NameResolver;
use crate::scope::Scope;
use std::sync::{Arc, Weak};

/// 注入绑定器：把解析出的依赖赋给实例的注入字段
pub(crate) struct InjectionBinder<'a> {
    registry: &'a Registry,
    resolver: NameResolver<'a>,
    context: Weak<Context>,
    strict: bool,
}

impl<'a> InjectionBinder<'a> {
    pub fn new(
        registry: &'a Registry,
        resolver: NameResolver<'a>,
        context: Weak<Context>,
        strict: bool,
    ) -> Self {
        Self {
            registry,
            resolver,
            context,
            strict,
        }
    }

    /// 装配一个实例的全部注入点
    pub fn wire(&self, component: &str, object: &dyn ManagedObject) -> ContainerResult<()> {
        for slot in object.injection_points() {
            let key = self.resolver.resolve(slot.point());
            match slot.point().scope() {
                Scope::Static => self.bind_static(component, &slot, &key)?,
                Scope::Access => self.install_access(component, &slot, key),
            }
        }
        Ok(())
    }

    fn bind_static(&self, component: &str, slot: &InjectionSlot<'_>, key: &str) -> ContainerResult<()> {
        let point = slot.point();
        let target = point.target();

        match self.registry.lookup(key, target) {
            Lookup::Named(candidate) => self.assign(component, slot, candidate),
            Lookup::Unique(candidate) => {
                tracing::trace!(
                    "No component named '{}', wiring '{}.{}' by type to '{}'",
                    key,
                    component,
                    point.field(),
                    candidate.name()
                );
                self.assign(component, slot, candidate)
            }
            Lookup::Missing if self.strict => Err(ContainerError::MatchingDependencyNotFound {
                target: target.name().to_string(),
                name: point.explicit_name().map(str::to_string),
            }),
            Lookup::Ambiguous(candidates) if self.strict => Err(ContainerError::AmbiguousDependency {
                target: target.name().to_string(),
                candidates,
            }),
            Lookup::Missing => {
                tracing::debug!(
                    "No candidate for '{}.{}' ({}), field left unset",
                    component,
                    point.field(),
                    target
                );
                Ok(())
            }
            Lookup::Ambiguous(candidates) => {
                tracing::debug!(
                    "Ambiguous candidates {:?} for '{}.{}' ({}), field left unset",
                    candidates,
                    component,
                    point.field(),
                    target
                );
                Ok(())
            }
        }
    }

    fn assign(
        &self,
        component: &str,
        slot: &InjectionSlot<'_>,
        candidate: &Arc<ManagedComponent>,
    ) -> ContainerResult<()> {
        let point = slot.point();
        if !candidate.is_live() {
            tracing::warn!(
                "Component '{}' is no longer available, '{}.{}' left unset",
                candidate.name(),
                component,
                point.field()
            );
            return Ok(());
        }

        // 上下文以弱引用注入，避免注册表中的组件持有上下文
        let bound = match candidate.context_ref() {
            Some(context) => slot.target().bind(context),
            None => candidate
                .view(point.target().id())
                .is_some_and(|view| slot.target().bind(view.as_ref())),
        };
        if !bound {
            return Err(ContainerError::DependencyWiring {
                component: component.to_string(),
                field: point.field().to_string(),
                reason: format!(
                    "component '{}' ({}) is not assignable to {}",
                    candidate.name(),
                    candidate.type_name(),
                    point.target()
                ),
            });
        }
        tracing::trace!("Wired '{}.{}' -> '{}'", component, point.field(), candidate.name());
        Ok(())
    }

    fn install_access(&self, component: &str, slot: &InjectionSlot<'_>, key: String) {
        let point = slot.point();
        tracing::trace!(
            "Installing access-scope indirection on '{}.{}' for '{}'",
            component,
            point.field(),
            key
        );
        let binding = AccessBinding::new(self.context.clone(), point.clone(), key);
        slot.target().install(binding);
    }
}
