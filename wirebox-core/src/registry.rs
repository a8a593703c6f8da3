use crate::component::ManagedComponent;
use crate::descriptor::TargetType;
use crate::error::{ContainerError, ContainerResult};
use std::collections::HashMap;
use std::sync::Arc;

/// 按名称查找依赖的结果
pub(crate) enum Lookup<'a> {
    /// 注册表中存在同名组件
    Named(&'a Arc<ManagedComponent>),
    /// 无同名组件，但恰好有一个组件可赋值给目标类型
    Unique(&'a Arc<ManagedComponent>),
    Missing,
    Ambiguous(Vec<String>),
}

/// 组件注册表
///
/// 名称唯一，保留注册顺序。初始化完成后以 `Arc` 快照形式发布，之后不再修改。
#[derive(Clone, Default)]
pub(crate) struct Registry {
    order: Vec<String>,
    components: HashMap<String, Arc<ManagedComponent>>,
}

impl Registry {
    pub fn insert(&mut self, component: ManagedComponent) -> ContainerResult<()> {
        let name = component.name().to_string();
        if self.components.contains_key(&name) {
            return Err(ContainerError::DuplicateComponent(name));
        }
        self.order.push(name.clone());
        self.components.insert(name, Arc::new(component));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ManagedComponent>> {
        self.components.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// 按注册顺序遍历
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Arc<ManagedComponent>> {
        self.order.iter().filter_map(|name| self.components.get(name))
    }

    /// 可赋值给目标类型的组件
    pub fn providers(&self, target: &TargetType) -> Vec<&Arc<ManagedComponent>> {
        self.iter()
            .filter(|component| component.descriptor().provides(target))
            .collect()
    }

    /// 先按名称精确匹配，再按类型能力查找唯一候选
    pub fn lookup(&self, key: &str, target: &TargetType) -> Lookup<'_> {
        if let Some(component) = self.get(key) {
            return Lookup::Named(component);
        }
        let providers = self.providers(target);
        match providers.as_slice() {
            [] => Lookup::Missing,
            [single] => Lookup::Unique(single),
            many => Lookup::Ambiguous(many.iter().map(|c| c.name().to_string()).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Managed;
    use crate::descriptor::{ComponentDescriptor, ConstructorArgs};

    trait Store: Send + Sync {}

    #[derive(Default)]
    struct Memory;
    impl Store for Memory {}

    #[derive(Default)]
    struct Disk;
    impl Store for Disk {}

    impl Managed for Memory {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<Memory>(module_path!())
                .implements::<dyn Store>(|c: Arc<Memory>| -> Arc<dyn Store> { c })
                .default_constructor()
                .build()
        }
    }

    impl Managed for Disk {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<Disk>(module_path!())
                .implements::<dyn Store>(|c: Arc<Disk>| -> Arc<dyn Store> { c })
                .default_constructor()
                .build()
        }
    }

    fn component<T: Managed>(name: &str) -> ManagedComponent {
        let descriptor = Arc::new(T::descriptor());
        let instance = descriptor
            .construct(&mut ConstructorArgs::empty(name))
            .unwrap();
        ManagedComponent::owned(name, descriptor, instance)
    }

    #[test]
    fn test_names_are_unique() {
        let mut registry = Registry::default();
        registry.insert(component::<Memory>("store")).unwrap();
        let err = registry.insert(component::<Disk>("store")).unwrap_err();
        assert!(matches!(err, ContainerError::DuplicateComponent(name) if name == "store"));
    }

    #[test]
    fn test_lookup_prefers_name_then_unique_provider() {
        let store = TargetType::interface::<dyn Store>();
        let mut registry = Registry::default();
        registry.insert(component::<Memory>("memory")).unwrap();

        assert!(matches!(registry.lookup("memory", &store), Lookup::Named(_)));
        assert!(matches!(registry.lookup("other", &store), Lookup::Unique(c) if c.name() == "memory"));

        registry.insert(component::<Disk>("disk")).unwrap();
        match registry.lookup("other", &store) {
            Lookup::Ambiguous(names) => assert_eq!(names, vec!["memory", "disk"]),
            _ => panic!("expected ambiguous lookup"),
        }
        assert!(matches!(
            registry.lookup("other", &TargetType::concrete::<String>()),
            Lookup::Missing
        ));
    }

    #[test]
    fn test_iteration_keeps_registration_order() {
        let mut registry = Registry::default();
        registry.insert(component::<Disk>("b")).unwrap();
        registry.insert(component::<Memory>("a")).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(registry.len(), 2);
    }
}
