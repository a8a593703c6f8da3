use crate::config::Configurations;
use crate::injection::InjectionPoint;
use crate::utils::naming::split_filter;

/// 计算注入点的组件键
///
/// 1. 基础键为显式名称，否则为目标类型的全限定名
/// 2. 无过滤表达式时直接返回基础键
/// 3. 否则按第一个 `=` 拆分，在配置源中按发现顺序查找名称以基础键开头且包含该键值对的第一个，
///    找不到时退回基础键
///
/// 没有显式名称时，配置源也可以用目标类型的简单名称命名（`Foo`、`Foo_prod`），
/// 过滤查找同样接受以简单名称开头的配置源。
#[derive(Debug, Clone, Copy)]
pub struct NameResolver<'a> {
    configurations: &'a Configurations,
}

impl<'a> NameResolver<'a> {
    pub fn new(configurations: &'a Configurations) -> Self {
        Self { configurations }
    }

    pub fn base_key(point: &InjectionPoint) -> String {
        match point.explicit_name() {
            Some(name) => name.to_string(),
            None => point.target().name().to_string(),
        }
    }

    pub fn resolve(&self, point: &InjectionPoint) -> String {
        let base = Self::base_key(point);
        let Some(expression) = point.filter() else {
            return base;
        };
        let Some((key, value)) = split_filter(expression) else {
            tracing::warn!(
                "Ignoring malformed filter '{}' on field '{}', expected key=value",
                expression,
                point.field()
            );
            return base;
        };

        let simple = point
            .explicit_name()
            .is_none()
            .then(|| point.target().simple_name());
        let selected = self.configurations.iter().find(|source| {
            let name = source.name();
            let owned = name.starts_with(&base) || simple.is_some_and(|simple| name.starts_with(simple));
            owned && source.matches(key, value)
        });
        match selected {
            Some(source) => {
                tracing::trace!(
                    "Filter '{}' on field '{}' selected '{}'",
                    expression,
                    point.field(),
                    source.name()
                );
                source.name().to_string()
            }
            None => {
                tracing::debug!(
                    "Filter '{}' on field '{}' matched no configuration, falling back to '{}'",
                    expression,
                    point.field(),
                    base
                );
                base
            }
        }
    }
}
