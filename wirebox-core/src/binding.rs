use crate::component::ManagedObject;
use crate::config::ConfigurationSource;
use crate::converter::{
    instantiate, ConverterConstructor, ConverterFactory, ConverterRegistry, DefaultTypeConverter,
    TypeConverter,
};
use crate::descriptor::TargetType;
use crate::error::{ContainerError, ContainerResult, ConversionError};
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 可配置字段
///
/// 配置阶段按字段名（或 `#[configurable(name = "..")]` 指定的键）从组件的配置源取值，
/// 找不到键时保留初始值。
pub struct Setting<T> {
    value: RwLock<T>,
}

impl<T> Setting<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    pub fn with<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        read(&self.value.read())
    }

    pub fn set(&self, value: T) {
        *self.value.write() = value;
    }
}

impl<T: Clone> Setting<T> {
    pub fn get(&self) -> T {
        self.value.read().clone()
    }
}

impl<T: Default> Default for Setting<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Setting").field(&*self.value.read()).finish()
    }
}

/// 可被配置阶段赋值的字段
pub trait ConfigurationTarget: Send + Sync {
    /// 字段的声明类型
    fn target(&self) -> TargetType;

    /// 字段本身就是字符串时直接赋值，返回是否已赋值
    fn assign_raw(&self, raw: &str) -> bool;

    /// 赋值转换结果；类型不符时原样退回
    fn assign(&self, value: Box<dyn Any + Send + Sync>) -> Result<(), Box<dyn Any + Send + Sync>>;
}

impl<T: Send + Sync + 'static> ConfigurationTarget for Setting<T> {
    fn target(&self) -> TargetType {
        TargetType::concrete::<T>()
    }

    fn assign_raw(&self, raw: &str) -> bool {
        let text: Box<dyn Any + Send + Sync> = Box::new(raw.to_string());
        self.assign(text).is_ok()
    }

    fn assign(&self, value: Box<dyn Any + Send + Sync>) -> Result<(), Box<dyn Any + Send + Sync>> {
        let value = value.downcast::<T>()?;
        *self.value.write() = *value;
        Ok(())
    }
}

/// 配置点：字段、配置键与可选的自定义转换器
pub struct ConfigurationSlot<'a> {
    field: &'static str,
    key: String,
    target: &'a dyn ConfigurationTarget,
    converter: Option<ConverterConstructor>,
}

impl<'a> ConfigurationSlot<'a> {
    /// 配置键默认为字段名
    pub fn new(field: &'static str, target: &'a dyn ConfigurationTarget) -> Self {
        Self {
            field,
            key: field.to_string(),
            target,
            converter: None,
        }
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.is_empty() {
            self.key = key;
        }
        self
    }

    /// 使用自定义转换器代替默认转换
    pub fn converter<C: ConverterFactory>(mut self) -> Self {
        self.converter = Some(instantiate::<C>);
        self
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn config_key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for ConfigurationSlot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationSlot")
            .field("field", &self.field)
            .field("key", &self.key)
            .field("target", &self.target.target().name())
            .field("custom_converter", &self.converter.is_some())
            .finish()
    }
}

/// 配置绑定器
#[derive(Debug, Clone)]
pub struct ConfigurationBinder {
    converters: Arc<ConverterRegistry>,
}

impl ConfigurationBinder {
    pub fn new(converters: Arc<ConverterRegistry>) -> Self {
        Self { converters }
    }

    /// 绑定一个值，返回是否发生了赋值
    ///
    /// - 值不存在：不赋值，不是错误
    /// - 字段为字符串且未指定转换器：直接赋值
    /// - 其余情况经转换器转换后赋值
    pub fn bind(&self, slot: &ConfigurationSlot<'_>, raw: Option<&str>) -> Result<bool, ConversionError> {
        let Some(raw) = raw else {
            return Ok(false);
        };
        let target = slot.target.target();

        if slot.converter.is_none() && slot.target.assign_raw(raw) {
            return Ok(true);
        }

        let converter: Box<dyn TypeConverter> = match slot.converter {
            Some(construct) => construct(&target)?,
            None => Box::new(DefaultTypeConverter::new(target, Arc::clone(&self.converters))),
        };
        let value = converter.convert(raw)?;
        slot.target.assign(value).map_err(|_| {
            ConversionError::new(target.name(), raw, "converter produced a value of a different type")
        })?;
        Ok(true)
    }

    /// 对组件的全部配置点执行绑定
    pub(crate) fn configure(
        &self,
        component: &str,
        object: &dyn ManagedObject,
        source: Option<&ConfigurationSource>,
    ) -> ContainerResult<()> {
        let slots = object.configuration_points();
        if slots.is_empty() {
            return Ok(());
        }
        let Some(source) = source else {
            tracing::trace!(
                "No configuration source for component '{}', {} field(s) keep their defaults",
                component,
                slots.len()
            );
            return Ok(());
        };

        for slot in &slots {
            let raw = source.get(slot.config_key());
            let assigned = self
                .bind(slot, raw)
                .map_err(|source| ContainerError::Configuration {
                    component: component.to_string(),
                    field: slot.field().to_string(),
                    source,
                })?;
            if assigned {
                tracing::trace!(
                    "Configured '{}.{}' from '{}'",
                    component,
                    slot.field(),
                    source.name()
                );
            }
        }
        Ok(())
    }
}

impl Default for ConfigurationBinder {
    fn default() -> Self {
        Self::new(Arc::new(ConverterRegistry::with_defaults()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_value_keeps_default() {
        let binder = ConfigurationBinder::default();
        let port: Setting<u16> = Setting::default();
        let slot = ConfigurationSlot::new("port", &port);
        assert!(!binder.bind(&slot, None).unwrap());
        assert_eq!(port.get(), 0);
    }

    #[test]
    fn test_primitive_parse() {
        let binder = ConfigurationBinder::default();
        let port: Setting<i32> = Setting::default();
        let slot = ConfigurationSlot::new("port", &port);
        assert!(binder.bind(&slot, Some("42")).unwrap());
        assert_eq!(port.get(), 42);
    }

    #[test]
    fn test_string_assigned_directly() {
        let binder = ConfigurationBinder::default();
        let url: Setting<String> = Setting::default();
        let slot = ConfigurationSlot::new("url", &url);
        binder.bind(&slot, Some(" jdbc:h2 ")).unwrap();
        assert_eq!(url.get(), " jdbc:h2 ");
    }

    #[test]
    fn test_conversion_failure() {
        let binder = ConfigurationBinder::default();
        let enabled: Setting<bool> = Setting::default();
        let slot = ConfigurationSlot::new("enabled", &enabled).key("feature.enabled");
        assert_eq!(slot.config_key(), "feature.enabled");
        let err = binder.bind(&slot, Some("maybe")).unwrap_err();
        assert_eq!(err.target, "bool");
        assert_eq!(err.value, "maybe");
        assert!(!enabled.get());
    }

    struct Words;

    impl TypeConverter for Words {
        fn convert(&self, raw: &str) -> Result<Box<dyn Any + Send + Sync>, ConversionError> {
            Ok(Box::new(
                raw.split(',').map(|w| w.trim().to_string()).collect::<Vec<_>>(),
            ))
        }
    }

    impl ConverterFactory for Words {
        fn for_target(target: &TargetType) -> Option<Self> {
            (target.id() == std::any::TypeId::of::<Vec<String>>()).then_some(Words)
        }
    }

    #[test]
    fn test_custom_converter() {
        let binder = ConfigurationBinder::default();
        let tags: Setting<Vec<String>> = Setting::default();
        let slot = ConfigurationSlot::new("tags", &tags).converter::<Words>();
        binder.bind(&slot, Some("a, b,c")).unwrap();
        assert_eq!(tags.get(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_custom_converter_type_mismatch() {
        let binder = ConfigurationBinder::default();
        let count: Setting<u32> = Setting::default();
        // Words 只为 Vec<String> 构造
        let slot = ConfigurationSlot::new("count", &count).converter::<Words>();
        assert!(binder.bind(&slot, Some("1")).is_err());
    }
}
