use crate::descriptor::TargetType;
use crate::error::ConversionError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

type ParseFn = Arc<dyn Fn(&str) -> Result<Box<dyn Any + Send + Sync>, String> + Send + Sync>;

/// 字符串到字段类型的转换器
pub trait TypeConverter: Send + Sync {
    fn convert(&self, raw: &str) -> Result<Box<dyn Any + Send + Sync>, ConversionError>;
}

/// 配置点可指定的自定义转换器
///
/// 容器先以字段类型调用 [`for_target`](ConverterFactory::for_target)，
/// 返回 `None` 时再调用 [`create`](ConverterFactory::create)。
pub trait ConverterFactory: TypeConverter + Sized + 'static {
    fn for_target(target: &TargetType) -> Option<Self> {
        let _ = target;
        None
    }

    fn create() -> Option<Self> {
        None
    }
}

/// 构造配置点转换器的函数指针
pub type ConverterConstructor = fn(&TargetType) -> Result<Box<dyn TypeConverter>, ConversionError>;

/// 按 [`ConverterFactory`] 的约定构造转换器
pub fn instantiate<C: ConverterFactory>(
    target: &TargetType,
) -> Result<Box<dyn TypeConverter>, ConversionError> {
    C::for_target(target)
        .or_else(C::create)
        .map(|converter| Box::new(converter) as Box<dyn TypeConverter>)
        .ok_or_else(|| {
            ConversionError::new(
                target.name(),
                "",
                format!("converter {} cannot be constructed", std::any::type_name::<C>()),
            )
        })
}

/// 按目标类型注册的解析函数表
#[derive(Clone)]
pub struct ConverterRegistry {
    parsers: HashMap<TypeId, ParseFn>,
}

impl ConverterRegistry {
    /// 空表
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// 内置整数、浮点、布尔、字符、字符串与路径的转换
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_from_str::<i8>();
        registry.register_from_str::<i16>();
        registry.register_from_str::<i32>();
        registry.register_from_str::<i64>();
        registry.register_from_str::<i128>();
        registry.register_from_str::<isize>();
        registry.register_from_str::<u8>();
        registry.register_from_str::<u16>();
        registry.register_from_str::<u32>();
        registry.register_from_str::<u64>();
        registry.register_from_str::<u128>();
        registry.register_from_str::<usize>();
        registry.register_from_str::<f32>();
        registry.register_from_str::<f64>();
        registry.register_from_str::<bool>();
        registry.register_from_str::<char>();
        registry.register::<String, _, std::convert::Infallible>(|raw| Ok(raw.to_string()));
        registry.register::<PathBuf, _, std::convert::Infallible>(|raw| Ok(PathBuf::from(raw.trim())));
        registry
    }

    /// 注册解析函数，同类型的旧条目被替换
    pub fn register<T, F, E>(&mut self, parse: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        self.parsers.insert(
            TypeId::of::<T>(),
            Arc::new(move |raw: &str| {
                parse(raw)
                    .map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
                    .map_err(|e| e.to_string())
            }),
        );
        self
    }

    /// 以 `FromStr` 注册，输入先去掉首尾空白
    pub fn register_from_str<T>(&mut self) -> &mut Self
    where
        T: FromStr + Any + Send + Sync,
        T::Err: fmt::Display,
    {
        self.register::<T, _, T::Err>(|raw| raw.trim().parse::<T>())
    }

    pub fn supports(&self, target: &TargetType) -> bool {
        self.parsers.contains_key(&target.id())
    }

    pub fn convert(
        &self,
        target: &TargetType,
        raw: &str,
    ) -> Result<Box<dyn Any + Send + Sync>, ConversionError> {
        let parse = self
            .parsers
            .get(&target.id())
            .ok_or_else(|| ConversionError::unsupported(target.name(), raw))?;
        parse(raw).map_err(|reason| ConversionError::new(target.name(), raw, reason))
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("types", &self.parsers.len())
            .finish()
    }
}

/// 默认转换器，按字段的确切类型查表
pub struct DefaultTypeConverter {
    target: TargetType,
    registry: Arc<ConverterRegistry>,
}

impl DefaultTypeConverter {
    pub fn new(target: TargetType, registry: Arc<ConverterRegistry>) -> Self {
        Self { target, registry }
    }
}

impl TypeConverter for DefaultTypeConverter {
    fn convert(&self, raw: &str) -> Result<Box<dyn Any + Send + Sync>, ConversionError> {
        self.registry.convert(&self.target, raw)
    }
}
