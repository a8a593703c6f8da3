//! 属性解析与类型检查辅助函数

use proc_macro_error::abort;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Attribute, ExprPath, GenericArgument, LitStr, Meta, Path, PathArguments, Token, Type};

/// 结构体上的 `#[managed(..)]`
#[derive(Default)]
pub(crate) struct ManagedArgs {
    pub name: Option<String>,
    pub manual: bool,
}

/// 字段上的 `#[wire(..)]` 与 `#[inject(..)]`
#[derive(Default)]
pub(crate) struct WireArgs {
    pub name: Option<String>,
    pub filter: Option<String>,
}

/// 字段上的 `#[configurable(..)]`
#[derive(Default)]
pub(crate) struct ConfigurableArgs {
    pub name: Option<String>,
    pub converter: Option<Type>,
}

pub(crate) fn has_attr(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

fn find_attr<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attrs.iter().find(|attr| attr.path().is_ident(name))
}

/// 解析 `#[managed(name = "..", manual)]`
///
/// 也接受简写 `#[managed("name")]`
pub(crate) fn get_managed_args(attrs: &[Attribute]) -> ManagedArgs {
    let mut args = ManagedArgs::default();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("managed")) {
        let Meta::List(list) = &attr.meta else {
            continue;
        };
        if let Ok(name) = syn::parse2::<LitStr>(list.tokens.clone()) {
            args.name = Some(name.value());
            continue;
        }
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                args.name = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("manual") {
                args.manual = true;
                Ok(())
            } else {
                Err(meta.error("expected `name = \"..\"` or `manual`"))
            }
        });
        if let Err(e) = parsed {
            abort!(e.span(), "{}", e);
        }
    }
    args
}

/// 解析 `#[implements(TraitA, path::TraitB)]`，可以出现多次
pub(crate) fn get_implements(attrs: &[Attribute]) -> Vec<Path> {
    let mut traits = Vec::new();
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("implements")) {
        match attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated) {
            Ok(paths) => traits.extend(paths),
            Err(e) => abort!(
                attr.span(),
                "invalid #[implements] attribute: {}", e;
                help = "list the implemented traits, e.g. #[implements(Greeter, Clock)]"
            ),
        }
    }
    traits
}

/// 解析 `#[initialize("method")]` 或 `#[clean_up("method")]`，保持声明顺序
pub(crate) fn get_hook_methods(attrs: &[Attribute], name: &str) -> Vec<syn::Ident> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident(name))
        .map(|attr| match attr.parse_args::<LitStr>() {
            Ok(method) => syn::Ident::new(&method.value(), method.span()),
            Err(_) => abort!(
                attr.span(),
                "#[{}] expects a method name", name;
                help = "write #[{}(\"method_name\")]", name
            ),
        })
        .collect()
}

/// 解析 `#[wire]`、`#[wire(name = "..", filter = "k=v")]`，`#[inject]` 同理
pub(crate) fn get_wire_args(attrs: &[Attribute], name: &str) -> Option<WireArgs> {
    let attr = find_attr(attrs, name)?;
    let mut args = WireArgs::default();
    if let Meta::List(_) = &attr.meta {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                args.name = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("filter") {
                let value: LitStr = meta.value()?.parse()?;
                if !value.value().contains('=') {
                    return Err(meta.error("filter must have the form \"key=value\""));
                }
                args.filter = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `name = \"..\"` or `filter = \"key=value\"`"))
            }
        });
        if let Err(e) = parsed {
            abort!(e.span(), "{}", e);
        }
    }
    Some(args)
}

/// 解析 `#[configurable]`、`#[configurable(name = "key", converter = Type)]`
pub(crate) fn get_configurable_args(attrs: &[Attribute]) -> Option<ConfigurableArgs> {
    let attr = find_attr(attrs, "configurable")?;
    let mut args = ConfigurableArgs::default();
    if let Meta::List(_) = &attr.meta {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let value: LitStr = meta.value()?.parse()?;
                args.name = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("converter") {
                args.converter = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `name = \"..\"` or `converter = Type`"))
            }
        });
        if let Err(e) = parsed {
            abort!(e.span(), "{}", e);
        }
    }
    Some(args)
}

/// 字段上的 `#[managed(default = "path::to::fn")]`
pub(crate) fn get_field_default(attrs: &[Attribute]) -> Option<ExprPath> {
    let attr = find_attr(attrs, "managed")?;
    let mut default = None;
    let parsed = attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("default") {
            let value: LitStr = meta.value()?.parse()?;
            default = Some(value.parse::<ExprPath>()?);
            Ok(())
        } else {
            Err(meta.error("only `default = \"path::to::fn\"` is supported on fields"))
        }
    });
    if let Err(e) = parsed {
        abort!(e.span(), "{}", e);
    }
    default
}

/// 解析 `#[packages("a::b", "c::*")]`
pub(crate) fn get_packages(attrs: &[Attribute]) -> Option<Vec<String>> {
    let attr = find_attr(attrs, "packages")?;
    match attr.parse_args_with(Punctuated::<LitStr, Token![,]>::parse_terminated) {
        Ok(packages) => Some(packages.iter().map(LitStr::value).collect()),
        Err(e) => abort!(
            attr.span(),
            "invalid #[packages] attribute: {}", e;
            help = "write #[packages(\"my_app::services\", \"my_app::repo::*\")]"
        ),
    }
}

/// 辅助函数：取类型最后一段路径的名字
fn last_segment_ident(ty: &Type) -> Option<String> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return Some(segment.ident.to_string());
        }
    }
    None
}

/// 辅助函数：取 `Wrapper<T>` 的第一个类型参数，`Wrapper` 不匹配时为 `None`
pub(crate) fn extract_generic_type<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == wrapper {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner_ty)) = args.args.first() {
                        return Some(inner_ty);
                    }
                }
            }
        }
    }
    None
}

/// 辅助函数：检测类型是否为指定包装类型
pub(crate) fn is_wrapper_type(ty: &Type, wrapper: &str) -> bool {
    last_segment_ident(ty).is_some_and(|ident| ident == wrapper)
}

/// 辅助函数：检测类型是否为 Option<T>
pub(crate) fn is_option_type(ty: &Type) -> bool {
    is_wrapper_type(ty, "Option")
}

/// `dyn Trait` 目标按接口解析
pub(crate) fn is_interface(ty: &Type) -> bool {
    match ty {
        Type::TraitObject(_) => true,
        Type::Group(group) => is_interface(&group.elem),
        Type::Paren(paren) => is_interface(&paren.elem),
        _ => false,
    }
}
