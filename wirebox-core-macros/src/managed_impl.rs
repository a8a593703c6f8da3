use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use proc_macro_error::abort;
use quote::quote;
use syn::spanned::Spanned;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields, Type};

use crate::attribute_helpers::{
    extract_generic_type, get_configurable_args, get_field_default, get_hook_methods,
    get_implements, get_managed_args, get_wire_args, has_attr, is_interface, is_option_type,
    is_wrapper_type, WireArgs,
};

pub(crate) fn derive_managed_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        abort!(
            input.generics.span(),
            "#[derive(Managed)] does not support generic types";
            help = "wrap the generic type in a concrete newtype"
        );
    }

    let fields: Vec<&Field> = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => fields.named.iter().collect(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => abort!(
                name.span(),
                "#[derive(Managed)] requires named fields or a unit struct"
            ),
        },
        _ => abort!(name.span(), "#[derive(Managed)] can only be used on structs"),
    };
    let is_unit = matches!(&input.data, Data::Struct(s) if matches!(s.fields, Fields::Unit));

    let managed = get_managed_args(&input.attrs);
    let name_call = managed.name.map(|component_name| quote! { .name(#component_name) });
    let manual_call = managed.manual.then(|| quote! { .manual() });

    let implements_calls = get_implements(&input.attrs).into_iter().map(|path| {
        quote! {
            .implements::<dyn #path>(
                |component: ::std::sync::Arc<Self>| -> ::std::sync::Arc<dyn #path> { component }
            )
        }
    });

    let initialize_calls = get_hook_methods(&input.attrs, "initialize").into_iter().map(|method| {
        let hook = method.to_string();
        quote! { .on_initialize(#hook, |component: &Self| component.#method()) }
    });
    let clean_up_calls = get_hook_methods(&input.attrs, "clean_up").into_iter().map(|method| {
        let hook = method.to_string();
        quote! { .on_clean_up(#hook, |component: &Self| component.#method()) }
    });

    let constructor_call = constructor(&fields, is_unit);
    let injection_slots = fields.iter().filter_map(|field| injection_slot(field));
    let configuration_slots = fields.iter().filter_map(|field| configuration_slot(field));

    // 手工组件只能通过 Context::register 使用，不提交扫描注册
    let registration = (!managed.manual).then(|| {
        quote! {
            ::wirebox_core::inventory::submit! {
                ::wirebox_core::ComponentRegistration::new(<#name as ::wirebox_core::Managed>::descriptor)
            }
        }
    });

    let expanded = quote! {
        impl ::wirebox_core::Managed for #name {
            fn descriptor() -> ::wirebox_core::ComponentDescriptor {
                ::wirebox_core::ComponentDescriptor::builder::<Self>(::std::module_path!())
                    #name_call
                    #manual_call
                    #(#implements_calls)*
                    #constructor_call
                    #(#initialize_calls)*
                    #(#clean_up_calls)*
                    .build()
            }

            fn injection_points(&self) -> ::std::vec::Vec<::wirebox_core::InjectionSlot<'_>> {
                ::std::vec![#(#injection_slots),*]
            }

            fn configuration_points(&self) -> ::std::vec::Vec<::wirebox_core::ConfigurationSlot<'_>> {
                ::std::vec![#(#configuration_slots),*]
            }
        }

        #registration
    };

    TokenStream::from(expanded)
}

/// 目标类型表达式：`dyn Trait` 为接口，其余为具体类型
fn target_type(ty: &Type) -> TokenStream2 {
    if is_interface(ty) {
        quote! { ::wirebox_core::TargetType::interface::<#ty>() }
    } else {
        quote! { ::wirebox_core::TargetType::concrete::<#ty>() }
    }
}

fn injection_point(field_name: &str, target: &Type, args: &WireArgs) -> TokenStream2 {
    let target = target_type(target);
    let named = args.name.as_ref().map(|n| quote! { .named(#n) });
    let filtered = args.filter.as_ref().map(|f| quote! { .filtered(#f) });
    quote! {
        ::wirebox_core::InjectionPoint::new(#field_name, #target) #named #filtered
    }
}

/// 生成构造器
///
/// 有 `#[inject]` 字段时生成首选构造器，参数按字段顺序；否则生成无参构造器。
/// 其余字段取 `Default::default()` 或 `#[managed(default = "..")]` 指定的函数。
fn constructor(fields: &[&Field], is_unit: bool) -> TokenStream2 {
    if is_unit {
        return quote! { .constructor(|| ::std::result::Result::Ok(Self)) };
    }

    let mut parameters = Vec::new();
    let mut initializers = Vec::new();
    for field in fields {
        let ident = &field.ident;
        let field_name = field_name(field);

        if let Some(args) = get_wire_args(&field.attrs, "inject") {
            let ty = &field.ty;
            let arc_type = if is_option_type(ty) {
                extract_generic_type(ty, "Option").unwrap_or(ty)
            } else {
                ty
            };
            let Some(target) = extract_generic_type(arc_type, "Arc") else {
                abort!(
                    ty.span(),
                    "#[inject] fields must be Arc<T> or Option<Arc<T>>";
                    help = "use #[wire] with Wired<T> for field injection"
                );
            };
            let index = parameters.len();
            let point = injection_point(&field_name, target, &args);
            parameters.push(quote! {
                #point.optional(<#ty as ::wirebox_core::ConstructorParam>::OPTIONAL)
            });
            initializers.push(quote! { #ident: args.take(#index)? });
        } else if let Some(default) = get_field_default(&field.attrs) {
            initializers.push(quote! { #ident: #default() });
        } else {
            initializers.push(quote! { #ident: ::std::default::Default::default() });
        }
    }

    if parameters.is_empty() {
        quote! {
            .constructor(|| ::std::result::Result::Ok(Self { #(#initializers),* }))
        }
    } else {
        quote! {
            .preferred_constructor(
                ::std::vec![#(#parameters),*],
                |args: &mut ::wirebox_core::ConstructorArgs| {
                    ::std::result::Result::Ok(Self { #(#initializers),* })
                },
            )
        }
    }
}

fn field_name(field: &Field) -> String {
    field
        .ident
        .as_ref()
        .map(|ident| ident.to_string())
        .unwrap_or_default()
}

/// `#[wire]` 字段的注入点
fn injection_slot(field: &Field) -> Option<TokenStream2> {
    let args = get_wire_args(&field.attrs, "wire")?;
    let ty = &field.ty;
    let target = extract_generic_type(ty, "Wired")
        .or_else(|| extract_generic_type(ty, "OnAccess"))
        .unwrap_or_else(|| {
            abort!(
                ty.span(),
                "#[wire] fields must be Wired<T> or OnAccess<T>";
                help = "Wired<T> binds once at startup, OnAccess<T> builds a fresh instance on every use"
            )
        });
    let ident = &field.ident;
    let point = injection_point(&field_name(field), target, &args);
    Some(quote! {
        ::wirebox_core::InjectionSlot::new(#point, &self.#ident)
    })
}

/// `#[configurable]` 字段的配置点
fn configuration_slot(field: &Field) -> Option<TokenStream2> {
    let args = get_configurable_args(&field.attrs)?;
    let ty = &field.ty;
    if !is_wrapper_type(ty, "Setting") {
        abort!(
            ty.span(),
            "#[configurable] fields must be Setting<T>";
            help = "declare the field as Setting<T> so it can be assigned after construction"
        );
    }
    if has_attr(&field.attrs, "wire") || has_attr(&field.attrs, "inject") {
        abort!(ty.span(), "a field cannot be both configurable and injected");
    }
    let ident = &field.ident;
    let field_name = field_name(field);
    let key = args.name.map(|key| quote! { .key(#key) });
    let converter = args.converter.map(|converter| quote! { .converter::<#converter>() });
    Some(quote! {
        ::wirebox_core::ConfigurationSlot::new(#field_name, &self.#ident) #key #converter
    })
}
