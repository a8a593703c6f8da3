use proc_macro::TokenStream;
use proc_macro_error::abort;
use quote::quote;
use syn::spanned::Spanned;
use syn::{parse_macro_input, DeriveInput};

use crate::attribute_helpers::get_packages;

pub(crate) fn derive_application_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        abort!(
            input.generics.span(),
            "#[derive(ManagedApplication)] does not support generic types"
        );
    }

    let Some(packages) = get_packages(&input.attrs) else {
        abort!(
            name.span(),
            "application marker {} declares no packages to scan", name;
            help = "add #[packages(\"my_app::*\")]"
        );
    };
    if packages.is_empty() {
        abort!(name.span(), "#[packages] must list at least one namespace");
    }

    let expanded = quote! {
        ::wirebox_core::inventory::submit! {
            ::wirebox_core::ApplicationRegistration::new(
                ::std::any::TypeId::of::<#name>,
                ::std::concat!(::std::module_path!(), "::", ::std::stringify!(#name)),
                &[#(#packages),*],
            )
        }
    };

    TokenStream::from(expanded)
}
