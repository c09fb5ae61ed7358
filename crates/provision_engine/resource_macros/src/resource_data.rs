//! Derive macro for the `ResourceData` trait.

use crate::engine_path::engine_crate_path;
use darling::FromDeriveInput;
use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

/// Parsed attributes for the macro.
#[derive(FromDeriveInput)]
#[darling(attributes(resource))]
struct ResourceArgs {
    ident: syn::Ident,
    generics: syn::Generics,

    /// The registered type name. Defaults to the type identifier.
    #[darling(default)]
    name: Option<String>,
}

pub(crate) fn derive_resource_data(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let args = match ResourceArgs::from_derive_input(&input) {
        Ok(args) => args,
        Err(err) => return err.write_errors().into(),
    };

    let ident = &args.ident;
    let (impl_generics, ty_generics, where_clause) = args.generics.split_for_impl();

    let name = args.name.clone().unwrap_or_else(|| ident.to_string());

    let engine_crate = engine_crate_path();

    let expanded = quote! {
        impl #impl_generics #engine_crate::ResourceData for #ident #ty_generics #where_clause {
            fn type_name() -> &'static str {
                #name
            }
        }
    };

    expanded.into()
}
