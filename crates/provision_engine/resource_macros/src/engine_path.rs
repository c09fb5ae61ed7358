//! Locating `provision_engine` from the consumer's manifest.

use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

const ENGINE: &str = "provision_engine";

/// Crates that re-export the engine as `<crate>::provision_engine`,
/// in the order they are tried.
const REEXPORTS: [&str; 2] = ["provision_internal", "provision"];

/// Path of the engine crate as seen from the crate being expanded.
pub(crate) fn engine_crate_path() -> TokenStream {
    resolve(|name| crate_name(name).ok())
}

/// A direct dependency wins, possibly renamed. Otherwise the engine is
/// reached through the first re-exporting crate the consumer depends on.
/// With neither, the bare name is emitted so the compile error names the
/// missing dependency.
fn resolve(lookup: impl Fn(&str) -> Option<FoundCrate>) -> TokenStream {
    let engine = format_ident!("{}", ENGINE);

    match lookup(ENGINE) {
        // `provision_engine` declares `extern crate self as provision_engine`
        Some(FoundCrate::Itself) => return quote!(#engine),
        Some(FoundCrate::Name(renamed)) => {
            let renamed = format_ident!("{}", renamed);
            return quote!(#renamed);
        }
        None => {}
    }

    for umbrella in REEXPORTS {
        match lookup(umbrella) {
            Some(FoundCrate::Itself) => return quote!(crate::#engine),
            Some(FoundCrate::Name(found)) => {
                let found = format_ident!("{}", found);
                return quote!(#found::#engine);
            }
            None => {}
        }
    }

    quote!(#engine)
}
