use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Ident, ItemFn, LitStr, Path, parse_macro_input, parse_quote};

/// Implementation of the `#[register_module]` attribute macro.
///
/// Leaves the decorated function unchanged and appends a
/// `#[linkme::distributed_slice]` static that wires it into
/// `rivet_framework::MODULE_REGISTRY`.
pub fn register_module(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut id: Option<LitStr> = None;
    let mut krate: Option<Path> = None;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("id") {
            id = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("crate") {
            krate = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported argument, expected `id` or `crate`"))
        }
    });
    parse_macro_input!(attr with parser);

    let func = parse_macro_input!(item as ItemFn);

    if let Some(asyncness) = &func.sig.asyncness {
        return syn::Error::new_spanned(asyncness, "module factories must not be async")
            .into_compile_error()
            .into();
    }
    if !func.sig.generics.params.is_empty() {
        return syn::Error::new_spanned(&func.sig.generics, "module factories must not be generic")
            .into_compile_error()
            .into();
    }
    if func.sig.inputs.len() != 1 {
        return syn::Error::new_spanned(
            &func.sig.inputs,
            "module factories take exactly one `&ModuleContext` parameter",
        )
        .into_compile_error()
        .into();
    }

    let fn_name = &func.sig.ident;
    let id = id.unwrap_or_else(|| LitStr::new(&fn_name.to_string(), fn_name.span()));
    let krate = krate.unwrap_or_else(|| parse_quote!(::rivet_framework));

    let fn_name_upper = fn_name.to_string().to_uppercase();
    let static_name = Ident::new(
        &format!("_MODULE_REGISTER_{fn_name_upper}"),
        Span::call_site(),
    );

    quote! {
        #func

        #[#krate::linkme::distributed_slice(#krate::MODULE_REGISTRY)]
        #[linkme(crate = #krate::linkme)]
        static #static_name: #krate::ModuleFactory =
            #krate::ModuleFactory::new(#id, #fn_name);
    }
    .into()
}
