use fxhash::FxHashSet;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::{Attribute, Data, DeriveInput, Fields, Ident, Meta, Path, Token, Type, Variant};

/// Per-variant facts collected before any code is generated.
struct VariantInfo<'a> {
    ident: &'a Ident,
    source_ty: Option<&'a Type>,
    source_field: Option<&'a Ident>,
    has_context: bool,
    code: Option<Ident>,
    cfg_attrs: Vec<Attribute>,
}

/// Arguments accepted by `#[fv_error(...)]`.
#[derive(Default)]
struct ErrorArgs {
    code_type: Option<Path>,
}

pub fn expand_derive(args: TokenStream, mut input: DeriveInput) -> TokenStream {
    let args = match parse_args(args) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error(),
    };

    let name = input.ident.clone();
    let ext_trait = format_ident!("{}Ext", name);

    let Data::Enum(data) = &input.data else {
        return quote! { compile_error!("fv_error can only be applied to enums"); };
    };

    let variants: Vec<VariantInfo<'_>> = match data.variants.iter().map(inspect_variant).collect()
    {
        Ok(v) => v,
        Err(err) => return err,
    };
    if let Some(err) = check_variants(&variants, args.code_type.is_some()) {
        return err;
    }

    let context_trait = context_trait(&name, &ext_trait, &variants);
    let source_impls: Vec<TokenStream> =
        variants.iter().filter_map(|v| source_conversion(&name, &ext_trait, v)).collect();
    let internal_impls = internal_conversions(&name, &variants);
    let code_impl = args.code_type.as_ref().map(|ty| code_accessor(&name, ty, &variants));

    // Drop the helper attributes before thiserror sees the enum.
    strip_code_attrs(&mut input);
    let derives = missing_derives(&input);

    quote! {
        #[allow(non_shorthand_field_patterns)]
        #derives
        #input

        #context_trait
        #(#source_impls)*
        #internal_impls
        #code_impl

        #[allow(dead_code)]
        fn format_context(context: &Option<std::borrow::Cow<'static, str>>) -> std::borrow::Cow<'static, str> {
            context.as_ref().map_or(std::borrow::Cow::Borrowed(""), |c| std::borrow::Cow::Owned(format!(" ({c})")))
        }
    }
}

fn parse_args(args: TokenStream) -> syn::Result<ErrorArgs> {
    let mut parsed = ErrorArgs::default();
    if args.is_empty() {
        return Ok(parsed);
    }

    let metas = Punctuated::<Meta, Token![,]>::parse_terminated.parse2(args)?;
    for meta in metas {
        match &meta {
            Meta::NameValue(nv) if nv.path.is_ident("code") => {
                let syn::Expr::Path(expr) = &nv.value else {
                    return Err(syn::Error::new_spanned(&nv.value, "`code` expects a type path"));
                };
                parsed.code_type = Some(expr.path.clone());
            },
            other => {
                return Err(syn::Error::new_spanned(other, "unsupported fv_error argument"));
            },
        }
    }

    Ok(parsed)
}

fn inspect_variant(v: &Variant) -> Result<VariantInfo<'_>, TokenStream> {
    let Fields::Named(fields) = &v.fields else {
        return Err(syn::Error::new_spanned(
            v,
            "fv_error variants must use named fields so context and source can be attached",
        )
        .to_compile_error());
    };

    let context_field = context_field(fields)?;
    let source_field = fields.named.iter().find(|field| {
        let named_source = field.ident.as_ref().is_some_and(|ident| ident == "source");
        named_source || has_attr(field, "source") || has_attr(field, "from")
    });
    let code = variant_code(v).map_err(|e| e.to_compile_error())?;

    Ok(VariantInfo {
        ident: &v.ident,
        source_ty: source_field.map(|field| &field.ty),
        source_field: source_field.and_then(|field| field.ident.as_ref()),
        has_context: context_field.is_some(),
        code,
        cfg_attrs: v.attrs.iter().filter(|attr| attr.path().is_ident("cfg")).cloned().collect(),
    })
}

fn variant_code(v: &Variant) -> syn::Result<Option<Ident>> {
    let Some(attr) = v.attrs.iter().find(|attr| attr.path().is_ident("code")) else {
        return Ok(None);
    };
    attr.parse_args::<Ident>().map(Some)
}

fn context_field(fields: &syn::FieldsNamed) -> Result<Option<&syn::Field>, TokenStream> {
    let Some(field) =
        fields.named.iter().find(|f| f.ident.as_ref().is_some_and(|ident| ident == "context"))
    else {
        return Ok(None);
    };

    if is_cow_context(&field.ty) {
        Ok(Some(field))
    } else {
        Err(syn::Error::new_spanned(&field.ty, "context field must be Option<Cow<'static, str>>")
            .to_compile_error())
    }
}

fn context_trait(name: &Ident, ext_trait: &Ident, variants: &[VariantInfo<'_>]) -> TokenStream {
    let arms = variants.iter().filter(|v| v.has_context).map(|v| {
        let cfg_attrs = &v.cfg_attrs;
        let ident = v.ident;
        quote! { #(#cfg_attrs)* #name::#ident { context: c, .. } => *c = Some(context.into()), }
    });

    quote! {
        pub trait #ext_trait<T> {
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Result<T, #name>;
        }

        #[automatically_derived]
        impl<T> #ext_trait<T> for Result<T, #name> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Self {
                self.map_err(|mut e| {
                    match &mut e {
                        #( #arms )*
                        _ => {}
                    }
                    e
                })
            }
        }
    }
}

fn source_conversion(
    name: &Ident,
    ext_trait: &Ident,
    v: &VariantInfo<'_>,
) -> Option<TokenStream> {
    if v.ident == "Internal" {
        return None;
    }
    let source_ty = v.source_ty?;
    let source_field = v.source_field?;
    let ident = v.ident;
    let cfg_attrs = &v.cfg_attrs;

    Some(quote! {
        #(#cfg_attrs)*
        #[automatically_derived]
        impl From<#source_ty> for #name {
            #[inline]
            fn from(#source_field: #source_ty) -> Self { Self::#ident { #source_field, context: None } }
        }

        #(#cfg_attrs)*
        impl<T> #ext_trait<T> for std::result::Result<T, #source_ty> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> std::result::Result<T, #name> {
                self.map_err(|#source_field| #name::#ident { #source_field, context: Some(context.into()) })
            }
        }
    })
}

fn internal_conversions(name: &Ident, variants: &[VariantInfo<'_>]) -> TokenStream {
    let Some(internal) = variants.iter().find(|v| v.ident == "Internal") else {
        return quote!();
    };
    let cfg_attrs = &internal.cfg_attrs;

    quote! {
        #(#cfg_attrs)*
        impl From<&'static str> for #name {
            #[inline]
            fn from(s: &'static str) -> Self { Self::Internal { message: std::borrow::Cow::Borrowed(s), context: None } }
        }
        #(#cfg_attrs)*
        impl From<String> for #name {
            #[inline]
            fn from(s: String) -> Self { Self::Internal { message: std::borrow::Cow::Owned(s), context: None } }
        }
    }
}

/// Generates `code()` mapping every variant onto a variant of the `code = ...` enum.
fn code_accessor(name: &Ident, code_type: &Path, variants: &[VariantInfo<'_>]) -> TokenStream {
    let arms = variants.iter().filter_map(|v| {
        let ident = v.ident;
        let code = v.code.as_ref()?;
        let cfg_attrs = &v.cfg_attrs;
        Some(quote! { #(#cfg_attrs)* #name::#ident { .. } => #code_type::#code, })
    });

    quote! {
        impl #name {
            /// Stable numeric classification of this error for callers across the boundary.
            #[must_use]
            pub const fn code(&self) -> #code_type {
                match self {
                    #( #arms )*
                }
            }
        }
    }
}

fn strip_code_attrs(input: &mut DeriveInput) {
    if let Data::Enum(data) = &mut input.data {
        for variant in &mut data.variants {
            variant.attrs.retain(|attr| !attr.path().is_ident("code"));
        }
    }
}

fn missing_derives(input: &DeriveInput) -> TokenStream {
    let present = derived_traits(input);
    let mut derives = Vec::new();
    if !present.contains("Debug") {
        derives.push(quote! { Debug });
    }
    if !present.contains("Error") {
        derives.push(quote! { ::thiserror::Error });
    }
    if derives.is_empty() { quote! {} } else { quote! { #[derive(#(#derives),*)] } }
}

fn has_attr(field: &syn::Field, name: &str) -> bool {
    field.attrs.iter().any(|attr| attr.path().is_ident(name))
}

fn derived_traits(input: &DeriveInput) -> FxHashSet<String> {
    let mut traits = FxHashSet::default();

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(segment) = meta.path.segments.last() {
                traits.insert(segment.ident.to_string());
            }
            Ok(())
        });
    }

    traits
}

fn check_variants(variants: &[VariantInfo<'_>], codes_required: bool) -> Option<TokenStream> {
    for v in variants {
        if v.source_ty.is_some() && !v.has_context {
            return Some(
                syn::Error::new_spanned(
                    v.ident,
                    "fv_error requires `context: Option<Cow<'static, str>>` on variants with a source",
                )
                .to_compile_error(),
            );
        }
        if codes_required && v.code.is_none() {
            return Some(
                syn::Error::new_spanned(
                    v.ident,
                    "every variant needs `#[code(...)]` when `code = ...` is given",
                )
                .to_compile_error(),
            );
        }
        if !codes_required && v.code.is_some() {
            return Some(
                syn::Error::new_spanned(
                    v.ident,
                    "`#[code(...)]` requires `#[fv_error(code = ...)]` on the enum",
                )
                .to_compile_error(),
            );
        }
    }
    None
}

/// Matches `Option<Cow<'static, str>>` by its last path segments.
fn is_cow_context(ty: &Type) -> bool {
    let Some(option) = last_segment(ty) else { return false };
    if option.ident != "Option" {
        return false;
    }
    let Some(inner) = generic_args(option).and_then(|args| match args.first() {
        Some(syn::GenericArgument::Type(ty)) => last_segment(ty),
        _ => None,
    }) else {
        return false;
    };
    if inner.ident != "Cow" {
        return false;
    }
    let Some(args) = generic_args(inner) else { return false };
    let mut args = args.iter();
    let Some(syn::GenericArgument::Lifetime(lt)) = args.next() else { return false };
    let Some(syn::GenericArgument::Type(str_ty)) = args.next() else { return false };
    lt.ident == "static" && last_segment(str_ty).is_some_and(|seg| seg.ident == "str")
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    let Type::Path(path) = ty else { return None };
    path.path.segments.last()
}

fn generic_args(
    segment: &syn::PathSegment,
) -> Option<&Punctuated<syn::GenericArgument, Token![,]>> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => Some(&args.args),
        _ => None,
    }
}
