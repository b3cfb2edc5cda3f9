#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the FileVault crates.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! fv-derive = { path = "../infra/derive" }
//! ```
//!
//! Examples below are `ignore`d because a proc-macro crate cannot expand itself; the
//! consuming crates carry the real usages and tests.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Attribute macro for defining domain error enums.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]` when missing.
/// * **Context Support**: Generates a companion `...Ext` trait that adds `.context()`
///   to any `Result` that can be converted into this error type.
/// * **Standard Conversions**: Implements `From<T>` for variants containing a `source`
///   field (or a field marked `#[source]`/`#[from]`), enabling `?` on upstream errors.
/// * **Internal Fallback**: Provides `From<&str>` and `From<String>` when an `Internal`
///   variant is present.
/// * **Error Codes**: With `#[fv_error(code = SomeEnum)]`, every variant must carry
///   `#[code(Variant)]` and a `const fn code(&self) -> SomeEnum` accessor is generated.
///   This is how errors are flattened to numbers at the memory boundary.
///
/// # Requirements
///
/// 1. The macro must be applied to an **enum** with named-field variants.
/// 2. Variants that support context include `context: Option<Cow<'static, str>>`.
/// 3. Variants wrapping external errors must also carry a context field.
///
/// # Example
///
/// ```rust,ignore
/// use fv_derive::fv_error;
/// use std::borrow::Cow;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// pub enum Code { Io = 1, Internal = 255 }
///
/// #[fv_error(code = Code)]
/// pub enum StoreError {
///     #[code(Io)]
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[code(Internal)]
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn read(path: &str) -> Result<Vec<u8>, StoreError> {
///     std::fs::read(path).context("Reading container")
/// }
/// ```
#[proc_macro_attribute]
pub fn fv_error(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(args.into(), input).into()
}
