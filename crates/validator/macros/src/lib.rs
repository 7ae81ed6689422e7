//! Procedural macros for docvault-validator
//!
//! - **`#[derive(Record)]`** - describes a struct's annotated fields to the
//!   validation engine
//!
//! Re-exported by `docvault-validator` behind its default `derive` feature;
//! depend on that crate rather than on this one.

use proc_macro::TokenStream;

mod record;

/// Derives `Record` and `FieldValue` for a struct with named fields.
///
/// Only fields carrying a `#[vault("...")]` attribute take part in
/// validation; the attribute holds the field's annotation string.
///
/// ```rust,ignore
/// use docvault_validator::prelude::*;
///
/// #[derive(Record)]
/// struct Address {
///     #[vault("street,required")]
///     street: String,
///     #[vault("city")]
///     city: String,
/// }
///
/// #[derive(Record)]
/// struct User {
///     #[vault("name,required,min=3")]
///     name: String,
///     #[vault("tags,omitempty,max=5,dive,lowercase")]
///     tags: Vec<String>,
///     #[vault("address")]
///     address: Option<Address>,
///     // not annotated: invisible to the engine
///     session: u64,
/// }
/// ```
///
/// Fields of types the engine cannot represent (function pointers, trait
/// objects, channels, tuples, arrays, references) are described as
/// unsupported; annotating one with anything but `"-"` fails when the
/// record's metadata is first built. Fields annotated `"-"` (or `""`) are
/// dropped by the derive, so they may hold any type at all, such as an
/// `AtomicU32` counter.
///
/// Generic structs are not supported.
#[proc_macro_derive(Record, attributes(vault))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive_record_impl(input)
}
