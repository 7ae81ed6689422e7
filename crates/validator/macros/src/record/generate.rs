//! Code generation for the Record derive
//!
//! For each struct the derive emits:
//! - `FieldValue`: descriptor, value snapshot and write back, so records can
//!   be nested in other records and containers
//! - `Record`: the record type (with its lazily built field declarations)
//!   and the ordered snapshot of annotated field values

use super::parse::{self, VaultField};
use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

/// Generate the `FieldValue` and `Record` impls for a struct.
pub(super) fn generate_record(input: &DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let name_str = name.to_string();

    let fields = parse::require_record_struct(input)?;
    let fields = parse::vault_fields(fields)?;

    let decls = fields.iter().map(field_decl);
    let values = fields.iter().map(field_value);
    let assign_all = fields.iter().map(assign_from_record);
    let write_arms = fields.iter().enumerate().map(|(index, field)| write_arm(index, field));

    Ok(quote! {
        #[automatically_derived]
        impl ::docvault_validator::FieldValue for #name {
            fn descriptor() -> ::docvault_validator::TypeDescriptor {
                ::docvault_validator::TypeDescriptor::Record(
                    <Self as ::docvault_validator::Record>::record_type(),
                )
            }

            fn to_value(&self) -> ::docvault_validator::Value {
                ::docvault_validator::Value::Record(
                    <Self as ::docvault_validator::Record>::record_value(self),
                )
            }

            fn from_value(
                _value: ::docvault_validator::Value,
            ) -> ::core::result::Result<Self, ::docvault_validator::ValueError> {
                ::core::result::Result::Err(::docvault_validator::ValueError::NotConstructible {
                    type_name: #name_str,
                })
            }

            #[allow(unused_mut, unused_variables)]
            fn write_at(
                &mut self,
                path: &[::docvault_validator::PathSegment],
                value: ::docvault_validator::Value,
            ) -> ::core::result::Result<(), ::docvault_validator::ValueError> {
                match path.split_first() {
                    ::core::option::Option::None => match value {
                        ::docvault_validator::Value::Record(record)
                            if record.record_type()
                                == <Self as ::docvault_validator::Record>::record_type() =>
                        {
                            let mut fields = record.into_fields().into_iter();
                            #(#assign_all)*
                            ::core::result::Result::Ok(())
                        }
                        other => ::core::result::Result::Err(
                            ::docvault_validator::ValueError::kind_mismatch(
                                <Self as ::docvault_validator::FieldValue>::descriptor(),
                                &other,
                            ),
                        ),
                    },
                    #(#write_arms)*
                    ::core::option::Option::Some((segment, _)) => ::core::result::Result::Err(
                        ::docvault_validator::ValueError::unexpected_segment(
                            segment,
                            <Self as ::docvault_validator::FieldValue>::descriptor(),
                        ),
                    ),
                }
            }
        }

        #[automatically_derived]
        impl ::docvault_validator::Record for #name {
            fn record_type() -> ::docvault_validator::RecordType {
                fn fields() -> ::std::vec::Vec<::docvault_validator::FieldDecl> {
                    ::std::vec![#(#decls),*]
                }
                ::docvault_validator::RecordType::of::<Self>(#name_str, fields)
            }

            fn record_value(&self) -> ::docvault_validator::RecordValue {
                ::docvault_validator::RecordValue::new(
                    <Self as ::docvault_validator::Record>::record_type(),
                    ::std::vec![#(#values),*],
                )
            }
        }
    })
}

/// `FieldDecl::new("name", "annotation", descriptor)`
fn field_decl(field: &VaultField<'_>) -> TokenStream {
    let ident = field.ident.to_string();
    let annotation = &field.annotation;
    let descriptor = match field.unsupported {
        Some(kind) => quote! { ::docvault_validator::TypeDescriptor::Unsupported(#kind) },
        None => {
            let ty = field.ty;
            quote! { <#ty as ::docvault_validator::FieldValue>::descriptor() }
        }
    };

    quote! {
        ::docvault_validator::FieldDecl::new(#ident, #annotation, #descriptor)
    }
}

/// `("name", value)` pair of the snapshot.
fn field_value(field: &VaultField<'_>) -> TokenStream {
    let ident = field.ident;
    let ident_str = ident.to_string();
    let value = match field.unsupported {
        Some(_) => quote! { ::docvault_validator::Value::Null },
        None => quote! { ::docvault_validator::FieldValue::to_value(&self.#ident) },
    };

    quote! { (#ident_str, #value) }
}

/// Assignment of one field while replacing the whole record.
fn assign_from_record(field: &VaultField<'_>) -> TokenStream {
    let ident = field.ident;
    match field.unsupported {
        Some(_) => quote! {
            let _ = fields.next();
        },
        None => quote! {
            if let ::core::option::Option::Some((_, value)) = fields.next() {
                ::docvault_validator::FieldValue::write_at(&mut self.#ident, &[], value)?;
            }
        },
    }
}

/// Match arm routing `Field(index)` to the field.
fn write_arm(index: usize, field: &VaultField<'_>) -> TokenStream {
    let ident = field.ident;
    let body = match field.unsupported {
        Some(_) => quote! {
            ::core::result::Result::Err(::docvault_validator::ValueError::unexpected_segment(
                segment,
                ::docvault_validator::TypeDescriptor::Unsupported("field"),
            ))
        },
        None => quote! {
            ::docvault_validator::FieldValue::write_at(&mut self.#ident, rest, value)
        },
    };

    quote! {
        ::core::option::Option::Some((
            segment @ ::docvault_validator::PathSegment::Field(#index),
            rest,
        )) => #body,
    }
}
