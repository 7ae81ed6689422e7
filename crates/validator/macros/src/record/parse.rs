//! Parsing of the derive input: `#[vault("...")]` attributes and field types

use syn::{
    Attribute, Data, DeriveInput, Fields, FieldsNamed, GenericArgument, Ident, LitStr,
    PathArguments, Type,
};

/// Type names treated as channels.
const CHANNEL_TYPES: &[&str] = &[
    "Sender",
    "SyncSender",
    "Receiver",
    "UnboundedSender",
    "UnboundedReceiver",
];

/// One annotated field of the record.
pub(super) struct VaultField<'a> {
    pub ident: &'a Ident,
    pub ty: &'a Type,
    pub annotation: LitStr,
    /// Set when the type cannot be represented as a value.
    pub unsupported: Option<&'static str>,
}

/// Validate that input is a non-generic struct with named fields.
pub(super) fn require_record_struct(input: &DeriveInput) -> syn::Result<&FieldsNamed> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[derive(Record)] does not support generic structs",
        ));
    }

    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(fields),
            Fields::Unnamed(_) => Err(syn::Error::new_spanned(
                input,
                "#[derive(Record)] requires named fields.\n\
                 \n\
                 Tuple structs are not supported.",
            )),
            Fields::Unit => Err(syn::Error::new_spanned(
                input,
                "#[derive(Record)] cannot be applied to unit structs.",
            )),
        },
        Data::Enum(_) | Data::Union(_) => Err(syn::Error::new_spanned(
            input,
            "#[derive(Record)] can only be applied to structs",
        )),
    }
}

/// Collect the fields carrying a `#[vault("...")]` attribute, in order.
///
/// Fields annotated `""` or `"-"` are left out entirely, so their types
/// never need a value conversion.
pub(super) fn vault_fields(fields: &FieldsNamed) -> syn::Result<Vec<VaultField<'_>>> {
    let mut result = Vec::new();

    for field in &fields.named {
        let Some(annotation) = annotation(&field.attrs)? else {
            continue;
        };
        if is_skip(&annotation) {
            continue;
        }
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;

        result.push(VaultField {
            ident,
            ty: &field.ty,
            annotation,
            unsupported: unsupported_kind(&field.ty),
        });
    }

    Ok(result)
}

/// Read the annotation string from `#[vault("...")]`.
fn annotation(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut found: Option<LitStr> = None;

    for attr in attrs {
        if !attr.path().is_ident("vault") {
            continue;
        }
        if found.is_some() {
            return Err(syn::Error::new_spanned(
                attr,
                "duplicate #[vault] attribute; put all rules in one annotation",
            ));
        }
        let lit: LitStr = attr.parse_args().map_err(|err| {
            syn::Error::new(
                err.span(),
                "expected an annotation string, e.g. #[vault(\"name,required\")]",
            )
        })?;
        found = Some(lit);
    }

    Ok(found)
}

fn is_skip(annotation: &LitStr) -> bool {
    let value = annotation.value();
    value.is_empty() || value == "-"
}

/// Name of the first type the engine cannot represent, searching through
/// generic arguments.
pub(super) fn unsupported_kind(ty: &Type) -> Option<&'static str> {
    match ty {
        Type::BareFn(_) => Some("function"),
        Type::TraitObject(_) | Type::ImplTrait(_) => Some("trait object"),
        Type::Ptr(_) => Some("pointer"),
        Type::Reference(_) => Some("reference"),
        Type::Tuple(tuple) if !tuple.elems.is_empty() => Some("tuple"),
        Type::Tuple(_) => Some("unit"),
        Type::Array(_) | Type::Slice(_) => Some("array"),
        Type::Paren(inner) => unsupported_kind(&inner.elem),
        Type::Group(inner) => unsupported_kind(&inner.elem),
        Type::Path(path) => {
            let segment = path.path.segments.last()?;
            if CHANNEL_TYPES.iter().any(|name| segment.ident == name) {
                return Some("channel");
            }
            match &segment.arguments {
                PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
                    GenericArgument::Type(inner) => unsupported_kind(inner),
                    _ => None,
                }),
                _ => None,
            }
        }
        _ => None,
    }
}
