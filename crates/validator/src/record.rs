//! Record and field-value traits.
//!
//! `#[derive(Record)]` implements both traits for a struct; the
//! [`FieldValue`] impls below cover the supported field types.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::value::{Kind, RecordValue, TypeDescriptor, Value};

// ============================================================================
// ERRORS
// ============================================================================

/// Errors converting a [`Value`] back into a concrete field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    #[error("expected `{expected}`, found `{found}`")]
    KindMismatch { expected: String, found: Kind },

    #[error("value `{value}` is out of range for `{target}`")]
    OutOfRange { value: String, target: &'static str },

    #[error("path segment `{segment}` does not address a part of `{target}`")]
    UnexpectedSegment { segment: String, target: String },

    #[error("no element at `{segment}`")]
    MissingElement { segment: String },

    #[error("`{type_name}` cannot be rebuilt from a value")]
    NotConstructible { type_name: &'static str },
}

impl ValueError {
    pub fn kind_mismatch(expected: impl fmt::Display, found: &Value) -> Self {
        Self::KindMismatch {
            expected: expected.to_string(),
            found: found.kind(),
        }
    }

    pub fn unexpected_segment(segment: &PathSegment, target: impl fmt::Display) -> Self {
        Self::UnexpectedSegment {
            segment: segment.to_string(),
            target: target.to_string(),
        }
    }
}

// ============================================================================
// PATHS AND DECLARATIONS
// ============================================================================

/// One step of a write-back path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Annotated field, by declaration index.
    Field(usize),
    /// Sequence element.
    Index(usize),
    /// Mapping entry.
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(index) => write!(f, "#{index}"),
            Self::Index(index) => write!(f, "[{index}]"),
            Self::Key(key) => write!(f, ".{key}"),
        }
    }
}

/// Declaration of one annotated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: &'static str,
    pub annotation: &'static str,
    pub descriptor: TypeDescriptor,
}

impl FieldDecl {
    pub fn new(name: &'static str, annotation: &'static str, descriptor: TypeDescriptor) -> Self {
        Self {
            name,
            annotation,
            descriptor,
        }
    }
}

/// Identity of a record type.
///
/// Field declarations are produced lazily, so a record that contains itself
/// (through `Option<Box<_>>`) has a finite descriptor.
#[derive(Clone, Copy)]
pub struct RecordType {
    type_id: TypeId,
    name: &'static str,
    fields: fn() -> Vec<FieldDecl>,
}

impl RecordType {
    pub fn of<R: 'static>(name: &'static str, fields: fn() -> Vec<FieldDecl>) -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            name,
            fields,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> Vec<FieldDecl> {
        (self.fields)()
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for RecordType {}

impl Hash for RecordType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordType").field(&self.name).finish()
    }
}

// ============================================================================
// TRAITS
// ============================================================================

/// A type that can be held by an annotated field.
pub trait FieldValue: Sized {
    /// Shape of the type.
    fn descriptor() -> TypeDescriptor;

    /// Snapshot of the current value.
    fn to_value(&self) -> Value;

    /// Rebuilds the type from a value.
    fn from_value(value: Value) -> Result<Self, ValueError>;

    /// Writes `value` at `path` below `self`. An empty path replaces `self`.
    fn write_at(&mut self, path: &[PathSegment], value: Value) -> Result<(), ValueError> {
        match path.first() {
            None => {
                *self = Self::from_value(value)?;
                Ok(())
            }
            Some(segment) => Err(ValueError::unexpected_segment(segment, Self::descriptor())),
        }
    }
}

/// A typed record with annotated fields.
///
/// Normally implemented with `#[derive(Record)]`:
///
/// ```rust,ignore
/// #[derive(Record)]
/// struct User {
///     #[vault("name,required,min=3")]
///     name: String,
///     #[vault("email,omitempty,lowercase,email")]
///     email: Option<String>,
/// }
/// ```
pub trait Record: FieldValue + Send + Sync + 'static {
    fn record_type() -> RecordType;

    /// Values of the annotated fields, in declaration order.
    fn record_value(&self) -> RecordValue;
}

// ============================================================================
// SCALAR IMPLS
// ============================================================================

impl FieldValue for bool {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Bool
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(ValueError::kind_mismatch(Kind::Bool, &other)),
        }
    }
}

impl FieldValue for String {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::String
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(ValueError::kind_mismatch(Kind::String, &other)),
        }
    }
}

impl FieldValue for Bytes {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Bytes
    }

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bytes(b) => Ok(b),
            other => Err(ValueError::kind_mismatch(Kind::Bytes, &other)),
        }
    }
}

impl FieldValue for DateTime<Utc> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Time
    }

    fn to_value(&self) -> Value {
        Value::Time(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Time(t) => Ok(t),
            other => Err(ValueError::kind_mismatch(Kind::Time, &other)),
        }
    }
}

macro_rules! signed_field_value {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::Int
                }

                fn to_value(&self) -> Value {
                    Value::Int(*self as i64)
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let out_of_range = |value: String| ValueError::OutOfRange {
                        value,
                        target: stringify!($ty),
                    };
                    match value {
                        Value::Int(i) => Self::try_from(i).map_err(|_| out_of_range(i.to_string())),
                        Value::Uint(u) => Self::try_from(u).map_err(|_| out_of_range(u.to_string())),
                        other => Err(ValueError::kind_mismatch(Kind::Int, &other)),
                    }
                }
            }
        )*
    };
}

macro_rules! unsigned_field_value {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::Uint
                }

                fn to_value(&self) -> Value {
                    Value::Uint(*self as u64)
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let out_of_range = |value: String| ValueError::OutOfRange {
                        value,
                        target: stringify!($ty),
                    };
                    match value {
                        Value::Uint(u) => Self::try_from(u).map_err(|_| out_of_range(u.to_string())),
                        Value::Int(i) => Self::try_from(i).map_err(|_| out_of_range(i.to_string())),
                        other => Err(ValueError::kind_mismatch(Kind::Uint, &other)),
                    }
                }
            }
        )*
    };
}

signed_field_value!(i8, i16, i32, i64, isize);
unsigned_field_value!(u8, u16, u32, u64, usize);

impl FieldValue for f64 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Float
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(f) => Ok(f),
            other => Err(ValueError::kind_mismatch(Kind::Float, &other)),
        }
    }
}

impl FieldValue for f32 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Float
    }

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(f) => Ok(f as f32),
            other => Err(ValueError::kind_mismatch(Kind::Float, &other)),
        }
    }
}

// ============================================================================
// WRAPPER AND CONTAINER IMPLS
// ============================================================================

impl<T: FieldValue> FieldValue for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::optional(T::descriptor())
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn write_at(&mut self, path: &[PathSegment], value: Value) -> Result<(), ValueError> {
        if path.is_empty() && value.is_null() {
            *self = None;
            return Ok(());
        }
        if let Some(inner) = self {
            return inner.write_at(path, value);
        }
        match path.first() {
            None => {
                *self = Some(T::from_value(value)?);
                Ok(())
            }
            Some(segment) => Err(ValueError::MissingElement {
                segment: segment.to_string(),
            }),
        }
    }
}

impl<T: FieldValue> FieldValue for Box<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn to_value(&self) -> Value {
        T::to_value(self)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        T::from_value(value).map(Box::new)
    }

    fn write_at(&mut self, path: &[PathSegment], value: Value) -> Result<(), ValueError> {
        T::write_at(self, path, value)
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::sequence(T::descriptor())
    }

    fn to_value(&self) -> Value {
        Value::Sequence(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Sequence(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(ValueError::kind_mismatch(Self::descriptor(), &other)),
        }
    }

    fn write_at(&mut self, path: &[PathSegment], value: Value) -> Result<(), ValueError> {
        match path.split_first() {
            None => {
                *self = Self::from_value(value)?;
                Ok(())
            }
            Some((PathSegment::Index(index), rest)) => self
                .get_mut(*index)
                .ok_or_else(|| ValueError::MissingElement {
                    segment: format!("[{index}]"),
                })?
                .write_at(rest, value),
            Some((segment, _)) => Err(ValueError::unexpected_segment(segment, Self::descriptor())),
        }
    }
}

macro_rules! mapping_field_value {
    ($($map:ident),*) => {
        $(
            impl<V: FieldValue> FieldValue for $map<String, V> {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::mapping(V::descriptor())
                }

                fn to_value(&self) -> Value {
                    Value::Mapping(
                        self.iter()
                            .map(|(key, value)| (key.clone(), value.to_value()))
                            .collect(),
                    )
                }

                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match value {
                        Value::Mapping(entries) => entries
                            .into_iter()
                            .map(|(key, value)| V::from_value(value).map(|v| (key, v)))
                            .collect(),
                        other => Err(ValueError::kind_mismatch(Self::descriptor(), &other)),
                    }
                }

                fn write_at(&mut self, path: &[PathSegment], value: Value) -> Result<(), ValueError> {
                    match path.split_first() {
                        None => {
                            *self = Self::from_value(value)?;
                            Ok(())
                        }
                        Some((PathSegment::Key(key), rest)) => self
                            .get_mut(key.as_str())
                            .ok_or_else(|| ValueError::MissingElement {
                                segment: format!(".{key}"),
                            })?
                            .write_at(rest, value),
                        Some((segment, _)) => {
                            Err(ValueError::unexpected_segment(segment, Self::descriptor()))
                        }
                    }
                }
            }
        )*
    };
}

mapping_field_value!(HashMap, BTreeMap, IndexMap);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn option_round_trips_through_null() {
        let mut field: Option<String> = Some("x".into());
        assert_eq!(field.to_value(), Value::from("x"));

        field.write_at(&[], Value::Null).unwrap();
        assert_eq!(field, None);
        assert_eq!(field.to_value(), Value::Null);

        field.write_at(&[], Value::from("y")).unwrap();
        assert_eq!(field.as_deref(), Some("y"));
    }

    #[test]
    fn vec_writes_element_by_index() {
        let mut tags = vec!["A".to_owned(), "B".to_owned()];
        tags.write_at(&[PathSegment::Index(1)], Value::from("b"))
            .unwrap();
        assert_eq!(tags, vec!["A".to_owned(), "b".to_owned()]);

        let err = tags
            .write_at(&[PathSegment::Index(5)], Value::from("z"))
            .unwrap_err();
        assert!(matches!(err, ValueError::MissingElement { .. }));
    }

    #[test]
    fn map_writes_entry_by_key() {
        let mut labels: HashMap<String, String> = HashMap::new();
        labels.insert("env".into(), "PROD".into());
        labels
            .write_at(&[PathSegment::Key("env".into())], Value::from("prod"))
            .unwrap();
        assert_eq!(labels["env"], "prod");
    }

    #[test]
    fn integer_conversion_checks_range() {
        assert_eq!(u8::from_value(Value::Int(200)), Ok(200));
        assert!(matches!(
            u8::from_value(Value::Int(-1)),
            Err(ValueError::OutOfRange { target: "u8", .. })
        ));
        assert!(matches!(
            i32::from_value(Value::from("1")),
            Err(ValueError::KindMismatch { .. })
        ));
    }

    #[test]
    fn scalar_rejects_nested_path() {
        let mut n = 3_i64;
        let err = n
            .write_at(&[PathSegment::Index(0)], Value::Int(1))
            .unwrap_err();
        assert!(matches!(err, ValueError::UnexpectedSegment { .. }));
    }

    #[test]
    fn descriptors_of_containers() {
        assert_eq!(
            <Vec<Option<u16>>>::descriptor(),
            TypeDescriptor::sequence(TypeDescriptor::optional(TypeDescriptor::Uint))
        );
        assert_eq!(
            <IndexMap<String, f32>>::descriptor(),
            TypeDescriptor::mapping(TypeDescriptor::Float)
        );
    }
}
