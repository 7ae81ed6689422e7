//! Runtime value model and type descriptors.
//!
//! Every annotated field is snapshotted into a [`Value`] before rules run,
//! and described by a [`TypeDescriptor`] built once per field type. The
//! descriptor decides which values a transformation may return.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::record::RecordType;

/// Output of a validation run: resolved field name to emitted value, in
/// field declaration order.
pub type Document = IndexMap<String, Value>;

// ============================================================================
// VALUE
// ============================================================================

/// A language-neutral runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (`None`, or an unsupported field).
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Bytes(Bytes),
    Time(DateTime<Utc>),
    Sequence(Vec<Value>),
    Mapping(IndexMap<String, Value>),
    /// Snapshot of a nested record, before traversal flattens it.
    Record(RecordValue),
    /// Tombstone asking the store to delete the field.
    Delete,
}

/// The variant of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Uint,
    Float,
    String,
    Bytes,
    Time,
    Sequence,
    Mapping,
    Record,
    Delete,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Time => "time",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
            Self::Record => "record",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Null => Kind::Null,
            Self::Bool(_) => Kind::Bool,
            Self::Int(_) => Kind::Int,
            Self::Uint(_) => Kind::Uint,
            Self::Float(_) => Kind::Float,
            Self::String(_) => Kind::String,
            Self::Bytes(_) => Kind::Bytes,
            Self::Time(_) => Kind::Time,
            Self::Sequence(_) => Kind::Sequence,
            Self::Mapping(_) => Kind::Mapping,
            Self::Record(_) => Kind::Record,
            Self::Delete => Kind::Delete,
        }
    }

    /// Returns `true` for the zero value of the value's kind.
    ///
    /// Zero means absent: `Null`, `false`, numeric zero, empty strings,
    /// bytes, sequences and mappings, the Unix epoch, and records whose
    /// fields are all zero. The tombstone is never zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::Uint(u) => *u == 0,
            Self::Float(f) => *f == 0.0,
            Self::String(s) => s.is_empty(),
            Self::Bytes(b) => b.is_empty(),
            Self::Time(t) => *t == DateTime::<Utc>::UNIX_EPOCH,
            Self::Sequence(items) => items.is_empty(),
            Self::Mapping(entries) => entries.is_empty(),
            Self::Record(record) => record.fields().iter().all(|(_, v)| v.is_zero()),
            Self::Delete => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Length used by length-based rules: characters for strings, elements
    /// for containers, octets for bytes.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::String(s) => Some(s.chars().count()),
            Self::Bytes(b) => Some(b.len()),
            Self::Sequence(items) => Some(items.len()),
            Self::Mapping(entries) => Some(entries.len()),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Uint,
    u64 => Uint,
    f64 => Float,
    String => String,
    &str => String,
    Bytes => Bytes,
    DateTime<Utc> => Time,
    Vec<Value> => Sequence,
    IndexMap<String, Value> => Mapping,
    RecordValue => Record,
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null | Self::Delete => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Uint(u) => serializer.serialize_u64(*u),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Bytes(b) => serializer.serialize_bytes(b),
            Self::Time(t) => {
                serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Record(record) => {
                let mut map = serializer.serialize_map(Some(record.fields().len()))?;
                for (name, value) in record.fields() {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

// ============================================================================
// RECORD VALUE
// ============================================================================

/// Snapshot of a record: its type and the values of its annotated fields,
/// in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordValue {
    record_type: RecordType,
    fields: Vec<(&'static str, Value)>,
}

impl RecordValue {
    pub fn new(record_type: RecordType, fields: Vec<(&'static str, Value)>) -> Self {
        Self {
            record_type,
            fields,
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn fields(&self) -> &[(&'static str, Value)] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<(&'static str, Value)> {
        self.fields
    }

    /// Looks a field up by its declared (struct) name.
    pub fn get(&self, declared_name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| *name == declared_name)
            .map(|(_, value)| value)
    }

    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.fields.get(index).map(|(_, value)| value)
    }
}

// ============================================================================
// TYPE DESCRIPTOR
// ============================================================================

/// Shape of a field type, built once per type by
/// [`FieldValue::descriptor`](crate::FieldValue::descriptor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    Bool,
    Int,
    Uint,
    Float,
    String,
    Bytes,
    Time,
    Optional(Box<TypeDescriptor>),
    Sequence(Box<TypeDescriptor>),
    /// Keyed mapping; keys are always strings.
    Mapping(Box<TypeDescriptor>),
    Record(RecordType),
    /// A type the engine cannot represent (callables, channels, ...).
    Unsupported(&'static str),
}

impl TypeDescriptor {
    pub fn optional(inner: Self) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn sequence(element: Self) -> Self {
        Self::Sequence(Box::new(element))
    }

    pub fn mapping(value: Self) -> Self {
        Self::Mapping(Box::new(value))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Strips every `Optional` layer.
    pub fn dereferenced(&self) -> &Self {
        let mut current = self;
        while let Self::Optional(inner) = current {
            current = inner;
        }
        current
    }

    /// Element descriptor of a sequence or mapping, looking through `Optional`.
    pub fn element(&self) -> Option<&Self> {
        match self.dereferenced() {
            Self::Sequence(element) | Self::Mapping(element) => Some(element),
            _ => None,
        }
    }

    /// Name of the first unsupported type reachable without entering a
    /// nested record.
    pub fn unsupported_kind(&self) -> Option<&'static str> {
        match self {
            Self::Unsupported(kind) => Some(kind),
            Self::Optional(inner) | Self::Sequence(inner) | Self::Mapping(inner) => {
                inner.unsupported_kind()
            }
            _ => None,
        }
    }

    /// Returns `true` if `value` is a legal value for a field of this type.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Optional(_), Value::Null) => true,
            (Self::Optional(inner), other) => inner.admits(other),
            (Self::Bool, Value::Bool(_))
            | (Self::Int, Value::Int(_))
            | (Self::Uint, Value::Uint(_))
            | (Self::Float, Value::Float(_))
            | (Self::String, Value::String(_))
            | (Self::Bytes, Value::Bytes(_))
            | (Self::Time, Value::Time(_)) => true,
            (Self::Sequence(element), Value::Sequence(items)) => {
                items.iter().all(|item| element.admits(item))
            }
            (Self::Mapping(element), Value::Mapping(entries)) => {
                entries.values().all(|item| element.admits(item))
            }
            (Self::Record(expected), Value::Record(record)) => record.record_type() == *expected,
            _ => false,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Uint => f.write_str("uint"),
            Self::Float => f.write_str("float"),
            Self::String => f.write_str("string"),
            Self::Bytes => f.write_str("bytes"),
            Self::Time => f.write_str("time"),
            Self::Optional(inner) => write!(f, "optional<{inner}>"),
            Self::Sequence(element) => write!(f, "sequence<{element}>"),
            Self::Mapping(element) => write!(f, "mapping<string, {element}>"),
            Self::Record(record) => write!(f, "record<{}>", record.name()),
            Self::Unsupported(kind) => write!(f, "unsupported<{kind}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn zero_values() {
        assert!(Value::Null.is_zero());
        assert!(Value::Bool(false).is_zero());
        assert!(Value::Int(0).is_zero());
        assert!(Value::Float(0.0).is_zero());
        assert!(Value::from("").is_zero());
        assert!(Value::Sequence(Vec::new()).is_zero());
        assert!(Value::Mapping(IndexMap::new()).is_zero());
        assert!(Value::Time(DateTime::<Utc>::UNIX_EPOCH).is_zero());

        assert!(!Value::Delete.is_zero());
        assert!(!Value::from("x").is_zero());
        assert!(!Value::Uint(7).is_zero());
        assert!(!Value::Time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()).is_zero());
    }

    #[test]
    fn len_counts_chars() {
        assert_eq!(Value::from("héllo").len(), Some(5));
        assert_eq!(Value::Sequence(vec![Value::Null; 3]).len(), Some(3));
        assert_eq!(Value::Int(3).len(), None);
    }

    #[test]
    fn optional_admits_null_and_inner() {
        let descriptor = TypeDescriptor::optional(TypeDescriptor::String);
        assert!(descriptor.admits(&Value::Null));
        assert!(descriptor.admits(&Value::from("x")));
        assert!(!descriptor.admits(&Value::Int(1)));
        assert!(!TypeDescriptor::String.admits(&Value::Null));
    }

    #[test]
    fn sequence_admits_checks_every_element() {
        let descriptor = TypeDescriptor::sequence(TypeDescriptor::Int);
        assert!(descriptor.admits(&Value::Sequence(vec![Value::Int(1), Value::Int(2)])));
        assert!(!descriptor.admits(&Value::Sequence(vec![Value::Int(1), Value::from("2")])));
    }

    #[test]
    fn dereferenced_strips_all_optional_layers() {
        let descriptor =
            TypeDescriptor::optional(TypeDescriptor::optional(TypeDescriptor::sequence(
                TypeDescriptor::Bool,
            )));
        assert_eq!(
            descriptor.dereferenced(),
            &TypeDescriptor::sequence(TypeDescriptor::Bool)
        );
        assert_eq!(descriptor.element(), Some(&TypeDescriptor::Bool));
    }

    #[test]
    fn unsupported_kind_found_inside_containers() {
        let descriptor = TypeDescriptor::sequence(TypeDescriptor::Unsupported("callable"));
        assert_eq!(descriptor.unsupported_kind(), Some("callable"));
        assert_eq!(TypeDescriptor::String.unsupported_kind(), None);
    }

    #[test]
    fn serializes_time_as_rfc3339_and_delete_as_null() {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let mut doc = Document::new();
        doc.insert("at".into(), Value::Time(time));
        doc.insert("gone".into(), Value::Delete);
        doc.insert("n".into(), Value::Int(-4));

        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"at":"2024-05-01T12:30:00Z","gone":null,"n":-4}"#);
    }

    #[test]
    fn descriptor_display() {
        let descriptor = TypeDescriptor::mapping(TypeDescriptor::optional(TypeDescriptor::Float));
        assert_eq!(descriptor.to_string(), "mapping<string, optional<float>>");
    }
}
