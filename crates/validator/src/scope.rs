//! The per-field unit of work handed to rules.

use std::borrow::Cow;

use crate::error::display_name;
use crate::value::{Kind, RecordValue, TypeDescriptor, Value};

/// Everything a rule can see about the field it runs on.
///
/// One scope is created per field (or per element when diving) and reused
/// across the field's rule chain; transformations replace its value.
#[derive(Debug, Clone)]
pub struct FieldScope<'a> {
    record: &'a RecordValue,
    field: Cow<'a, str>,
    struct_field: Cow<'a, str>,
    path: String,
    struct_path: String,
    value: Value,
    descriptor: &'a TypeDescriptor,
    rule: &'a str,
    param: Option<&'a str>,
}

impl<'a> FieldScope<'a> {
    pub(crate) fn new(
        record: &'a RecordValue,
        field: Cow<'a, str>,
        struct_field: Cow<'a, str>,
        path: String,
        struct_path: String,
        value: Value,
        descriptor: &'a TypeDescriptor,
    ) -> Self {
        Self {
            record,
            field,
            struct_field,
            path,
            struct_path,
            value,
            descriptor: descriptor.dereferenced(),
            rule: "",
            param: None,
        }
    }

    /// Snapshot of the record owning the field, for cross-field rules.
    pub fn record(&self) -> &RecordValue {
        self.record
    }

    /// Output name of the field; `[i]` or the key for diving elements.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Declared name of the field.
    pub fn struct_field(&self) -> &str {
        &self.struct_field
    }

    pub fn display_field(&self) -> String {
        display_name(&self.struct_field)
    }

    /// Dot-separated output path, e.g. `address.street` or `tags[2]`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn struct_path(&self) -> &str {
        &self.struct_path
    }

    /// Current value, after earlier transformations in the chain.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn kind(&self) -> Kind {
        self.value.kind()
    }

    /// Field type with `Optional` layers removed.
    pub fn descriptor(&self) -> &TypeDescriptor {
        self.descriptor
    }

    /// Name of the rule currently running.
    pub fn rule(&self) -> &str {
        self.rule
    }

    /// Parameter of the rule currently running (`min=3` gives `"3"`).
    pub fn param(&self) -> Option<&str> {
        self.param
    }

    pub(crate) fn set_rule(&mut self, rule: &'a str, param: Option<&'a str>) {
        self.rule = rule;
        self.param = param;
    }

    pub(crate) fn set_value(&mut self, value: Value) {
        self.value = value;
    }

    pub(crate) fn into_value(self) -> Value {
        self.value
    }
}
