//! Error types.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::record::ValueError;
use crate::scope::FieldScope;
use crate::value::{Kind, TypeDescriptor, Value};

/// Error type returned by user rules and formatters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the crate.
pub type VaultResult<T> = Result<T, VaultError>;

// ============================================================================
// FIELD ERROR
// ============================================================================

/// A failed rule application on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    field: String,
    struct_field: String,
    display_field: String,
    path: String,
    struct_path: String,
    value: Value,
    descriptor: TypeDescriptor,
    rule: String,
    param: Option<String>,
}

impl FieldError {
    pub(crate) fn from_scope(scope: &FieldScope<'_>) -> Self {
        Self {
            field: scope.field().to_owned(),
            struct_field: scope.struct_field().to_owned(),
            display_field: scope.display_field(),
            path: scope.path().to_owned(),
            struct_path: scope.struct_path().to_owned(),
            value: scope.value().clone(),
            descriptor: scope.descriptor().clone(),
            rule: scope.rule().to_owned(),
            param: scope.param().map(str::to_owned),
        }
    }

    /// Output name of the field (rename-aware).
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Declared name of the field.
    pub fn struct_field(&self) -> &str {
        &self.struct_field
    }

    /// Human-readable name, e.g. `"Home Address 2"` for `HomeAddress2`.
    pub fn display_field(&self) -> &str {
        &self.display_field
    }

    /// Dot-separated output path, e.g. `address.street`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn struct_path(&self) -> &str {
        &self.struct_path
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn kind(&self) -> Kind {
        self.value.kind()
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field validation for '{}' failed on the '{}' rule",
            self.field, self.rule
        )
    }
}

impl std::error::Error for FieldError {}

static LOWER_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("([a-z])([A-Z])").expect("static regex is valid"));
static LETTER_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("([a-zA-Z])([0-9])").expect("static regex is valid"));

/// Turns a field name into a display name: underscores become spaces and
/// lower-to-upper and letter-to-digit boundaries are split.
pub fn display_name(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let spaced = LOWER_UPPER.replace_all(&spaced, "$1 $2");
    LETTER_DIGIT.replace_all(&spaced, "$1 $2").into_owned()
}

// ============================================================================
// VAULT ERROR
// ============================================================================

/// Errors produced by registration, metadata building and validation.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("rule name must not be empty")]
    InvalidRuleName,

    #[error("rule name `{name}` is reserved: {reason}")]
    ReservedRuleName { name: String, reason: &'static str },

    #[error("field `{field}` of `{record}` has unsupported type `{kind}`")]
    UnsupportedFieldType {
        record: &'static str,
        field: String,
        kind: &'static str,
    },

    #[error("unknown rule `{rule}` on field `{field}` of `{record}`")]
    UnknownRule {
        record: &'static str,
        field: String,
        rule: String,
    },

    #[error("rule `{rule}` on `{path}` requires a parameter")]
    MissingParam { rule: String, path: String },

    #[error("invalid parameter `{param}` for rule `{rule}` on `{path}`: {reason}")]
    InvalidParam {
        rule: String,
        param: String,
        path: String,
        reason: String,
    },

    #[error("rule `{rule}` cannot be applied to `{kind}` value at `{path}`")]
    InvalidRuleTarget {
        rule: String,
        path: String,
        kind: Kind,
    },

    #[error("transformation `{rule}` on `{path}` returned `{found}`, expected `{expected}`")]
    TypeMismatch {
        rule: String,
        path: String,
        expected: String,
        found: Kind,
    },

    #[error("maximum traversal depth {max_depth} exceeded at `{path}`")]
    DepthExceeded { path: String, max_depth: usize },

    #[error("write back needs a mutable record, use `validate_mut`")]
    ReadOnlyRecord,

    #[error("failed to write `{path}` back into the record: {source}")]
    WriteBack {
        path: String,
        #[source]
        source: ValueError,
    },

    #[error(transparent)]
    Field(#[from] FieldError),

    /// A registered formatter replaced the [`FieldError`].
    #[error(transparent)]
    Formatted(BoxError),

    /// A rule returned its own error.
    #[error(transparent)]
    Rule(BoxError),
}

impl VaultError {
    /// Converts an error returned by a rule. `VaultError`s raised inside
    /// rules (e.g. by built-ins) are passed through unchanged.
    pub fn from_rule_error(error: BoxError) -> Self {
        match error.downcast::<Self>() {
            Ok(error) => *error,
            Err(error) => Self::Rule(error),
        }
    }

    /// The failed rule, when the error is an unformatted rule failure.
    pub fn field_error(&self) -> Option<&FieldError> {
        match self {
            Self::Field(error) => Some(error),
            _ => None,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRuleName => "INVALID_RULE_NAME",
            Self::ReservedRuleName { .. } => "RESERVED_RULE_NAME",
            Self::UnsupportedFieldType { .. } => "UNSUPPORTED_FIELD_TYPE",
            Self::UnknownRule { .. } => "UNKNOWN_RULE",
            Self::MissingParam { .. } => "MISSING_PARAM",
            Self::InvalidParam { .. } => "INVALID_PARAM",
            Self::InvalidRuleTarget { .. } => "INVALID_RULE_TARGET",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::DepthExceeded { .. } => "DEPTH_EXCEEDED",
            Self::ReadOnlyRecord => "READ_ONLY_RECORD",
            Self::WriteBack { .. } => "WRITE_BACK",
            Self::Field(_) => "RULE_FAILED",
            Self::Formatted(_) => "FORMATTED",
            Self::Rule(_) => "RULE_ERROR",
        }
    }

    /// Returns `true` for errors raised while building metadata, before any
    /// rule ran.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFieldType { .. } | Self::UnknownRule { .. }
        )
    }
}
