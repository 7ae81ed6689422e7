//! Per-call options.

use std::fmt;
use std::sync::Arc;

use crate::context::Transaction;

/// The operation a validation run is performed for.
///
/// Method-suffixed rules (`required_create`, `omitempty_update`, ...) only
/// apply when the run's method matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Validate,
    Create,
    Update,
}

impl Method {
    pub const ALL: [Self; 3] = [Self::Validate, Self::Create, Self::Update];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Create => "create",
            Self::Update => "update",
        }
    }

    /// Splits a `<name>_<method>` token into its base name and method.
    pub fn split_suffix(token: &str) -> Option<(&str, Self)> {
        Self::ALL.into_iter().find_map(|method| {
            token
                .strip_suffix(method.as_str())
                .and_then(|rest| rest.strip_suffix('_'))
                .filter(|base| !base.is_empty())
                .map(|base| (base, method))
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a single [`Engine::validate`](crate::Engine::validate) call.
///
/// Built with chained methods:
///
/// ```rust
/// use docvault_validator::Options;
///
/// let options = Options::new().as_update().allow_empty_fields(["nickname"]);
/// assert_eq!(options.method(), docvault_validator::Method::Update);
/// ```
#[derive(Clone, Default)]
pub struct Options {
    method: Method,
    skip_validation: bool,
    skip_validation_fields: Vec<String>,
    allow_empty_fields: Vec<String>,
    modify_original: bool,
    tombstone_omitted: bool,
    transaction: Option<Arc<dyn Transaction>>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Validate as if creating: `*_create` rules apply.
    #[must_use = "builder methods must be chained or built"]
    pub fn as_create(self) -> Self {
        self.with_method(Method::Create)
    }

    /// Validate as if updating: `*_update` rules apply.
    #[must_use = "builder methods must be chained or built"]
    pub fn as_update(self) -> Self {
        self.with_method(Method::Update)
    }

    /// Skip every rule. Renames, `omitempty` and `-` still apply.
    #[must_use = "builder methods must be chained or built"]
    pub fn skip_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }

    /// Skip rules for the given dot-separated field paths only. Everything
    /// below a skipped path (elements, nested record fields) is skipped too.
    #[must_use = "builder methods must be chained or built"]
    pub fn skip_validation_for<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip_validation_fields
            .extend(paths.into_iter().map(Into::into));
        self
    }

    /// Emit the given paths even when `omitempty` would drop them.
    #[must_use = "builder methods must be chained or built"]
    pub fn allow_empty_fields<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_empty_fields.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Write transformed values back into the record. Requires
    /// [`Engine::validate_mut`](crate::Engine::validate_mut).
    #[must_use = "builder methods must be chained or built"]
    pub fn modify_original(mut self) -> Self {
        self.modify_original = true;
        self
    }

    /// Emit [`Value::Delete`](crate::Value::Delete) for omitted fields
    /// instead of leaving them out.
    #[must_use = "builder methods must be chained or built"]
    pub fn tombstone_omitted(mut self) -> Self {
        self.tombstone_omitted = true;
        self
    }

    /// Hand a transaction to transaction-aware rules.
    #[must_use = "builder methods must be chained or built"]
    pub fn transaction(mut self, transaction: Arc<dyn Transaction>) -> Self {
        self.transaction = Some(transaction);
        self
    }

    // ===== accessors =====

    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns `true` when rules should run for the field at `path`.
    pub fn validates(&self, path: &str) -> bool {
        !self.skip_validation && !self.skip_validation_fields.iter().any(|p| p == path)
    }

    pub fn allows_empty(&self, path: &str) -> bool {
        self.allow_empty_fields.iter().any(|p| p == path)
    }

    pub fn modifies_original(&self) -> bool {
        self.modify_original
    }

    pub fn tombstones_omitted(&self) -> bool {
        self.tombstone_omitted
    }

    pub fn transaction_handle(&self) -> Option<&dyn Transaction> {
        self.transaction.as_deref()
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("method", &self.method)
            .field("skip_validation", &self.skip_validation)
            .field("skip_validation_fields", &self.skip_validation_fields)
            .field("allow_empty_fields", &self.allow_empty_fields)
            .field("modify_original", &self.modify_original)
            .field("tombstone_omitted", &self.tombstone_omitted)
            .field("transaction", &self.transaction.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("required_create", Some(("required", Method::Create)))]
    #[case("unique_update", Some(("unique", Method::Update)))]
    #[case("min_validate", Some(("min", Method::Validate)))]
    #[case("_create", None)]
    #[case("recreate", None)]
    #[case("email", None)]
    fn splits_method_suffix(#[case] token: &str, #[case] expected: Option<(&str, Method)>) {
        assert_eq!(Method::split_suffix(token), expected);
    }

    #[test]
    fn skip_validation_for_paths() {
        let options = Options::new().skip_validation_for(["address.street"]);
        assert!(!options.validates("address.street"));
        assert!(options.validates("address"));

        let all = Options::new().skip_validation();
        assert!(!all.validates("anything"));
    }

    #[test]
    fn defaults() {
        let options = Options::default();
        assert_eq!(options.method(), Method::Validate);
        assert!(!options.modifies_original());
        assert!(!options.tombstones_omitted());
        assert!(options.transaction_handle().is_none());
    }
}
