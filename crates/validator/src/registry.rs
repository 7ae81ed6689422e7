//! Named rule and formatter registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BoxError, FieldError, VaultError};
use crate::rule::{ErrorFormatter, Transformation, Validation};

/// Characters that may not appear in a rule name; they carry meaning in
/// annotations or are kept for future syntax.
pub const RESERVED_CHARS: &[char] = &[
    '.', '[', ']', ',', '|', '=', '+', '(', ')', '`', '~', '!', '@', '#', '$', '%', '^', '&', '*',
    '"', '/', '?', '<', '>', '{', '}', '\\', '\'', ';', ':',
];

#[derive(Debug, Clone)]
struct Entry<T> {
    rule: T,
    builtin: bool,
}

/// Validations, transformations (separate namespaces) and the ordered
/// error-formatter chain.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    validations: HashMap<String, Entry<Validation>>,
    transformations: HashMap<String, Entry<Transformation>>,
    formatters: Vec<ErrorFormatter>,
}

impl RuleRegistry {
    /// Empty registry, without built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in rules.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::install(&mut registry);
        registry
    }

    /// Registers (or replaces) a user validation.
    pub fn register_validation(
        &mut self,
        name: &str,
        validation: Validation,
    ) -> Result<(), VaultError> {
        check_name(name, self.is_builtin(name))?;
        tracing::debug!(rule = name, runs_on_nil = validation.is_run_on_nil(), "registered validation");
        self.validations.insert(
            name.to_owned(),
            Entry {
                rule: validation,
                builtin: false,
            },
        );
        Ok(())
    }

    /// Registers (or replaces) a user transformation.
    pub fn register_transformation(
        &mut self,
        name: &str,
        transformation: Transformation,
    ) -> Result<(), VaultError> {
        check_name(name, self.is_builtin(name))?;
        tracing::debug!(
            rule = name,
            runs_on_nil = transformation.is_run_on_nil(),
            "registered transformation"
        );
        self.transformations.insert(
            name.to_owned(),
            Entry {
                rule: transformation,
                builtin: false,
            },
        );
        Ok(())
    }

    /// Appends a formatter to the chain.
    pub fn register_error_formatter<F>(&mut self, formatter: F)
    where
        F: Fn(&FieldError) -> Option<BoxError> + Send + Sync + 'static,
    {
        self.formatters.push(Arc::new(formatter));
    }

    pub(crate) fn insert_builtin_validation(&mut self, name: &str, validation: Validation) {
        self.validations.insert(
            name.to_owned(),
            Entry {
                rule: validation,
                builtin: true,
            },
        );
    }

    pub(crate) fn insert_builtin_transformation(&mut self, name: &str, transformation: Transformation) {
        self.transformations.insert(
            name.to_owned(),
            Entry {
                rule: transformation,
                builtin: true,
            },
        );
    }

    pub fn validation(&self, name: &str) -> Option<&Validation> {
        self.validations.get(name).map(|e| &e.rule)
    }

    pub fn transformation(&self, name: &str) -> Option<&Transformation> {
        self.transformations.get(name).map(|e| &e.rule)
    }

    pub fn formatters(&self) -> &[ErrorFormatter] {
        &self.formatters
    }

    /// Returns `true` if `name` is a built-in in either namespace.
    pub fn is_builtin(&self, name: &str) -> bool {
        self.validations.get(name).is_some_and(|e| e.builtin)
            || self.transformations.get(name).is_some_and(|e| e.builtin)
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut validations: Vec<_> = self.validations.keys().collect();
        validations.sort();
        let mut transformations: Vec<_> = self.transformations.keys().collect();
        transformations.sort();
        f.debug_struct("RuleRegistry")
            .field("validations", &validations)
            .field("transformations", &transformations)
            .field("formatters", &self.formatters.len())
            .finish()
    }
}

fn check_name(name: &str, shadows_builtin: bool) -> Result<(), VaultError> {
    if name.is_empty() {
        return Err(VaultError::InvalidRuleName);
    }
    let reserved = |reason| {
        Err(VaultError::ReservedRuleName {
            name: name.to_owned(),
            reason,
        })
    };
    if shadows_builtin {
        return reserved("collides with a built-in rule");
    }
    if name.chars().any(char::is_whitespace) {
        return reserved("contains whitespace");
    }
    if name.contains(RESERVED_CHARS) {
        return reserved("contains a reserved character");
    }
    if matches!(name, crate::annotation::DIVE | crate::annotation::OMIT_EMPTY)
        || crate::options::Method::split_suffix(name)
            .is_some_and(|(base, _)| base == crate::annotation::OMIT_EMPTY)
    {
        return reserved("is a structural annotation token");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn always() -> Validation {
        Validation::new(|_| Ok(true))
    }

    #[test]
    fn builtins_are_present() {
        let registry = RuleRegistry::with_builtins();
        for name in ["required", "required_create", "required_update", "required_validate", "min", "max", "email"] {
            assert!(registry.validation(name).is_some(), "{name}");
        }
        for name in ["uppercase", "lowercase", "trim_space"] {
            assert!(registry.transformation(name).is_some(), "{name}");
        }
        assert!(registry.validation("required").unwrap().is_run_on_nil());
    }

    #[test]
    fn empty_name_is_invalid() {
        let mut registry = RuleRegistry::with_builtins();
        let err = registry.register_validation("", always()).unwrap_err();
        assert!(matches!(err, VaultError::InvalidRuleName));
    }

    #[rstest]
    #[case("required")]
    #[case("email")]
    #[case("has space")]
    #[case("a.b")]
    #[case("x=y")]
    #[case("a,b")]
    #[case("dive")]
    #[case("omitempty_create")]
    fn reserved_names(#[case] name: &str) {
        let mut registry = RuleRegistry::with_builtins();
        let err = registry.register_validation(name, always()).unwrap_err();
        assert_eq!(err.code(), "RESERVED_RULE_NAME", "{name}");
    }

    #[test]
    fn builtin_names_are_reserved_in_both_namespaces() {
        let mut registry = RuleRegistry::with_builtins();
        let err = registry
            .register_transformation("email", Transformation::new(|s| Ok(s.value().clone())))
            .unwrap_err();
        assert_eq!(err.code(), "RESERVED_RULE_NAME");
        let err = registry.register_validation("lowercase", always()).unwrap_err();
        assert_eq!(err.code(), "RESERVED_RULE_NAME");
        assert!(registry.transformation("email").is_none());
        assert!(registry.validation("lowercase").is_none());
    }

    #[test]
    fn user_names_may_repeat_across_namespaces() {
        let mut registry = RuleRegistry::with_builtins();
        registry.register_validation("slug", always()).unwrap();
        registry
            .register_transformation("slug", Transformation::new(|s| Ok(s.value().clone())))
            .unwrap();
        assert!(registry.validation("slug").is_some());
        assert!(registry.transformation("slug").is_some());
    }

    #[test]
    fn user_rules_can_be_replaced() {
        let mut registry = RuleRegistry::new();
        registry.register_validation("unique", always()).unwrap();
        registry
            .register_validation("unique", always().runs_on_nil(true))
            .unwrap();
        assert!(registry.validation("unique").unwrap().is_run_on_nil());
    }

    #[test]
    fn formatters_keep_registration_order() {
        let mut registry = RuleRegistry::new();
        registry.register_error_formatter(|_| None);
        registry.register_error_formatter(|e| Some(e.rule().to_owned().into()));
        assert_eq!(registry.formatters().len(), 2);
    }
}
