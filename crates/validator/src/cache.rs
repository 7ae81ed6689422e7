//! Per-record-type metadata cache.
//!
//! Annotations are parsed and rule names resolved once per record type; the
//! result is shared as an `Arc<RecordMetadata>` by every later call.

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::annotation::{self, Annotation, OmitPolicy, RuleRef, RuleToken};
use crate::builtin::REQUIRED;
use crate::error::VaultError;
use crate::options::Method;
use crate::record::RecordType;
use crate::registry::RuleRegistry;
use crate::rule::{Transformation, Validation};
use crate::value::TypeDescriptor;

// ==================== Metadata ====================

/// The bound implementation of a rule entry.
#[derive(Debug, Clone)]
pub enum RuleAction {
    Validate(Validation),
    Transform(Transformation),
}

/// One resolved rule of a field's chain.
#[derive(Debug, Clone)]
pub struct RuleEntry {
    name: String,
    param: Option<String>,
    action: RuleAction,
    runs_on_nil: bool,
    method: Option<Method>,
    required: bool,
}

impl RuleEntry {
    /// Rule name with any method suffix removed (`required_create` is
    /// reported as `required`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }

    pub fn action(&self) -> &RuleAction {
        &self.action
    }

    pub fn runs_on_nil(&self) -> bool {
        self.runs_on_nil
    }

    pub fn method(&self) -> Option<Method> {
        self.method
    }

    /// Member of the `required` family; never skipped on zero values.
    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn applies_to(&self, method: Method) -> bool {
        self.method.is_none_or(|m| m == method)
    }

    pub fn is_transformation(&self) -> bool {
        matches!(self.action, RuleAction::Transform(_))
    }
}

/// Cached description of one annotated, non-skipped field.
#[derive(Debug, Clone)]
pub struct FieldMetadata {
    index: usize,
    name: String,
    struct_field: &'static str,
    descriptor: TypeDescriptor,
    element: Option<TypeDescriptor>,
    omit: OmitPolicy,
    dive: bool,
    rules: Vec<RuleEntry>,
    element_rules: Vec<RuleEntry>,
}

impl FieldMetadata {
    /// Position of the field in the record's value snapshot.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Output name (rename-aware).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn struct_field(&self) -> &'static str {
        self.struct_field
    }

    /// Declared type, `Optional` layers included.
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Element type of a sequence or mapping field.
    pub fn element(&self) -> Option<&TypeDescriptor> {
        self.element.as_ref()
    }

    pub fn omit(&self) -> OmitPolicy {
        self.omit
    }

    pub fn dive(&self) -> bool {
        self.dive
    }

    pub fn is_optional(&self) -> bool {
        self.descriptor.is_optional()
    }

    pub fn rules(&self) -> &[RuleEntry] {
        &self.rules
    }

    /// Rules declared after `dive`, applied to each element.
    pub fn element_rules(&self) -> &[RuleEntry] {
        &self.element_rules
    }
}

/// Cached metadata of a record type.
#[derive(Debug, Clone)]
pub struct RecordMetadata {
    record: &'static str,
    fields: Vec<FieldMetadata>,
}

impl RecordMetadata {
    pub fn record(&self) -> &'static str {
        self.record
    }

    pub fn fields(&self) -> &[FieldMetadata] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Parses every annotation of `record_type` and binds its rules.
    pub fn build(record_type: RecordType, registry: &RuleRegistry) -> Result<Self, VaultError> {
        let record = record_type.name();
        let mut fields = Vec::new();

        for (index, decl) in record_type.fields().into_iter().enumerate() {
            let (rename, tokens) = match annotation::parse(decl.annotation) {
                Annotation::Skip => continue,
                Annotation::Field { rename, tokens } => (rename, tokens),
            };

            if let Some(kind) = decl.descriptor.unsupported_kind() {
                return Err(VaultError::UnsupportedFieldType {
                    record,
                    field: decl.name.to_owned(),
                    kind,
                });
            }

            let mut omit = OmitPolicy::default();
            let mut dive = false;
            let mut rules = Vec::new();
            let mut element_rules = Vec::new();

            for token in tokens {
                match RuleToken::classify(token) {
                    RuleToken::OmitEmpty(method) => omit = omit.with(method),
                    RuleToken::Dive => dive = true,
                    RuleToken::Rule(rule) => {
                        let entry = resolve(registry, record, decl.name, rule)?;
                        if dive {
                            element_rules.push(entry);
                        } else {
                            rules.push(entry);
                        }
                    }
                }
            }

            let element = decl.descriptor.element().cloned();
            if dive && element.is_none() {
                debug!(record, field = decl.name, "`dive` on a field without elements has no effect");
            }

            fields.push(FieldMetadata {
                index,
                name: rename.unwrap_or(decl.name).to_owned(),
                struct_field: decl.name,
                descriptor: decl.descriptor,
                element,
                omit,
                dive,
                rules,
                element_rules,
            });
        }

        Ok(Self { record, fields })
    }
}

/// Binds a rule reference to its implementation.
fn resolve(
    registry: &RuleRegistry,
    record: &'static str,
    field: &str,
    rule: RuleRef<'_>,
) -> Result<RuleEntry, VaultError> {
    let (base, method) = match Method::split_suffix(rule.name) {
        Some((base, method)) => (base, Some(method)),
        None => (rule.name, None),
    };

    let transformation = |name| registry.transformation(name).cloned().map(RuleAction::Transform);
    let validation = |name| registry.validation(name).cloned().map(RuleAction::Validate);

    let action = if rule.forced_transform {
        transformation(rule.name).or_else(|| method.and_then(|_| transformation(base)))
    } else {
        validation(rule.name)
            .or_else(|| transformation(rule.name))
            .or_else(|| method.and_then(|_| validation(base).or_else(|| transformation(base))))
    };

    let action = action.ok_or_else(|| VaultError::UnknownRule {
        record,
        field: field.to_owned(),
        rule: rule.name.to_owned(),
    })?;

    let (runs_on_nil, required) = match &action {
        RuleAction::Validate(v) => (v.is_run_on_nil(), base == REQUIRED),
        RuleAction::Transform(t) => (t.is_run_on_nil(), false),
    };

    Ok(RuleEntry {
        name: base.to_owned(),
        param: rule.param.map(str::to_owned),
        action,
        runs_on_nil,
        method,
        required,
    })
}

// ==================== Cache ====================

/// Concurrent map from record type to its metadata. Entries are never
/// replaced once stored.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: DashMap<TypeId, Arc<RecordMetadata>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached metadata for `record_type`, building it on first use.
    ///
    /// Concurrent first uses may each build; the first stored entry wins and
    /// the others are dropped. A failed build caches nothing.
    pub fn get_or_build(
        &self,
        record_type: RecordType,
        registry: &RuleRegistry,
    ) -> Result<Arc<RecordMetadata>, VaultError> {
        if let Some(hit) = self.entries.get(&record_type.type_id()) {
            return Ok(Arc::clone(hit.value()));
        }

        debug!(record = record_type.name(), "metadata cache miss, building");
        let built = Arc::new(RecordMetadata::build(record_type, registry)?);

        let stored = self
            .entries
            .entry(record_type.type_id())
            .or_insert_with(|| Arc::clone(&built));
        if !Arc::ptr_eq(stored.value(), &built) {
            debug!(record = record_type.name(), "discarded concurrently built metadata");
        }
        Ok(Arc::clone(stored.value()))
    }

    pub fn get(&self, type_id: TypeId) -> Option<Arc<RecordMetadata>> {
        self.entries.get(&type_id).map(|e| Arc::clone(e.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldDecl;
    use crate::rule::Validation;

    struct Profile;

    fn profile_fields() -> Vec<FieldDecl> {
        vec![
            FieldDecl::new("Name", "name,required,min=3", TypeDescriptor::String),
            FieldDecl::new("Secret", "-", TypeDescriptor::Unsupported("callable")),
            FieldDecl::new(
                "Tags",
                "tags,omitempty,omitempty_create,max=5,dive,lowercase,min=1",
                TypeDescriptor::sequence(TypeDescriptor::String),
            ),
            FieldDecl::new(
                "Email",
                ",required_create,transform=lowercase,email",
                TypeDescriptor::optional(TypeDescriptor::String),
            ),
        ]
    }

    fn profile() -> RecordType {
        RecordType::of::<Profile>("Profile", profile_fields)
    }

    #[test]
    fn builds_field_metadata() {
        let metadata = RecordMetadata::build(profile(), &RuleRegistry::with_builtins()).unwrap();
        let names: Vec<_> = metadata.fields().iter().map(FieldMetadata::name).collect();
        assert_eq!(names, ["name", "tags", "Email"]);

        let tags = metadata.field("tags").unwrap();
        assert_eq!(tags.index(), 2);
        assert!(tags.dive());
        assert!(tags.omit().applies_to(Method::Validate));
        assert_eq!(tags.rules().len(), 1);
        assert_eq!(tags.element_rules().len(), 2);
        assert!(tags.element_rules()[0].is_transformation());
        assert_eq!(tags.element(), Some(&TypeDescriptor::String));
    }

    #[test]
    fn method_suffix_becomes_restriction() {
        let metadata = RecordMetadata::build(profile(), &RuleRegistry::with_builtins()).unwrap();
        let email = metadata.field("Email").unwrap();
        let required = &email.rules()[0];
        assert_eq!(required.name(), "required");
        assert_eq!(required.method(), Some(Method::Create));
        assert!(required.is_required());
        assert!(required.runs_on_nil());
        assert!(!required.applies_to(Method::Update));
        assert!(email.is_optional());
    }

    #[test]
    fn user_rule_with_suffix_resolves_to_base() {
        let mut registry = RuleRegistry::with_builtins();
        registry
            .register_validation("unique", Validation::new(|_| Ok(true)))
            .unwrap();

        struct Account;
        fn fields() -> Vec<FieldDecl> {
            vec![FieldDecl::new("Login", "login,unique_update", TypeDescriptor::String)]
        }
        let metadata =
            RecordMetadata::build(RecordType::of::<Account>("Account", fields), &registry).unwrap();
        let rule = &metadata.fields()[0].rules()[0];
        assert_eq!(rule.name(), "unique");
        assert_eq!(rule.method(), Some(Method::Update));
    }

    #[test]
    fn unknown_rule_fails_build() {
        struct Broken;
        fn fields() -> Vec<FieldDecl> {
            vec![FieldDecl::new("X", "x,no_such_rule", TypeDescriptor::Int)]
        }
        let cache = MetadataCache::new();
        let err = cache
            .get_or_build(RecordType::of::<Broken>("Broken", fields), &RuleRegistry::with_builtins())
            .unwrap_err();
        assert!(matches!(err, VaultError::UnknownRule { ref rule, .. } if rule == "no_such_rule"));
        assert!(cache.is_empty());
    }

    #[test]
    fn forced_transform_ignores_validations() {
        struct Shout;
        fn fields() -> Vec<FieldDecl> {
            vec![FieldDecl::new("X", "x,transform=email", TypeDescriptor::String)]
        }
        let err = RecordMetadata::build(
            RecordType::of::<Shout>("Shout", fields),
            &RuleRegistry::with_builtins(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_RULE");
    }

    #[test]
    fn unsupported_type_fails_build() {
        struct Job;
        fn fields() -> Vec<FieldDecl> {
            vec![FieldDecl::new(
                "Callback",
                "callback",
                TypeDescriptor::optional(TypeDescriptor::Unsupported("callable")),
            )]
        }
        let err = RecordMetadata::build(RecordType::of::<Job>("Job", fields), &RuleRegistry::new())
            .unwrap_err();
        assert!(matches!(err, VaultError::UnsupportedFieldType { kind: "callable", .. }));
    }

    #[test]
    fn cache_returns_same_entry() {
        let cache = MetadataCache::new();
        let registry = RuleRegistry::with_builtins();
        let first = cache.get_or_build(profile(), &registry).unwrap();
        let second = cache.get_or_build(profile(), &registry).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }
}
