//! The validation engine.
//!
//! [`Engine::validate`] snapshots a record, walks its cached field metadata,
//! runs each field's rule chain and emits a [`Document`]. Nested records
//! become nested mappings; sequences and mappings are entered only when the
//! field is annotated with `dive`.

use std::borrow::Cow;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::cache::{FieldMetadata, MetadataCache, RecordMetadata, RuleAction, RuleEntry};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::{BoxError, FieldError, VaultError};
use crate::options::Options;
use crate::record::{PathSegment, Record, ValueError};
use crate::registry::RuleRegistry;
use crate::rule::{Transformation, Validation};
use crate::scope::FieldScope;
use crate::value::{Document, RecordValue, TypeDescriptor, Value};

// ============================================================================
// BUILDER
// ============================================================================

/// Collects rules and formatters, then builds an immutable [`Engine`].
///
/// ```rust
/// use docvault_validator::{Engine, Validation};
///
/// let engine = Engine::builder()
///     .register_validation("not_root", Validation::new(|s| Ok(s.value().as_str() != Some("root"))))?
///     .build();
/// # let _ = engine;
/// # Ok::<(), docvault_validator::VaultError>(())
/// ```
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    registry: RuleRegistry,
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Builder with the built-in rules registered.
    pub fn new() -> Self {
        Self {
            registry: RuleRegistry::with_builtins(),
            config: EngineConfig::default(),
        }
    }

    pub fn config(&mut self, config: EngineConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn register_validation(
        &mut self,
        name: &str,
        validation: Validation,
    ) -> Result<&mut Self, VaultError> {
        self.registry.register_validation(name, validation)?;
        Ok(self)
    }

    pub fn register_transformation(
        &mut self,
        name: &str,
        transformation: Transformation,
    ) -> Result<&mut Self, VaultError> {
        self.registry
            .register_transformation(name, transformation)?;
        Ok(self)
    }

    /// Appends a formatter. The first formatter returning `Some` decides the
    /// error a failed rule produces.
    pub fn register_error_formatter<F>(&mut self, formatter: F) -> Result<&mut Self, VaultError>
    where
        F: Fn(&FieldError) -> Option<BoxError> + Send + Sync + 'static,
    {
        self.registry.register_error_formatter(formatter);
        Ok(self)
    }

    pub fn build(&self) -> Engine {
        debug!(registry = ?self.registry, max_depth = self.config.max_depth, "engine built");
        Engine {
            registry: self.registry.clone(),
            cache: MetadataCache::new(),
            config: self.config.clone(),
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Validates and transforms records. `Send + Sync`; share it as
/// `Arc<Engine>`.
#[derive(Debug)]
pub struct Engine {
    registry: RuleRegistry,
    cache: MetadataCache,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with only the built-in rules.
    pub fn new() -> Self {
        EngineBuilder::new().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Cached metadata of `R`, building it if needed.
    pub fn metadata<R: Record>(&self) -> Result<Arc<RecordMetadata>, VaultError> {
        self.cache.get_or_build(R::record_type(), &self.registry)
    }

    /// Validates `record` and returns the document to persist.
    ///
    /// Fails with [`VaultError::ReadOnlyRecord`] when `options` asks for
    /// write back; use [`Engine::validate_mut`] for that.
    pub fn validate<R: Record>(
        &self,
        ctx: &Context,
        record: &R,
        options: &Options,
    ) -> Result<Document, VaultError> {
        if options.modifies_original() {
            return Err(VaultError::ReadOnlyRecord);
        }
        let snapshot = record.record_value();
        Walker::new(self, ctx, options, None).record(&snapshot, &Location::default(), true)
    }

    /// Like [`Engine::validate`], and with `modify_original` writes every
    /// transformed value back into `record` as soon as it is produced.
    /// Values written before a later rule fails stay written.
    pub fn validate_mut<R: Record>(
        &self,
        ctx: &Context,
        record: &mut R,
        options: &Options,
    ) -> Result<Document, VaultError> {
        let snapshot = record.record_value();
        if !options.modifies_original() {
            return Walker::new(self, ctx, options, None).record(
                &snapshot,
                &Location::default(),
                true,
            );
        }

        let mut write = |path: &[PathSegment], value: Value| record.write_at(path, value);
        let sink: &mut WriteBack<'_> = &mut write;
        Walker::new(self, ctx, options, Some(sink)).record(&snapshot, &Location::default(), true)
    }

    /// Builds the error for a failed validation, running the formatter chain.
    fn rule_failed(&self, scope: &FieldScope<'_>) -> VaultError {
        let error = FieldError::from_scope(scope);
        debug!(path = error.path(), rule = error.rule(), "rule failed");
        self.registry
            .formatters()
            .iter()
            .find_map(|format| format(&error))
            .map_or(VaultError::Field(error), VaultError::Formatted)
    }
}

// ============================================================================
// TRAVERSAL
// ============================================================================

type WriteBack<'a> = dyn FnMut(&[PathSegment], Value) -> Result<(), ValueError> + 'a;

/// Position of the field being visited.
#[derive(Debug, Clone, Default)]
struct Location {
    path: String,
    struct_path: String,
    segments: Vec<PathSegment>,
    depth: usize,
}

impl Location {
    fn field(&self, name: &str, struct_field: &str, index: usize) -> Self {
        self.child(
            join(&self.path, name),
            join(&self.struct_path, struct_field),
            PathSegment::Field(index),
        )
    }

    fn index(&self, index: usize) -> Self {
        self.child(
            format!("{}[{index}]", self.path),
            format!("{}[{index}]", self.struct_path),
            PathSegment::Index(index),
        )
    }

    fn key(&self, key: &str) -> Self {
        self.child(
            join(&self.path, key),
            join(&self.struct_path, key),
            PathSegment::Key(key.to_owned()),
        )
    }

    fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    fn child(&self, path: String, struct_path: String, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self {
            path,
            struct_path,
            segments,
            depth: self.depth,
        }
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}.{name}")
    }
}

/// Element descriptor and rules of a `dive` field.
#[derive(Clone, Copy)]
struct Dive<'m> {
    element: &'m TypeDescriptor,
    rules: &'m [RuleEntry],
}

struct Walker<'a> {
    engine: &'a Engine,
    ctx: &'a Context,
    options: &'a Options,
    write_back: Option<&'a mut WriteBack<'a>>,
}

impl<'a> Walker<'a> {
    fn new(
        engine: &'a Engine,
        ctx: &'a Context,
        options: &'a Options,
        write_back: Option<&'a mut WriteBack<'a>>,
    ) -> Self {
        Self {
            engine,
            ctx,
            options,
            write_back,
        }
    }

    /// `validate` is false once an enclosing path was skipped.
    fn record(
        &mut self,
        record: &RecordValue,
        at: &Location,
        validate: bool,
    ) -> Result<Document, VaultError> {
        let max_depth = self.engine.config.max_depth;
        if at.depth > max_depth {
            return Err(VaultError::DepthExceeded {
                path: at.path.clone(),
                max_depth,
            });
        }

        let metadata = self
            .engine
            .cache
            .get_or_build(record.record_type(), &self.engine.registry)?;

        let mut document = Document::with_capacity(metadata.fields().len());
        for field in metadata.fields() {
            let here = at.field(field.name(), field.struct_field(), field.index());
            let value = record.value_at(field.index()).cloned().unwrap_or(Value::Null);
            if let Some(emitted) = self.field(record, field, value, validate, &here)? {
                document.insert(field.name().to_owned(), emitted);
            }
        }
        Ok(document)
    }

    /// Returns `None` when the field is omitted.
    fn field(
        &mut self,
        record: &RecordValue,
        field: &FieldMetadata,
        value: Value,
        inherited: bool,
        here: &Location,
    ) -> Result<Option<Value>, VaultError> {
        if value.is_zero()
            && field.omit().applies_to(self.options.method())
            && !self.options.allows_empty(&here.path)
        {
            trace!(path = %here.path, "omitting zero value");
            return Ok(self.options.tombstones_omitted().then_some(Value::Delete));
        }

        let validate = inherited && self.options.validates(&here.path);
        let value = if validate {
            let scope = FieldScope::new(
                record,
                Cow::Borrowed(field.name()),
                Cow::Borrowed(field.struct_field()),
                here.path.clone(),
                here.struct_path.clone(),
                value,
                field.descriptor(),
            );
            self.chain(scope, field.rules(), field.is_optional(), here)?
        } else {
            value
        };

        let dive = match (field.dive(), field.element()) {
            (true, Some(element)) => Some(Dive {
                element,
                rules: field.element_rules(),
            }),
            _ => None,
        };
        self.finalize(record, value, dive, validate, here).map(Some)
    }

    /// Runs a rule chain on one scope and returns the final value.
    fn chain<'s>(
        &mut self,
        mut scope: FieldScope<'s>,
        rules: &'s [RuleEntry],
        nullable: bool,
        here: &Location,
    ) -> Result<Value, VaultError> {
        let options = self.options;
        let ctx = self.ctx;
        let method = options.method();
        let tx = options.transaction_handle();

        for rule in rules {
            if !rule.applies_to(method) {
                continue;
            }
            if scope.value().is_zero() && !rule.runs_on_nil() && !rule.is_required() {
                trace!(path = %here.path, rule = rule.name(), "skipping rule on zero value");
                continue;
            }

            scope.set_rule(rule.name(), rule.param());
            trace!(path = %here.path, rule = rule.name(), param = ?rule.param(), "running rule");

            match rule.action() {
                RuleAction::Validate(validation) => {
                    let passed = validation
                        .call(ctx, tx, &scope)
                        .map_err(VaultError::from_rule_error)?;
                    if !passed {
                        return Err(self.engine.rule_failed(&scope));
                    }
                }
                RuleAction::Transform(transformation) => {
                    let next = transformation
                        .call(ctx, tx, &scope)
                        .map_err(VaultError::from_rule_error)?;
                    if !(nullable && next.is_null()) && !scope.descriptor().admits(&next) {
                        return Err(VaultError::TypeMismatch {
                            rule: rule.name().to_owned(),
                            path: here.path.clone(),
                            expected: scope.descriptor().to_string(),
                            found: next.kind(),
                        });
                    }
                    if next != *scope.value() {
                        self.write_back(here, &next)?;
                        scope.set_value(next);
                    }
                }
            }
        }

        Ok(scope.into_value())
    }

    /// Computes the emitted form of a value after its own chain ran.
    fn finalize(
        &mut self,
        owner: &RecordValue,
        value: Value,
        dive: Option<Dive<'_>>,
        validate: bool,
        here: &Location,
    ) -> Result<Value, VaultError> {
        match (value, dive) {
            (Value::Record(nested), _) => self
                .record(&nested, &here.nested(), validate)
                .map(Value::Mapping),
            (Value::Sequence(items), Some(dive)) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let at = here.index(index);
                    out.push(self.element(owner, item, format!("[{index}]"), dive, validate, &at)?);
                }
                Ok(Value::Sequence(out))
            }
            (Value::Mapping(entries), Some(dive)) => {
                let mut out = IndexMap::with_capacity(entries.len());
                for (key, item) in entries {
                    let at = here.key(&key);
                    let item = self.element(owner, item, key.clone(), dive, validate, &at)?;
                    out.insert(key, item);
                }
                Ok(Value::Mapping(out))
            }
            (other, _) => Ok(other),
        }
    }

    fn element(
        &mut self,
        owner: &RecordValue,
        item: Value,
        name: String,
        dive: Dive<'_>,
        validate: bool,
        here: &Location,
    ) -> Result<Value, VaultError> {
        let validate = validate && self.options.validates(&here.path);
        let item = if validate && !dive.rules.is_empty() {
            let scope = FieldScope::new(
                owner,
                Cow::Owned(name.clone()),
                Cow::Owned(name),
                here.path.clone(),
                here.struct_path.clone(),
                item,
                dive.element,
            );
            self.chain(scope, dive.rules, dive.element.is_optional(), here)?
        } else {
            item
        };
        self.finalize(owner, item, None, validate, here)
    }

    fn write_back(&mut self, here: &Location, value: &Value) -> Result<(), VaultError> {
        if let Some(write) = self.write_back.as_deref_mut() {
            trace!(path = %here.path, "writing value back");
            write(&here.segments, value.clone()).map_err(|source| VaultError::WriteBack {
                path: here.path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_paths() {
        let root = Location::default();
        let tags = root.field("tags", "Tags", 2);
        assert_eq!(tags.path, "tags");
        let second = tags.index(1);
        assert_eq!(second.path, "tags[1]");
        assert_eq!(second.struct_path, "Tags[1]");
        assert_eq!(
            second.segments,
            vec![PathSegment::Field(2), PathSegment::Index(1)]
        );

        let labels = root.field("labels", "Labels", 0).key("env");
        assert_eq!(labels.path, "labels.env");

        let street = root.field("address", "Address", 1).nested().field("street", "Street", 0);
        assert_eq!(street.path, "address.street");
        assert_eq!(street.struct_path, "Address.Street");
        assert_eq!(street.depth, 1);
    }

    #[test]
    fn engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
        assert_send_sync::<Arc<Engine>>();
    }
}
