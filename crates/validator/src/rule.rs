//! Rule implementations and their adapters.
//!
//! Every rule is stored with one signature,
//! `(&Context, Option<&dyn Transaction>, &FieldScope) -> Result<_, BoxError>`.
//! The adapter constructors let callers write only the parts they use:
//!
//! ```rust
//! use docvault_validator::{Transformation, Validation, Value};
//!
//! let not_admin = Validation::new(|scope| Ok(scope.value().as_str() != Some("admin")));
//! let slug = Transformation::new(|scope| {
//!     Ok(match scope.value() {
//!         Value::String(s) => Value::String(s.replace(' ', "-")),
//!         other => other.clone(),
//!     })
//! });
//! # let _ = (not_admin, slug);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::context::{Context, Transaction};
use crate::error::BoxError;
use crate::scope::FieldScope;
use crate::value::Value;

type ValidationFn = dyn Fn(&Context, Option<&dyn Transaction>, &FieldScope<'_>) -> Result<bool, BoxError>
    + Send
    + Sync;

type TransformationFn = dyn Fn(&Context, Option<&dyn Transaction>, &FieldScope<'_>) -> Result<Value, BoxError>
    + Send
    + Sync;

/// Rewrites a field error into a caller-facing error. Returning `None`
/// passes the error on to the next formatter.
pub type ErrorFormatter =
    Arc<dyn Fn(&crate::FieldError) -> Option<BoxError> + Send + Sync>;

// ============================================================================
// VALIDATION
// ============================================================================

/// A boolean check. `Ok(false)` fails the field with a
/// [`FieldError`](crate::FieldError).
#[derive(Clone)]
pub struct Validation {
    func: Arc<ValidationFn>,
    runs_on_nil: bool,
}

impl Validation {
    /// Validation that only looks at the field.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&FieldScope<'_>) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Self::full(move |_: &Context, _: Option<&dyn Transaction>, scope: &FieldScope<'_>| f(scope))
    }

    /// Validation that reads the call context.
    pub fn with_context<F>(f: F) -> Self
    where
        F: Fn(&Context, &FieldScope<'_>) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Self::full(move |ctx: &Context, _: Option<&dyn Transaction>, scope: &FieldScope<'_>| {
            f(ctx, scope)
        })
    }

    /// Validation that uses the caller's transaction, if any.
    pub fn with_transaction<F>(f: F) -> Self
    where
        F: Fn(Option<&dyn Transaction>, &FieldScope<'_>) -> Result<bool, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::full(move |_: &Context, tx: Option<&dyn Transaction>, scope: &FieldScope<'_>| {
            f(tx, scope)
        })
    }

    /// Validation with the full signature.
    pub fn full<F>(f: F) -> Self
    where
        F: Fn(&Context, Option<&dyn Transaction>, &FieldScope<'_>) -> Result<bool, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            func: Arc::new(f),
            runs_on_nil: false,
        }
    }

    /// Also run when the field holds a zero value.
    #[must_use = "builder methods must be chained or built"]
    pub fn runs_on_nil(mut self, runs_on_nil: bool) -> Self {
        self.runs_on_nil = runs_on_nil;
        self
    }

    pub fn is_run_on_nil(&self) -> bool {
        self.runs_on_nil
    }

    pub(crate) fn call(
        &self,
        ctx: &Context,
        tx: Option<&dyn Transaction>,
        scope: &FieldScope<'_>,
    ) -> Result<bool, BoxError> {
        (self.func)(ctx, tx, scope)
    }
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validation")
            .field("runs_on_nil", &self.runs_on_nil)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TRANSFORMATION
// ============================================================================

/// A value rewrite. The returned value must fit the field's type.
#[derive(Clone)]
pub struct Transformation {
    func: Arc<TransformationFn>,
    runs_on_nil: bool,
}

impl Transformation {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&FieldScope<'_>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::full(move |_: &Context, _: Option<&dyn Transaction>, scope: &FieldScope<'_>| f(scope))
    }

    pub fn with_context<F>(f: F) -> Self
    where
        F: Fn(&Context, &FieldScope<'_>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::full(move |ctx: &Context, _: Option<&dyn Transaction>, scope: &FieldScope<'_>| {
            f(ctx, scope)
        })
    }

    pub fn with_transaction<F>(f: F) -> Self
    where
        F: Fn(Option<&dyn Transaction>, &FieldScope<'_>) -> Result<Value, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::full(move |_: &Context, tx: Option<&dyn Transaction>, scope: &FieldScope<'_>| {
            f(tx, scope)
        })
    }

    pub fn full<F>(f: F) -> Self
    where
        F: Fn(&Context, Option<&dyn Transaction>, &FieldScope<'_>) -> Result<Value, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            func: Arc::new(f),
            runs_on_nil: false,
        }
    }

    /// Also run when the field holds a zero value (e.g. to fill defaults).
    #[must_use = "builder methods must be chained or built"]
    pub fn runs_on_nil(mut self, runs_on_nil: bool) -> Self {
        self.runs_on_nil = runs_on_nil;
        self
    }

    pub fn is_run_on_nil(&self) -> bool {
        self.runs_on_nil
    }

    pub(crate) fn call(
        &self,
        ctx: &Context,
        tx: Option<&dyn Transaction>,
        scope: &FieldScope<'_>,
    ) -> Result<Value, BoxError> {
        (self.func)(ctx, tx, scope)
    }
}

impl fmt::Debug for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformation")
            .field("runs_on_nil", &self.runs_on_nil)
            .finish_non_exhaustive()
    }
}
