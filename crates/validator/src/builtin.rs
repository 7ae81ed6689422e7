//! Built-in rules.
//!
//! | Name | Kind | Notes |
//! |---|---|---|
//! | `required`, `required_<method>` | validation | runs on zero values, fails on them |
//! | `min=N`, `max=N` | validation | length, numeric bound, or strict time bound |
//! | `email` | validation | permissive RFC 5322 address |
//! | `uppercase`, `lowercase`, `trim_space` | transformation | strings only |

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::context::{Context, Transaction};
use crate::error::{BoxError, VaultError};
use crate::options::Method;
use crate::registry::RuleRegistry;
use crate::rule::{Transformation, Validation};
use crate::scope::FieldScope;
use crate::value::Value;

/// Base name of the required family.
pub const REQUIRED: &str = "required";

/// Non-ASCII ranges accepted in both halves of an address.
const EMAIL_UNICODE: &str = r"\x{00A0}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFEF}";

/// Dot-atom or quoted local part, dotted domain with an optional trailing dot.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let u = EMAIL_UNICODE;
    let atom = format!(r"[a-zA-Z0-9!\#\$%\&'\*\+\-/=\?\^_`\{{\|\}}\~{u}]");
    let dot_atom = format!(r"{atom}+(?:\.{atom}+)*");
    // folding whitespace
    let fws = r"(?:(?:[ \t]*\r\n)?[ \t]+)?";
    let quoted = format!(r#""(?:{fws}[\x01-\x09\x0b\x0c\x0d-\x7f{u}])*{fws}""#);

    let alnum = format!(r"[a-zA-Z0-9{u}]");
    let alpha = format!(r"[a-zA-Z{u}]");
    let inner = format!(r"[a-zA-Z0-9\-\.\~{u}]");
    let label = format!(r"(?:{alnum}|{alnum}{inner}*{alnum})");
    let tld = format!(r"(?:{alpha}|{alpha}{inner}*{alpha})");

    Regex::new(&format!(r"^(?:{dot_atom}|{quoted})@(?:{label}\.)+{tld}\.?$"))
        .expect("static regex is valid")
});

pub(crate) fn install(registry: &mut RuleRegistry) {
    registry.insert_builtin_validation(REQUIRED, Validation::full(required).runs_on_nil(true));
    for method in Method::ALL {
        registry.insert_builtin_validation(
            &format!("{REQUIRED}_{method}"),
            Validation::full(required).runs_on_nil(true),
        );
    }
    registry.insert_builtin_validation("min", Validation::full(min));
    registry.insert_builtin_validation("max", Validation::full(max));
    registry.insert_builtin_validation("email", Validation::full(email));

    registry.insert_builtin_transformation("uppercase", map_string(str::to_uppercase));
    registry.insert_builtin_transformation("lowercase", map_string(str::to_lowercase));
    registry.insert_builtin_transformation("trim_space", map_string(|s| s.trim().to_owned()));
}

// ===== validations =====

fn required(
    _ctx: &Context,
    _tx: Option<&dyn Transaction>,
    scope: &FieldScope<'_>,
) -> Result<bool, BoxError> {
    Ok(!scope.value().is_zero())
}

fn email(
    _ctx: &Context,
    _tx: Option<&dyn Transaction>,
    scope: &FieldScope<'_>,
) -> Result<bool, BoxError> {
    match scope.value() {
        Value::String(s) => Ok(EMAIL_REGEX.is_match(s)),
        other => Err(invalid_target(scope, other).into()),
    }
}

fn min(
    _ctx: &Context,
    _tx: Option<&dyn Transaction>,
    scope: &FieldScope<'_>,
) -> Result<bool, BoxError> {
    compare(scope, Bound::Min).map_err(Into::into)
}

fn max(
    _ctx: &Context,
    _tx: Option<&dyn Transaction>,
    scope: &FieldScope<'_>,
) -> Result<bool, BoxError> {
    compare(scope, Bound::Max).map_err(Into::into)
}

#[derive(Clone, Copy)]
enum Bound {
    Min,
    Max,
}

impl Bound {
    /// Inclusive check for lengths and numbers.
    fn holds<T: PartialOrd>(self, actual: T, limit: T) -> bool {
        match self {
            Self::Min => actual >= limit,
            Self::Max => actual <= limit,
        }
    }

    /// Strict check for times: `min` means after, `max` means before.
    fn holds_strictly<T: PartialOrd>(self, actual: T, limit: T) -> bool {
        match self {
            Self::Min => actual > limit,
            Self::Max => actual < limit,
        }
    }
}

fn compare(scope: &FieldScope<'_>, bound: Bound) -> Result<bool, VaultError> {
    let param = scope
        .param()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| VaultError::MissingParam {
            rule: scope.rule().to_owned(),
            path: scope.path().to_owned(),
        })?;

    let value = scope.value();
    if let Some(len) = value.len() {
        let len = i64::try_from(len).unwrap_or(i64::MAX);
        return Ok(bound.holds(len, parse_param::<i64>(scope, param)?));
    }

    match value {
        Value::Int(i) => Ok(bound.holds(*i, parse_param::<i64>(scope, param)?)),
        Value::Uint(u) => Ok(bound.holds(*u, parse_param::<u64>(scope, param)?)),
        Value::Float(f) => Ok(bound.holds(*f, parse_param::<f64>(scope, param)?)),
        Value::Time(t) => {
            let limit = DateTime::parse_from_rfc3339(param)
                .map_err(|e| invalid_param(scope, param, e))?
                .with_timezone(&Utc);
            Ok(bound.holds_strictly(*t, limit))
        }
        other => Err(invalid_target(scope, other)),
    }
}

fn parse_param<T>(scope: &FieldScope<'_>, param: &str) -> Result<T, VaultError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    param
        .parse::<T>()
        .map_err(|e| invalid_param(scope, param, e))
}

fn invalid_param(scope: &FieldScope<'_>, param: &str, reason: impl std::fmt::Display) -> VaultError {
    VaultError::InvalidParam {
        rule: scope.rule().to_owned(),
        param: param.to_owned(),
        path: scope.path().to_owned(),
        reason: reason.to_string(),
    }
}

fn invalid_target(scope: &FieldScope<'_>, value: &Value) -> VaultError {
    VaultError::InvalidRuleTarget {
        rule: scope.rule().to_owned(),
        path: scope.path().to_owned(),
        kind: value.kind(),
    }
}

// ===== transformations =====

fn map_string(f: fn(&str) -> String) -> Transformation {
    Transformation::new(move |scope| {
        Ok(match scope.value() {
            Value::String(s) => Value::String(f(s)),
            other => other.clone(),
        })
    })
}
