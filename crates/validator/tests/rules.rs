//! Custom rules, formatters, context and transaction plumbing.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use docvault_validator::prelude::*;
use pretty_assertions::assert_eq;
use rstest::rstest;

#[derive(Record)]
struct Login {
    #[vault("username,required,not_admin")]
    username: String,
    #[vault("email,omitempty,transform=slugify,email")]
    email: String,
}

fn login(username: &str) -> Login {
    Login {
        username: username.into(),
        email: String::new(),
    }
}

fn not_admin() -> Validation {
    Validation::new(|scope| Ok(scope.value().as_str() != Some("admin")))
}

fn slugify() -> Transformation {
    Transformation::new(|scope| {
        Ok(match scope.value() {
            Value::String(s) => Value::String(s.trim().replace(' ', "-").to_lowercase()),
            other => other.clone(),
        })
    })
}

fn engine_with_rules() -> Engine {
    let mut builder = Engine::builder();
    builder
        .register_validation("not_admin", not_admin())
        .unwrap()
        .register_transformation("slugify", slugify())
        .unwrap();
    builder.build()
}

#[test]
fn custom_rules_run_like_builtins() {
    let engine = engine_with_rules();
    let ctx = Context::new();

    let err = engine.validate(&ctx, &login("admin"), &Options::new()).unwrap_err();
    let field = err.field_error().unwrap();
    assert_eq!(field.rule(), "not_admin");
    assert_eq!(
        err.to_string(),
        "field validation for 'username' failed on the 'not_admin' rule"
    );

    let record = Login {
        username: "ada".into(),
        email: " Ada@Example.com ".into(),
    };
    let document = engine.validate(&ctx, &record, &Options::new()).unwrap();
    assert_eq!(document["email"], Value::from("ada@example.com"));
}

#[test]
fn unregistered_custom_rule_fails_the_build() {
    let err = Engine::new()
        .validate(&Context::new(), &login("ada"), &Options::new())
        .unwrap_err();
    assert!(matches!(err, VaultError::UnknownRule { ref rule, .. } if rule == "not_admin"));
}

#[test]
fn literal_transform_annotation_with_custom_name() {
    #[derive(Record)]
    struct Shout {
        #[vault("x,lowercase_no_prefix_needed,transform=lowercase,email")]
        x: String,
    }

    let mut builder = Engine::builder();
    builder
        .register_transformation(
            "lowercase_no_prefix_needed",
            Transformation::new(|scope| Ok(scope.value().clone())),
        )
        .unwrap();
    let document = builder
        .build()
        .validate(
            &Context::new(),
            &Shout {
                x: "USER@EXAMPLE.COM".into(),
            },
            &Options::new(),
        )
        .unwrap();
    assert_eq!(document["x"], Value::from("user@example.com"));
}

#[rstest]
#[case::empty("", "INVALID_RULE_NAME")]
#[case::builtin("required", "RESERVED_RULE_NAME")]
#[case::builtin_method("required_create", "RESERVED_RULE_NAME")]
#[case::delimiter("a,b", "RESERVED_RULE_NAME")]
#[case::param("a=b", "RESERVED_RULE_NAME")]
#[case::path("a.b", "RESERVED_RULE_NAME")]
#[case::space("a b", "RESERVED_RULE_NAME")]
#[case::dive("dive", "RESERVED_RULE_NAME")]
#[case::omit("omitempty_update", "RESERVED_RULE_NAME")]
#[case::transformation_builtin("lowercase", "RESERVED_RULE_NAME")]
fn rejected_rule_names(#[case] name: &str, #[case] code: &str) {
    let mut builder = Engine::builder();
    let err = builder.register_validation(name, not_admin()).unwrap_err();
    assert_eq!(err.code(), code);
}

#[rstest]
#[case::own_namespace("trim_space")]
#[case::validation_builtin("email")]
#[case::validation_builtin_required("required")]
fn builtin_names_reject_transformations(#[case] name: &str) {
    let mut builder = Engine::builder();
    let err = builder.register_transformation(name, slugify()).unwrap_err();
    assert_eq!(err.code(), "RESERVED_RULE_NAME");
}

#[test]
fn re_registering_replaces_the_rule() {
    #[derive(Record)]
    struct Named {
        #[vault("name,custom")]
        name: String,
    }

    let mut builder = Engine::builder();
    builder
        .register_validation("custom", Validation::new(|_| Ok(false)))
        .unwrap()
        .register_validation("custom", Validation::new(|_| Ok(true)))
        .unwrap();
    let record = Named { name: "x".into() };
    assert!(builder.build().validate(&Context::new(), &record, &Options::new()).is_ok());
}

// ===== runs_on_nil =====

#[derive(Record, Default)]
struct Counted {
    #[vault("value,counted")]
    value: String,
}

#[rstest]
#[case::skipped(false, 0)]
#[case::runs(true, 1)]
fn zero_values_only_reach_rules_that_opt_in(#[case] runs_on_nil: bool, #[case] calls: usize) {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&counter);
    let mut builder = Engine::builder();
    builder
        .register_validation(
            "counted",
            Validation::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            })
            .runs_on_nil(runs_on_nil),
        )
        .unwrap();

    builder
        .build()
        .validate(&Context::new(), &Counted::default(), &Options::new())
        .unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), calls);
}

// ===== type checks on transformations =====

#[test]
fn transformation_must_keep_the_field_type() {
    #[derive(Record)]
    struct Age {
        #[vault("age,stringify")]
        age: i64,
    }

    let mut builder = Engine::builder();
    builder
        .register_transformation(
            "stringify",
            Transformation::new(|scope| Ok(Value::String(format!("{:?}", scope.value())))),
        )
        .unwrap();
    let err = builder
        .build()
        .validate(&Context::new(), &Age { age: 3 }, &Options::new())
        .unwrap_err();
    assert!(matches!(
        err,
        VaultError::TypeMismatch { ref rule, found: docvault_validator::Kind::String, .. }
            if rule == "stringify"
    ));
}

#[test]
fn optional_fields_may_be_cleared() {
    #[derive(Record)]
    struct Nick {
        #[vault("nick,clear")]
        nick: Option<String>,
    }

    let mut builder = Engine::builder();
    builder
        .register_transformation("clear", Transformation::new(|_| Ok(Value::Null)))
        .unwrap();
    let document = builder
        .build()
        .validate(
            &Context::new(),
            &Nick {
                nick: Some("x".into()),
            },
            &Options::new(),
        )
        .unwrap();
    assert_eq!(document["nick"], Value::Null);
}

// ===== errors and formatters =====

#[derive(Debug)]
struct Friendly(String);

impl fmt::Display for Friendly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Friendly {}

#[test]
fn first_formatter_returning_some_wins() {
    let mut builder = Engine::builder();
    builder
        .register_validation("not_admin", not_admin())
        .unwrap()
        .register_transformation("slugify", slugify())
        .unwrap()
        .register_error_formatter(|_| None)
        .unwrap()
        .register_error_formatter(|field| {
            (field.rule() == "not_admin").then(|| {
                Box::new(Friendly(format!("{} is taken", field.display_field()))) as BoxError
            })
        })
        .unwrap()
        .register_error_formatter(|_| Some("unreachable".into()))
        .unwrap();

    let err = builder
        .build()
        .validate(&Context::new(), &login("admin"), &Options::new())
        .unwrap_err();
    assert_eq!(err.code(), "FORMATTED");
    assert_eq!(err.to_string(), "username is taken");
}

#[test]
fn rule_errors_pass_through_unchanged() {
    #[derive(Record)]
    struct Flaky {
        #[vault("value,explode")]
        value: String,
    }

    let mut builder = Engine::builder();
    builder
        .register_validation(
            "explode",
            Validation::new(|scope| Err(Friendly(format!("boom at {}", scope.path())).into())),
        )
        .unwrap();
    let err = builder
        .build()
        .validate(
            &Context::new(),
            &Flaky { value: "x".into() },
            &Options::new(),
        )
        .unwrap_err();
    assert_eq!(err.code(), "RULE_ERROR");
    assert_eq!(err.to_string(), "boom at value");
    let VaultError::Rule(inner) = err else {
        panic!("expected a rule error");
    };
    assert!(inner.downcast_ref::<Friendly>().is_some());
}

// ===== context and transactions =====

#[derive(Debug, PartialEq)]
struct Tenant(&'static str);

struct Tx {
    existing: Vec<&'static str>,
}

impl Transaction for Tx {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Record)]
struct Member {
    #[vault("tenant,same_tenant")]
    tenant: String,
    #[vault("handle,unique")]
    handle: String,
}

fn member_engine() -> Engine {
    let mut builder = Engine::builder();
    builder
        .register_validation(
            "same_tenant",
            Validation::with_context(|ctx, scope| {
                Ok(ctx
                    .get::<Tenant>("tenant")
                    .is_some_and(|tenant| scope.value().as_str() == Some(tenant.0)))
            }),
        )
        .unwrap()
        .register_validation(
            "unique",
            Validation::with_transaction(|tx, scope| {
                let Some(tx) = tx.and_then(|tx| tx.downcast_ref::<Tx>()) else {
                    return Err("unique needs a transaction".into());
                };
                Ok(!tx.existing.iter().any(|h| scope.value().as_str() == Some(*h)))
            }),
        )
        .unwrap();
    builder.build()
}

#[test]
fn rules_read_context_and_transaction() {
    let engine = member_engine();
    let ctx = Context::new().with_value("tenant", Tenant("acme"));
    let options = Options::new().transaction(Arc::new(Tx {
        existing: vec!["ada"],
    }));

    let member = |tenant: &str, handle: &str| Member {
        tenant: tenant.into(),
        handle: handle.into(),
    };

    assert!(engine.validate(&ctx, &member("acme", "grace"), &options).is_ok());

    let err = engine.validate(&ctx, &member("other", "grace"), &options).unwrap_err();
    assert_eq!(err.field_error().unwrap().rule(), "same_tenant");

    let err = engine.validate(&ctx, &member("acme", "ada"), &options).unwrap_err();
    assert_eq!(err.field_error().unwrap().rule(), "unique");

    let err = engine
        .validate(&ctx, &member("acme", "ada"), &Options::new())
        .unwrap_err();
    assert_eq!(err.to_string(), "unique needs a transaction");
}
