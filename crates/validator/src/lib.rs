//! # docvault-validator
//!
//! Annotation-driven validation and transformation of typed records, producing
//! documents ready for a document store.
//!
//! ## Quick Start
//!
//! ```rust
//! use docvault_validator::prelude::*;
//!
//! #[derive(Record)]
//! struct User {
//!     #[vault("name,required,min=3,trim_space")]
//!     name: String,
//!     #[vault("email,omitempty,lowercase,email")]
//!     email: Option<String>,
//!     #[vault("-")]
//!     password_hash: String,
//! }
//!
//! let engine = Engine::new();
//! let user = User {
//!     name: "Ada".into(),
//!     email: Some("ADA@EXAMPLE.COM".into()),
//!     password_hash: String::new(),
//! };
//!
//! let document = engine.validate(&Context::new(), &user, &Options::new())?;
//! assert_eq!(document["email"], Value::from("ada@example.com"));
//! assert!(!document.contains_key("password_hash"));
//! # Ok::<(), VaultError>(())
//! ```
//!
//! ## Annotations
//!
//! `#[vault("<name>,<token>,...")]`: the first segment renames the output
//! field (empty keeps the declared name, `"-"` skips the field). Tokens are
//! rules (`min=3`, `email`, `transform=lowercase`), method-scoped rules
//! (`required_create`), omit policies (`omitempty`, `omitempty_update`) and
//! `dive`, after which rules apply to each element of a sequence or mapping.
//!
//! ## Built-in Rules
//!
//! - **Validations**: `required`, `required_<method>`, `min`, `max`, `email`
//! - **Transformations**: `uppercase`, `lowercase`, `trim_space`
//!
//! Register more with [`EngineBuilder::register_validation`] and
//! [`EngineBuilder::register_transformation`].

// VaultError carries FieldError inline; boxing it would add an allocation to
// every failed rule.
#![allow(clippy::result_large_err)]

extern crate self as docvault_validator;

pub mod annotation;
pub mod builtin;
pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod options;
pub mod prelude;
pub mod record;
pub mod registry;
pub mod rule;
pub mod scope;
pub mod value;

pub use config::EngineConfig;
pub use context::{Context, Transaction};
pub use engine::{Engine, EngineBuilder};
pub use error::{BoxError, FieldError, VaultError, VaultResult};
pub use options::{Method, Options};
pub use record::{FieldDecl, FieldValue, PathSegment, Record, RecordType, ValueError};
pub use rule::{ErrorFormatter, Transformation, Validation};
pub use scope::FieldScope;
pub use value::{Document, Kind, RecordValue, TypeDescriptor, Value};

#[cfg(feature = "derive")]
pub use docvault_validator_macros::Record;
