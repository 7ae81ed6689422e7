//! Prelude module for convenient imports.
//!
//! ```rust
//! use docvault_validator::prelude::*;
//!
//! let engine = Engine::new();
//! let options = Options::new().as_create();
//! # let _ = (engine, options);
//! ```

// ============================================================================
// ENGINE: building and running
// ============================================================================

pub use crate::config::EngineConfig;
pub use crate::context::{Context, Transaction};
pub use crate::engine::{Engine, EngineBuilder};
pub use crate::options::{Method, Options};

// ============================================================================
// RULES: custom validations, transformations and formatters
// ============================================================================

pub use crate::error::{BoxError, FieldError, VaultError};
pub use crate::rule::{Transformation, Validation};
pub use crate::scope::FieldScope;

// ============================================================================
// VALUES: records and the document model
// ============================================================================

pub use crate::record::{FieldValue, Record};
pub use crate::value::{Document, Value};

#[cfg(feature = "derive")]
pub use docvault_validator_macros::Record;
