//! # docvault-store
//!
//! Typed collections over a document store. A [`Collection`] validates each
//! record with a [`docvault_validator::Engine`] and forwards the resulting
//! document to a [`DocumentStore`] connector.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use docvault_store::{Collection, CreateOptions, MemoryStore};
//! use docvault_validator::prelude::*;
//!
//! #[derive(Record)]
//! struct User {
//!     #[vault("name,required,trim_space")]
//!     name: String,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), docvault_store::StoreError> {
//! let users: Collection<User> =
//!     Collection::new("users", Arc::new(Engine::new()), Arc::new(MemoryStore::new()));
//!
//! let user = User { name: "  Ada ".into() };
//! let id = users.create(&Context::new(), &user, &CreateOptions::new()).await?;
//! let stored = users.find_by_id(&id).await?;
//! assert_eq!(stored.get("name"), Some(&Value::from("Ada")));
//! # Ok(())
//! # }
//! ```

// StoreError wraps VaultError inline.
#![allow(clippy::result_large_err)]

pub mod collection;
pub mod connector;
pub mod error;
pub mod memory;
pub mod query;

pub use collection::{Collection, CreateOptions, UpdateOptions};
pub use connector::{DocumentStore, StoredDocument, WriteMode, lookup};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use query::{Cursor, CursorKind, Direction, Filter, FilterOp, Limit, Order, Query};
