//! Document-store connector interface.

use async_trait::async_trait;
use docvault_validator::{Document, Value};
use serde::de::DeserializeOwned;

use crate::error::StoreResult;
use crate::query::Query;

/// A stored document with its ID.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Document,
}

impl StoredDocument {
    pub fn new(id: impl Into<String>, data: Document) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Value at a dot-separated path (`address.city`).
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.data, path)
    }

    /// Deserializes the document data into `D`.
    pub fn decode<D: DeserializeOwned>(&self) -> StoreResult<D> {
        let json = serde_json::to_value(&self.data)?;
        Ok(serde_json::from_value(json)?)
    }
}

/// Resolves a dot-separated path through nested mappings.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Mapping(entries) => entries.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

/// How [`DocumentStore::write`] combines new data with an existing document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Overwrite the whole document.
    #[default]
    Replace,
    /// Deep-merge every field of the new data; other fields are untouched.
    MergeAll,
    /// Overwrite only the listed dot-separated paths. A listed path absent
    /// from the new data is deleted.
    Merge(Vec<String>),
}

/// A backing document store.
///
/// Connectors own their wire protocol and retries; the crate only forwards
/// validated documents. [`Value::Delete`] in written data removes the field.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Adds a document, generating an ID when `id` is `None`. Returns the ID.
    async fn insert(&self, collection: &str, id: Option<&str>, data: Document)
    -> StoreResult<String>;

    async fn get(&self, collection: &str, id: &str) -> StoreResult<StoredDocument>;

    /// Writes data to a document, creating it if missing.
    async fn write(
        &self,
        collection: &str,
        id: &str,
        data: Document,
        mode: WriteMode,
    ) -> StoreResult<()>;

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<StoredDocument>>;

    async fn count(&self, collection: &str, query: &Query) -> StoreResult<usize> {
        Ok(self.find(collection, query).await?.len())
    }
}
