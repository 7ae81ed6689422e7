//! In-memory reference connector.
//!
//! Evaluates document IDs, filters, ordering, offset and limits. Cursors
//! are rejected with [`StoreError::Unsupported`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use docvault_validator::{Document, Value};
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::trace;
use uuid::Uuid;

use crate::connector::{DocumentStore, StoredDocument, WriteMode, lookup};
use crate::error::{StoreError, StoreResult};
use crate::query::{Direction, Filter, FilterOp, Limit, Query};

type Collection = BTreeMap<String, Document>;

/// Process-local document store. Cheap to create; intended for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Document,
    ) -> StoreResult<String> {
        let id = id.map_or_else(|| Uuid::new_v4().simple().to_string(), str::to_owned);
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_owned()).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_owned(),
                id,
            });
        }
        trace!(collection, id = %id, fields = data.len(), "insert");
        docs.insert(id.clone(), strip_deletes(data));
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<StoredDocument> {
        self.collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| StoredDocument::new(id, data.clone()))
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn write(
        &self,
        collection: &str,
        id: &str,
        data: Document,
        mode: WriteMode,
    ) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let existing = collections
            .entry(collection.to_owned())
            .or_default()
            .entry(id.to_owned())
            .or_default();
        trace!(collection, id, ?mode, "write");

        match mode {
            WriteMode::Replace => *existing = strip_deletes(data),
            WriteMode::MergeAll => merge_all(existing, data),
            WriteMode::Merge(paths) => {
                for path in &paths {
                    match lookup(&data, path) {
                        Some(value) if !matches!(value, Value::Delete) => {
                            set_path(existing, path, value.clone());
                        }
                        _ => remove_path(existing, path),
                    }
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let removed = self
            .collections
            .write()
            .get_mut(collection)
            .and_then(|docs| docs.remove(id));
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(collection, id)),
        }
    }

    async fn find(&self, collection: &str, query: &Query) -> StoreResult<Vec<StoredDocument>> {
        if query.start_cursor().is_some() || query.end_cursor().is_some() {
            return Err(StoreError::unsupported("query cursors in the memory store"));
        }

        let mut results: Vec<StoredDocument> = {
            let collections = self.collections.read();
            let Some(docs) = collections.get(collection) else {
                return Ok(Vec::new());
            };
            docs.iter()
                .filter(|(id, _)| query.id_list().is_empty() || query.id_list().contains(*id))
                .filter(|(_, data)| query.filters().iter().all(|f| matches_filter(data, f)))
                .filter(|(_, data)| {
                    query
                        .ordering()
                        .iter()
                        .all(|order| lookup(data, &order.path).is_some())
                })
                .map(|(id, data)| StoredDocument::new(id.clone(), data.clone()))
                .collect()
        };

        results.sort_by(|a, b| {
            query
                .ordering()
                .iter()
                .map(|order| {
                    let ordering = compare_present(a.get(&order.path), b.get(&order.path));
                    match order.direction {
                        Direction::Asc => ordering,
                        Direction::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.id.cmp(&b.id))
        });

        let mut results: Vec<_> = results.into_iter().skip(query.offset_value()).collect();
        match query.limit_value() {
            Some(Limit::First(n)) => results.truncate(n),
            Some(Limit::Last(n)) => {
                let skip = results.len().saturating_sub(n);
                results.drain(..skip);
            }
            None => {}
        }
        Ok(results)
    }
}

// ==================== Writes ====================

fn strip_deletes(data: Document) -> Document {
    data.into_iter()
        .filter(|(_, value)| !matches!(value, Value::Delete))
        .map(|(key, value)| (key, strip_nested_deletes(value)))
        .collect()
}

fn strip_nested_deletes(value: Value) -> Value {
    match value {
        Value::Mapping(entries) => Value::Mapping(strip_deletes(entries)),
        other => other,
    }
}

fn merge_all(existing: &mut Document, data: Document) {
    for (key, value) in data {
        match value {
            Value::Delete => {
                existing.shift_remove(&key);
            }
            Value::Mapping(entries) => {
                let slot = existing
                    .entry(key)
                    .or_insert_with(|| Value::Mapping(IndexMap::new()));
                match slot {
                    Value::Mapping(current) => merge_all(current, entries),
                    other => *other = Value::Mapping(strip_deletes(entries)),
                }
            }
            other => {
                existing.insert(key, other);
            }
        }
    }
}

fn set_path(document: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            document.insert(path.to_owned(), strip_nested_deletes(value));
        }
        Some((head, rest)) => {
            let slot = document
                .entry(head.to_owned())
                .or_insert_with(|| Value::Mapping(IndexMap::new()));
            if !matches!(slot, Value::Mapping(_)) {
                *slot = Value::Mapping(IndexMap::new());
            }
            if let Value::Mapping(inner) = slot {
                set_path(inner, rest, value);
            }
        }
    }
}

fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.shift_remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Mapping(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

// ==================== Reads ====================

/// Orders two values of comparable kinds; numbers compare across `Int`,
/// `Uint` and `Float`.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Uint(x), Value::Uint(y)) => Some(x.cmp(y)),
        (Value::Int(_) | Value::Uint(_) | Value::Float(_), Value::Int(_) | Value::Uint(_) | Value::Float(_)) => {
            as_f64(a)?.partial_cmp(&as_f64(b)?)
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Uint(u) => Some(*u as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn equals(a: &Value, b: &Value) -> bool {
    compare(a, b).map_or_else(|| a == b, Ordering::is_eq)
}

fn compare_present(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => compare(a, b).unwrap_or_else(|| kind_rank(a).cmp(&kind_rank(b))),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Cross-kind ordering, following the usual document-store type order.
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null | Value::Delete => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Uint(_) | Value::Float(_) => 2,
        Value::Time(_) => 3,
        Value::String(_) => 4,
        Value::Bytes(_) => 5,
        Value::Sequence(_) => 6,
        Value::Mapping(_) | Value::Record(_) => 7,
    }
}

fn matches_filter(data: &Document, filter: &Filter) -> bool {
    let Some(field) = lookup(data, &filter.path) else {
        return false;
    };
    let operand = &filter.value;
    let ordered = |accept: fn(Ordering) -> bool| compare(field, operand).is_some_and(accept);

    match filter.op {
        FilterOp::Eq => equals(field, operand),
        FilterOp::NotEq => !equals(field, operand),
        FilterOp::Lt => ordered(Ordering::is_lt),
        FilterOp::Lte => ordered(Ordering::is_le),
        FilterOp::Gt => ordered(Ordering::is_gt),
        FilterOp::Gte => ordered(Ordering::is_ge),
        FilterOp::In => sequence(operand).iter().any(|v| equals(field, v)),
        FilterOp::NotIn => !sequence(operand).iter().any(|v| equals(field, v)),
        FilterOp::ArrayContains => sequence(field).iter().any(|v| equals(v, operand)),
        FilterOp::ArrayContainsAny => sequence(field)
            .iter()
            .any(|v| sequence(operand).iter().any(|w| equals(v, w))),
    }
}

fn sequence(value: &Value) -> &[Value] {
    match value {
        Value::Sequence(items) => items,
        _ => &[],
    }
}
