//! Document store: records addressed by id, listed by equality filters.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    AudioFiles,
    ProcessedVoices,
    VoicePresets,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::AudioFiles => "audioFiles",
            Collection::ProcessedVoices => "processedVoices",
            Collection::VoicePresets => "voicePresets",
        }
    }
}

/// Equality filters plus an optional single ordering.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    fn matches(&self, doc: &Value) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }
}

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores `doc`, using its `id` field if present, otherwise a generated one.
    /// Stamps `createdAt`/`updatedAt` and returns the stored document.
    async fn create(&self, collection: Collection, doc: Value) -> AppResult<Value>;

    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<Value>>;

    /// Shallow patch; bumps `updatedAt`. Missing document is `NotFound`.
    async fn update(&self, collection: Collection, id: &str, patch: Value) -> AppResult<Value>;

    async fn delete(&self, collection: Collection, id: &str) -> AppResult<bool>;

    async fn list(&self, collection: Collection, query: &Query) -> AppResult<Vec<Value>>;
}

// Типизированные обёртки поверх JSON-документов

pub async fn create_typed<T, R>(store: &dyn DocumentStore, collection: Collection, doc: &T) -> AppResult<R>
where
    T: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let stored = store.create(collection, serde_json::to_value(doc)?).await?;
    Ok(serde_json::from_value(stored)?)
}

pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
) -> AppResult<Option<T>> {
    match store.get(collection, id).await? {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

pub async fn update_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
    patch: Value,
) -> AppResult<T> {
    let updated = store.update(collection, id, patch).await?;
    Ok(serde_json::from_value(updated)?)
}

pub async fn list_typed<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    query: &Query,
) -> AppResult<Vec<T>> {
    store
        .list(collection, query)
        .await?
        .into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(AppError::from))
        .collect()
}

pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[derive(Debug, Clone)]
struct StoredDoc {
    seq: u64,
    doc: Value,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    collections: HashMap<Collection, HashMap<String, StoredDoc>>,
}

/// In-memory document store; ties in ordering fall back to insertion order.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<Inner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (a.parse::<DateTime<Utc>>(), b.parse::<DateTime<Utc>>()) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(&self, collection: Collection, doc: Value) -> AppResult<Value> {
        let Value::Object(mut fields) = doc else {
            return Err(AppError::Storage(format!(
                "{} documents must be JSON objects",
                collection.as_str()
            )));
        };

        let id = match fields.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let now = timestamp_now();
        fields.insert("id".to_string(), Value::String(id.clone()));
        fields.insert("createdAt".to_string(), Value::String(now.clone()));
        fields.insert("updatedAt".to_string(), Value::String(now));
        let doc = Value::Object(fields);

        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner
            .collections
            .entry(collection)
            .or_default()
            .insert(id, StoredDoc { seq, doc: doc.clone() });
        Ok(doc)
    }

    async fn get(&self, collection: Collection, id: &str) -> AppResult<Option<Value>> {
        let inner = self.inner.lock();
        Ok(inner
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|stored| stored.doc.clone()))
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> AppResult<Value> {
        let Value::Object(patch) = patch else {
            return Err(AppError::Storage("update patch must be a JSON object".to_string()));
        };

        let mut inner = self.inner.lock();
        let stored = inner
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| AppError::NotFound(format!("{} {}", collection.as_str(), id)))?;

        let fields: &mut Map<String, Value> = stored
            .doc
            .as_object_mut()
            .ok_or_else(|| AppError::Storage("stored document is not an object".to_string()))?;
        for (key, value) in patch {
            // id и createdAt не переписываются
            if key == "id" || key == "createdAt" {
                continue;
            }
            fields.insert(key, value);
        }
        fields.insert("updatedAt".to_string(), Value::String(timestamp_now()));
        Ok(stored.doc.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> AppResult<bool> {
        let mut inner = self.inner.lock();
        Ok(inner
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    async fn list(&self, collection: Collection, query: &Query) -> AppResult<Vec<Value>> {
        let inner = self.inner.lock();
        let mut matched: Vec<&StoredDoc> = inner
            .collections
            .get(&collection)
            .map(|docs| docs.values().filter(|stored| query.matches(&stored.doc)).collect())
            .unwrap_or_default();

        match &query.order_by {
            Some((field, direction)) => {
                matched.sort_by(|a, b| {
                    let ord = compare_values(a.doc.get(field), b.doc.get(field))
                        .then(a.seq.cmp(&b.seq));
                    match direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    }
                });
            }
            None => matched.sort_by_key(|stored| stored.seq),
        }

        Ok(matched.into_iter().map(|stored| stored.doc.clone()).collect())
    }
}
