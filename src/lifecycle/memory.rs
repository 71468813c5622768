//! In-memory host.
//!
//! Thread-safe reference implementation of [`Host`] for embedded usage and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::lifecycle::host::Host;
use crate::record::{key_string, Record};
use crate::schema::EntityDefinition;
use crate::text::{TextBundle, Texts};

fn lock_err(context: &'static str) -> StoreError {
    StoreError::Backend(format!("poisoned lock: {context}"))
}

/// Builds the storage key `<ShortName>(<k>=<v>,...)` in declared key order.
fn storage_key(entity: &EntityDefinition, key: &Record) -> Result<String, StoreError> {
    let mut ordered = Record::new();
    for name in &entity.keys {
        let value = key.get(name).ok_or_else(|| {
            StoreError::Backend(format!("missing key element '{name}' for {}", entity.name))
        })?;
        ordered.insert(name.clone(), value.clone());
    }
    Ok(format!("{}({})", entity.short_name(), key_string(&ordered)))
}

/// Host backed by a map of records, with default English texts.
#[derive(Debug)]
pub struct InMemoryHost {
    records: RwLock<HashMap<String, Record>>,
    texts: Texts,
    persisted: AtomicUsize,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHost {
    /// Creates an empty host using [`Texts::with_defaults`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_texts(Texts::with_defaults())
    }

    /// Creates an empty host using `texts`.
    #[must_use]
    pub fn with_texts(texts: Texts) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            texts,
            persisted: AtomicUsize::new(0),
        }
    }

    /// Stores `record`, replacing any record with the same key.
    pub fn insert(&self, entity: &EntityDefinition, record: Record) -> Result<(), StoreError> {
        let key = storage_key(entity, &record)?;
        let mut records = self.records.write().map_err(|_| lock_err("insert"))?;
        records.insert(key, record);
        Ok(())
    }

    /// Returns a copy of the stored record.
    pub fn get(&self, entity: &EntityDefinition, key: &Record) -> Result<Option<Record>, StoreError> {
        let key = storage_key(entity, key)?;
        let records = self.records.read().map_err(|_| lock_err("get"))?;
        Ok(records.get(&key).cloned())
    }

    /// Number of successful `persist` calls so far.
    #[must_use]
    pub fn persist_count(&self) -> usize {
        self.persisted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Host for InMemoryHost {
    async fn read_current(&self, entity: &EntityDefinition, key: &Record) -> Result<Option<Record>, StoreError> {
        self.get(entity, key)
    }

    async fn persist(&self, entity: &EntityDefinition, key: &Record, changes: &Record) -> Result<Value, StoreError> {
        let storage = storage_key(entity, key)?;
        let mut records = self.records.write().map_err(|_| lock_err("persist"))?;
        let stored = records.get_mut(&storage).ok_or_else(|| StoreError::NotFound {
            entity: entity.name.clone(),
            key: key_string(key),
        })?;
        for (field, value) in changes {
            stored.insert(field.clone(), value.clone());
        }
        self.persisted.fetch_add(1, Ordering::Relaxed);
        Ok(Value::Object(stored.clone()))
    }

    fn texts(&self) -> &dyn TextBundle {
        &self.texts
    }
}
