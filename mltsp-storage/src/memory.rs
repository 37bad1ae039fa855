//! In-memory record store
//!
//! Each collection sits behind its own `RwLock`, so a long listing scan of
//! one collection never blocks writes to another.

use std::collections::HashMap;
use std::sync::RwLock;

use mltsp_core::{Collection, MltspResult, StorageError};

use crate::{document_key, merge_patch, Document, RecordStore};

type Table = RwLock<HashMap<String, Document>>;

/// Record store held entirely in process memory.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    tables: HashMap<Collection, Table>,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        let tables = Collection::ALL
            .iter()
            .map(|collection| (*collection, RwLock::new(HashMap::new())))
            .collect();
        Self { tables }
    }
}

impl InMemoryRecordStore {
    /// Create an empty store with all six collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every document from every collection.
    pub fn clear(&self) -> MltspResult<()> {
        for table in self.tables.values() {
            table
                .write()
                .map_err(|_| StorageError::LockPoisoned)?
                .clear();
        }
        Ok(())
    }

    fn table(&self, collection: Collection) -> MltspResult<&Table> {
        self.tables.get(&collection).ok_or_else(|| {
            StorageError::Backend {
                reason: format!("collection {} is not initialized", collection),
            }
            .into()
        })
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get(&self, collection: Collection, key: &str) -> MltspResult<Option<Document>> {
        let table = self
            .table(collection)?
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(table.get(key).cloned())
    }

    fn insert(&self, collection: Collection, document: Document) -> MltspResult<()> {
        let key = document_key(collection, &document)?;
        let mut table = self
            .table(collection)?
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        if table.contains_key(&key) {
            return Err(StorageError::AlreadyExists { collection, key }.into());
        }
        table.insert(key, document);
        Ok(())
    }

    fn update(&self, collection: Collection, key: &str, patch: Document) -> MltspResult<Document> {
        let mut table = self
            .table(collection)?
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        let document = table.get_mut(key).ok_or_else(|| StorageError::NotFound {
            collection,
            key: key.to_string(),
        })?;
        merge_patch(collection, document, patch)?;
        Ok(document.clone())
    }

    fn delete(&self, collection: Collection, key: &str) -> MltspResult<bool> {
        let mut table = self
            .table(collection)?
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(table.remove(key).is_some())
    }

    fn filter(
        &self,
        collection: Collection,
        predicate: &dyn Fn(&Document) -> bool,
    ) -> MltspResult<Vec<Document>> {
        let table = self
            .table(collection)?
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(table.values().filter(|d| predicate(*d)).cloned().collect())
    }

    fn count(&self, collection: Collection) -> MltspResult<usize> {
        let table = self
            .table(collection)?
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(table.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mltsp_core::MltspError;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test document must be an object"),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = InMemoryRecordStore::new();
        store
            .insert(Collection::Projects, doc(json!({"id": "p1", "name": "TEST"})))
            .unwrap();

        let fetched = store.get(Collection::Projects, "p1").unwrap().unwrap();
        assert_eq!(fetched["name"], "TEST");
        assert!(store.get(Collection::Models, "p1").unwrap().is_none());
    }

    #[test]
    fn test_insert_duplicate_fails() {
        let store = InMemoryRecordStore::new();
        store
            .insert(Collection::Users, doc(json!({"id": "a@b.c", "email": "a@b.c"})))
            .unwrap();
        let err = store
            .insert(Collection::Users, doc(json!({"id": "a@b.c", "email": "a@b.c"})))
            .unwrap_err();
        assert!(matches!(
            err,
            MltspError::Storage(StorageError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = InMemoryRecordStore::new();
        let err = store
            .update(Collection::Features, "nope", doc(json!({"pid": "1"})))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_merges() {
        let store = InMemoryRecordStore::new();
        store
            .insert(Collection::Features, doc(json!({"id": "f1", "name": "fs"})))
            .unwrap();
        let merged = store
            .update(Collection::Features, "f1", doc(json!({"pid": "9999"})))
            .unwrap();
        assert_eq!(merged["pid"], "9999");
        assert_eq!(merged["name"], "fs");
        assert_eq!(
            store.get(Collection::Features, "f1").unwrap().unwrap()["pid"],
            "9999"
        );
    }

    #[test]
    fn test_delete_then_get_absent() {
        let store = InMemoryRecordStore::new();
        store
            .insert(Collection::Models, doc(json!({"id": "m1"})))
            .unwrap();
        assert!(store.delete(Collection::Models, "m1").unwrap());
        assert!(store.get(Collection::Models, "m1").unwrap().is_none());
        assert!(!store.delete(Collection::Models, "m1").unwrap());
    }

    #[test]
    fn test_filter_and_count() {
        let store = InMemoryRecordStore::new();
        for (id, projkey) in [("f1", "p1"), ("f2", "p2"), ("f3", "p1")] {
            store
                .insert(
                    Collection::Features,
                    doc(json!({"id": id, "projkey": projkey})),
                )
                .unwrap();
        }
        let matched = store
            .filter(Collection::Features, &|d: &Document| d["projkey"] == "p1")
            .unwrap();
        assert_eq!(matched.len(), 2);
        assert_eq!(store.count(Collection::Features).unwrap(), 3);
        assert_eq!(store.count(Collection::Predictions).unwrap(), 0);
    }

    #[test]
    fn test_clear() {
        let store = InMemoryRecordStore::new();
        store
            .insert(Collection::Projects, doc(json!({"id": "p1"})))
            .unwrap();
        store.clear().unwrap();
        assert_eq!(store.count(Collection::Projects).unwrap(), 0);
    }
}
