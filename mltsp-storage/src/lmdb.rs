//! LMDB-backed record store.
//!
//! Uses the heed crate (Rust bindings for LMDB). Each collection is a named
//! database inside one environment; documents are stored as JSON bytes
//! under their `id`.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Read transactions for `get`, `filter` and `count`
//! - Write transactions for `insert`, `update` and `delete`
//!
//! LMDB allows one writer per environment at a time, which gives the
//! read-modify-write in `update` its atomicity.

use std::collections::HashMap;
use std::path::Path;

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use mltsp_core::{Collection, MltspError, MltspResult, StorageError};

use crate::{document_key, merge_patch, Document, RecordStore};

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open a collection database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for MltspError {
    fn from(e: LmdbStoreError) -> Self {
        MltspError::Storage(StorageError::Backend {
            reason: e.to_string(),
        })
    }
}

impl From<heed::Error> for LmdbStoreError {
    fn from(e: heed::Error) -> Self {
        LmdbStoreError::Transaction(e.to_string())
    }
}

/// Record store persisted in an LMDB environment.
pub struct LmdbRecordStore {
    env: Env,
    dbs: HashMap<Collection, Database<Str, Bytes>>,
}

impl std::fmt::Debug for LmdbRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbRecordStore")
            .field("path", &self.env.path())
            .finish()
    }
}

impl LmdbRecordStore {
    /// Open (or create) a store at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the environment in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(Collection::ALL.len() as u32)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn()?;
        let mut dbs = HashMap::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            let db: Database<Str, Bytes> = env
                .create_database(&mut wtxn, Some(collection.as_str()))
                .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
            dbs.insert(collection, db);
        }
        wtxn.commit()?;

        tracing::info!(path = %path.as_ref().display(), max_size_mb, "Opened LMDB record store");
        Ok(Self { env, dbs })
    }

    fn db(&self, collection: Collection) -> MltspResult<Database<Str, Bytes>> {
        self.dbs.get(&collection).copied().ok_or_else(|| {
            StorageError::Backend {
                reason: format!("collection {} is not open", collection),
            }
            .into()
        })
    }
}

fn decode(collection: Collection, bytes: &[u8]) -> MltspResult<Document> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::Serialization {
            collection,
            reason: e.to_string(),
        }
        .into()
    })
}

fn encode(collection: Collection, document: &Document) -> MltspResult<Vec<u8>> {
    serde_json::to_vec(document).map_err(|e| {
        StorageError::Serialization {
            collection,
            reason: e.to_string(),
        }
        .into()
    })
}

fn txn_error(e: heed::Error) -> MltspError {
    LmdbStoreError::from(e).into()
}

impl RecordStore for LmdbRecordStore {
    fn get(&self, collection: Collection, key: &str) -> MltspResult<Option<Document>> {
        let db = self.db(collection)?;
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        match db.get(&rtxn, key).map_err(txn_error)? {
            Some(bytes) => Ok(Some(decode(collection, bytes)?)),
            None => Ok(None),
        }
    }

    fn insert(&self, collection: Collection, document: Document) -> MltspResult<()> {
        let key = document_key(collection, &document)?;
        let bytes = encode(collection, &document)?;
        let db = self.db(collection)?;

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        if db.get(&wtxn, &key).map_err(txn_error)?.is_some() {
            return Err(StorageError::AlreadyExists { collection, key }.into());
        }
        db.put(&mut wtxn, &key, bytes.as_slice()).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    fn update(&self, collection: Collection, key: &str, patch: Document) -> MltspResult<Document> {
        let db = self.db(collection)?;

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let mut document = match db.get(&wtxn, key).map_err(txn_error)? {
            Some(bytes) => decode(collection, bytes)?,
            None => {
                return Err(StorageError::NotFound {
                    collection,
                    key: key.to_string(),
                }
                .into())
            }
        };
        merge_patch(collection, &mut document, patch)?;
        let bytes = encode(collection, &document)?;
        db.put(&mut wtxn, key, bytes.as_slice()).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(document)
    }

    fn delete(&self, collection: Collection, key: &str) -> MltspResult<bool> {
        let db = self.db(collection)?;
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let deleted = db.delete(&mut wtxn, key).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(deleted)
    }

    fn filter(
        &self,
        collection: Collection,
        predicate: &dyn Fn(&Document) -> bool,
    ) -> MltspResult<Vec<Document>> {
        let db = self.db(collection)?;
        let rtxn = self.env.read_txn().map_err(txn_error)?;

        let mut matched = Vec::new();
        for entry in db.iter(&rtxn).map_err(txn_error)? {
            let (_, bytes) = entry.map_err(txn_error)?;
            let document = decode(collection, bytes)?;
            if predicate(&document) {
                matched.push(document);
            }
        }
        Ok(matched)
    }

    fn count(&self, collection: Collection) -> MltspResult<usize> {
        let db = self.db(collection)?;
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let len = db.len(&rtxn).map_err(txn_error)?;
        Ok(len as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbRecordStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store =
            LmdbRecordStore::open(temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test document must be an object"),
        }
    }

    #[test]
    fn test_insert_get_roundtrip() {
        let (store, _dir) = create_test_store();
        store
            .insert(
                Collection::Features,
                doc(json!({"id": "f1", "projkey": "p1", "featlist": ["a", "b"]})),
            )
            .unwrap();

        let fetched = store.get(Collection::Features, "f1").unwrap().unwrap();
        assert_eq!(fetched["featlist"], json!(["a", "b"]));
        assert!(store.get(Collection::Models, "f1").unwrap().is_none());
    }

    #[test]
    fn test_insert_duplicate_fails() {
        let (store, _dir) = create_test_store();
        store
            .insert(Collection::Projects, doc(json!({"id": "p1"})))
            .unwrap();
        let err = store
            .insert(Collection::Projects, doc(json!({"id": "p1"})))
            .unwrap_err();
        assert!(matches!(
            err,
            MltspError::Storage(StorageError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_update_and_delete() {
        let (store, _dir) = create_test_store();
        store
            .insert(Collection::Models, doc(json!({"id": "m1", "name": "fs"})))
            .unwrap();

        let merged = store
            .update(Collection::Models, "m1", doc(json!({"pid": "9999"})))
            .unwrap();
        assert_eq!(merged["pid"], "9999");

        assert!(store.delete(Collection::Models, "m1").unwrap());
        assert!(store.get(Collection::Models, "m1").unwrap().is_none());
        assert!(store
            .update(Collection::Models, "m1", doc(json!({"pid": "1"})))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_filter_and_count() {
        let (store, _dir) = create_test_store();
        for (id, userkey) in [("g1", "a"), ("g2", "b"), ("g3", "a")] {
            store
                .insert(
                    Collection::UserAuth,
                    doc(json!({"id": id, "userkey": userkey})),
                )
                .unwrap();
        }
        let matched = store
            .filter(Collection::UserAuth, &|d: &Document| d["userkey"] == "a")
            .unwrap();
        assert_eq!(matched.len(), 2);
        assert_eq!(store.count(Collection::UserAuth).unwrap(), 3);
    }
}
