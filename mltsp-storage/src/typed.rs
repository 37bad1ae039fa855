//! Typed record access on top of any [`RecordStore`].
//!
//! Every document read back is decoded into its `mltsp-core` struct, and
//! every update is validated by decoding the merged result before it is
//! written. Since those structs deny unknown fields, a patch naming a field
//! the record kind does not have never reaches the store.

use mltsp_core::{MltspResult, Record, StorageError};
use serde::Serialize;
use serde_json::Value;

use crate::{merge_patch, to_document, Document, RecordStore};

/// Decode a stored document. Failure means the store holds bad data.
fn decode<R: Record>(document: Document) -> MltspResult<R> {
    serde_json::from_value(Value::Object(document)).map_err(|e| {
        StorageError::Corrupt {
            collection: R::COLLECTION,
            reason: e.to_string(),
        }
        .into()
    })
}

/// Check that a merged update still decodes. Failure blames the patch.
fn check_update<R: Record>(preview: Document) -> MltspResult<()> {
    serde_json::from_value::<R>(Value::Object(preview))
        .map(|_| ())
        .map_err(|e| {
            StorageError::Rejected {
                collection: R::COLLECTION,
                reason: e.to_string(),
            }
            .into()
        })
}

/// Typed operations for every record store, including `dyn RecordStore`.
pub trait RecordStoreExt: RecordStore {
    /// Get a record by key.
    fn get_record<R: Record>(&self, key: &str) -> MltspResult<Option<R>> {
        self.get(R::COLLECTION, key)?.map(decode::<R>).transpose()
    }

    /// Get a record by key, failing with `NotFound` when absent.
    fn require_record<R: Record>(&self, key: &str) -> MltspResult<R> {
        self.get_record::<R>(key)?.ok_or_else(|| {
            StorageError::NotFound {
                collection: R::COLLECTION,
                key: key.to_string(),
            }
            .into()
        })
    }

    /// Insert a new record under its own key.
    fn insert_record<R: Record>(&self, record: &R) -> MltspResult<()> {
        self.insert(R::COLLECTION, to_document(R::COLLECTION, record)?)
    }

    /// Apply a partial update and return the updated record.
    ///
    /// The merged document must still decode as `R`; otherwise the update
    /// is rejected and nothing is written.
    fn update_record<R: Record, U: Serialize + ?Sized>(
        &self,
        key: &str,
        update: &U,
    ) -> MltspResult<R> {
        let patch = to_document(R::COLLECTION, update)?;
        let mut preview = self
            .get(R::COLLECTION, key)?
            .ok_or_else(|| StorageError::NotFound {
                collection: R::COLLECTION,
                key: key.to_string(),
            })?;
        merge_patch(R::COLLECTION, &mut preview, patch.clone())?;
        check_update::<R>(preview)?;

        decode(self.update(R::COLLECTION, key, patch)?)
    }

    /// Delete a record, failing with `NotFound` when absent.
    fn delete_record<R: Record>(&self, key: &str) -> MltspResult<()> {
        if self.delete(R::COLLECTION, key)? {
            Ok(())
        } else {
            Err(StorageError::NotFound {
                collection: R::COLLECTION,
                key: key.to_string(),
            }
            .into())
        }
    }

    /// Every record in the collection.
    fn list_records<R: Record>(&self) -> MltspResult<Vec<R>> {
        self.filter(R::COLLECTION, &|_| true)?
            .into_iter()
            .map(decode::<R>)
            .collect()
    }

    /// Records matching a typed predicate.
    fn filter_records<R, F>(&self, predicate: F) -> MltspResult<Vec<R>>
    where
        R: Record,
        F: Fn(&R) -> bool,
    {
        let mut matched = Vec::new();
        for record in self.list_records::<R>()? {
            if predicate(&record) {
                matched.push(record);
            }
        }
        Ok(matched)
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryRecordStore, JobUpdate};
    use chrono::Utc;
    use mltsp_core::{FeatureSet, MltspError, Project};
    use std::sync::Arc;

    fn make_test_featureset(id: &str, projkey: &str) -> FeatureSet {
        FeatureSet {
            id: id.to_string(),
            projkey: projkey.to_string(),
            name: format!("fs-{}", id),
            created: Utc::now(),
            featlist: vec!["amplitude".to_string()],
            meta_feats: vec![],
            pid: None,
            results_msg: None,
            err_msg: None,
        }
    }

    #[test]
    fn test_typed_roundtrip_through_dyn_store() {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryRecordStore::new());
        let fs = make_test_featureset("f1", "p1");
        store.insert_record(&fs).unwrap();

        let fetched: FeatureSet = store.require_record("f1").unwrap();
        assert_eq!(fetched, fs);
        assert!(store.get_record::<FeatureSet>("f2").unwrap().is_none());
    }

    #[test]
    fn test_update_record_stores_pid_as_string() {
        let store = InMemoryRecordStore::new();
        store.insert_record(&make_test_featureset("f1", "p1")).unwrap();

        let updated: FeatureSet = store.update_record("f1", &JobUpdate::pid(9999)).unwrap();
        assert_eq!(updated.pid.as_deref(), Some("9999"));
    }

    #[test]
    fn test_update_record_rejects_foreign_field() {
        let store = InMemoryRecordStore::new();
        store.insert_record(&make_test_featureset("f1", "p1")).unwrap();

        let update = JobUpdate {
            results_str_html: Some("<table></table>".to_string()),
            ..Default::default()
        };
        let err = store
            .update_record::<FeatureSet, _>("f1", &update)
            .unwrap_err();
        assert!(matches!(
            err,
            MltspError::Storage(StorageError::Rejected { .. })
        ));

        let unchanged: FeatureSet = store.require_record("f1").unwrap();
        assert!(unchanged.results_msg.is_none());
    }

    #[test]
    fn test_update_record_missing_is_not_found() {
        let store = InMemoryRecordStore::new();
        let err = store
            .update_record::<FeatureSet, _>("nope", &JobUpdate::pid(1))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_delete_record_then_get_not_found() {
        let store = InMemoryRecordStore::new();
        store.insert_record(&make_test_featureset("f1", "p1")).unwrap();
        store.delete_record::<FeatureSet>("f1").unwrap();
        assert!(store.require_record::<FeatureSet>("f1").unwrap_err().is_not_found());
        assert!(store.delete_record::<FeatureSet>("f1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_filter_records() {
        let store = InMemoryRecordStore::new();
        store.insert_record(&make_test_featureset("f1", "p1")).unwrap();
        store.insert_record(&make_test_featureset("f2", "p2")).unwrap();
        store
            .insert_record(&Project {
                id: "p1".to_string(),
                name: "TEST".to_string(),
                description: String::new(),
            })
            .unwrap();

        let in_p1: Vec<FeatureSet> = store.filter_records(|f: &FeatureSet| f.projkey == "p1").unwrap();
        assert_eq!(in_p1.len(), 1);
        assert_eq!(store.list_records::<Project>().unwrap().len(), 1);
    }

    #[test]
    fn test_undecodable_document_is_corrupt() {
        let store = InMemoryRecordStore::new();
        store.insert_record(&make_test_featureset("f1", "p1")).unwrap();
        let mut bad = Document::new();
        bad.insert("id".to_string(), Value::String("f2".to_string()));
        bad.insert("projkey".to_string(), Value::from(17));
        store.insert(FeatureSet::COLLECTION, bad).unwrap();

        let err = store.list_records::<FeatureSet>().unwrap_err();
        assert!(matches!(
            err,
            MltspError::Storage(StorageError::Corrupt { .. })
        ));
        let err = store.get_record::<FeatureSet>("f2").unwrap_err();
        assert!(matches!(
            err,
            MltspError::Storage(StorageError::Corrupt { .. })
        ));
    }
}
