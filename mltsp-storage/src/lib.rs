//! MLTSP Storage - Record Store Trait and Backends
//!
//! Defines the keyed-record persistence abstraction over the six MLTSP
//! collections. Records travel through the store as JSON documents; the
//! typed layer in [`typed`] binds them back to the structs in `mltsp-core`
//! and rejects any field those structs do not declare.

pub mod lmdb;
pub mod memory;
pub mod typed;

pub use lmdb::{LmdbRecordStore, LmdbStoreError};
pub use memory::InMemoryRecordStore;
pub use typed::RecordStoreExt;

use mltsp_core::{Collection, MltspResult, StorageError};
use serde::Serialize;
use serde_json::{Map, Value};

/// A stored record as a JSON object. Always carries a string `id`.
pub type Document = Map<String, Value>;

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Keyed persistence over the six collections.
///
/// Implementations must be safe to share behind `Arc<dyn RecordStore>`.
/// Reads may run concurrently with each other and with updates; the last
/// write to a key wins.
pub trait RecordStore: Send + Sync {
    /// Get a document by key.
    fn get(&self, collection: Collection, key: &str) -> MltspResult<Option<Document>>;

    /// Insert a new document. Fails if the key is already taken.
    fn insert(&self, collection: Collection, document: Document) -> MltspResult<()>;

    /// Merge `patch` into the document stored under `key` and return the
    /// merged document. A `null` value in the patch removes that field.
    fn update(&self, collection: Collection, key: &str, patch: Document) -> MltspResult<Document>;

    /// Delete a document. Returns whether it existed.
    fn delete(&self, collection: Collection, key: &str) -> MltspResult<bool>;

    /// All documents matching the predicate, in no particular order.
    fn filter(
        &self,
        collection: Collection,
        predicate: &dyn Fn(&Document) -> bool,
    ) -> MltspResult<Vec<Document>>;

    /// Number of documents in a collection.
    fn count(&self, collection: Collection) -> MltspResult<usize>;
}

// ============================================================================
// UPDATE TYPES
// ============================================================================

/// Update payload for job-backed artifacts.
///
/// Only the fields that are set are written. Which fields a record accepts
/// depends on its kind: a feature set has no `results_str_html`, so an
/// update carrying one is rejected by the typed layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_str_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features_dict: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts_data_dict: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pred_results_list_dict: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

impl JobUpdate {
    pub fn pid(pid: impl ToString) -> Self {
        Self {
            pid: Some(pid.to_string()),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            err_msg: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// DOCUMENT HELPERS
// ============================================================================

/// Read the `id` of a document.
pub fn document_key(collection: Collection, document: &Document) -> MltspResult<String> {
    match document.get("id") {
        Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
        _ => Err(StorageError::Rejected {
            collection,
            reason: "document has no string id".to_string(),
        }
        .into()),
    }
}

/// Serialize any value into a document.
pub fn to_document<T: Serialize + ?Sized>(
    collection: Collection,
    value: &T,
) -> MltspResult<Document> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StorageError::Rejected {
            collection,
            reason: format!("expected a JSON object, got {}", json_type_name(&other)),
        }
        .into()),
        Err(e) => Err(StorageError::Serialization {
            collection,
            reason: e.to_string(),
        }
        .into()),
    }
}

/// Apply a patch to a document in place.
///
/// The `id` field is immutable; a patch that tries to change it is rejected.
pub fn merge_patch(
    collection: Collection,
    document: &mut Document,
    patch: Document,
) -> MltspResult<()> {
    if let Some(new_id) = patch.get("id") {
        if document.get("id") != Some(new_id) {
            return Err(StorageError::Rejected {
                collection,
                reason: "id cannot be changed by an update".to_string(),
            }
            .into());
        }
    }
    for (field, value) in patch {
        if value.is_null() {
            document.remove(&field);
        } else {
            document.insert(field, value);
        }
    }
    Ok(())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test document must be an object"),
        }
    }

    #[test]
    fn test_document_key() {
        let d = doc(json!({"id": "abc", "name": "x"}));
        assert_eq!(document_key(Collection::Projects, &d).unwrap(), "abc");

        let missing = doc(json!({"name": "x"}));
        assert!(document_key(Collection::Projects, &missing).is_err());

        let numeric = doc(json!({"id": 7}));
        assert!(document_key(Collection::Projects, &numeric).is_err());
    }

    #[test]
    fn test_merge_patch_sets_and_removes() {
        let mut d = doc(json!({"id": "f1", "pid": "1", "err_msg": "old"}));
        merge_patch(
            Collection::Features,
            &mut d,
            doc(json!({"results_msg": "ok", "err_msg": null})),
        )
        .unwrap();
        assert_eq!(d["results_msg"], "ok");
        assert_eq!(d["pid"], "1");
        assert!(!d.contains_key("err_msg"));
    }

    #[test]
    fn test_merge_patch_rejects_id_change() {
        let mut d = doc(json!({"id": "f1"}));
        let err = merge_patch(Collection::Features, &mut d, doc(json!({"id": "f2"})));
        assert!(err.is_err());
        assert_eq!(d["id"], "f1");
    }

    #[test]
    fn test_to_document_rejects_non_objects() {
        assert!(to_document(Collection::Users, &"just a string").is_err());
        assert!(to_document(Collection::Users, &json!({"id": "a"})).is_ok());
    }

    #[test]
    fn test_job_update_serializes_only_set_fields() {
        let update = JobUpdate::pid(9999);
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value, json!({"pid": "9999"}));
        assert!(!update.is_empty());
        assert!(JobUpdate::default().is_empty());
    }
}
