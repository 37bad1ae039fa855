//! MLTSP Test Utilities
//!
//! Centralized test infrastructure for the MLTSP workspace:
//! - Proptest generators for records and grant sets
//! - Record fixtures and a seeded multi-user store
//! - Assertions on the error taxonomy

// Re-export stores from their source crate
pub use mltsp_storage::{InMemoryRecordStore, RecordStore, RecordStoreExt};

// Re-export core types for convenience
pub use mltsp_core::{
    AuthorizationGrant, Collection, FeatureSet, GrantFlag, JobStage, MltspError, MltspResult,
    Model, Prediction, Project, RecordKey, StorageError, Timestamp, User, ValidationError,
};

use chrono::Utc;
use std::sync::Arc;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating MLTSP records.

    use super::*;
    use proptest::prelude::*;

    /// Short lowercase record key.
    pub fn arb_record_key() -> impl Strategy<Value = RecordKey> {
        "[a-z0-9]{4,12}"
    }

    /// Plausible email address, used as a user key.
    pub fn arb_email() -> impl Strategy<Value = String> {
        ("[a-z]{1,8}", "[a-z]{2,6}").prop_map(|(user, domain)| format!("{}@{}.org", user, domain))
    }

    pub fn arb_grant_flag() -> impl Strategy<Value = GrantFlag> {
        any::<bool>().prop_map(GrantFlag::from)
    }

    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2020-2030
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// A grant drawn from small pools of projects and users, so that
    /// collisions (duplicate and conflicting grants) are common.
    pub fn arb_grant(
        projkeys: Vec<RecordKey>,
        userkeys: Vec<RecordKey>,
    ) -> impl Strategy<Value = AuthorizationGrant> {
        (
            arb_record_key(),
            proptest::sample::select(projkeys),
            proptest::sample::select(userkeys),
            arb_grant_flag(),
        )
            .prop_map(|(id, projkey, userkey, active)| AuthorizationGrant {
                id,
                projkey,
                userkey,
                active,
            })
    }

    /// A batch of grants with unique ids over 1-5 projects and 1-4 users.
    pub fn arb_grant_set() -> impl Strategy<Value = Vec<AuthorizationGrant>> {
        (
            prop::collection::hash_set(arb_record_key(), 1..=5),
            prop::collection::hash_set(arb_email(), 1..=4),
        )
            .prop_flat_map(|(projkeys, userkeys)| {
                let projkeys: Vec<_> = projkeys.into_iter().collect();
                let userkeys: Vec<_> = userkeys.into_iter().collect();
                prop::collection::vec(arb_grant(projkeys, userkeys), 0..24)
            })
            .prop_map(|grants| {
                grants
                    .into_iter()
                    .enumerate()
                    .map(|(i, mut grant)| {
                        grant.id = format!("{}-{}", grant.id, i);
                        grant
                    })
                    .collect()
            })
    }

    pub fn arb_project() -> impl Strategy<Value = Project> {
        (arb_record_key(), "[A-Za-z ]{1,20}", "[a-z ]{0,40}").prop_map(
            |(id, name, description)| Project {
                id,
                name,
                description,
            },
        )
    }

    pub fn arb_featureset(projkey: RecordKey) -> impl Strategy<Value = FeatureSet> {
        (
            arb_record_key(),
            "[a-z_]{1,16}",
            arb_timestamp(),
            prop::collection::vec("[a-z_]{3,12}", 0..6),
        )
            .prop_map(move |(id, name, created, featlist)| FeatureSet {
                id,
                projkey: projkey.clone(),
                name,
                created,
                featlist,
                meta_feats: vec![],
                pid: None,
                results_msg: None,
                err_msg: None,
            })
    }

    /// Positive pid in the Linux default range.
    pub fn arb_pid() -> impl Strategy<Value = u32> {
        1u32..4_194_304u32
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and a seeded store for common scenarios.

    use super::*;

    pub const ALICE: &str = "alice@example.com";
    pub const BOB: &str = "bob@example.com";
    pub const CAROL: &str = "carol@example.com";

    pub const ALICE_PROJECT: &str = "proj-alice";
    pub const BOB_PROJECT: &str = "proj-bob";
    pub const SHARED_PROJECT: &str = "proj-shared";

    pub fn project(id: &str, name: &str) -> Project {
        Project {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
        }
    }

    pub fn grant(id: &str, projkey: &str, userkey: &str, active: GrantFlag) -> AuthorizationGrant {
        AuthorizationGrant {
            id: id.to_string(),
            projkey: projkey.to_string(),
            userkey: userkey.to_string(),
            active,
        }
    }

    pub fn featureset(id: &str, projkey: &str) -> FeatureSet {
        FeatureSet {
            id: id.to_string(),
            projkey: projkey.to_string(),
            name: format!("{}-features", id),
            created: Utc::now(),
            featlist: vec!["amplitude".to_string(), "std_err".to_string()],
            meta_feats: vec!["meta1".to_string()],
            pid: None,
            results_msg: None,
            err_msg: None,
        }
    }

    pub fn model(id: &str, projkey: &str) -> Model {
        Model {
            id: id.to_string(),
            projkey: projkey.to_string(),
            name: format!("{}-features", id),
            model_type: "RFC".to_string(),
            created: Utc::now(),
            meta_feats: vec![],
            pid: None,
            results_msg: None,
            err_msg: None,
        }
    }

    pub fn prediction(id: &str, projkey: &str) -> Prediction {
        Prediction {
            id: id.to_string(),
            projkey: projkey.to_string(),
            name: format!("{}-prediction", id),
            model_type: "RFC".to_string(),
            model_name: "fs-features".to_string(),
            created: Utc::now(),
            filename: "dotastro_215153.dat".to_string(),
            results_str_html: None,
            features_dict: None,
            ts_data_dict: None,
            pred_results_list_dict: None,
            pid: None,
            err_msg: None,
        }
    }

    /// An empty in-memory store behind the shared handle type.
    pub fn empty_store() -> Arc<dyn RecordStore> {
        Arc::new(InMemoryRecordStore::new())
    }

    /// A store with three users and three projects:
    ///
    /// - alice has active grants on `proj-alice` and `proj-shared`
    /// - bob has an active grant on `proj-bob` and an inactive one on `proj-shared`
    /// - carol has no grants
    ///
    /// Each project holds a feature set; alice's and bob's hold a model;
    /// alice's holds a prediction.
    pub fn seeded_store() -> Arc<dyn RecordStore> {
        let store = empty_store();
        seed(store.as_ref()).expect("seeding fixture store should succeed");
        store
    }

    fn seed(store: &dyn RecordStore) -> MltspResult<()> {
        for email in [ALICE, BOB, CAROL] {
            store.insert_record(&User::from_email(email))?;
        }

        store.insert_record(&project(ALICE_PROJECT, "Alice Project"))?;
        store.insert_record(&project(BOB_PROJECT, "Bob Project"))?;
        store.insert_record(&project(SHARED_PROJECT, "Shared Project"))?;

        store.insert_record(&grant("g1", ALICE_PROJECT, ALICE, GrantFlag::Active))?;
        store.insert_record(&grant("g2", BOB_PROJECT, BOB, GrantFlag::Active))?;
        store.insert_record(&grant("g3", SHARED_PROJECT, ALICE, GrantFlag::Active))?;
        store.insert_record(&grant("g4", SHARED_PROJECT, BOB, GrantFlag::Inactive))?;

        store.insert_record(&featureset("fs-alice", ALICE_PROJECT))?;
        store.insert_record(&featureset("fs-bob", BOB_PROJECT))?;
        store.insert_record(&featureset("fs-shared", SHARED_PROJECT))?;

        store.insert_record(&model("model-alice", ALICE_PROJECT))?;
        store.insert_record(&model("model-bob", BOB_PROJECT))?;

        store.insert_record(&prediction("pred-alice", ALICE_PROJECT))?;
        Ok(())
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on the MLTSP error taxonomy.

    use super::*;

    pub fn assert_not_found<T: std::fmt::Debug>(result: &MltspResult<T>, collection: Collection) {
        match result {
            Err(MltspError::Storage(StorageError::NotFound { collection: c, .. })) => {
                assert_eq!(*c, collection, "Wrong collection in NotFound error");
            }
            other => panic!("Expected NotFound in {}, got {:?}", collection, other),
        }
    }

    pub fn assert_validation_error<T: std::fmt::Debug>(result: &MltspResult<T>) {
        assert!(
            matches!(result, Err(MltspError::Validation(_))),
            "Expected ValidationError, got {:?}",
            result
        );
    }

    pub fn assert_rejected<T: std::fmt::Debug>(result: &MltspResult<T>) {
        assert!(
            matches!(result, Err(MltspError::Storage(StorageError::Rejected { .. }))),
            "Expected Rejected, got {:?}",
            result
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seeded_store_contents() {
        let store = fixtures::seeded_store();
        assert_eq!(store.count(Collection::Projects).unwrap(), 3);
        assert_eq!(store.count(Collection::UserAuth).unwrap(), 4);
        assert_eq!(store.count(Collection::Users).unwrap(), 3);
        assert_eq!(store.count(Collection::Features).unwrap(), 3);
        assert_eq!(store.count(Collection::Models).unwrap(), 2);
        assert_eq!(store.count(Collection::Predictions).unwrap(), 1);
    }

    #[test]
    fn test_assert_not_found() {
        let store = fixtures::empty_store();
        let result = store.require_record::<Model>("missing");
        assertions::assert_not_found(&result, Collection::Models);
    }

    proptest! {
        #[test]
        fn prop_grant_set_ids_unique(grants in generators::arb_grant_set()) {
            let ids: std::collections::HashSet<_> = grants.iter().map(|g| g.id.clone()).collect();
            prop_assert_eq!(ids.len(), grants.len());
        }
    }
}
