//! Resource catalog: one listing engine for every resource kind.
//!
//! A listing runs the same four steps whatever the kind:
//!
//! 1. `auth_only` keeps records whose project the caller holds an active
//!    grant on (projects use their own id)
//! 2. `by_project` keeps exact project-key matches
//! 3. `name_only` projects each record to `{id, name}`
//! 4. `as_table` renders an HTML table instead of returning records
//!
//! Ordering is whatever the store yields.

use std::sync::Arc;

use mltsp_core::{
    CatalogKind, FeatureSet, JobRecord, MltspResult, Model, Prediction, Project, ProjectScoped,
    RecordKey, StorageError,
};
use mltsp_storage::{RecordStore, RecordStoreExt};
use serde::Serialize;
use serde_json::Value;

use crate::authz::AuthorizationIndex;
use crate::render::render_table;

// ============================================================================
// LISTABLE RECORDS
// ============================================================================

/// A record kind the catalog can list and render.
pub trait CatalogRecord: ProjectScoped {
    /// Column headers for the full table rendering.
    fn table_columns() -> &'static [&'static str];

    /// Cell text, one per column.
    fn table_cells(&self) -> Vec<String>;
}

fn created_cell(created: &chrono::DateTime<chrono::Utc>) -> String {
    created.format("%Y-%m-%d %H:%M:%S").to_string()
}

impl CatalogRecord for Project {
    fn table_columns() -> &'static [&'static str] {
        &["Name", "Description"]
    }

    fn table_cells(&self) -> Vec<String> {
        vec![self.name.clone(), self.description.clone()]
    }
}

impl CatalogRecord for FeatureSet {
    fn table_columns() -> &'static [&'static str] {
        &["Name", "Created", "Features", "Status"]
    }

    fn table_cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            created_cell(&self.created),
            self.featlist.join(", "),
            self.stage().to_string(),
        ]
    }
}

impl CatalogRecord for Model {
    fn table_columns() -> &'static [&'static str] {
        &["Name", "Type", "Created", "Status"]
    }

    fn table_cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.model_type.clone(),
            created_cell(&self.created),
            self.stage().to_string(),
        ]
    }
}

impl CatalogRecord for Prediction {
    fn table_columns() -> &'static [&'static str] {
        &["Name", "Model", "Type", "File", "Created", "Status"]
    }

    fn table_cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.model_name.clone(),
            self.model_type.clone(),
            self.filename.clone(),
            created_cell(&self.created),
            self.stage().to_string(),
        ]
    }
}

// ============================================================================
// QUERY AND RESULT TYPES
// ============================================================================

/// Listing options. Defaults match an unqualified listing: authorized
/// records only, full records, no project filter, no table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub auth_only: bool,
    pub name_only: bool,
    pub by_project: Option<RecordKey>,
    pub as_table: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            auth_only: true,
            name_only: false,
            by_project: None,
            as_table: false,
        }
    }
}

impl ListQuery {
    pub fn all() -> Self {
        Self {
            auth_only: false,
            ..Self::default()
        }
    }

    pub fn names(mut self) -> Self {
        self.name_only = true;
        self
    }

    pub fn in_project(mut self, projkey: impl Into<RecordKey>) -> Self {
        self.by_project = Some(projkey.into());
        self
    }

    pub fn as_table(mut self) -> Self {
        self.as_table = true;
        self
    }
}

/// `{id, name}` projection of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NamedKey {
    pub id: RecordKey,
    pub name: String,
}

impl NamedKey {
    fn of<R: ProjectScoped>(record: &R) -> Self {
        Self {
            id: record.key().to_string(),
            name: record.name().to_string(),
        }
    }
}

/// Result of a listing, shaped by the query flags.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing<R> {
    Records(Vec<R>),
    Names(Vec<NamedKey>),
    Table(String),
}

impl<R: Serialize> Listing<R> {
    /// Erase the record type, for callers that dispatch on kind at runtime.
    pub fn into_json(self) -> MltspResult<Listing<Value>> {
        match self {
            Listing::Records(records) => {
                let values = records
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| StorageError::Backend {
                        reason: format!("failed to encode listing: {}", e),
                    })?;
                Ok(Listing::Records(values))
            }
            Listing::Names(names) => Ok(Listing::Names(names)),
            Listing::Table(html) => Ok(Listing::Table(html)),
        }
    }
}

// ============================================================================
// CATALOG
// ============================================================================

/// Authorization-gated listing over projects and artifacts.
#[derive(Clone)]
pub struct ResourceCatalog {
    store: Arc<dyn RecordStore>,
    authz: AuthorizationIndex,
}

impl ResourceCatalog {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let authz = AuthorizationIndex::new(store.clone());
        Self { store, authz }
    }

    pub fn authz(&self) -> &AuthorizationIndex {
        &self.authz
    }

    /// List records of kind `R` visible under `query`.
    pub fn list<R: CatalogRecord>(&self, caller: &str, query: &ListQuery) -> MltspResult<Listing<R>> {
        let allowed = if query.auth_only {
            Some(self.authz.authorized_project_keys(caller)?)
        } else {
            None
        };

        let records = self.store.filter_records(|record: &R| {
            let projkey = record.project_key();
            allowed.as_ref().map_or(true, |keys| keys.contains(projkey))
                && query.by_project.as_deref().map_or(true, |p| p == projkey)
        })?;
        tracing::debug!(kind = %R::KIND, caller, count = records.len(), "Catalog listing");

        if query.as_table {
            return Ok(Listing::Table(render_table(&records, query.name_only)));
        }
        if query.name_only {
            return Ok(Listing::Names(records.iter().map(NamedKey::of).collect()));
        }
        Ok(Listing::Records(records))
    }

    /// [`list`](Self::list) with the kind chosen at runtime.
    pub fn list_kind(
        &self,
        kind: CatalogKind,
        caller: &str,
        query: &ListQuery,
    ) -> MltspResult<Listing<Value>> {
        match kind {
            CatalogKind::Projects => self.list::<Project>(caller, query)?.into_json(),
            CatalogKind::FeatureSets => self.list::<FeatureSet>(caller, query)?.into_json(),
            CatalogKind::Models => self.list::<Model>(caller, query)?.into_json(),
            CatalogKind::Predictions => self.list::<Prediction>(caller, query)?.into_json(),
        }
    }

    /// Names of the projects the caller is authorized on.
    pub fn project_names(&self, caller: &str) -> MltspResult<Vec<String>> {
        let allowed = self.authz.authorized_project_keys(caller)?;
        let projects = self
            .store
            .filter_records(|project: &Project| allowed.contains(&project.id))?;
        Ok(projects.into_iter().map(|project| project.name).collect())
    }

    /// Fetch one record the caller may see.
    ///
    /// A record on a project the caller holds no active grant on is
    /// reported as not found, exactly like a missing one.
    pub fn get_visible<R: CatalogRecord>(&self, caller: &str, key: &str) -> MltspResult<R> {
        let not_found = || StorageError::NotFound {
            collection: R::COLLECTION,
            key: key.to_string(),
        };
        let record = self.store.get_record::<R>(key)?.ok_or_else(not_found)?;
        if !self.authz.is_authorized(caller, record.project_key())? {
            tracing::debug!(kind = %R::KIND, key, caller, "Record hidden from caller");
            return Err(not_found().into());
        }
        Ok(record)
    }

    /// [`get_visible`](Self::get_visible) with the kind chosen at runtime.
    pub fn get_visible_kind(&self, kind: CatalogKind, caller: &str, key: &str) -> MltspResult<Value> {
        let value = match kind {
            CatalogKind::Projects => serde_json::to_value(self.get_visible::<Project>(caller, key)?),
            CatalogKind::FeatureSets => {
                serde_json::to_value(self.get_visible::<FeatureSet>(caller, key)?)
            }
            CatalogKind::Models => serde_json::to_value(self.get_visible::<Model>(caller, key)?),
            CatalogKind::Predictions => {
                serde_json::to_value(self.get_visible::<Prediction>(caller, key)?)
            }
        };
        value.map_err(|e| {
            StorageError::Backend {
                reason: format!("failed to encode record: {}", e),
            }
            .into()
        })
    }

    /// Owning project key of a record the caller may see.
    pub fn visible_project_key(
        &self,
        kind: CatalogKind,
        caller: &str,
        key: &str,
    ) -> MltspResult<RecordKey> {
        Ok(match kind {
            CatalogKind::Projects => self.get_visible::<Project>(caller, key)?.id,
            CatalogKind::FeatureSets => self.get_visible::<FeatureSet>(caller, key)?.projkey,
            CatalogKind::Models => self.get_visible::<Model>(caller, key)?.projkey,
            CatalogKind::Predictions => self.get_visible::<Prediction>(caller, key)?.projkey,
        })
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use mltsp_test_utils::fixtures;
    use mltsp_test_utils::generators::arb_grant_set;
    use proptest::prelude::*;
    use std::collections::HashSet;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Authorized listings are always a subset of the unrestricted
        /// listing, and contain only records on granted projects.
        #[test]
        fn prop_auth_only_never_superset(grants in arb_grant_set()) {
            let store = fixtures::empty_store();
            let mut projkeys = HashSet::new();
            for grant in &grants {
                store.insert_record(grant).unwrap();
                projkeys.insert(grant.projkey.clone());
            }
            for (i, projkey) in projkeys.iter().enumerate() {
                store.insert_record(&fixtures::featureset(&format!("fs{}", i), projkey)).unwrap();
            }
            let catalog = ResourceCatalog::new(store);

            let Listing::Records(everything) = catalog.list::<FeatureSet>("x", &ListQuery::all()).unwrap() else {
                panic!("expected records");
            };
            let all_ids: HashSet<_> = everything.iter().map(|f| f.id.clone()).collect();

            for grant in &grants {
                let user = grant.userkey.as_str();
                let allowed = catalog.authz().authorized_project_keys(user).unwrap();
                let Listing::Records(mine) = catalog.list::<FeatureSet>(user, &ListQuery::default()).unwrap() else {
                    panic!("expected records");
                };
                prop_assert!(mine.len() <= everything.len());
                for record in &mine {
                    prop_assert!(all_ids.contains(&record.id));
                    prop_assert!(allowed.contains(&record.projkey));
                }
            }
        }
    }
}
