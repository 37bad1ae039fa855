//! Authorization index over the `userauth` collection.

use std::collections::HashSet;
use std::sync::Arc;

use mltsp_core::{new_record_key, AuthorizationGrant, GrantFlag, MltspResult, Project, RecordKey};
use mltsp_storage::{RecordStore, RecordStoreExt};

/// Answers which projects a user holds an active grant on.
///
/// Grants are scanned on every call; nothing is cached, so a grant written
/// by one request is visible to the next.
#[derive(Clone)]
pub struct AuthorizationIndex {
    store: Arc<dyn RecordStore>,
}

impl AuthorizationIndex {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Distinct project keys the user has at least one active grant on.
    pub fn authorized_project_keys(&self, user_key: &str) -> MltspResult<HashSet<RecordKey>> {
        let grants = self.store.filter_records(|g: &AuthorizationGrant| {
            g.userkey == user_key && g.active.is_active()
        })?;
        Ok(grants.into_iter().map(|g| g.projkey).collect())
    }

    /// Whether the user holds an active grant on the project.
    pub fn is_authorized(&self, user_key: &str, projkey: &str) -> MltspResult<bool> {
        let grants = self.store.filter_records(|g: &AuthorizationGrant| {
            g.userkey == user_key && g.projkey == projkey && g.active.is_active()
        })?;
        Ok(!grants.is_empty())
    }

    /// Insert a fresh grant. Existing grants for the same pair are left alone.
    pub fn create_grant(
        &self,
        projkey: &str,
        user_key: &str,
        active: GrantFlag,
    ) -> MltspResult<AuthorizationGrant> {
        let grant = AuthorizationGrant {
            id: new_record_key(),
            projkey: projkey.to_string(),
            userkey: user_key.to_string(),
            active,
        };
        self.store.insert_record(&grant)?;
        tracing::debug!(projkey, user_key, active = ?active, "Created authorization grant");
        Ok(grant)
    }

    /// Every grant on a project, active or not.
    pub fn grants_for_project(&self, projkey: &str) -> MltspResult<Vec<AuthorizationGrant>> {
        self.store
            .filter_records(|g: &AuthorizationGrant| g.projkey == projkey)
    }

    /// Delete every grant on a project. Returns how many were removed.
    pub fn revoke_project_grants(&self, projkey: &str) -> MltspResult<usize> {
        let grants = self.grants_for_project(projkey)?;
        for grant in &grants {
            self.store.delete_record::<AuthorizationGrant>(&grant.id)?;
        }
        Ok(grants.len())
    }

    /// Keys of all projects, regardless of grants.
    pub fn all_project_keys(&self) -> MltspResult<HashSet<RecordKey>> {
        Ok(self
            .store
            .list_records::<Project>()?
            .into_iter()
            .map(|p| p.id)
            .collect())
    }
}
