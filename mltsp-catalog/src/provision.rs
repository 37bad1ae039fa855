//! Creation and removal of projects, artifacts and users.
//!
//! New artifacts start pending (no pid) unless the caller already knows the
//! worker's pid. Provisioning does not verify that `projkey` names an
//! existing project; the HTTP layer checks the caller's grant on it instead.
//! Records referenced by a request (the feature set behind a model, the
//! model behind a prediction) are resolved as the caller: one in a project
//! they hold no active grant on is treated as absent.

use std::sync::Arc;

use chrono::Utc;
use mltsp_core::{
    new_record_key, CatalogKind, Collection, FeatureSet, GrantFlag, MltspError, MltspResult, Model,
    Prediction, Project, ProjectScoped, RecordKey, StorageError, User, ValidationError,
};
use mltsp_storage::{RecordStore, RecordStoreExt};
use serde::Deserialize;

use crate::authz::AuthorizationIndex;
use crate::jobs::ProcessId;

// ============================================================================
// REQUEST TYPES
// ============================================================================

/// A project to create. The creator always gets an active grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Emails of users invited alongside the creator.
    #[serde(default, alias = "addl_authed_users")]
    pub additional_users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewFeatureSet {
    pub projkey: RecordKey,
    pub name: String,
    #[serde(default)]
    pub featlist: Vec<String>,
    #[serde(default)]
    pub meta_feats: Vec<String>,
    #[serde(default)]
    pub pid: Option<ProcessId>,
}

/// A model trained on an existing feature set. The model takes the
/// feature set's name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewModel {
    pub projkey: RecordKey,
    pub featureset_key: RecordKey,
    /// Falls back to the stored feature set's name when omitted.
    #[serde(default)]
    pub featureset_name: Option<String>,
    pub model_type: String,
    #[serde(default)]
    pub pid: Option<ProcessId>,
}

/// A prediction run of a model over an uploaded time-series file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewPrediction {
    pub projkey: RecordKey,
    /// Defaults to `filename`.
    #[serde(default)]
    pub name: Option<String>,
    /// Stored model to take name and type from.
    #[serde(default)]
    pub model_key: Option<RecordKey>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub model_type: Option<String>,
    pub filename: String,
    #[serde(default)]
    pub pid: Option<ProcessId>,
}

fn require(field: &str, value: &str) -> MltspResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        }
        .into());
    }
    Ok(())
}

// ============================================================================
// PROVISIONER
// ============================================================================

#[derive(Clone)]
pub struct Provisioner {
    store: Arc<dyn RecordStore>,
    authz: AuthorizationIndex,
}

impl Provisioner {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let authz = AuthorizationIndex::new(store.clone());
        Self { store, authz }
    }

    /// The user record for `email`, created on first sight.
    pub fn ensure_user(&self, email: &str) -> MltspResult<User> {
        require("email", email)?;
        if let Some(user) = self.store.get_record::<User>(email)? {
            return Ok(user);
        }

        let user = User::from_email(email);
        match self.store.insert_record(&user) {
            Ok(()) => {
                tracing::info!(email, "Created user");
                Ok(user)
            }
            // Another request created it between our get and insert.
            Err(MltspError::Storage(StorageError::AlreadyExists { .. })) => {
                self.store.require_record::<User>(email)
            }
            Err(e) => Err(e),
        }
    }

    /// Create a project plus one active grant for the creator and one per
    /// additional user.
    pub fn add_project(&self, creator: &str, request: NewProject) -> MltspResult<RecordKey> {
        require("name", &request.name)?;
        require("creator", creator)?;

        let project = Project {
            id: new_record_key(),
            name: request.name,
            description: request.description.unwrap_or_default(),
        };
        self.store.insert_record(&project)?;

        if let Err(e) = self.grant_members(&project.id, creator, &request.additional_users) {
            tracing::warn!(key = %project.id, error = %e, "Granting failed, removing new project");
            self.roll_back_project(&project.id);
            return Err(e);
        }

        tracing::info!(
            key = %project.id,
            name = %project.name,
            creator,
            invited = request.additional_users.len(),
            "Created project"
        );
        Ok(project.id)
    }

    fn grant_members(&self, projkey: &str, creator: &str, invited: &[String]) -> MltspResult<()> {
        self.authz.create_grant(projkey, creator, GrantFlag::Active)?;
        for user in invited.iter().filter(|u| !u.trim().is_empty()) {
            self.authz.create_grant(projkey, user, GrantFlag::Active)?;
        }
        Ok(())
    }

    fn roll_back_project(&self, key: &str) {
        let undone = self
            .authz
            .revoke_project_grants(key)
            .and_then(|_| self.store.delete_record::<Project>(key));
        if let Err(e) = undone {
            tracing::error!(key, error = %e, "Could not remove partially created project");
        }
    }

    /// The record under `key` if it exists and `caller` may see it.
    fn visible_reference<R: ProjectScoped>(&self, caller: &str, key: &str) -> MltspResult<Option<R>> {
        let Some(record) = self.store.get_record::<R>(key)? else {
            return Ok(None);
        };
        if self.authz.is_authorized(caller, record.project_key())? {
            Ok(Some(record))
        } else {
            tracing::debug!(kind = %R::KIND, key, caller, "Referenced record hidden from caller");
            Ok(None)
        }
    }

    pub fn add_featureset(&self, request: NewFeatureSet) -> MltspResult<RecordKey> {
        require("projkey", &request.projkey)?;
        require("name", &request.name)?;

        let featureset = FeatureSet {
            id: new_record_key(),
            projkey: request.projkey,
            name: request.name,
            created: Utc::now(),
            featlist: request.featlist,
            meta_feats: request.meta_feats,
            pid: request.pid.map(|pid| pid.to_string()),
            results_msg: None,
            err_msg: None,
        };
        self.store.insert_record(&featureset)?;
        tracing::info!(key = %featureset.id, projkey = %featureset.projkey, "Created feature set");
        Ok(featureset.id)
    }

    /// Create a model record. `meta_feats` are copied from the referenced
    /// feature set when `caller` can see it; a missing or hidden feature set
    /// is not an error.
    pub fn add_model(&self, caller: &str, request: NewModel) -> MltspResult<RecordKey> {
        require("projkey", &request.projkey)?;
        require("featureset_key", &request.featureset_key)?;
        require("model_type", &request.model_type)?;

        let featureset =
            self.visible_reference::<FeatureSet>(caller, &request.featureset_key)?;
        let name = match (request.featureset_name, &featureset) {
            (Some(name), _) if !name.trim().is_empty() => name,
            (_, Some(fs)) => fs.name.clone(),
            _ => {
                return Err(ValidationError::RequiredFieldMissing {
                    field: "featureset_name".to_string(),
                }
                .into())
            }
        };

        let model = Model {
            id: new_record_key(),
            projkey: request.projkey,
            name,
            model_type: request.model_type,
            created: Utc::now(),
            meta_feats: featureset.map(|fs| fs.meta_feats).unwrap_or_default(),
            pid: request.pid.map(|pid| pid.to_string()),
            results_msg: None,
            err_msg: None,
        };
        self.store.insert_record(&model)?;
        tracing::info!(key = %model.id, projkey = %model.projkey, "Created model");
        Ok(model.id)
    }

    /// Create a prediction record. Model name and type come from the
    /// request, falling back to the stored model named by `model_key`, which
    /// must exist and be visible to `caller`.
    pub fn add_prediction(&self, caller: &str, request: NewPrediction) -> MltspResult<RecordKey> {
        require("projkey", &request.projkey)?;
        require("filename", &request.filename)?;

        let model = match request.model_key.as_deref() {
            Some(key) => {
                let model = self.visible_reference::<Model>(caller, key)?;
                Some(model.ok_or_else(|| StorageError::NotFound {
                    collection: Collection::Models,
                    key: key.to_string(),
                })?)
            }
            None => None,
        };
        let model_name = request
            .model_name
            .or_else(|| model.as_ref().map(|m| m.name.clone()))
            .ok_or_else(|| ValidationError::RequiredFieldMissing {
                field: "model_name".to_string(),
            })?;
        let model_type = request
            .model_type
            .or_else(|| model.as_ref().map(|m| m.model_type.clone()))
            .ok_or_else(|| ValidationError::RequiredFieldMissing {
                field: "model_type".to_string(),
            })?;

        let prediction = Prediction {
            id: new_record_key(),
            projkey: request.projkey,
            name: request.name.unwrap_or_else(|| request.filename.clone()),
            model_type,
            model_name,
            created: Utc::now(),
            filename: request.filename,
            results_str_html: None,
            features_dict: None,
            ts_data_dict: None,
            pred_results_list_dict: None,
            pid: request.pid.map(|pid| pid.to_string()),
            err_msg: None,
        };
        self.store.insert_record(&prediction)?;
        tracing::info!(key = %prediction.id, projkey = %prediction.projkey, "Created prediction");
        Ok(prediction.id)
    }

    /// Delete a project and every grant on it. Artifacts in the project
    /// are left in place.
    pub fn remove_project(&self, key: &str) -> MltspResult<()> {
        self.store.delete_record::<Project>(key)?;
        let revoked = self.authz.revoke_project_grants(key)?;
        tracing::info!(key, revoked, "Removed project");
        Ok(())
    }

    /// Delete one record of the given kind. Projects also lose their grants.
    pub fn remove_artifact(&self, kind: CatalogKind, key: &str) -> MltspResult<()> {
        match kind {
            CatalogKind::Projects => return self.remove_project(key),
            CatalogKind::FeatureSets => self.store.delete_record::<FeatureSet>(key)?,
            CatalogKind::Models => self.store.delete_record::<Model>(key)?,
            CatalogKind::Predictions => self.store.delete_record::<Prediction>(key)?,
        }
        tracing::info!(%kind, key, "Removed record");
        Ok(())
    }
}
