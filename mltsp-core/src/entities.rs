//! Stored record structures
//!
//! One struct per collection. Every struct rejects unknown fields so that a
//! stray key in an update is caught at the store boundary instead of being
//! persisted silently.

use crate::{GrantFlag, RecordKey, Timestamp};
use serde::{Deserialize, Serialize};

/// Project - top-level grouping of artifacts, the unit of authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Project {
    pub id: RecordKey,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// User record, keyed by email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    pub id: RecordKey,
    pub email: String,
}

impl User {
    pub fn from_email(email: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            id: email.clone(),
            email,
        }
    }
}

/// Grant of a user's access to a project. Stored in `userauth`.
///
/// Grants are never deduplicated; several may exist for the same pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuthorizationGrant {
    pub id: RecordKey,
    pub projkey: RecordKey,
    pub userkey: RecordKey,
    pub active: GrantFlag,
}

/// Feature set produced by a feature-extraction job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FeatureSet {
    pub id: RecordKey,
    pub projkey: RecordKey,
    pub name: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created: Timestamp,
    #[serde(default)]
    pub featlist: Vec<String>,
    #[serde(default)]
    pub meta_feats: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

/// Model produced by a training job over a feature set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Model {
    pub id: RecordKey,
    pub projkey: RecordKey,
    /// Name of the feature set the model was trained on.
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created: Timestamp,
    #[serde(default)]
    pub meta_feats: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

/// Prediction produced by running a model over an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Prediction {
    pub id: RecordKey,
    pub projkey: RecordKey,
    pub name: String,
    pub model_type: String,
    pub model_name: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created: Timestamp,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_str_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub features_dict: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub ts_data_dict: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub pred_results_list_dict: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}
