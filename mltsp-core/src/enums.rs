//! Enum types for MLTSP records

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// COLLECTIONS
// ============================================================================

/// The six stored collections. Names are the on-disk table names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Collection {
    Projects,
    Users,
    #[serde(rename = "userauth")]
    UserAuth,
    Features,
    Models,
    Predictions,
}

impl Collection {
    /// Every collection, in creation order.
    pub const ALL: [Collection; 6] = [
        Collection::Projects,
        Collection::Users,
        Collection::UserAuth,
        Collection::Features,
        Collection::Models,
        Collection::Predictions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Users => "users",
            Collection::UserAuth => "userauth",
            Collection::Features => "features",
            Collection::Models => "models",
            Collection::Predictions => "predictions",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CATALOG AND JOB KINDS
// ============================================================================

/// Resource kinds the catalog can list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum CatalogKind {
    Projects,
    #[serde(rename = "featuresets")]
    FeatureSets,
    Models,
    Predictions,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 4] = [
        CatalogKind::Projects,
        CatalogKind::FeatureSets,
        CatalogKind::Models,
        CatalogKind::Predictions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Projects => "projects",
            CatalogKind::FeatureSets => "featuresets",
            CatalogKind::Models => "models",
            CatalogKind::Predictions => "predictions",
        }
    }

    /// Collection the kind's records are stored in.
    pub fn collection(&self) -> Collection {
        match self {
            CatalogKind::Projects => Collection::Projects,
            CatalogKind::FeatureSets => Collection::Features,
            CatalogKind::Models => Collection::Models,
            CatalogKind::Predictions => Collection::Predictions,
        }
    }

    /// `id` attribute of the rendered HTML table.
    pub fn table_id(&self) -> String {
        format!("{}_table", self.as_str())
    }

    /// The job kind, for everything except projects.
    pub fn job_kind(&self) -> Option<JobKind> {
        match self {
            CatalogKind::Projects => None,
            CatalogKind::FeatureSets => Some(JobKind::FeatureSet),
            CatalogKind::Models => Some(JobKind::Model),
            CatalogKind::Predictions => Some(JobKind::Prediction),
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "projects" | "project" => Ok(CatalogKind::Projects),
            "featuresets" | "featureset" | "features" => Ok(CatalogKind::FeatureSets),
            "models" | "model" => Ok(CatalogKind::Models),
            "predictions" | "prediction" => Ok(CatalogKind::Predictions),
            _ => Err(ValidationError::UnknownKind {
                value: s.to_string(),
            }),
        }
    }
}

/// Artifact kinds that are produced by an external background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum JobKind {
    #[serde(rename = "featureset")]
    FeatureSet,
    Model,
    Prediction,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::FeatureSet, JobKind::Model, JobKind::Prediction];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::FeatureSet => "featureset",
            JobKind::Model => "model",
            JobKind::Prediction => "prediction",
        }
    }

    pub fn collection(&self) -> Collection {
        self.catalog_kind().collection()
    }

    pub fn catalog_kind(&self) -> CatalogKind {
        match self {
            JobKind::FeatureSet => CatalogKind::FeatureSets,
            JobKind::Model => CatalogKind::Models,
            JobKind::Prediction => CatalogKind::Predictions,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind: CatalogKind = s.parse()?;
        kind.job_kind().ok_or_else(|| ValidationError::UnknownKind {
            value: s.to_string(),
        })
    }
}

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ============================================================================
// GRANTS
// ============================================================================

/// Active flag on an authorization grant, stored as `"y"` / `"n"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum GrantFlag {
    #[serde(rename = "y")]
    Active,
    #[serde(rename = "n")]
    Inactive,
}

impl GrantFlag {
    pub fn is_active(&self) -> bool {
        matches!(self, GrantFlag::Active)
    }
}

impl From<bool> for GrantFlag {
    fn from(active: bool) -> Self {
        if active {
            GrantFlag::Active
        } else {
            GrantFlag::Inactive
        }
    }
}

// ============================================================================
// JOB STATE
// ============================================================================

/// Stage of a job-backed artifact, derived from which fields are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum JobStage {
    /// Created, no process attached yet
    Pending,
    /// Process id attached, no terminal payload
    Running,
    /// Success payload stored, no error
    Succeeded,
    /// Error message stored
    Failed,
}

impl JobStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Succeeded | JobStage::Failed)
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            JobStage::Pending => "PENDING",
            JobStage::Running => "RUNNING",
            JobStage::Succeeded => "SUCCEEDED",
            JobStage::Failed => "FAILED",
        };
        f.write_str(value)
    }
}

/// Result of an OS liveness probe on a process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum JobStatus {
    #[serde(rename = "finished")]
    Finished,
    #[serde(rename = "currently running")]
    CurrentlyRunning,
}

impl JobStatus {
    pub fn from_liveness(alive: bool) -> Self {
        if alive {
            JobStatus::CurrentlyRunning
        } else {
            JobStatus::Finished
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Finished => f.write_str("finished"),
            JobStatus::CurrentlyRunning => f.write_str("currently running"),
        }
    }
}
