//! API Request and Response Types

use mltsp_catalog::{JobPayload, ListQuery, PredictionResults, ProcessId};
use mltsp_core::{CatalogKind, JobStatus, RecordKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// CATALOG TYPES
// ============================================================================

fn default_true() -> bool {
    true
}

/// Query flags for `GET /api/v1/catalog/{kind}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogQuery {
    /// Only records on projects the caller holds an active grant on.
    #[serde(default = "default_true")]
    pub auth_only: bool,
    /// Project each record to `{id, name}`.
    #[serde(default)]
    pub name_only: bool,
    /// Exact project-key filter.
    #[serde(default)]
    pub by_project: Option<RecordKey>,
    /// Respond with an HTML table instead of JSON.
    #[serde(default, alias = "as_table")]
    pub as_html_table_string: bool,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            auth_only: true,
            name_only: false,
            by_project: None,
            as_html_table_string: false,
        }
    }
}

impl From<CatalogQuery> for ListQuery {
    fn from(query: CatalogQuery) -> Self {
        ListQuery {
            auth_only: query.auth_only,
            name_only: query.name_only,
            by_project: query.by_project.filter(|p| !p.is_empty()),
            as_table: query.as_html_table_string,
        }
    }
}

/// JSON catalog listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CatalogListResponse {
    pub kind: CatalogKind,
    pub count: usize,
    /// Full records, or `{id, name}` pairs when `name_only` is set
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub items: Vec<Value>,
}

/// Names of the caller's projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProjectNamesResponse {
    pub list: Vec<String>,
}

/// Key of a newly created record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct KeyResponse {
    pub key: RecordKey,
}

// ============================================================================
// JOB TYPES
// ============================================================================

/// `?pid=` for the job status probe. `PID` is accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PidQuery {
    #[serde(alias = "PID")]
    pub pid: String,
}

/// Liveness of a process id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct JobStatusResponse {
    /// The pid as given; numeric when it parses as one
    pub pid: ProcessId,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AttachPidRequest {
    pub pid: ProcessId,
}

/// Terminal results of a job. Feature sets and models send
/// `results_msg`; predictions send `results_str_html` and the three dicts.
/// `err_msg` may accompany either.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(deny_unknown_fields)]
pub struct RecordResultsRequest {
    #[serde(default)]
    pub results_msg: Option<String>,
    #[serde(default)]
    pub results_str_html: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub features_dict: Option<Value>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub ts_data_dict: Option<Value>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub pred_results_list_dict: Option<Value>,
    #[serde(default)]
    pub err_msg: Option<String>,
}

impl RecordResultsRequest {
    /// Split into the success payload and the optional error message.
    pub fn into_parts(self) -> ApiResult<(JobPayload, Option<String>)> {
        let payload = match (self.results_msg, self.results_str_html) {
            (Some(_), Some(_)) => {
                return Err(ApiError::validation_failed(
                    "Send either results_msg or results_str_html, not both",
                ))
            }
            (Some(message), None) => JobPayload::ResultsMessage(message),
            (None, Some(html)) => JobPayload::Prediction(PredictionResults {
                results_str_html: html,
                features_dict: self.features_dict.unwrap_or_else(empty_object),
                ts_data_dict: self.ts_data_dict.unwrap_or_else(empty_object),
                pred_results_list_dict: self.pred_results_list_dict.unwrap_or_else(empty_object),
            }),
            (None, None) => return Err(ApiError::missing_field("results_msg")),
        };
        Ok((payload, self.err_msg))
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecordFailureRequest {
    pub err_msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_query_defaults() {
        let query: CatalogQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(query, CatalogQuery::default());
        let list: ListQuery = query.into();
        assert!(list.auth_only);
        assert!(!list.as_table);
    }

    #[test]
    fn test_empty_by_project_is_no_filter() {
        let query = CatalogQuery {
            by_project: Some(String::new()),
            ..Default::default()
        };
        let list: ListQuery = query.into();
        assert!(list.by_project.is_none());
    }

    #[test]
    fn test_results_message_parts() {
        let request = RecordResultsRequest {
            results_msg: Some("MSG".to_string()),
            err_msg: Some("ERR_MSG".to_string()),
            ..Default::default()
        };
        let (payload, err) = request.into_parts().unwrap();
        assert_eq!(payload, JobPayload::ResultsMessage("MSG".to_string()));
        assert_eq!(err.as_deref(), Some("ERR_MSG"));
    }

    #[test]
    fn test_prediction_parts_fill_missing_dicts() {
        let request = RecordResultsRequest {
            results_str_html: Some("<table></table>".to_string()),
            features_dict: Some(json!({"a": 1})),
            ..Default::default()
        };
        let (payload, err) = request.into_parts().unwrap();
        assert!(err.is_none());
        match payload {
            JobPayload::Prediction(results) => {
                assert_eq!(results.features_dict, json!({"a": 1}));
                assert_eq!(results.ts_data_dict, json!({}));
            }
            other => panic!("expected prediction payload, got {:?}", other),
        }
    }

    #[test]
    fn test_results_request_needs_a_payload() {
        assert!(RecordResultsRequest::default().into_parts().is_err());
        let both = RecordResultsRequest {
            results_msg: Some("a".to_string()),
            results_str_html: Some("b".to_string()),
            ..Default::default()
        };
        assert!(both.into_parts().is_err());
    }

    #[test]
    fn test_pid_query_accepts_uppercase() {
        let query: PidQuery = serde_json::from_value(json!({"PID": "999999"})).unwrap();
        assert_eq!(query.pid, "999999");
    }
}
