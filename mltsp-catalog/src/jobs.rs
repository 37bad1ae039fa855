//! Job tracker: lifecycle of artifacts produced by external processes.
//!
//! An artifact is created pending, gets a process id once its worker is
//! spawned, and ends with either a success payload or an error message.
//! Nothing stores the stage itself; it is always derived from which fields
//! are present. OS liveness of the pid is a separate question, answered by
//! a [`LivenessProbe`], and the two are never reconciled here: a pid that
//! exited without writing a payload stays RUNNING while probing as finished.

use std::fmt;
use std::sync::Arc;

use mltsp_core::{
    FeatureSet, JobKind, JobRecord, JobStage, JobStatus, MltspResult, Model, Prediction,
    RecordKey, ValidationError,
};
use mltsp_storage::{JobUpdate, RecordStore, RecordStoreExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::liveness::{parse_pid, probe_or_dead, LivenessProbe, SignalProbe};

// ============================================================================
// PAYLOAD TYPES
// ============================================================================

/// A process id as callers supply it: a JSON number or a string.
///
/// Either way it is persisted as a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ProcessId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::Number(n) => write!(f, "{}", n),
            ProcessId::Text(s) => f.write_str(s.trim()),
        }
    }
}

impl From<i64> for ProcessId {
    fn from(pid: i64) -> Self {
        ProcessId::Number(pid)
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId::Number(i64::from(pid))
    }
}

/// Results of a finished prediction job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PredictionResults {
    pub results_str_html: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub features_dict: Value,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub ts_data_dict: Value,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub pred_results_list_dict: Value,
}

/// Success payload of a job. The variant must match the job kind.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload {
    /// Feature sets and models report a message.
    ResultsMessage(String),
    /// Predictions report rendered results plus the underlying data.
    Prediction(PredictionResults),
}

impl JobPayload {
    fn accepted_by(&self) -> &'static str {
        match self {
            JobPayload::ResultsMessage(_) => "featureset or model",
            JobPayload::Prediction(_) => "prediction",
        }
    }

    fn into_update(self, kind: JobKind) -> MltspResult<JobUpdate> {
        match (kind, self) {
            (JobKind::FeatureSet | JobKind::Model, JobPayload::ResultsMessage(message)) => {
                Ok(JobUpdate {
                    results_msg: Some(message),
                    ..Default::default()
                })
            }
            (JobKind::Prediction, JobPayload::Prediction(results)) => Ok(JobUpdate {
                results_str_html: Some(results.results_str_html),
                features_dict: Some(results.features_dict),
                ts_data_dict: Some(results.ts_data_dict),
                pred_results_list_dict: Some(results.pred_results_list_dict),
                ..Default::default()
            }),
            (kind, payload) => Err(ValidationError::PayloadMismatch {
                kind: kind.to_string(),
                expected: payload.accepted_by().to_string(),
            }
            .into()),
        }
    }
}

/// Snapshot of one job-backed record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct JobReport {
    pub kind: JobKind,
    pub key: RecordKey,
    pub projkey: RecordKey,
    pub stage: JobStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    /// OS liveness of `pid`, probed only while the stage is RUNNING.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

// ============================================================================
// TRACKER
// ============================================================================

/// Tracks external jobs through their artifact records.
#[derive(Clone)]
pub struct JobTracker {
    store: Arc<dyn RecordStore>,
    probe: Arc<dyn LivenessProbe>,
}

impl JobTracker {
    /// Tracker probing liveness with `kill(pid, 0)`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_probe(store, Arc::new(SignalProbe))
    }

    pub fn with_probe(store: Arc<dyn RecordStore>, probe: Arc<dyn LivenessProbe>) -> Self {
        Self { store, probe }
    }

    /// Record the pid of the process computing this artifact.
    pub fn attach_process_id(
        &self,
        kind: JobKind,
        key: &str,
        pid: impl fmt::Display,
    ) -> MltspResult<()> {
        let pid = pid.to_string();
        if pid.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "pid".to_string(),
            }
            .into());
        }
        self.apply(kind, key, &JobUpdate::pid(&pid))?;
        tracing::info!(%kind, key, pid, "Attached process id");
        Ok(())
    }

    /// Store a success payload, and optionally an error message in the
    /// same write. With an error present the job reads as FAILED even
    /// though the payload is kept.
    pub fn record_success(
        &self,
        kind: JobKind,
        key: &str,
        payload: JobPayload,
        err_msg: Option<String>,
    ) -> MltspResult<()> {
        let mut update = payload.into_update(kind)?;
        update.err_msg = err_msg;
        let with_error = update.err_msg.is_some();
        self.apply(kind, key, &update)?;
        tracing::info!(%kind, key, with_error, "Recorded job results");
        Ok(())
    }

    /// Store an error message as the job's terminal state.
    pub fn record_failure(
        &self,
        kind: JobKind,
        key: &str,
        message: impl Into<String>,
    ) -> MltspResult<()> {
        self.apply(kind, key, &JobUpdate::error(message))?;
        tracing::info!(%kind, key, "Recorded job failure");
        Ok(())
    }

    /// Whether the pid names a live process. Probe failures read as false.
    pub fn is_running(&self, pid: i64) -> bool {
        probe_or_dead(self.probe.as_ref(), pid)
    }

    pub fn job_status(&self, pid: i64) -> JobStatus {
        JobStatus::from_liveness(self.is_running(pid))
    }

    /// [`job_status`](Self::job_status) for a pid as stored or as it
    /// arrives in a query string. A malformed pid reads as finished.
    pub fn job_status_of(&self, pid: &str) -> JobStatus {
        match parse_pid(pid) {
            Ok(pid) => self.job_status(pid),
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable pid; reporting finished");
                JobStatus::Finished
            }
        }
    }

    /// Stage derived from the stored record. Does not probe the pid.
    pub fn job_stage(&self, kind: JobKind, key: &str) -> MltspResult<JobStage> {
        Ok(self.snapshot(kind, key)?.stage)
    }

    /// Stage plus, for RUNNING records, the liveness of their pid.
    pub fn probe_record(&self, kind: JobKind, key: &str) -> MltspResult<JobReport> {
        let mut report = self.snapshot(kind, key)?;
        if report.stage == JobStage::Running {
            report.status = report.pid.as_deref().map(|pid| self.job_status_of(pid));
        }
        Ok(report)
    }

    fn apply(&self, kind: JobKind, key: &str, update: &JobUpdate) -> MltspResult<()> {
        match kind {
            JobKind::FeatureSet => self.store.update_record::<FeatureSet, _>(key, update).map(drop),
            JobKind::Model => self.store.update_record::<Model, _>(key, update).map(drop),
            JobKind::Prediction => self.store.update_record::<Prediction, _>(key, update).map(drop),
        }
    }

    fn snapshot(&self, kind: JobKind, key: &str) -> MltspResult<JobReport> {
        match kind {
            JobKind::FeatureSet => self.snapshot_of::<FeatureSet>(key),
            JobKind::Model => self.snapshot_of::<Model>(key),
            JobKind::Prediction => self.snapshot_of::<Prediction>(key),
        }
    }

    fn snapshot_of<R: JobRecord>(&self, key: &str) -> MltspResult<JobReport> {
        let record: R = self.store.require_record(key)?;
        Ok(JobReport {
            kind: R::JOB_KIND,
            key: record.key().to_string(),
            projkey: record.project_key().to_string(),
            stage: record.stage(),
            pid: record.pid().map(str::to_string),
            status: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mltsp_core::{Collection, ProbeError};
    use mltsp_test_utils::assertions::{assert_not_found, assert_validation_error};
    use mltsp_test_utils::fixtures;
    use serde_json::json;

    struct FixedProbe(bool);

    impl LivenessProbe for FixedProbe {
        fn probe(&self, _pid: i64) -> Result<bool, ProbeError> {
            Ok(self.0)
        }
    }

    fn make_tracker() -> (JobTracker, Arc<dyn RecordStore>) {
        let store = fixtures::seeded_store();
        (JobTracker::new(store.clone()), store)
    }

    fn prediction_results() -> PredictionResults {
        PredictionResults {
            results_str_html: "<table id='results'></table>".to_string(),
            features_dict: json!({"amplitude": 1.5}),
            ts_data_dict: json!({"t": [0, 1]}),
            pred_results_list_dict: json!([["Mira", 0.9]]),
        }
    }

    #[test]
    fn test_attach_pid_stored_as_string() {
        for kind in JobKind::ALL {
            let (tracker, store) = make_tracker();
            let key = match kind {
                JobKind::FeatureSet => "fs-alice",
                JobKind::Model => "model-alice",
                JobKind::Prediction => "pred-alice",
            };
            tracker.attach_process_id(kind, key, 9999).unwrap();
            let doc = store.get(kind.collection(), key).unwrap().unwrap();
            assert_eq!(doc["pid"], "9999");
            assert_eq!(tracker.job_stage(kind, key).unwrap(), JobStage::Running);
        }
    }

    #[test]
    fn test_attach_pid_accepts_process_id_text() {
        let (tracker, store) = make_tracker();
        tracker
            .attach_process_id(JobKind::Model, "model-bob", ProcessId::Text("123".to_string()))
            .unwrap();
        let model: Model = store.require_record("model-bob").unwrap();
        assert_eq!(model.pid.as_deref(), Some("123"));
    }

    #[test]
    fn test_attach_pid_missing_record() {
        let (tracker, _) = make_tracker();
        let result = tracker.attach_process_id(JobKind::FeatureSet, "nope", 1);
        assert_not_found(&result, Collection::Features);
    }

    #[test]
    fn test_attach_empty_pid_rejected() {
        let (tracker, _) = make_tracker();
        let result = tracker.attach_process_id(JobKind::FeatureSet, "fs-alice", "");
        assert_validation_error(&result);
    }

    #[test]
    fn test_results_message_with_error() {
        let (tracker, store) = make_tracker();
        tracker.attach_process_id(JobKind::Model, "model-alice", 9999).unwrap();
        tracker
            .record_success(
                JobKind::Model,
                "model-alice",
                JobPayload::ResultsMessage("MSG".to_string()),
                Some("ERR_MSG".to_string()),
            )
            .unwrap();

        let model: Model = store.require_record("model-alice").unwrap();
        assert_eq!(model.results_msg.as_deref(), Some("MSG"));
        assert_eq!(model.err_msg.as_deref(), Some("ERR_MSG"));
        assert_eq!(
            tracker.job_stage(JobKind::Model, "model-alice").unwrap(),
            JobStage::Failed
        );
    }

    #[test]
    fn test_featureset_success() {
        let (tracker, store) = make_tracker();
        tracker
            .record_success(
                JobKind::FeatureSet,
                "fs-bob",
                JobPayload::ResultsMessage("Features computed".to_string()),
                None,
            )
            .unwrap();
        let fs: FeatureSet = store.require_record("fs-bob").unwrap();
        assert_eq!(fs.results_msg.as_deref(), Some("Features computed"));
        assert!(fs.err_msg.is_none());
        assert_eq!(
            tracker.job_stage(JobKind::FeatureSet, "fs-bob").unwrap(),
            JobStage::Succeeded
        );
    }

    #[test]
    fn test_prediction_results_with_error() {
        let (tracker, store) = make_tracker();
        tracker
            .record_success(
                JobKind::Prediction,
                "pred-alice",
                JobPayload::Prediction(prediction_results()),
                Some("ERR_MSG".to_string()),
            )
            .unwrap();

        let prediction: Prediction = store.require_record("pred-alice").unwrap();
        assert_eq!(
            prediction.results_str_html.as_deref(),
            Some("<table id='results'></table>")
        );
        assert_eq!(prediction.features_dict, Some(json!({"amplitude": 1.5})));
        assert_eq!(prediction.pred_results_list_dict, Some(json!([["Mira", 0.9]])));
        assert_eq!(prediction.err_msg.as_deref(), Some("ERR_MSG"));
    }

    #[test]
    fn test_payload_kind_mismatch() {
        let (tracker, store) = make_tracker();
        let result = tracker.record_success(
            JobKind::FeatureSet,
            "fs-alice",
            JobPayload::Prediction(prediction_results()),
            None,
        );
        assert_validation_error(&result);

        let result = tracker.record_success(
            JobKind::Prediction,
            "pred-alice",
            JobPayload::ResultsMessage("MSG".to_string()),
            None,
        );
        assert_validation_error(&result);

        let fs: FeatureSet = store.require_record("fs-alice").unwrap();
        assert!(fs.results_msg.is_none());
    }

    #[test]
    fn test_record_failure() {
        let (tracker, store) = make_tracker();
        tracker
            .record_failure(JobKind::FeatureSet, "fs-shared", "worker crashed")
            .unwrap();
        let fs: FeatureSet = store.require_record("fs-shared").unwrap();
        assert_eq!(fs.err_msg.as_deref(), Some("worker crashed"));
        assert!(fs.results_msg.is_none());
        assert_eq!(
            tracker.job_stage(JobKind::FeatureSet, "fs-shared").unwrap(),
            JobStage::Failed
        );
    }

    #[test]
    fn test_record_failure_missing_record() {
        let (tracker, _) = make_tracker();
        let result = tracker.record_failure(JobKind::Prediction, "nope", "x");
        assert_not_found(&result, Collection::Predictions);
    }

    #[test]
    fn test_job_status_of_strings() {
        let (tracker, _) = make_tracker();
        let own = std::process::id().to_string();
        assert_eq!(tracker.job_status_of(&own), JobStatus::CurrentlyRunning);
        assert_eq!(tracker.job_status_of("99999"), JobStatus::Finished);
        assert_eq!(tracker.job_status_of("not-a-pid"), JobStatus::Finished);
    }

    #[test]
    fn test_probe_record_only_probes_running() {
        let store = fixtures::seeded_store();
        let tracker = JobTracker::with_probe(store, Arc::new(FixedProbe(true)));

        let pending = tracker.probe_record(JobKind::Model, "model-alice").unwrap();
        assert_eq!(pending.stage, JobStage::Pending);
        assert!(pending.status.is_none());

        tracker.attach_process_id(JobKind::Model, "model-alice", 4242).unwrap();
        let running = tracker.probe_record(JobKind::Model, "model-alice").unwrap();
        assert_eq!(running.stage, JobStage::Running);
        assert_eq!(running.status, Some(JobStatus::CurrentlyRunning));
        assert_eq!(running.pid.as_deref(), Some("4242"));
        assert_eq!(running.projkey, fixtures::ALICE_PROJECT);

        tracker
            .record_success(
                JobKind::Model,
                "model-alice",
                JobPayload::ResultsMessage("done".to_string()),
                None,
            )
            .unwrap();
        let done = tracker.probe_record(JobKind::Model, "model-alice").unwrap();
        assert_eq!(done.stage, JobStage::Succeeded);
        assert!(done.status.is_none());
    }

    #[test]
    fn test_exited_process_without_payload_stays_running() {
        let store = fixtures::seeded_store();
        let tracker = JobTracker::with_probe(store, Arc::new(FixedProbe(false)));
        tracker.attach_process_id(JobKind::FeatureSet, "fs-alice", 4242).unwrap();

        let report = tracker.probe_record(JobKind::FeatureSet, "fs-alice").unwrap();
        assert_eq!(report.stage, JobStage::Running);
        assert_eq!(report.status, Some(JobStatus::Finished));
    }

    #[test]
    fn test_process_id_deserializes_number_or_string() {
        let n: ProcessId = serde_json::from_value(json!(9999)).unwrap();
        let s: ProcessId = serde_json::from_value(json!("9999")).unwrap();
        assert_eq!(n.to_string(), "9999");
        assert_eq!(s.to_string(), "9999");
    }
}
