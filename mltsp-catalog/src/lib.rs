//! MLTSP Catalog - Authorization, Listing and Job Tracking
//!
//! Business logic over a shared [`RecordStore`](mltsp_storage::RecordStore):
//!
//! - [`AuthorizationIndex`] answers which projects a user may see
//! - [`ResourceCatalog`] lists projects and artifacts through that index
//! - [`JobTracker`] follows external background jobs by process id
//! - [`Provisioner`] creates and removes projects and artifacts
//!
//! Every component holds an `Arc<dyn RecordStore>`; none of them keeps
//! state of its own, so they are cheap to clone into request handlers.

pub mod authz;
pub mod catalog;
pub mod jobs;
pub mod liveness;
pub mod provision;
pub mod render;

pub use authz::AuthorizationIndex;
pub use catalog::{CatalogRecord, ListQuery, Listing, NamedKey, ResourceCatalog};
pub use jobs::{JobPayload, JobReport, JobTracker, PredictionResults, ProcessId};
pub use liveness::{is_running, job_status, LivenessProbe, SignalProbe};
pub use provision::{NewFeatureSet, NewModel, NewPrediction, NewProject, Provisioner};
pub use render::render_table;
