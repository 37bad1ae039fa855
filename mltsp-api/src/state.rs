//! Shared application state for Axum routers.

use std::sync::Arc;

use mltsp_catalog::{AuthorizationIndex, JobTracker, LivenessProbe, Provisioner, ResourceCatalog};
use mltsp_storage::RecordStore;

/// Application-wide state shared across all routes.
///
/// Every service wraps the same injected store handle.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub authz: AuthorizationIndex,
    pub catalog: ResourceCatalog,
    pub jobs: JobTracker,
    pub provisioner: Provisioner,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// State over `store`, probing job liveness with `kill(pid, 0)`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        let jobs = JobTracker::new(store.clone());
        Self::build(store, jobs)
    }

    /// State with a substitute liveness probe.
    pub fn with_probe(store: Arc<dyn RecordStore>, probe: Arc<dyn LivenessProbe>) -> Self {
        let jobs = JobTracker::with_probe(store.clone(), probe);
        Self::build(store, jobs)
    }

    fn build(store: Arc<dyn RecordStore>, jobs: JobTracker) -> Self {
        Self {
            authz: AuthorizationIndex::new(store.clone()),
            catalog: ResourceCatalog::new(store.clone()),
            provisioner: Provisioner::new(store.clone()),
            jobs,
            store,
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(
    store: Arc<dyn RecordStore>,
    authz: AuthorizationIndex,
    catalog: ResourceCatalog,
    jobs: JobTracker,
    provisioner: Provisioner,
    start_time: std::time::Instant,
);
