use std::sync::Arc;

use crate::jobs::JobScheduler;
use crate::store::RecordStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    /// Where generate / extract requests are queued for the job worker.
    pub jobs: Arc<dyn JobScheduler>,
}
