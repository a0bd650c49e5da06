//! Application state.

use std::sync::Arc;

use dcast_store::JobStore;
use dcast_pipeline::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub jobs: Arc<dyn JobStore>,
}

impl AppState {
    pub fn new(scheduler: Arc<Scheduler>, jobs: Arc<dyn JobStore>) -> Self {
        Self { scheduler, jobs }
    }
}
