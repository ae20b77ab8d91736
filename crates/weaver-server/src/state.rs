use std::sync::Arc;

use weaver_core::store::Store;
use weaver_core::validate::Ruleset;

use weaver_controller::RetryPolicy;

use crate::engine::{ControllerFactory, JobEngine};

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub engine: Arc<JobEngine>,
    pub ruleset: Ruleset,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        ruleset: Ruleset,
        factory: ControllerFactory,
        retry: RetryPolicy,
    ) -> Self {
        let engine = JobEngine::new(Arc::clone(&store), ruleset.clone(), factory, retry);
        Self {
            store,
            engine,
            ruleset,
        }
    }
}
