//! Application-scoped handles shared by every request.

use std::sync::Arc;

use crate::analysis::AnalysisService;
use crate::store::FeedbackStore;

/// Created once at startup and cloned into each handler.
#[derive(Clone)]
pub struct AppState {
    pub store: FeedbackStore,
    pub analyzer: Arc<AnalysisService>,
}

impl AppState {
    pub fn new(store: FeedbackStore, analyzer: AnalysisService) -> Self {
        Self {
            store,
            analyzer: Arc::new(analyzer),
        }
    }
}
