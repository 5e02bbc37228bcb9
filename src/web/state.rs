use crate::db::history::HistoryStore;
use crate::pipeline::QueryPipeline;
use std::sync::Arc;

/// Shared application state for the web server.
pub struct AppState {
    pub pipeline: QueryPipeline,
    pub history: Arc<HistoryStore>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(pipeline: QueryPipeline, history: Arc<HistoryStore>) -> Self {
        Self {
            pipeline,
            history,
            startup_time: chrono::Utc::now(),
        }
    }
}
