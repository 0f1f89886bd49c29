pub mod entities;
pub mod health;
pub mod stats;

use crate::context::ContextSource;
use crate::ingest::IngestStats;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub source: ContextSource,
    pub stats: Arc<IngestStats>,
}
