use super::AppState;
use crate::ingest::IngestStatsSnapshot;
use axum::{extract::State, Json};

pub async fn get_ingest_stats(State(state): State<AppState>) -> Json<IngestStatsSnapshot> {
    Json(state.stats.snapshot())
}
