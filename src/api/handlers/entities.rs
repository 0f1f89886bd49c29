use super::AppState;
use crate::api::models::EntitiesParams;
use crate::context::{EntityQuery, TemperatureEntity};
use crate::error::AppError;
use axum::{
    extract::{Query, State},
    Json,
};

pub async fn get_entities(
    State(state): State<AppState>,
    Query(params): Query<EntitiesParams>,
) -> Result<Json<Vec<TemperatureEntity>>, AppError> {
    let query = EntityQuery::try_from(params)?;
    let entities = state.source.collect_entities(&query).await?;
    Ok(Json(entities))
}
