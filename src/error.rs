use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: a measurement from device '{device}' at {observed_at} already exists")]
    Conflict {
        device: String,
        observed_at: DateTime<Utc>,
    },
    #[error("Geo query relation '{0}' is not supported")]
    UnsupportedRelation(String),
    #[error("DB error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error("MQTT error: {0}")]
    Mqtt(String),
}

impl AppError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict { .. })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::UnsupportedRelation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Conflict { .. } => (StatusCode::CONFLICT, self.to_string()),
            AppError::Db(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Config(_) | AppError::Mqtt(_) => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
