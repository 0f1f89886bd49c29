use crate::error::AppError;
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, FromRow, Row};

/// Default value of the typed timestamp column in the legacy table. Rows
/// carrying it predate that column and only have the text timestamp.
pub fn legacy_timestamp_sentinel() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1970, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Rounds a temperature to one decimal place.
pub fn round_temperature(temp: f64) -> f64 {
    (temp * 10.0).round() / 10.0
}

/// A persisted temperature observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: i64,
    pub device: String,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: f32,
    pub is_water: bool,
    pub observed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Measurement {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            device: row.try_get("device")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            temperature: row.try_get("temperature")?,
            is_water: row.try_get("is_water")?,
            observed_at: row.try_get("observed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A validated measurement that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub device: String,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: f32,
    pub is_water: bool,
    pub observed_at: DateTime<Utc>,
}

impl NewMeasurement {
    pub fn new(
        device: impl Into<String>,
        latitude: f64,
        longitude: f64,
        temperature: f64,
        is_water: bool,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            device: device.into(),
            latitude,
            longitude,
            temperature: round_temperature(temperature) as f32,
            is_water,
            // TIMESTAMPTZ keeps microseconds
            observed_at: observed_at.trunc_subsecs(6),
        }
    }

    /// Validates raw input. `timestamp` must be an RFC 3339 instant.
    pub fn parse(
        device: &str,
        latitude: f64,
        longitude: f64,
        temperature: f64,
        is_water: bool,
        timestamp: &str,
    ) -> Result<Self, AppError> {
        let observed_at = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| {
                AppError::Validation(format!("failed to parse timestamp from {timestamp:?}: {e}"))
            })?
            .with_timezone(&Utc);

        if !temperature.is_finite() {
            return Err(AppError::Validation(format!(
                "temperature must be a finite number, got {temperature}"
            )));
        }

        Ok(Self::new(
            device,
            latitude,
            longitude,
            temperature,
            is_water,
            observed_at,
        ))
    }
}

/// A row of the legacy `temperatures` table. Only read by the migration.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyMeasurement {
    pub id: i64,
    pub device: String,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: f32,
    pub is_water: bool,
    pub timestamp_text: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for LegacyMeasurement {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            device: row.try_get::<Option<String>, _>("device")?.unwrap_or_default(),
            latitude: row.try_get::<Option<f64>, _>("latitude")?.unwrap_or_default(),
            longitude: row.try_get::<Option<f64>, _>("longitude")?.unwrap_or_default(),
            temperature: row.try_get::<Option<f32>, _>("temp")?.unwrap_or_default(),
            is_water: row.try_get::<Option<bool>, _>("water")?.unwrap_or_default(),
            timestamp_text: row.try_get("timestamp")?,
            observed_at: row
                .try_get::<Option<DateTime<Utc>>, _>("timestamp2")?
                .unwrap_or_else(legacy_timestamp_sentinel),
        })
    }
}

impl LegacyMeasurement {
    /// The observation time of this row. The typed column wins unless it
    /// still holds its default and the text column has a usable value.
    pub fn observation_time(&self) -> DateTime<Utc> {
        if self.observed_at == legacy_timestamp_sentinel() {
            if let Some(parsed) = self
                .timestamp_text
                .as_deref()
                .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
            {
                return parsed.with_timezone(&Utc);
            }
        }
        self.observed_at
    }

    pub fn to_current(&self) -> NewMeasurement {
        NewMeasurement::new(
            self.device.clone(),
            self.latitude,
            self.longitude,
            self.temperature as f64,
            self.is_water,
            self.observation_time(),
        )
    }
}
