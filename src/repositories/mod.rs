pub mod memory;
pub mod measurement;

pub use measurement::PgMeasurementStore;
pub use memory::InMemoryMeasurementStore;

use crate::error::AppError;
use crate::geo::BoundingBox;
use crate::models::{LegacyMeasurement, Measurement, NewMeasurement};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Filters for [`MeasurementStore::query`]. All filters are optional and
/// combine conjunctively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementQuery {
    /// Exact device match. `None` or an empty string disables the filter.
    pub device: Option<String>,
    /// Inclusive lower bound on the observation time.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the observation time.
    pub to: Option<DateTime<Utc>>,
    /// Inclusive lat/lon rectangle.
    pub within: Option<BoundingBox>,
    /// Maximum number of rows; 0 means no cap.
    pub limit: u64,
}

impl MeasurementQuery {
    pub(crate) fn device_filter(&self) -> Option<&str> {
        self.device.as_deref().filter(|d| !d.is_empty())
    }

    /// In-process evaluation of the filters, used by the in-memory store.
    pub fn matches(&self, m: &Measurement) -> bool {
        if let Some(device) = self.device_filter() {
            if m.device != device {
                return false;
            }
        }
        if let Some(from) = self.from {
            if m.observed_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if m.observed_at >= to {
                return false;
            }
        }
        if let Some(bb) = &self.within {
            if !bb.contains(m.latitude, m.longitude) {
                return false;
            }
        }
        true
    }
}

/// Persistence capability for temperature measurements.
///
/// Implementations must reject a second measurement with the same non-empty
/// device and observation time with [`AppError::Conflict`], and must be safe
/// to call concurrently.
#[async_trait]
pub trait MeasurementStore: Send + Sync {
    async fn insert(&self, measurement: NewMeasurement) -> Result<Measurement, AppError>;

    /// Matching measurements in ascending observation time.
    async fn query(&self, query: &MeasurementQuery) -> Result<Vec<Measurement>, AppError>;

    /// Up to `limit` legacy rows, oldest first.
    async fn legacy_batch(&self, limit: i64) -> Result<Vec<LegacyMeasurement>, AppError>;

    async fn delete_legacy(&self, id: i64) -> Result<(), AppError>;

    /// Validates and stores a measurement given as raw values.
    async fn add_measurement(
        &self,
        device: &str,
        latitude: f64,
        longitude: f64,
        temperature: f64,
        is_water: bool,
        timestamp: &str,
    ) -> Result<Measurement, AppError> {
        let measurement =
            NewMeasurement::parse(device, latitude, longitude, temperature, is_water, timestamp)?;
        self.insert(measurement).await
    }
}
