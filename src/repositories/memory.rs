use crate::error::AppError;
use crate::models::{LegacyMeasurement, Measurement, NewMeasurement};
use crate::repositories::{MeasurementQuery, MeasurementStore};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Store backed by process memory. Enforces the same device/time uniqueness
/// as the database.
#[derive(Debug, Default)]
pub struct InMemoryMeasurementStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    measurements: Vec<Measurement>,
    legacy: BTreeMap<i64, LegacyMeasurement>,
}

impl InMemoryMeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with legacy rows, keyed by their ids.
    pub fn with_legacy(records: impl IntoIterator<Item = LegacyMeasurement>) -> Self {
        let legacy = records.into_iter().map(|r| (r.id, r)).collect();
        Self {
            inner: RwLock::new(Inner {
                legacy,
                ..Default::default()
            }),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.measurements.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn legacy_len(&self) -> usize {
        self.inner.read().await.legacy.len()
    }

    pub async fn all(&self) -> Vec<Measurement> {
        self.inner.read().await.measurements.clone()
    }
}

#[async_trait]
impl MeasurementStore for InMemoryMeasurementStore {
    async fn insert(&self, measurement: NewMeasurement) -> Result<Measurement, AppError> {
        let mut inner = self.inner.write().await;

        if !measurement.device.is_empty()
            && inner.measurements.iter().any(|m| {
                m.device == measurement.device && m.observed_at == measurement.observed_at
            })
        {
            return Err(AppError::Conflict {
                device: measurement.device,
                observed_at: measurement.observed_at,
            });
        }

        inner.next_id += 1;
        let now = Utc::now();
        let stored = Measurement {
            id: inner.next_id,
            device: measurement.device,
            latitude: measurement.latitude,
            longitude: measurement.longitude,
            temperature: measurement.temperature,
            is_water: measurement.is_water,
            observed_at: measurement.observed_at,
            created_at: now,
            updated_at: now,
        };
        inner.measurements.push(stored.clone());
        Ok(stored)
    }

    async fn query(&self, query: &MeasurementQuery) -> Result<Vec<Measurement>, AppError> {
        let inner = self.inner.read().await;
        let mut found: Vec<Measurement> = inner
            .measurements
            .iter()
            .filter(|m| query.matches(m))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.observed_at.cmp(&b.observed_at).then(a.id.cmp(&b.id)));
        if query.limit > 0 {
            found.truncate(query.limit as usize);
        }
        Ok(found)
    }

    async fn legacy_batch(&self, limit: i64) -> Result<Vec<LegacyMeasurement>, AppError> {
        let inner = self.inner.read().await;
        let mut batch: Vec<LegacyMeasurement> = inner.legacy.values().cloned().collect();
        batch.sort_by(|a, b| a.observed_at.cmp(&b.observed_at).then(a.id.cmp(&b.id)));
        batch.truncate(limit.max(0) as usize);
        Ok(batch)
    }

    async fn delete_legacy(&self, id: i64) -> Result<(), AppError> {
        self.inner.write().await.legacy.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::BoundingBox;
    use chrono::{DateTime, Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_a_conflict() {
        let store = InMemoryMeasurementStore::new();
        let first = store
            .add_measurement("mydevice", 64.278, 17.182, 12.7, true, "2024-05-01T12:00:00Z")
            .await
            .unwrap();
        assert_eq!(first.id, 1);

        let err = store
            .add_measurement("mydevice", 64.0, 17.0, 3.0, true, "2024-05-01T12:00:00Z")
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_empty_device_is_not_deduplicated() {
        let store = InMemoryMeasurementStore::new();
        for _ in 0..2 {
            store
                .insert(NewMeasurement::new("", 1.0, 2.0, 3.0, false, t0()))
                .await
                .unwrap();
        }
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_invalid_timestamp_has_no_side_effect() {
        let store = InMemoryMeasurementStore::new();
        let err = store
            .add_measurement("d", 1.0, 2.0, 3.0, false, "not a time")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_query_orders_ascending_and_limits() {
        let store = InMemoryMeasurementStore::new();
        for minutes in [30, 10, 20] {
            store
                .insert(NewMeasurement::new(
                    format!("d{minutes}"),
                    1.0,
                    2.0,
                    3.0,
                    false,
                    t0() + Duration::minutes(minutes),
                ))
                .await
                .unwrap();
        }

        let all = store.query(&MeasurementQuery::default()).await.unwrap();
        let devices: Vec<&str> = all.iter().map(|m| m.device.as_str()).collect();
        assert_eq!(devices, vec!["d10", "d20", "d30"]);

        let limited = store
            .query(&MeasurementQuery {
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[1].device, "d20");
    }

    #[tokio::test]
    async fn test_query_combines_filters() {
        let store = InMemoryMeasurementStore::new();
        store
            .insert(NewMeasurement::new("a", 64.2, 17.1, 1.0, false, t0()))
            .await
            .unwrap();
        store
            .insert(NewMeasurement::new("a", 10.0, 10.0, 1.0, false, t0() + Duration::minutes(1)))
            .await
            .unwrap();
        store
            .insert(NewMeasurement::new("b", 64.2, 17.1, 1.0, false, t0()))
            .await
            .unwrap();

        let found = store
            .query(&MeasurementQuery {
                device: Some("a".into()),
                from: Some(t0() - Duration::hours(1)),
                to: Some(t0() + Duration::hours(1)),
                within: Some(BoundingBox::from_corners(64.0, 17.0, 65.0, 18.0)),
                limit: 0,
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].latitude, 64.2);
    }

    #[tokio::test]
    async fn test_query_without_matches_is_empty() {
        let store = InMemoryMeasurementStore::new();
        let found = store
            .query(&MeasurementQuery {
                device: Some("nobody".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_store_once() {
        let store = Arc::new(InMemoryMeasurementStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert(NewMeasurement::new("racer", 1.0, 2.0, 3.0, true, t0()))
                    .await
            }));
        }

        let mut stored = 0;
        let mut conflicts = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => stored += 1,
                Err(e) if e.is_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(stored, 1);
        assert_eq!(conflicts, 15);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_sub_microsecond_timestamps_conflict() {
        let store = InMemoryMeasurementStore::new();
        store
            .add_measurement("sensor-1", 1.0, 2.0, 3.0, false, "2024-05-01T12:00:00.000001100Z")
            .await
            .unwrap();
        let err = store
            .add_measurement("sensor-1", 1.0, 2.0, 3.0, false, "2024-05-01T12:00:00.000001900Z")
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.len().await, 1);
    }
}
