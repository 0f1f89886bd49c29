use crate::db::DbPool;
use crate::error::AppError;
use crate::models::{LegacyMeasurement, Measurement, NewMeasurement};
use crate::repositories::{MeasurementQuery, MeasurementStore};
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

const MEASUREMENT_COLUMNS: &str =
    "id, device, latitude, longitude, temperature, is_water, observed_at, created_at, updated_at";

/// PostgreSQL backed store. Deduplication relies on the partial unique index
/// over (device, observed_at) created by [`crate::db::ensure_schema`].
#[derive(Clone)]
pub struct PgMeasurementStore {
    pool: DbPool,
}

impl PgMeasurementStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MeasurementStore for PgMeasurementStore {
    async fn insert(&self, measurement: NewMeasurement) -> Result<Measurement, AppError> {
        let sql = format!(
            r#"
            INSERT INTO temperature_measurements
                (device, latitude, longitude, temperature, is_water, observed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MEASUREMENT_COLUMNS}
            "#
        );

        let result = sqlx::query_as::<_, Measurement>(&sql)
            .bind(&measurement.device)
            .bind(measurement.latitude)
            .bind(measurement.longitude)
            .bind(measurement.temperature)
            .bind(measurement.is_water)
            .bind(measurement.observed_at)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(stored) => Ok(stored),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::Conflict {
                    device: measurement.device,
                    observed_at: measurement.observed_at,
                })
            }
            Err(e) => Err(AppError::Db(e)),
        }
    }

    async fn query(&self, query: &MeasurementQuery) -> Result<Vec<Measurement>, AppError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {MEASUREMENT_COLUMNS} FROM temperature_measurements WHERE TRUE"
        ));

        if let Some(device) = query.device_filter() {
            qb.push(" AND device = ").push_bind(device.to_string());
        }
        if let Some(from) = query.from {
            qb.push(" AND observed_at >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            qb.push(" AND observed_at < ").push_bind(to);
        }
        if let Some(bb) = query.within {
            qb.push(" AND latitude >= ")
                .push_bind(bb.min_lat)
                .push(" AND latitude <= ")
                .push_bind(bb.max_lat);
            // a box across the antimeridian has min_lon > max_lon
            let join = if bb.crosses_antimeridian() { " OR " } else { " AND " };
            qb.push(" AND (longitude >= ")
                .push_bind(bb.min_lon)
                .push(join)
                .push("longitude <= ")
                .push_bind(bb.max_lon)
                .push(")");
        }

        qb.push(" ORDER BY observed_at ASC, id ASC");
        if query.limit > 0 {
            qb.push(" LIMIT ")
                .push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));
        }

        let rows = qb
            .build_query_as::<Measurement>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn legacy_batch(&self, limit: i64) -> Result<Vec<LegacyMeasurement>, AppError> {
        let rows = sqlx::query_as::<_, LegacyMeasurement>(
            r#"
            SELECT
                id,
                device,
                latitude,
                longitude,
                temp,
                water,
                "timestamp",
                timestamp2
            FROM temperatures
            WHERE deleted_at IS NULL
            ORDER BY timestamp2 ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn delete_legacy(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM temperatures WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
