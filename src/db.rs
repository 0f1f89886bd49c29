use crate::config::DbConfig;
use crate::error::AppError;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;

pub type DbPool = Pool<Postgres>;

pub async fn connect(cfg: &DbConfig) -> Result<DbPool, AppError> {
    let options = connect_options(cfg)?;
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn connect_url(url: &str) -> Result<DbPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await?;
    Ok(pool)
}

fn connect_options(cfg: &DbConfig) -> Result<PgConnectOptions, AppError> {
    if let Some(url) = &cfg.url {
        return PgConnectOptions::from_str(url).map_err(AppError::Db);
    }

    let host = cfg
        .host
        .as_deref()
        .ok_or_else(|| AppError::Config("database.host is not set".into()))?;
    let ssl_mode = PgSslMode::from_str(&cfg.sslmode)
        .map_err(|e| AppError::Config(format!("invalid sslmode {:?}: {e}", cfg.sslmode)))?;

    let mut options = PgConnectOptions::new().host(host).ssl_mode(ssl_mode);
    if let Some(user) = &cfg.user {
        options = options.username(user);
    }
    if let Some(password) = &cfg.password {
        options = options.password(password);
    }
    if let Some(name) = &cfg.name {
        options = options.database(name);
    }
    Ok(options)
}

/// Creates both tables if they are missing. The legacy table only exists to
/// feed the migration.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS temperature_measurements
        (
            id          BIGSERIAL        PRIMARY KEY,
            created_at  TIMESTAMPTZ      NOT NULL DEFAULT NOW(),
            updated_at  TIMESTAMPTZ      NOT NULL DEFAULT NOW(),
            device      TEXT             NOT NULL DEFAULT '',
            latitude    DOUBLE PRECISION NOT NULL,
            longitude   DOUBLE PRECISION NOT NULL,
            temperature REAL             NOT NULL,
            is_water    BOOLEAN          NOT NULL DEFAULT FALSE,
            observed_at TIMESTAMPTZ      NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_measurements_device_observed_at
            ON temperature_measurements (device, observed_at)
            WHERE device <> ''
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_measurements_observed_at
            ON temperature_measurements (observed_at)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS temperatures
        (
            id          BIGSERIAL        PRIMARY KEY,
            created_at  TIMESTAMPTZ,
            updated_at  TIMESTAMPTZ,
            deleted_at  TIMESTAMPTZ,
            latitude    DOUBLE PRECISION,
            longitude   DOUBLE PRECISION,
            device      TEXT,
            temp        REAL,
            water       BOOLEAN,
            "timestamp" TEXT,
            timestamp2  TIMESTAMPTZ DEFAULT '1970-01-01T12:00:00Z'
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
