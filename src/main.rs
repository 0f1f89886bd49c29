use std::sync::Arc;
use temperature_context::api::{self, AppState};
use temperature_context::context::ContextSource;
use temperature_context::ingest::{self, Ingestor};
use temperature_context::repositories::{MeasurementStore, PgMeasurementStore};
use temperature_context::{db, migration, mqtt, Config};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting temperature-context");

    let cfg_path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    info!("Configuration loaded");

    let pool = db::connect(&cfg.database).await?;
    sqlx::query("SELECT 1").execute(&pool).await?;
    db::ensure_schema(&pool).await?;
    info!("Connected to database");

    let store: Arc<dyn MeasurementStore> = Arc::new(PgMeasurementStore::new(pool));

    let report = migration::migrate(store.as_ref()).await?;
    info!(
        migrated = report.migrated,
        discarded = report.discarded,
        "Legacy data migrated"
    );

    let ingestor = Ingestor::new(store.clone());
    let state = AppState {
        source: ContextSource::new(store),
        stats: ingestor.stats(),
    };

    let router = api::create_router(state);
    let addr = format!("{}:{}", cfg.api.host, cfg.api.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;
    info!("API server listening on {}", addr);

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let server = tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.changed().await;
        };
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error = %e, "API server error");
        }
    });

    let routes = Arc::new(ingest::routes(&cfg.ingest));
    let (client, mut eventloop) = mqtt::new(mqtt::build_options(&cfg.mqtt));
    mqtt::subscribe_routes(&client, &routes, cfg.ingest.qos).await?;
    info!("subscribed to {} topic(s)", routes.len());

    let sig = tokio::signal::ctrl_c();
    tokio::pin!(sig);
    loop {
        tokio::select! {
            biased;
            _ = &mut sig => {
                info!("shutdown requested");
                break;
            }
            res = mqtt::next_publish(&mut eventloop) => {
                match res {
                    Ok(Some(msg)) => {
                        let topic = match std::str::from_utf8(&msg.topic) {
                            Ok(s) => s.to_string(),
                            Err(_) => {
                                warn!(topic = ?msg.topic, "non-utf8 topic; skipping message");
                                continue;
                            }
                        };
                        let ingestor = ingestor.clone();
                        let routes = routes.clone();
                        tokio::spawn(async move {
                            ingestor.handle_message(&routes, &topic, msg.payload.as_ref()).await;
                        });
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("mqtt error: {e}; reconnecting after short delay");
                        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                    }
                }
            }
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = server.await {
        warn!(error = %e, "API server task failed");
    }

    info!("Application shutdown complete");
    Ok(())
}
