use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use telemetry_relay::{
    api::{self, AppState},
    config::Config,
    control::ControlService,
    db::{self, PgStore, Store},
    mqtt::{MessageChannel, MqttChannel},
    sensors::SensorService,
    state_cache::StateCache,
};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "telemetry_relay=info,rumqttc=warn".into()),
        )
        .init();

    let config = Config::from_env()?;

    // The store may be down at startup; ingestion still feeds the cache.
    let pool = db::create_pool(
        &config.database_url,
        config.db_max_connections,
        config.db_acquire_timeout,
    )?;
    match db::run_migrations(&pool).await {
        Ok(()) => info!("Database ready"),
        Err(e) => error!(error = %e, "Database unavailable; continuing with cache only"),
    }
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

    let cache = StateCache::new();

    let (channel, connection) = MqttChannel::connect(&config.mqtt);
    let sensors = Arc::new(SensorService::new(
        store.clone(),
        cache.clone(),
        config.ingest_queue_capacity,
    ));
    channel
        .subscribe(&config.mqtt.sensor_topic, sensors)
        .await
        .context("failed to subscribe to sensor topic")?;

    let control = ControlService::new(
        Arc::new(channel),
        store.clone(),
        cache.clone(),
        config.mqtt.control_topic.clone(),
    );

    let state = AppState {
        store,
        cache,
        control,
        control_history_limit: config.control_history_limit,
    };

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    connection.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
