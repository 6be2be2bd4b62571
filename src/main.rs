use actix_web::web;
use std::{env, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod context;
mod errors;
mod health;
mod metrics;
mod models;
mod service;
mod storage;
mod utils;

use config::{BackendKind, Config};
use service::OrderService;
use storage::{KvBackend, MemoryBackend, OrderStore, RedisBackend};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let dotenv_loaded = config::load_dotenv();
    let log_level = config::log_level_from(|key| env::var(key).ok());

    // RUST_LOG overrides ORDERS_LOG_LEVEL
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{},redis_orders={}", log_level, log_level))),
        )
        .init();

    tracing::info!("🚀 Starting order service");
    if dotenv_loaded {
        tracing::info!("Loaded .env file");
    }

    let config = Config::load()?;
    if !config.is_prod_mode {
        tracing::info!(?config, "Effective configuration");
    }

    // === 1. Backend ===
    let backend: Arc<dyn KvBackend> = match config.backend {
        BackendKind::Redis => {
            tracing::info!(url = %config.redis_url, "Connecting to Redis...");
            Arc::new(RedisBackend::connect(&config.redis_url, &utils::RetryConfig::default()).await?)
        }
        BackendKind::Memory => {
            tracing::warn!("Using in-memory backend, orders will not survive a restart");
            Arc::new(MemoryBackend::new())
        }
    };

    // === 2. Metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    let registry = Arc::new(metrics.registry().clone());

    // === 3. Shutdown ===
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received, cancelling in-flight store calls");
                shutdown.cancel();
            }
        });
    }

    // === 4. Store, service, HTTP state ===
    let store = Arc::new(OrderStore::new(backend.clone()).with_metrics(metrics.clone()));
    let state = web::Data::new(api::AppState {
        service: OrderService::new(store),
        backend,
        metrics: Some(metrics),
        request_timeout: config.request_timeout,
        shutdown,
    });

    // === 5. Serve until either server stops ===
    tokio::try_join!(
        api::start_api_server(state, &config.listen, &config.prefix),
        metrics::start_metrics_server(registry, config.metrics_port),
    )?;

    tracing::info!("Order service stopped");
    Ok(())
}
