use saferpay_gateway::config;
use saferpay_gateway::db;
use saferpay_gateway::hooks::AssertHooks;
use saferpay_gateway::lock::RedisLockManager;
use saferpay_gateway::saferpay::SaferpayClient;
use saferpay_gateway::{app_router, AppState};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config()?;
    config::init_tracing(&config.log_level, config.log_json);

    info!(
        environment = %config.environment,
        mode = %config.saferpay.mode,
        "Starting Saferpay gateway"
    );

    let db = Arc::new(db::establish_connection_from_app_config(&config).await?);
    if config.auto_migrate {
        db::run_migrations(&db).await?;
    }

    let redis_client = Arc::new(redis::Client::open(config.redis_url.as_str())?);
    let lock = Arc::new(RedisLockManager::new(
        redis_client.clone(),
        config.lock_namespace.clone(),
        config.lock_ttl_secs,
    ));

    let saferpay = Arc::new(SaferpayClient::new(config.saferpay.clone()));

    let state = AppState {
        db: db.clone(),
        config: config.clone(),
        saferpay,
        lock,
        hooks: Arc::new(AssertHooks::new()),
        redis: Some(redis_client),
    };

    let app = app_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, closing database pool");
    if let Ok(db) = Arc::try_unwrap(db) {
        if let Err(e) = db::close_pool(db).await {
            error!(error = %e, "Failed to close database pool");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
