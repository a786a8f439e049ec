// API server entry point

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use artex_backend::app::AppState;
use artex_backend::app_config::config;
use artex_backend::db::{self, diesel_pool, RedisPool};
use artex_backend::handlers::api_router;
use artex_backend::services::{JobService, JwtService, RealtimeHub, TaskQueue};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artex_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv::dotenv().ok();
    let config = Arc::new(config().clone());
    info!("Starting Artex API");

    info!(
        url = %db::mask_connection_string(&config.database.url),
        "Connecting to Postgres"
    );
    let diesel_pool = diesel_pool::create_diesel_pool(&config.database)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to initialize database pool");
            e
        })?;

    diesel_pool::run_migrations(config.database.url.clone()).await?;

    let redis = RedisPool::new(&config.redis).await?;

    let jwt_service = Arc::new(JwtService::new(&config.jwt));
    let hub = RealtimeHub::new();
    let queue = Arc::new(TaskQueue::new(redis.clone()));
    let job_service = Arc::new(JobService::new(
        diesel_pool.clone(),
        queue,
        hub.clone(),
    ));

    let state = AppState {
        config: config.clone(),
        diesel_pool,
        redis,
        jwt_service,
        job_service,
        hub,
    };

    let app = api_router(state);

    let addr = config.server.bind_address();
    info!(addr = %addr, "API server listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install shutdown handler");
        return;
    }
    info!("Shutdown signal received");
}
