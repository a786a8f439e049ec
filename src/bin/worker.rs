// Extraction worker entry point

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use artex_backend::app_config::config;
use artex_backend::db::{self, diesel_pool, RedisPool};
use artex_backend::extractor::Extractor;
use artex_backend::services::describe::{DescribeImage, GeminiDescriber};
use artex_backend::services::{LearnerClient, TASK_EXTRACTION_JOB};
use artex_backend::worker::handler::ExtractionJobHandler;
use artex_backend::worker::{QueueWorker, WorkerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artex_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv::dotenv().ok();
    let config = config();
    info!("Starting Artex extraction worker");

    info!(
        url = %db::mask_connection_string(&config.database.url),
        "Connecting to Postgres"
    );
    let pool = diesel_pool::create_diesel_pool(&config.database)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to initialize database pool");
            e
        })?;

    let redis = RedisPool::new(&config.redis).await?;

    let describer: Arc<dyn DescribeImage> = Arc::new(GeminiDescriber::new(&config.describe));
    let extractor = Arc::new(Extractor::new(describer, config.storage.path.clone()));
    let learner = Arc::new(LearnerClient::new(&config.learner));

    let handler = Arc::new(ExtractionJobHandler::new(
        pool.clone(),
        extractor,
        learner,
    ));

    let worker_config = WorkerConfig {
        concurrency: config.queue.concurrency,
        max_retries: config.queue.max_retries,
        consumer_id: hostname(),
    };

    let mut worker = QueueWorker::new(redis, worker_config);
    worker.register(TASK_EXTRACTION_JOB, handler);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    worker.run(shutdown_rx).await?;

    info!("Worker stopped");
    Ok(())
}

/// Stable consumer id so crash recovery finds this worker's active lists
fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "worker-1".to_string())
}
