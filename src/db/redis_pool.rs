// Redis connection management
// ConnectionManager multiplexes one auto-reconnecting connection; clones are cheap

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use tracing::info;

use crate::app_config::RedisConfig;

/// Shared Redis handle used by the rate limiter and the task queue
#[derive(Clone)]
pub struct RedisPool {
    manager: ConnectionManager,
}

impl RedisPool {
    pub async fn new(config: &RedisConfig) -> Result<Self, RedisError> {
        info!(url = %mask_redis_url(&config.url), "Connecting to Redis");

        let client = Client::open(config.url.as_str())?;
        let manager = tokio::time::timeout(
            config.connection_timeout,
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| {
            RedisError::from((redis::ErrorKind::IoError, "Redis connection timed out"))
        })??;

        info!("Redis connection established");
        Ok(Self { manager })
    }

    /// Get a connection handle. ConnectionManager clones share the
    /// underlying multiplexed connection.
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Round-trip a PING, returning latency in milliseconds
    pub async fn health_check(&self) -> Result<u64, RedisError> {
        let start = std::time::Instant::now();
        let mut conn = self.connection();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(start.elapsed().as_millis() as u64)
    }
}

/// Mask credentials in a Redis URL for logging
pub fn mask_redis_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("***");
            let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();
            if parsed.password().is_some() {
                format!("redis://***@{}{}", host, port)
            } else {
                format!("redis://{}{}", host, port)
            }
        }
        Err(_) => "redis://***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_password() {
        let masked = mask_redis_url("redis://:hunter2@cache.internal:6379/0");
        assert_eq!(masked, "redis://***@cache.internal:6379");
    }

    #[test]
    fn plain_url_unchanged() {
        assert_eq!(mask_redis_url("redis://localhost:6379"), "redis://localhost:6379");
    }
}
