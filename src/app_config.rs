// Centralized configuration for the Artex backend
// All environment variables are read once at startup

use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    dotenv::dotenv().ok();
    AppConfig::from_env().expect("Failed to load configuration")
});

/// Convenience accessor for the global config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtSettings,
    pub rate_limit: RateLimitSettings,
    pub queue: QueueSettings,
    pub storage: StorageConfig,
    pub describe: DescribeConfig,
    pub learner: LearnerConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub connection_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub expiry_hours: u64,
    pub issuer: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub free: u32,
    pub pro: u32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub concurrency: usize,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct DescribeConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct LearnerConfig {
    pub url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = AppConfig {
            server: ServerConfig {
                host: get_env_or("API_HOST", "0.0.0.0"),
                port: get_env_parsed("API_PORT", 8080)?,
                environment: Environment::from(get_env_or("ENVIRONMENT", "development")),
            },
            database: DatabaseConfig {
                url: get_env_required("DATABASE_URL")?,
                max_connections: get_env_parsed("DB_MAX_CONNECTIONS", 25)?,
                min_connections: get_env_parsed("DB_MIN_CONNECTIONS", 5)?,
                connect_timeout: Duration::from_secs(get_env_parsed("DB_CONNECT_TIMEOUT", 10)?),
                idle_timeout: Duration::from_secs(get_env_parsed("DB_IDLE_TIMEOUT", 1800)?),
                max_lifetime: Duration::from_secs(get_env_parsed("DB_MAX_LIFETIME", 3600)?),
            },
            redis: RedisConfig {
                url: get_env_required("REDIS_URL")?,
                connection_timeout: Duration::from_secs(get_env_parsed(
                    "REDIS_CONNECT_TIMEOUT",
                    5,
                )?),
            },
            jwt: JwtSettings {
                secret: get_env_required("JWT_SECRET")?,
                expiry_hours: get_env_parsed("JWT_EXPIRY_HOURS", 24)?,
                issuer: get_env_or("JWT_ISSUER", "artex-api"),
            },
            rate_limit: RateLimitSettings {
                free: get_env_parsed("RATE_LIMIT_FREE", 10)?,
                pro: get_env_parsed("RATE_LIMIT_PRO", 100)?,
                window: Duration::from_secs(get_env_parsed("RATE_LIMIT_WINDOW", 60)?),
            },
            queue: QueueSettings {
                concurrency: get_env_parsed("WORKER_CONCURRENCY", 10)?,
                max_retries: get_env_parsed("QUEUE_MAX_RETRIES", 5)?,
            },
            storage: StorageConfig {
                path: get_env_or("STORAGE_PATH", "./storage"),
            },
            describe: DescribeConfig {
                api_key: get_env_required("GEMINI_API_KEY")?,
                model: get_env_or("GEMINI_MODEL", "gemini-2.0-flash-exp"),
            },
            learner: LearnerConfig {
                url: get_env_or("LEARNER_URL", "http://localhost:8081"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "must be at least 32 characters".to_string(),
            ));
        }
        if self.rate_limit.window.as_secs() == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_WINDOW".to_string(),
                "must be positive".to_string(),
            ));
        }
        if self.queue.concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "WORKER_CONCURRENCY".to_string(),
                "must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.environment == Environment::Production
    }
}

fn get_env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

fn get_env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn get_env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(val) if !val.is_empty() => val
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), val)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_aliases() {
        assert_eq!(
            Environment::from("prod".to_string()),
            Environment::Production
        );
        assert_eq!(
            Environment::from("Staging".to_string()),
            Environment::Staging
        );
        assert_eq!(
            Environment::from("anything-else".to_string()),
            Environment::Development
        );
    }

    #[test]
    fn get_env_parsed_falls_back_to_default() {
        std::env::remove_var("ARTEX_TEST_UNSET");
        let value: u32 = get_env_parsed("ARTEX_TEST_UNSET", 42).unwrap();
        assert_eq!(value, 42);
    }
}
