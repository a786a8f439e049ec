// Library exports for the Artex backend

pub mod app;
pub mod app_config;
pub mod db;
pub mod extractor;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;
pub mod worker;

// Commonly used types
pub use app::AppState;
pub use app_config::{config, AppConfig, CONFIG};
pub use db::{DieselPool, RedisPool};
pub use extractor::{ExtractError, ExtractionResult, Extractor};
pub use middleware::CurrentUser;
pub use models::{Job, JobStatus, SiteConfig, User, UserTier};
pub use services::{
    Claims, JobService, JwtService, Lane, LearnerClient, RealtimeHub, TaskQueue,
    TASK_EXTRACTION_JOB,
};
pub use utils::ApiError;
