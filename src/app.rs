// Application state shared across handlers

use std::sync::Arc;

use crate::{
    app_config::AppConfig,
    db::{DieselPool, RedisPool},
    services::{JobService, JwtService, RealtimeHub},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub diesel_pool: DieselPool,
    pub redis: RedisPool,
    pub jwt_service: Arc<JwtService>,
    pub job_service: Arc<JobService>,
    pub hub: Arc<RealtimeHub>,
}
