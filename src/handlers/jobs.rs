// Job read handlers

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::app::AppState;
use crate::middleware::auth::CurrentUser;
use crate::services::JobServiceError;
use crate::utils::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<i64>,
}

pub async fn get_job(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let job_id =
        Uuid::parse_str(&id).map_err(|_| ApiError::Validation("Invalid job ID".to_string()))?;

    let job = state
        .job_service
        .get_job(job_id, user.id)
        .await
        .map_err(|e| match e {
            JobServiceError::NotFound => ApiError::NotFound("Job not found".to_string()),
            other => ApiError::Database(other.to_string()),
        })?;

    Ok(Json(json!({ "job": job })))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let jobs = state
        .job_service
        .list_user_jobs(user.id, query.limit)
        .await
        .map_err(|e| ApiError::Database(e.to_string()))?;

    let count = jobs.len();
    Ok(Json(json!({ "jobs": jobs, "count": count })))
}
