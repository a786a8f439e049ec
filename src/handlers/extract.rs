// Extraction admission handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::app::AppState;
use crate::middleware::auth::CurrentUser;
use crate::services::JobServiceError;
use crate::utils::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct ExtractRequest {
    #[validate(url(message = "Invalid URL"))]
    pub url: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExtractBatchRequest {
    #[validate(length(min = 1, max = 100, message = "Batch must contain 1 to 100 URLs"))]
    pub urls: Vec<String>,
}

pub async fn extract_single(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ExtractRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let job = state
        .job_service
        .create_job(&user, &req.url)
        .await
        .map_err(into_api_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "job": job,
            "message": "Job queued for processing",
        })),
    ))
}

pub async fn extract_batch(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ExtractBatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let jobs = state
        .job_service
        .create_batch_jobs(&user, &req.urls)
        .await
        .map_err(into_api_error)?;

    let count = jobs.len();
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "jobs": jobs,
            "count": count,
            "message": "Batch jobs queued for processing",
        })),
    ))
}

fn into_api_error(e: JobServiceError) -> ApiError {
    match e {
        JobServiceError::InsufficientCredits => ApiError::InsufficientCredits,
        JobServiceError::InvalidUrl(msg) => ApiError::Validation(msg),
        JobServiceError::NotFound => ApiError::NotFound("Job not found".to_string()),
        JobServiceError::Database(msg) => ApiError::Database(msg),
        JobServiceError::Queue(msg) => ApiError::Queue(msg),
    }
}
