// Job orchestrator: admission, credit accounting, lane routing, enqueue,
// and realtime announcements

use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::db::{DieselPool, PooledConn};
use crate::models::{Job, JobError, JobStatus, NewJob, SiteConfig, User, UserError};
use crate::services::hub::{RealtimeHub, EVENT_JOB_STATUS};
use crate::services::queue::{Lane, TaskQueue, TASK_EXTRACTION_JOB};
use crate::utils::validation::derive_domain;

#[derive(thiserror::Error, Debug)]
pub enum JobServiceError {
    #[error("insufficient credits")]
    InsufficientCredits,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Job not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Queue error: {0}")]
    Queue(String),
}

impl From<JobError> for JobServiceError {
    fn from(e: JobError) -> Self {
        match e {
            JobError::NotFound => JobServiceError::NotFound,
            JobError::Database(inner) => JobServiceError::Database(inner.to_string()),
        }
    }
}

/// Routing decision: a known recipe sends the job down the fast lane, a
/// miss sends it to recipe discovery.
pub fn route_lane(recipe: Option<&SiteConfig>) -> Lane {
    match recipe {
        Some(_) => Lane::Fast,
        None => Lane::Learn,
    }
}

pub struct JobService {
    db: DieselPool,
    queue: Arc<TaskQueue>,
    hub: Arc<RealtimeHub>,
}

impl JobService {
    pub fn new(db: DieselPool, queue: Arc<TaskQueue>, hub: Arc<RealtimeHub>) -> Self {
        Self { db, queue, hub }
    }

    /// Admit a single extraction job: validate, create, debit one credit,
    /// route by recipe, enqueue, announce. On enqueue failure the job row is
    /// marked failed; credits are not refunded.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create_job(&self, user: &User, url: &str) -> Result<Job, JobServiceError> {
        if user.credits < 1 {
            return Err(JobServiceError::InsufficientCredits);
        }

        let domain = derive_domain(url).map_err(|e| JobServiceError::InvalidUrl(e.to_string()))?;

        let mut conn = self.pooled_conn().await?;

        let recipe = SiteConfig::find_by_domain(&mut conn, &domain)
            .await
            .map_err(|e| JobServiceError::Database(e.to_string()))?;
        let lane = route_lane(recipe.as_ref());

        let job = Job::create(
            &mut conn,
            NewJob {
                user_id: user.id,
                url: url.to_string(),
                domain: domain.clone(),
                status: JobStatus::Queued,
                worker_type: Some(lane.as_str().to_string()),
                credits_used: 1,
            },
        )
        .await?;

        self.debit(&mut conn, user.id, 1, &[&job]).await?;

        if let Err(e) = self.enqueue_job(&job, lane).await {
            error!(job_id = %job.id, error = %e, "Enqueue failed after admission");
            let _ = Job::fail(&mut conn, job.id, "Failed to queue job for processing").await;
            return Err(JobServiceError::Queue(e));
        }

        info!(job_id = %job.id, domain = %domain, lane = lane.as_str(), "Job admitted");
        self.announce(&job);

        Ok(job)
    }

    /// Batch admission: URLs are processed serially; invalid URLs and failed
    /// creations are skipped. Credits are debited by the number of jobs
    /// actually created, never by the requested count.
    #[instrument(skip(self, user, urls), fields(user_id = %user.id, requested = urls.len()))]
    pub async fn create_batch_jobs(
        &self,
        user: &User,
        urls: &[String],
    ) -> Result<Vec<Job>, JobServiceError> {
        if user.credits < urls.len() as i32 {
            return Err(JobServiceError::InsufficientCredits);
        }

        let mut conn = self.pooled_conn().await?;
        let mut admitted: Vec<(Job, Lane)> = Vec::with_capacity(urls.len());

        for url in urls {
            let Ok(domain) = derive_domain(url) else {
                warn!(url = %url, "Skipping invalid URL in batch");
                continue;
            };

            let recipe = SiteConfig::find_by_domain(&mut conn, &domain)
                .await
                .map_err(|e| JobServiceError::Database(e.to_string()))?;
            let lane = route_lane(recipe.as_ref());

            match Job::create(
                &mut conn,
                NewJob {
                    user_id: user.id,
                    url: url.to_string(),
                    domain,
                    status: JobStatus::Queued,
                    worker_type: Some(lane.as_str().to_string()),
                    credits_used: 1,
                },
            )
            .await
            {
                Ok(job) => admitted.push((job, lane)),
                Err(e) => warn!(url = %url, error = %e, "Skipping failed job creation in batch"),
            }
        }

        if admitted.is_empty() {
            return Ok(Vec::new());
        }

        let job_refs: Vec<&Job> = admitted.iter().map(|(job, _)| job).collect();
        self.debit(&mut conn, user.id, admitted.len() as i32, &job_refs)
            .await?;

        for (job, lane) in &admitted {
            if let Err(e) = self.enqueue_job(job, *lane).await {
                error!(job_id = %job.id, error = %e, "Enqueue failed for batch job");
                let _ = Job::fail(&mut conn, job.id, "Failed to queue job for processing").await;
                continue;
            }
            self.announce(job);
        }

        info!(count = admitted.len(), "Batch admitted");
        Ok(admitted.into_iter().map(|(job, _)| job).collect())
    }

    /// Fetch a job, enforcing ownership. Another user's job is
    /// indistinguishable from a missing one.
    pub async fn get_job(&self, job_id: Uuid, user_id: Uuid) -> Result<Job, JobServiceError> {
        let mut conn = self.pooled_conn().await?;
        let job = Job::find_by_id(&mut conn, job_id).await?;

        if job.user_id != user_id {
            return Err(JobServiceError::NotFound);
        }
        Ok(job)
    }

    /// Newest-first job listing. Out-of-range limits fall back to 20.
    pub async fn list_user_jobs(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Job>, JobServiceError> {
        let limit = match limit {
            Some(l) if (1..=100).contains(&l) => l,
            _ => 20,
        };

        let mut conn = self.pooled_conn().await?;
        Ok(Job::list_by_user(&mut conn, user_id, limit).await?)
    }

    async fn pooled_conn(&self) -> Result<PooledConn<'_>, JobServiceError> {
        self.db
            .get()
            .await
            .map_err(|e| JobServiceError::Database(e.to_string()))
    }

    /// Conditional debit; loses the race only to a concurrent admission, in
    /// which case the jobs created under the stale balance are failed.
    async fn debit(
        &self,
        conn: &mut diesel_async::AsyncPgConnection,
        user_id: Uuid,
        amount: i32,
        jobs: &[&Job],
    ) -> Result<(), JobServiceError> {
        match User::decrement_credits(conn, user_id, amount).await {
            Ok(remaining) => {
                info!(user_id = %user_id, amount, remaining, "Credits debited");
                Ok(())
            }
            Err(UserError::InsufficientCredits) => {
                for job in jobs {
                    let _ = Job::fail(conn, job.id, "insufficient credits").await;
                }
                Err(JobServiceError::InsufficientCredits)
            }
            Err(e) => Err(JobServiceError::Database(e.to_string())),
        }
    }

    async fn enqueue_job(&self, job: &Job, lane: Lane) -> Result<(), String> {
        let payload = serde_json::to_value(job).map_err(|e| e.to_string())?;
        self.queue
            .enqueue(TASK_EXTRACTION_JOB, payload, lane)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn announce(&self, job: &Job) {
        let payload = match serde_json::to_value(job) {
            Ok(value) => json!({ "job": value }),
            Err(_) => return,
        };
        self.hub.broadcast(job.user_id, EVENT_JOB_STATUS, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_is_deterministic() {
        // A recipe for the domain selects the fast lane; a miss selects learn.
        assert_eq!(route_lane(None), Lane::Learn);

        let recipe = SiteConfig {
            id: Uuid::new_v4(),
            domain: "example.com".to_string(),
            config_yaml: String::new(),
            requires_browser: false,
            learned_by_user_id: None,
            learned_at: chrono::Utc::now(),
            learn_iterations: 1,
            success_count: 0,
            failure_count: 0,
            last_used_at: None,
            avg_extraction_time_ms: None,
            version: 1,
            notes: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert_eq!(route_lane(Some(&recipe)), Lane::Fast);
    }
}
