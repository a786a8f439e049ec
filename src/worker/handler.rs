// Extraction job handler: wraps the pipeline with status transitions,
// recipe lookup, the learning-lane hand-off, and usage stat updates

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::db::DieselPool;
use crate::extractor::recipe::SiteRecipe;
use crate::extractor::Extractor;
use crate::models::{Job, JobOutcome, JobStatus, SiteConfig};
use crate::services::learner::LearnerClient;
use crate::services::queue::TaskEnvelope;
use crate::worker::{HandlerError, TaskHandler};

pub struct ExtractionJobHandler {
    db: DieselPool,
    extractor: Arc<Extractor>,
    learner: Arc<LearnerClient>,
}

impl ExtractionJobHandler {
    pub fn new(db: DieselPool, extractor: Arc<Extractor>, learner: Arc<LearnerClient>) -> Self {
        Self {
            db,
            extractor,
            learner,
        }
    }

    /// Hand the job to the learning worker. On success the learner has
    /// already written the terminal job state and the core must not touch
    /// the row again. A learner-reported failure is terminal and acked; a
    /// transport error bubbles up for queue-level retry.
    async fn delegate_to_learner(&self, job: &Job) -> Result<(), HandlerError> {
        let mut conn = self.db.get().await?;
        Job::update_status(
            &mut conn,
            job.id,
            JobStatus::Learning,
            "Learning site structure...",
        )
        .await?;
        drop(conn);

        match self.learner.learn(job.id, &job.url).await {
            Ok(response) if response.success => {
                info!(job_id = %job.id, "Learning worker completed job");
                Ok(())
            }
            Ok(response) => {
                let reason = response
                    .error
                    .unwrap_or_else(|| {
                        if response.message.is_empty() {
                            "Learning failed".to_string()
                        } else {
                            response.message
                        }
                    });
                warn!(job_id = %job.id, reason = %reason, "Learning worker reported failure");

                let mut conn = self.db.get().await?;
                Job::fail(&mut conn, job.id, &reason).await?;
                Ok(())
            }
            Err(crate::services::learner::LearnerError::Status { status, body }) => {
                let reason = format!("Learning worker returned status {}: {}", status, body);
                error!(job_id = %job.id, status, "Learning worker rejected job");

                let mut conn = self.db.get().await?;
                Job::fail(&mut conn, job.id, &reason).await?;
                Ok(())
            }
            Err(transport) => {
                // Connection failures and timeouts are worth a redelivery
                Err(Box::new(transport))
            }
        }
    }

    async fn run_pipeline(
        &self,
        job: &Job,
        recipe: Option<&SiteRecipe>,
    ) -> Result<(), HandlerError> {
        let mut conn = self.db.get().await?;
        Job::update_progress(&mut conn, job.id, 20, "Fetching and parsing HTML...").await?;
        drop(conn);

        let html = match self.extractor.fetch_html(&job.url).await {
            Ok(html) => html,
            Err(e) => return self.fail_job(job, &format!("Extraction failed: {}", e)).await,
        };

        let mut conn = self.db.get().await?;
        Job::update_status(&mut conn, job.id, JobStatus::Extracting, "Extracting article content...")
            .await?;
        Job::update_progress(&mut conn, job.id, 40, "Extracting article content...").await?;
        drop(conn);

        let prepared = match self.extractor.prepare(&html, &job.url, recipe) {
            Ok(prepared) => prepared,
            Err(e) => return self.fail_job(job, &format!("Extraction failed: {}", e)).await,
        };

        let mut conn = self.db.get().await?;
        Job::update_status(
            &mut conn,
            job.id,
            JobStatus::GeneratingDescriptions,
            "Generating image descriptions...",
        )
        .await?;
        Job::update_progress(&mut conn, job.id, 60, "Generating image descriptions...").await?;
        drop(conn);

        let described = self.extractor.describe(&prepared.images).await;

        let mut conn = self.db.get().await?;
        Job::update_progress(&mut conn, job.id, 80, "Rendering markdown...").await?;
        drop(conn);

        let result = match self.extractor.finish(job.id, prepared, described).await {
            Ok(result) => result,
            Err(e) => return self.fail_job(job, &format!("Extraction failed: {}", e)).await,
        };

        let mut conn = self.db.get().await?;
        Job::complete(
            &mut conn,
            job.id,
            &JobOutcome {
                result_path: Some(result.path.clone()),
                markdown_content: Some(result.markdown),
                title: Some(result.title),
                author: Some(result.author),
                word_count: Some(result.word_count),
                image_count: Some(result.image_count),
            },
        )
        .await?;

        info!(
            job_id = %job.id,
            word_count = result.word_count,
            image_count = result.image_count,
            result_path = %result.path,
            "Job completed"
        );
        Ok(())
    }

    /// Terminal failure; extraction errors are deterministic enough that a
    /// queue-level retry would just repeat them, so the task is acked.
    async fn fail_job(&self, job: &Job, message: &str) -> Result<(), HandlerError> {
        error!(job_id = %job.id, message, "Extraction failed");
        let mut conn = self.db.get().await?;
        Job::fail(&mut conn, job.id, message).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskHandler for ExtractionJobHandler {
    async fn handle(&self, envelope: &TaskEnvelope) -> Result<(), HandlerError> {
        let job: Job = serde_json::from_value(envelope.payload.clone())?;

        info!(
            job_id = %job.id,
            url = %job.url,
            domain = %job.domain,
            "Processing extraction job"
        );

        // Redelivered task for an already-finished job: nothing to do
        let mut conn = self.db.get().await?;
        let current = Job::find_by_id(&mut conn, job.id).await?;
        if current.status.is_terminal() {
            info!(job_id = %job.id, status = current.status.as_str(), "Job already terminal, skipping");
            return Ok(());
        }

        Job::update_status(&mut conn, job.id, JobStatus::Processing, "Starting extraction...")
            .await?;

        let config_row = SiteConfig::find_by_domain(&mut conn, &job.domain).await?;
        drop(conn);

        let started = Instant::now();

        let Some(config_row) = config_row else {
            // No recipe for this domain: recipe discovery owns the job
            return self.delegate_to_learner(&job).await;
        };

        if config_row.requires_browser {
            let mut conn = self.db.get().await?;
            Job::update_progress(
                &mut conn,
                job.id,
                10,
                "Site requires JavaScript rendering, delegating to learning worker",
            )
            .await?;
            drop(conn);
            return self.delegate_to_learner(&job).await;
        }

        let recipe = match SiteRecipe::parse(&config_row.config_yaml) {
            Ok(recipe) => Some(recipe),
            Err(e) => {
                warn!(
                    domain = %job.domain,
                    error = %e,
                    "Unparsable recipe YAML, extracting with defaults"
                );
                None
            }
        };

        let outcome = self.run_pipeline(&job, recipe.as_ref()).await;

        // Attribute the terminal outcome to the domain's recipe
        let elapsed_ms = started.elapsed().as_millis() as i32;
        let succeeded = match &outcome {
            Ok(()) => {
                let mut conn = self.db.get().await?;
                let current = Job::find_by_id(&mut conn, job.id).await?;
                current.status == JobStatus::Completed
            }
            Err(_) => false,
        };

        let mut conn = self.db.get().await?;
        if let Err(e) = SiteConfig::update_usage_stats(
            &mut conn,
            &job.domain,
            succeeded,
            if succeeded { elapsed_ms } else { 0 },
        )
        .await
        {
            warn!(domain = %job.domain, error = %e, "Failed to update recipe usage stats");
        }

        outcome
    }
}
