// Job model: one extraction unit tied to a single URL
// Serialized whole as the queue payload, so every field is serde-visible

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::jobs;

/// Job lifecycle states. Linear with branching: intermediate phases may be
/// skipped but terminal states are never left.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    diesel::AsExpression,
    diesel::FromSqlRow,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Learning,
    Extracting,
    GeneratingDescriptions,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Learning => "learning",
            JobStatus::Extracting => "extracting",
            JobStatus::GeneratingDescriptions => "generating_descriptions",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "learning" => Ok(JobStatus::Learning),
            "extracting" => Ok(JobStatus::Extracting),
            "generating_descriptions" => Ok(JobStatus::GeneratingDescriptions),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

impl<DB> diesel::deserialize::FromSql<diesel::sql_types::Text, DB> for JobStatus
where
    DB: diesel::backend::Backend,
    String: diesel::deserialize::FromSql<diesel::sql_types::Text, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        let value = String::from_sql(bytes)?;
        Self::from_str(&value).map_err(|e| e.into())
    }
}

impl<DB> diesel::serialize::ToSql<diesel::sql_types::Text, DB> for JobStatus
where
    DB: diesel::backend::Backend,
    str: diesel::serialize::ToSql<diesel::sql_types::Text, DB>,
{
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, DB>,
    ) -> diesel::serialize::Result {
        self.as_str().to_sql(out)
    }
}

/// Job database model
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Job {
    pub id: Uuid,
    pub user_id: Uuid,
    pub url: String,
    pub domain: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_type: Option<String>,
    pub progress_percent: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub credits_used: i32,
    pub queued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New job for insertion; id and queued_at come from the database
#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub user_id: Uuid,
    pub url: String,
    pub domain: String,
    pub status: JobStatus,
    pub worker_type: Option<String>,
    pub credits_used: i32,
}

/// Result fields written by a single terminal `complete` call
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    pub result_path: Option<String>,
    pub markdown_content: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub word_count: Option<i32>,
    pub image_count: Option<i32>,
}

#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Job not found")]
    NotFound,
}

impl Job {
    pub async fn create(conn: &mut AsyncPgConnection, new_job: NewJob) -> Result<Self, JobError> {
        diesel::insert_into(jobs::table)
            .values(&new_job)
            .get_result::<Job>(conn)
            .await
            .map_err(JobError::Database)
    }

    pub async fn find_by_id(conn: &mut AsyncPgConnection, job_id: Uuid) -> Result<Self, JobError> {
        use crate::schema::jobs::dsl::*;

        jobs.filter(id.eq(job_id))
            .first::<Job>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => JobError::NotFound,
                _ => JobError::Database(e),
            })
    }

    /// Newest-first listing for one user
    pub async fn list_by_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, JobError> {
        use crate::schema::jobs::dsl::*;

        jobs.filter(user_id.eq(owner))
            .order(created_at.desc())
            .limit(limit)
            .load::<Job>(conn)
            .await
            .map_err(JobError::Database)
    }

    /// Move a non-terminal job to a new phase. Sets started_at on the first
    /// transition out of queued; terminal rows are left untouched.
    pub async fn update_status(
        conn: &mut AsyncPgConnection,
        job_id: Uuid,
        new_status: JobStatus,
        message: &str,
    ) -> Result<(), JobError> {
        use crate::schema::jobs::dsl::*;

        let now = Utc::now();
        diesel::update(jobs.filter(id.eq(job_id).and(status.ne_all(TERMINAL_STATUSES))))
            .set((
                status.eq(new_status),
                progress_message.eq(message),
                updated_at.eq(now),
            ))
            .execute(conn)
            .await?;

        // First transition out of queued stamps started_at
        diesel::update(
            jobs.filter(
                id.eq(job_id)
                    .and(status.ne_all(TERMINAL_STATUSES))
                    .and(started_at.is_null()),
            ),
        )
        .set(started_at.eq(Some(now)))
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Progress is monotonic non-decreasing; stale or duplicate updates
    /// become no-ops through the `<=` guard.
    pub async fn update_progress(
        conn: &mut AsyncPgConnection,
        job_id: Uuid,
        percent: i32,
        message: &str,
    ) -> Result<(), JobError> {
        use crate::schema::jobs::dsl::*;

        diesel::update(
            jobs.filter(
                id.eq(job_id)
                    .and(status.ne_all(TERMINAL_STATUSES))
                    .and(progress_percent.le(percent)),
            ),
        )
        .set((
            progress_percent.eq(percent),
            progress_message.eq(message),
            updated_at.eq(Utc::now()),
        ))
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Terminal success: status, progress=100, completed_at, and all result
    /// fields in one write. Idempotent: a redelivered task observing an
    /// already-terminal row changes nothing.
    pub async fn complete(
        conn: &mut AsyncPgConnection,
        job_id: Uuid,
        outcome: &JobOutcome,
    ) -> Result<(), JobError> {
        use crate::schema::jobs::dsl::*;

        let now = Utc::now();
        let updated = diesel::update(jobs.filter(id.eq(job_id).and(status.ne_all(TERMINAL_STATUSES))))
            .set((
                status.eq(JobStatus::Completed),
                progress_percent.eq(100),
                result_path.eq(&outcome.result_path),
                markdown_content.eq(&outcome.markdown_content),
                title.eq(&outcome.title),
                author.eq(&outcome.author),
                word_count.eq(outcome.word_count),
                image_count.eq(outcome.image_count),
                completed_at.eq(Some(now)),
                updated_at.eq(now),
            ))
            .execute(conn)
            .await?;

        if updated == 0 {
            tracing::debug!(job_id = %job_id, "complete() on terminal job, no-op");
        }
        Ok(())
    }

    /// Terminal failure. Idempotent like `complete`.
    pub async fn fail(
        conn: &mut AsyncPgConnection,
        job_id: Uuid,
        error: &str,
    ) -> Result<(), JobError> {
        use crate::schema::jobs::dsl::*;

        let now = Utc::now();
        let updated = diesel::update(jobs.filter(id.eq(job_id).and(status.ne_all(TERMINAL_STATUSES))))
            .set((
                status.eq(JobStatus::Failed),
                error_message.eq(error),
                completed_at.eq(Some(now)),
                updated_at.eq(now),
            ))
            .execute(conn)
            .await?;

        if updated == 0 {
            tracing::debug!(job_id = %job_id, "fail() on terminal job, no-op");
        }
        Ok(())
    }
}

const TERMINAL_STATUSES: [JobStatus; 2] = [JobStatus::Completed, JobStatus::Failed];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Learning,
            JobStatus::Extracting,
            JobStatus::GeneratingDescriptions,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::GeneratingDescriptions.is_terminal());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::GeneratingDescriptions).unwrap();
        assert_eq!(json, "\"generating_descriptions\"");
    }

    #[test]
    fn job_payload_roundtrip() {
        let job = Job {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            url: "https://example.com/a".to_string(),
            domain: "example.com".to_string(),
            status: JobStatus::Queued,
            worker_type: Some("fast".to_string()),
            progress_percent: 0,
            progress_message: None,
            result_path: None,
            markdown_content: None,
            title: None,
            author: None,
            published_at: None,
            word_count: None,
            image_count: None,
            error_message: None,
            retry_count: 0,
            credits_used: 1,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let bytes = serde_json::to_vec(&job).unwrap();
        let parsed: Job = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.id, job.id);
        assert_eq!(parsed.domain, "example.com");
        assert_eq!(parsed.status, JobStatus::Queued);
    }
}
