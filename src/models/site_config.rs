// Site config model: domain-keyed extraction recipe
// Rows are created by the learning worker; the core reads and updates stats

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::OptionalExtension;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use uuid::Uuid;

use crate::schema::site_configs;

#[derive(Debug, Clone, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = site_configs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SiteConfig {
    pub id: Uuid,
    pub domain: String,
    pub config_yaml: String,
    pub requires_browser: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learned_by_user_id: Option<Uuid>,
    pub learned_at: DateTime<Utc>,
    pub learn_iterations: i32,
    pub success_count: i32,
    pub failure_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_extraction_time_ms: Option<i32>,
    pub version: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = site_configs)]
pub struct NewSiteConfig {
    pub domain: String,
    pub config_yaml: String,
    pub requires_browser: bool,
    pub learned_by_user_id: Option<Uuid>,
    pub learn_iterations: i32,
}

#[derive(thiserror::Error, Debug)]
pub enum SiteConfigError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Site config not found")]
    NotFound,
}

impl SiteConfig {
    /// The routing lookup: is there a recipe for this domain?
    pub async fn find_by_domain(
        conn: &mut AsyncPgConnection,
        lookup: &str,
    ) -> Result<Option<Self>, SiteConfigError> {
        use crate::schema::site_configs::dsl::*;

        site_configs
            .filter(domain.eq(lookup))
            .first::<SiteConfig>(conn)
            .await
            .optional()
            .map_err(SiteConfigError::Database)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_config: NewSiteConfig,
    ) -> Result<Self, SiteConfigError> {
        diesel::insert_into(site_configs::table)
            .values(&new_config)
            .get_result::<SiteConfig>(conn)
            .await
            .map_err(SiteConfigError::Database)
    }

    /// Record a terminal extraction outcome for this domain. On success the
    /// rolling average is `ms` for the first sample, `(avg + ms) / 2` after.
    pub async fn update_usage_stats(
        conn: &mut AsyncPgConnection,
        lookup: &str,
        success: bool,
        extraction_time_ms: i32,
    ) -> Result<(), SiteConfigError> {
        use crate::schema::site_configs::dsl::*;

        if success {
            let current_avg: Option<Option<i32>> = site_configs
                .filter(domain.eq(lookup))
                .select(avg_extraction_time_ms)
                .first(conn)
                .await
                .optional()?;

            let Some(current_avg) = current_avg else {
                return Ok(());
            };

            let new_avg = match current_avg {
                None => extraction_time_ms,
                Some(avg) => (avg + extraction_time_ms) / 2,
            };

            let now = chrono::Utc::now();
            diesel::update(site_configs.filter(domain.eq(lookup)))
                .set((
                    success_count.eq(success_count + 1),
                    last_used_at.eq(Some(now)),
                    avg_extraction_time_ms.eq(new_avg),
                    updated_at.eq(now),
                ))
                .execute(conn)
                .await?;
        } else {
            let now = chrono::Utc::now();
            diesel::update(site_configs.filter(domain.eq(lookup)))
                .set((
                    failure_count.eq(failure_count + 1),
                    last_used_at.eq(Some(now)),
                    updated_at.eq(now),
                ))
                .execute(conn)
                .await?;
        }

        Ok(())
    }
}
