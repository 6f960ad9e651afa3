use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::stats::{JobLinkStats, MagicLinkStats};

#[async_trait::async_trait]
pub trait StatsRepository: Send + Sync {
    async fn magic_link_stats(&self) -> Result<MagicLinkStats, AppError>;
    async fn job_link_stats(&self) -> Result<JobLinkStats, AppError>;
}

#[async_trait::async_trait]
impl StatsRepository for PostgresRepository {
    async fn magic_link_stats(&self) -> Result<MagicLinkStats, AppError> {
        let stats = sqlx::query_as::<_, MagicLinkStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM magic_links) AS total_generated,
                (SELECT COUNT(*) FROM magic_links WHERE used) AS total_used,
                (SELECT COUNT(*) FROM magic_links WHERE NOT used AND expires_at > NOW()) AS active_links,
                (SELECT COUNT(*) FROM magic_link_sessions WHERE expires_at > NOW()) AS active_sessions
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }

    async fn job_link_stats(&self) -> Result<JobLinkStats, AppError> {
        let stats = sqlx::query_as::<_, JobLinkStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM jobs) AS total_jobs,
                (SELECT COUNT(*) FROM jobs WHERE job_status = 'completed') AS completed_jobs,
                (SELECT COUNT(*) FROM jobs WHERE job_status = 'accepted') AS accepted_jobs,
                (SELECT COUNT(*) FROM jobs WHERE job_status = 'pending') AS pending_jobs,
                (SELECT COUNT(*) FROM job_sessions WHERE expires_at > NOW()) AS active_sessions,
                (SELECT COUNT(DISTINCT job_id) FROM driver_locations) AS tracked_jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(stats)
    }
}
