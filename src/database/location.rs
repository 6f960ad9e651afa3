use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::location::{LocationReport, NewLocationReport};
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait LocationRepository: Send + Sync {
    async fn append_location(&self, report: &NewLocationReport) -> Result<LocationReport, AppError>;
    async fn latest_location(&self, job_id: &str) -> Result<Option<LocationReport>, AppError>;
    /// Drops reports older than `cutoff`, returning how many were removed.
    async fn delete_locations_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait::async_trait]
impl LocationRepository for PostgresRepository {
    async fn append_location(&self, report: &NewLocationReport) -> Result<LocationReport, AppError> {
        let stored = sqlx::query_as::<_, LocationReport>(
            r#"
            INSERT INTO driver_locations (job_id, driver_email, latitude, longitude, accuracy, heading, speed)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, job_id, driver_email, latitude, longitude, accuracy, heading, speed, created_at
            "#,
        )
        .bind(&report.job_id)
        .bind(&report.driver_email)
        .bind(report.position.latitude)
        .bind(report.position.longitude)
        .bind(report.position.accuracy)
        .bind(report.position.heading)
        .bind(report.position.speed)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn latest_location(&self, job_id: &str) -> Result<Option<LocationReport>, AppError> {
        let report = sqlx::query_as::<_, LocationReport>(
            r#"
            SELECT id, job_id, driver_email, latitude, longitude, accuracy, heading, speed, created_at
            FROM driver_locations
            WHERE job_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(report)
    }

    async fn delete_locations_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM driver_locations WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
