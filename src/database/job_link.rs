use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::job_link::{JobLink, JobStatus, NewJobLink, Place};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait JobLinkRepository: Send + Sync {
    async fn create_job_link(&self, link: &NewJobLink) -> Result<JobLink, AppError>;
    /// Moves a pending or accepted, unexpired job to accepted. `None` if nothing matched.
    async fn accept_job_link(&self, token_hash: &str) -> Result<Option<JobLink>, AppError>;
    async fn get_job_link(&self, job_id: &str) -> Result<Option<JobLink>, AppError>;
    /// Marks the job completed, keeping the first completion time.
    async fn complete_job_link(&self, job_id: &str) -> Result<Option<JobLink>, AppError>;
}

const JOB_COLUMNS: &str = "id, job_id, driver_email, driver_name, driver_phone, \
    pickup_address, pickup_lat, pickup_lng, dropoff_address, dropoff_lat, dropoff_lng, \
    job_time, fare, payment_status, job_status, created_at, expires_at, accepted_at, completed_at, \
    ip_address, user_agent";

#[derive(Debug, sqlx::FromRow)]
struct JobLinkRow {
    id: Uuid,
    job_id: String,
    driver_email: String,
    driver_name: Option<String>,
    driver_phone: Option<String>,
    pickup_address: String,
    pickup_lat: f64,
    pickup_lng: f64,
    dropoff_address: String,
    dropoff_lat: f64,
    dropoff_lng: f64,
    job_time: DateTime<Utc>,
    fare: Option<f64>,
    payment_status: String,
    job_status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl TryFrom<JobLinkRow> for JobLink {
    type Error = AppError;

    fn try_from(row: JobLinkRow) -> Result<Self, Self::Error> {
        let status = JobStatus::parse(&row.job_status).ok_or_else(|| AppError::Internal(format!("unknown status stored on job {}", row.id)))?;
        Ok(JobLink {
            id: row.id,
            job_id: row.job_id,
            driver_email: row.driver_email,
            driver_name: row.driver_name,
            driver_phone: row.driver_phone,
            pickup: Place {
                address: row.pickup_address,
                lat: row.pickup_lat,
                lng: row.pickup_lng,
            },
            dropoff: Place {
                address: row.dropoff_address,
                lat: row.dropoff_lat,
                lng: row.dropoff_lng,
            },
            job_time: row.job_time,
            fare: row.fare,
            payment_status: row.payment_status,
            status,
            created_at: row.created_at,
            expires_at: row.expires_at,
            accepted_at: row.accepted_at,
            completed_at: row.completed_at,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
        })
    }
}

#[async_trait::async_trait]
impl JobLinkRepository for PostgresRepository {
    async fn create_job_link(&self, link: &NewJobLink) -> Result<JobLink, AppError> {
        let query = format!(
            r#"
            INSERT INTO jobs (
                job_id, driver_email, driver_name, driver_phone, token_hash,
                pickup_address, pickup_lat, pickup_lng,
                dropoff_address, dropoff_lat, dropoff_lng,
                job_time, fare, payment_status, expires_at, ip_address, user_agent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {JOB_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, JobLinkRow>(&query)
            .bind(&link.job_id)
            .bind(&link.driver_email)
            .bind(&link.driver_name)
            .bind(&link.driver_phone)
            .bind(&link.token_hash)
            .bind(&link.pickup.address)
            .bind(link.pickup.lat)
            .bind(link.pickup.lng)
            .bind(&link.dropoff.address)
            .bind(link.dropoff.lat)
            .bind(link.dropoff.lng)
            .bind(link.job_time)
            .bind(link.fare)
            .bind(&link.payment_status)
            .bind(link.expires_at)
            .bind(&link.ip_address)
            .bind(&link.user_agent)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::Conflict(format!("Job {} already exists", link.job_id)),
                _ => AppError::db("Failed to create job link", e),
            })?;

        row.try_into()
    }

    async fn accept_job_link(&self, token_hash: &str) -> Result<Option<JobLink>, AppError> {
        let query = format!(
            r#"
            UPDATE jobs
            SET job_status = 'accepted',
                accepted_at = COALESCE(accepted_at, NOW())
            WHERE token_hash = $1
              AND job_status <> 'completed'
              AND expires_at > NOW()
            RETURNING {JOB_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, JobLinkRow>(&query).bind(token_hash).fetch_optional(&self.pool).await?;

        row.map(JobLink::try_from).transpose()
    }

    async fn get_job_link(&self, job_id: &str) -> Result<Option<JobLink>, AppError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1");

        let row = sqlx::query_as::<_, JobLinkRow>(&query).bind(job_id).fetch_optional(&self.pool).await?;

        row.map(JobLink::try_from).transpose()
    }

    async fn complete_job_link(&self, job_id: &str) -> Result<Option<JobLink>, AppError> {
        let query = format!(
            r#"
            UPDATE jobs
            SET job_status = 'completed',
                completed_at = COALESCE(completed_at, NOW())
            WHERE job_id = $1
            RETURNING {JOB_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, JobLinkRow>(&query).bind(job_id).fetch_optional(&self.pool).await?;

        row.map(JobLink::try_from).transpose()
    }
}
