use crate::Config;
use crate::database::LinkStore;
use crate::database::job_link::JobLinkRepository;
use crate::error::app_error::AppError;
use crate::models::audit::audit_events;
use crate::models::job_link::{CreateJobLinkRequest, JobLink, NewJobLink, Place};
use crate::models::link::{LinkKind, Principal, RequestAudit};
use crate::models::session::IssuedSession;
use crate::models::validation::parse_job_time;
use crate::service::session::SessionGuard;
use crate::service::token::{generate_token, hash_token, is_well_formed, share_url};
use chrono::{Duration, Utc};
use tracing::{error, info};
use validator::Validate;

#[derive(Debug)]
pub struct IssuedJobLink {
    pub job: JobLink,
    pub token: String,
    pub url: String,
    pub hours: i64,
}

pub struct JobLinkService<'a> {
    pub store: &'a dyn LinkStore,
    pub config: &'a Config,
}

fn missing_fields() -> AppError {
    AppError::BadRequest("Missing required fields".to_string())
}

fn place(address: &Option<String>, lat: Option<f64>, lng: Option<f64>) -> Result<Place, AppError> {
    let address = address.as_ref().ok_or_else(missing_fields)?;
    match (lat, lng) {
        (Some(lat), Some(lng)) => Ok(Place {
            address: address.trim().to_string(),
            lat,
            lng,
        }),
        _ => Err(AppError::BadRequest("Invalid coordinates".to_string())),
    }
}

impl<'a> JobLinkService<'a> {
    pub fn new(store: &'a dyn LinkStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    pub async fn issue(&self, request: &CreateJobLinkRequest, audit: &RequestAudit) -> Result<IssuedJobLink, AppError> {
        request.validate()?;

        let settings = &self.config.job_link;
        let hours = request.expiry_hours.unwrap_or(settings.default_expiry_hours);
        if !(1..=settings.max_expiry_hours).contains(&hours) {
            return Err(AppError::BadRequest(format!(
                "Invalid expiry hours (must be 1-{})",
                settings.max_expiry_hours
            )));
        }

        let job_id = request.job_id.as_deref().map(str::trim).ok_or_else(missing_fields)?;
        let driver_email = request.driver_email.clone().ok_or_else(missing_fields)?;
        let job_time = request.job_time.as_deref().and_then(parse_job_time).ok_or_else(missing_fields)?;

        let token = generate_token();
        let new_job = NewJobLink {
            job_id: job_id.to_string(),
            driver_email,
            driver_name: request.driver_name.clone(),
            driver_phone: request.driver_phone.clone(),
            pickup: place(&request.pickup_address, request.pickup_lat, request.pickup_lng)?,
            dropoff: place(&request.dropoff_address, request.dropoff_lat, request.dropoff_lng)?,
            job_time,
            fare: request.fare,
            payment_status: request.payment_status.clone().unwrap_or_else(|| "pending".to_string()),
            token_hash: hash_token(&token),
            expires_at: Utc::now() + Duration::hours(hours),
            ip_address: audit.ip_address.clone(),
            user_agent: audit.user_agent.clone(),
        };

        let job = self.store.create_job_link(&new_job).await?;
        let url = share_url(&settings.public_base_url, &settings.driver_path, &token);

        info!(
            category = "audit",
            event = audit_events::LINK_ISSUED,
            kind = %LinkKind::Job,
            job_id = %job.job_id,
            email = %job.driver_email,
            hours,
            ip = audit.ip_address.as_deref().unwrap_or("unknown"),
            "job link issued"
        );

        Ok(IssuedJobLink { job, token, url, hours })
    }

    /// Accepts the job (re-opening an accepted one is allowed) and opens a driver session.
    pub async fn validate(&self, token: &str) -> Result<(JobLink, IssuedSession), AppError> {
        if !is_well_formed(token) {
            return Err(AppError::BadRequest("Invalid token format".to_string()));
        }

        let Some(job) = self.store.accept_job_link(&hash_token(token)).await? else {
            info!(category = "audit", event = audit_events::LINK_REJECTED, kind = %LinkKind::Job, "job link rejected");
            return Err(AppError::InvalidOrExpired(LinkKind::Job));
        };

        info!(
            category = "audit",
            event = audit_events::JOB_ACCEPTED,
            kind = %LinkKind::Job,
            job_id = %job.job_id,
            email = %job.driver_email,
            "job accepted"
        );

        let principal = Principal::Driver {
            job_id: job.job_id.clone(),
            driver_email: job.driver_email.clone(),
        };
        let session = SessionGuard::new(self.store, self.config).open(principal).await.map_err(|e| {
            error!(error = ?e, job_id = %job.job_id, "session creation failed after job link was accepted");
            AppError::Internal("Failed to create session".to_string())
        })?;

        Ok((job, session))
    }

    pub async fn get(&self, job_id: &str) -> Result<JobLink, AppError> {
        self.store
            .get_job_link(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Job not found".to_string()))
    }

    /// Completing an already completed job succeeds and keeps the first completion time.
    pub async fn complete(&self, job_id: &str, credential: Option<&str>) -> Result<JobLink, AppError> {
        let invalid_session = || AppError::Unauthorized("Invalid session".to_string());

        let credential = credential.ok_or_else(invalid_session)?;
        let guard = SessionGuard::new(self.store, self.config);
        guard.resolve_driver(job_id, credential).await?.ok_or_else(invalid_session)?;
        guard.touch(LinkKind::Job, credential).await;

        let job = self
            .store
            .complete_job_link(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;

        info!(
            category = "audit",
            event = audit_events::JOB_COMPLETED,
            kind = %LinkKind::Job,
            job_id = %job.job_id,
            email = %job.driver_email,
            "job completed"
        );

        Ok(job)
    }
}
