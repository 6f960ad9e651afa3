use crate::Config;
use crate::auth::{JobSessionCredential, session_cookie};
use crate::database::Store;
use crate::database::stats::StatsRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::ClientAudit;
use crate::middleware::rate_limit::{JobLinkIssueRateLimit, ValidateRateLimit};
use crate::models::audit::audit_events;
use crate::models::job_link::{
    CompleteJobResponse, CreateJobLinkRequest, CreateJobLinkResponse, IssuedJobDetails, JobResponse, SessionTokenBody, TripDetails, ValidateJobLinkResponse,
};
use crate::models::link::LinkKind;
use crate::models::location::{DriverLocationResponse, ReportedPosition, UpdateLocationRequest, UpdateLocationResponse};
use crate::models::stats::{JobLinkStats, StatsResponse};
use crate::service::email::EmailService;
use crate::service::job_link::JobLinkService;
use crate::service::location::LocationTracker;
use rocket::State;
use rocket::http::CookieJar;
use rocket::serde::json::Json;
use rocket::{get, post};
use rocket_okapi::openapi;
use tracing::warn;

/// Issue a job link bound to one driver and trip
#[openapi(tag = "Job Links")]
#[post("/create-for-job", data = "<payload>")]
pub async fn create_job_link(
    store: &State<Store>,
    config: &State<Config>,
    _rate_limit: JobLinkIssueRateLimit,
    audit: ClientAudit,
    payload: JsonBody<CreateJobLinkRequest>,
) -> Result<Json<CreateJobLinkResponse>, AppError> {
    let service = JobLinkService::new(store.inner().as_ref(), config.inner());
    let issued = service.issue(&payload, &audit.0).await?;
    let expires_in = format!("{} hours", issued.hours);

    if payload.send_email {
        let email_service = EmailService::new(config.email.clone());
        if let Err(e) = email_service.send_job_link_email(&issued.job, &issued.url, &expires_in).await {
            warn!(
                category = "audit",
                event = audit_events::LINK_DELIVERY_FAILED,
                kind = %LinkKind::Job,
                job_id = %issued.job.job_id,
                error = ?e,
                "job link email delivery failed"
            );
        }
    }

    let job = issued.job;
    Ok(Json(CreateJobLinkResponse {
        success: true,
        message: "Job link created successfully".to_string(),
        job_details: IssuedJobDetails {
            pickup: job.pickup.address,
            dropoff: job.dropoff.address,
            time: job.job_time,
            fare: job.fare,
        },
        job_id: job.job_id,
        driver_email: job.driver_email,
        token: issued.token,
        link: issued.url,
        expires_at: job.expires_at,
        expires_in,
    }))
}

/// Accept a job link and open a driver session
#[openapi(tag = "Job Links")]
#[get("/validate/<token>")]
pub async fn validate_job_link(
    store: &State<Store>,
    config: &State<Config>,
    _rate_limit: ValidateRateLimit,
    cookies: &CookieJar<'_>,
    token: &str,
) -> Result<Json<ValidateJobLinkResponse>, AppError> {
    let service = JobLinkService::new(store.inner().as_ref(), config.inner());
    let (job, issued) = service.validate(token).await?;

    cookies.add_private(session_cookie(LinkKind::Job, issued.token.clone(), &config.session));

    Ok(Json(ValidateJobLinkResponse {
        success: true,
        message: "Job link validated successfully".to_string(),
        job_details: TripDetails::from(&job),
        job_id: job.job_id,
        driver_email: job.driver_email,
        driver_name: job.driver_name,
        session_token: issued.token,
        expires_at: issued.session.expires_at,
    }))
}

/// Record the driver's current position
#[openapi(tag = "Job Links")]
#[post("/update-location/<job_id>", data = "<payload>")]
pub async fn update_location(
    store: &State<Store>,
    config: &State<Config>,
    credential: JobSessionCredential,
    job_id: &str,
    payload: Option<JsonBody<UpdateLocationRequest>>,
) -> Result<Json<UpdateLocationResponse>, AppError> {
    // An unreadable body still goes through the session check first.
    let payload = payload.map(|p| p.0).unwrap_or_default();
    let credential = credential.or_body(payload.session_token.clone());

    let tracker = LocationTracker::new(store.inner().as_ref(), config.inner());
    let report = tracker.report(job_id, &payload, credential.as_deref()).await?;

    Ok(Json(UpdateLocationResponse {
        success: true,
        message: "Location updated".to_string(),
        job_id: report.job_id,
        location: ReportedPosition {
            latitude: report.latitude,
            longitude: report.longitude,
        },
    }))
}

/// Latest reported position for a job
#[openapi(tag = "Job Links")]
#[get("/driver-location/<job_id>")]
pub async fn driver_location(store: &State<Store>, config: &State<Config>, job_id: &str) -> Result<Json<DriverLocationResponse>, AppError> {
    let report = LocationTracker::new(store.inner().as_ref(), config.inner()).latest(job_id).await?;
    Ok(Json(DriverLocationResponse {
        success: true,
        location: report.into(),
    }))
}

/// Job payload and current status
#[openapi(tag = "Job Links")]
#[get("/job/<job_id>")]
pub async fn get_job(store: &State<Store>, config: &State<Config>, job_id: &str) -> Result<Json<JobResponse>, AppError> {
    let job = JobLinkService::new(store.inner().as_ref(), config.inner()).get(job_id).await?;
    Ok(Json(JobResponse {
        success: true,
        job: job.into(),
    }))
}

/// Mark a job completed. Repeating the call succeeds.
#[openapi(tag = "Job Links")]
#[post("/complete-job/<job_id>", data = "<payload>")]
pub async fn complete_job(
    store: &State<Store>,
    config: &State<Config>,
    credential: JobSessionCredential,
    job_id: &str,
    payload: Option<JsonBody<SessionTokenBody>>,
) -> Result<Json<CompleteJobResponse>, AppError> {
    let credential = credential.or_body(payload.and_then(|p| p.0.session_token));

    let service = JobLinkService::new(store.inner().as_ref(), config.inner());
    let job = service.complete(job_id, credential.as_deref()).await?;

    Ok(Json(CompleteJobResponse {
        success: true,
        message: "Job completed successfully".to_string(),
        job_id: job.job_id,
    }))
}

/// Aggregate counts over jobs, driver sessions and tracking
#[openapi(tag = "Job Links")]
#[get("/stats")]
pub async fn job_link_stats(store: &State<Store>) -> Result<Json<StatsResponse<JobLinkStats>>, AppError> {
    let stats = store.job_link_stats().await?;
    Ok(Json(StatsResponse { success: true, stats }))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![
        create_job_link,
        validate_job_link,
        update_location,
        driver_location,
        get_job,
        complete_job,
        job_link_stats
    ]
}
