use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

/// Job lifecycle. Only ever advances: pending, accepted, completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Accepted,
    Completed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Accepted => "accepted",
            JobStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<JobStatus> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "accepted" => Some(JobStatus::Accepted),
            "completed" => Some(JobStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Place {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

/// Issued job link with its trip payload.
#[derive(Debug, Clone, PartialEq)]
pub struct JobLink {
    pub id: Uuid,
    pub job_id: String,
    pub driver_email: String,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub pickup: Place,
    pub dropoff: Place,
    pub job_time: DateTime<Utc>,
    pub fare: Option<f64>,
    pub payment_status: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewJobLink {
    pub job_id: String,
    pub driver_email: String,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub pickup: Place,
    pub dropoff: Place,
    pub job_time: DateTime<Utc>,
    pub fare: Option<f64>,
    pub payment_status: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobLinkRequest {
    #[validate(required(message = "Missing required fields"))]
    #[validate(custom(function = "crate::models::validation::validate_not_blank", message = "Missing required fields"))]
    pub job_id: Option<String>,
    #[validate(required(message = "Missing required fields"))]
    #[validate(custom(function = "crate::models::validation::validate_not_blank", message = "Missing required fields"))]
    #[validate(custom(function = "crate::models::validation::validate_email", message = "Invalid driver email"))]
    pub driver_email: Option<String>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    #[validate(required(message = "Missing required fields"))]
    #[validate(custom(function = "crate::models::validation::validate_not_blank", message = "Missing required fields"))]
    pub pickup_address: Option<String>,
    #[validate(required(code = "missing_coordinates", message = "Invalid coordinates"))]
    #[validate(range(min = -90.0, max = 90.0, message = "Invalid coordinates"))]
    #[serde(default, deserialize_with = "crate::models::validation::number_or_absent")]
    pub pickup_lat: Option<f64>,
    #[validate(required(code = "missing_coordinates", message = "Invalid coordinates"))]
    #[validate(range(min = -180.0, max = 180.0, message = "Invalid coordinates"))]
    #[serde(default, deserialize_with = "crate::models::validation::number_or_absent")]
    pub pickup_lng: Option<f64>,
    #[validate(required(message = "Missing required fields"))]
    #[validate(custom(function = "crate::models::validation::validate_not_blank", message = "Missing required fields"))]
    pub dropoff_address: Option<String>,
    #[validate(required(code = "missing_coordinates", message = "Invalid coordinates"))]
    #[validate(range(min = -90.0, max = 90.0, message = "Invalid coordinates"))]
    #[serde(default, deserialize_with = "crate::models::validation::number_or_absent")]
    pub dropoff_lat: Option<f64>,
    #[validate(required(code = "missing_coordinates", message = "Invalid coordinates"))]
    #[validate(range(min = -180.0, max = 180.0, message = "Invalid coordinates"))]
    #[serde(default, deserialize_with = "crate::models::validation::number_or_absent")]
    pub dropoff_lng: Option<f64>,
    /// RFC 3339 timestamp of the scheduled pickup.
    #[validate(required(message = "Missing required fields"))]
    #[validate(custom(function = "crate::models::validation::validate_job_time", message = "Invalid job time"))]
    pub job_time: Option<String>,
    #[validate(range(min = 0.0, message = "Invalid fare"))]
    pub fare: Option<f64>,
    /// Checked against the configured maximum when issuing.
    #[serde(default, deserialize_with = "crate::models::validation::whole_number")]
    pub expiry_hours: Option<i64>,
    pub payment_status: Option<String>,
    #[serde(default)]
    pub send_email: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct IssuedJobDetails {
    pub pickup: String,
    pub dropoff: String,
    pub time: DateTime<Utc>,
    pub fare: Option<f64>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobLinkResponse {
    pub success: bool,
    pub message: String,
    pub job_id: String,
    pub driver_email: String,
    pub token: String,
    pub link: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: String,
    pub job_details: IssuedJobDetails,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripDetails {
    pub job_id: String,
    pub pickup: Place,
    pub dropoff: Place,
    pub time: DateTime<Utc>,
    pub fare: Option<f64>,
    pub status: JobStatus,
}

impl From<&JobLink> for TripDetails {
    fn from(job: &JobLink) -> Self {
        Self {
            job_id: job.job_id.clone(),
            pickup: job.pickup.clone(),
            dropoff: job.dropoff.clone(),
            time: job.job_time,
            fare: job.fare,
            status: job.status,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateJobLinkResponse {
    pub success: bool,
    pub message: String,
    pub job_id: String,
    pub driver_email: String,
    pub driver_name: Option<String>,
    pub session_token: String,
    pub job_details: TripDetails,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub job_id: String,
    pub driver_email: String,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub pickup: Place,
    pub dropoff: Place,
    pub job_time: DateTime<Utc>,
    pub fare: Option<f64>,
    pub status: JobStatus,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<JobLink> for JobView {
    fn from(job: JobLink) -> Self {
        Self {
            job_id: job.job_id,
            driver_email: job.driver_email,
            driver_name: job.driver_name,
            driver_phone: job.driver_phone,
            pickup: job.pickup,
            dropoff: job.dropoff,
            job_time: job.job_time,
            fare: job.fare,
            status: job.status,
            payment_status: job.payment_status,
            created_at: job.created_at,
            accepted_at: job.accepted_at,
            completed_at: job.completed_at,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct JobResponse {
    pub success: bool,
    pub job: JobView,
}

/// Body of `complete-job`; the credential may come from the cookie instead.
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokenBody {
    pub session_token: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteJobResponse {
    pub success: bool,
    pub message: String,
    pub job_id: String,
}
