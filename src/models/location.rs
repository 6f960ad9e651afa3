use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;

/// Immutable position report. The latest one per job is the driver's current location.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LocationReport {
    pub id: Uuid,
    pub job_id: String,
    pub driver_email: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLocationReport {
    pub job_id: String,
    pub driver_email: String,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
}

/// Coordinates are range-checked by the tracker, after the session check.
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationRequest {
    #[serde(default, deserialize_with = "crate::models::validation::number_or_absent")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "crate::models::validation::number_or_absent")]
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub session_token: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReportedPosition {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLocationResponse {
    pub success: bool,
    pub message: String,
    pub job_id: String,
    pub location: ReportedPosition,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct LatestLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl From<LocationReport> for LatestLocation {
    fn from(report: LocationReport) -> Self {
        Self {
            latitude: report.latitude,
            longitude: report.longitude,
            accuracy: report.accuracy,
            heading: report.heading,
            speed: report.speed,
            timestamp: report.created_at,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DriverLocationResponse {
    pub success: bool,
    pub location: LatestLocation,
}
