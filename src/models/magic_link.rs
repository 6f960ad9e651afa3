use crate::models::link::Role;
use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

/// Issued generic link. The raw token is never stored, only its digest.
#[derive(Debug, Clone, PartialEq)]
pub struct MagicLink {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMagicLink {
    pub email: String,
    pub role: Role,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMagicLinkRequest {
    #[validate(required(message = "Invalid email format"))]
    #[validate(custom(function = "crate::models::validation::validate_email", message = "Invalid email format"))]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "crate::models::validation::validate_role", message = "Invalid role"))]
    pub role: String,
    /// Checked against the configured day range when issuing. `"3"` reads as 3.
    #[serde(default, deserialize_with = "crate::models::validation::whole_number")]
    pub days: Option<i64>,
    /// Mail the link to `email` after issuing it.
    #[serde(default)]
    pub send_email: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMagicLinkResponse {
    pub success: bool,
    pub message: String,
    pub email: String,
    pub token: String,
    pub link: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: String,
    pub note: String,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateMagicLinkResponse {
    pub success: bool,
    pub message: String,
    pub email: String,
    pub role: Role,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct VerifySessionResponse {
    pub success: bool,
    pub authenticated: bool,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}
