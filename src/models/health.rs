use rocket::serde::Serialize;
use schemars::JsonSchema;

#[derive(Debug, Serialize, JsonSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}
