use rocket::serde::Serialize;
use schemars::JsonSchema;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema, sqlx::FromRow)]
pub struct MagicLinkStats {
    pub total_generated: i64,
    pub total_used: i64,
    /// Unused and not yet expired.
    pub active_links: i64,
    pub active_sessions: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema, sqlx::FromRow)]
pub struct JobLinkStats {
    pub total_jobs: i64,
    pub completed_jobs: i64,
    pub accepted_jobs: i64,
    pub pending_jobs: i64,
    pub active_sessions: i64,
    /// Jobs with at least one location report.
    pub tracked_jobs: i64,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct StatsResponse<T> {
    pub success: bool,
    pub stats: T,
}
