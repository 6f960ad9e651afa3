use crate::models::link::Principal;
use chrono::{DateTime, Utc};

/// Session opened by a successful link validation.
///
/// The principal is copied from the link at creation time and never re-read, so
/// later changes to the originating link do not affect the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub principal: Principal,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Raw session credential together with the stored session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}
