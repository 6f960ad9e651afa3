use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::fmt;

/// Hex characters in every issued link token and session credential.
pub const TOKEN_LENGTH: usize = 32;

/// The two link families served by this process.
///
/// Both share issuance, single-use validation, session and rate-limit machinery and
/// differ only in payload shape, expiry defaults and the name of the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Magic,
    Job,
}

impl LinkKind {
    pub fn session_cookie(self) -> &'static str {
        match self {
            LinkKind::Magic => "session_token",
            LinkKind::Job => "job_session_token",
        }
    }

    /// The single message returned for unknown, consumed and expired tokens alike.
    pub fn invalid_message(self) -> &'static str {
        match self {
            LinkKind::Magic => "Invalid or expired magic link",
            LinkKind::Job => "Invalid or expired job link",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Magic => write!(f, "magic"),
            LinkKind::Job => write!(f, "job"),
        }
    }
}

/// Roles a generic magic link can be issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Driver,
    Customer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Driver => "driver",
            Role::Customer => "customer",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "admin" => Some(Role::Admin),
            "driver" => Some(Role::Driver),
            "customer" => Some(Role::Customer),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity a token or session is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    User { email: String, role: Role },
    Driver { job_id: String, driver_email: String },
}

impl Principal {
    pub fn kind(&self) -> LinkKind {
        match self {
            Principal::User { .. } => LinkKind::Magic,
            Principal::Driver { .. } => LinkKind::Job,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Principal::User { email, .. } => email,
            Principal::Driver { driver_email, .. } => driver_email,
        }
    }
}

/// Caller metadata captured on issuance.
#[derive(Debug, Clone, Default)]
pub struct RequestAudit {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
