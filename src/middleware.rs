pub mod rate_limit;

use crate::models::link::RequestAudit;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::{Data, Response};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use tracing::{info, warn};
use uuid::Uuid;

/// Request ID that is attached to every request for tracking
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new() -> Self {
        RequestId(Uuid::new_v4().to_string())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Path of the request with link tokens masked, safe to put in logs.
pub fn redacted_path(path: &str) -> String {
    let mut redact_next = false;
    path.split('/')
        .map(|segment| {
            let out = if redact_next && !segment.is_empty() { "***" } else { segment };
            redact_next = segment == "validate";
            out
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Fairing that adds request ID to all requests and logs request/response information
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        let request_id = RequestId::new();

        request.local_cache(|| Some(request_id.clone()));

        info!(
            request_id = %request_id.0,
            method = %request.method(),
            path = %redacted_path(request.uri().path().as_str()),
            "incoming request"
        );
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let request_id = request
            .local_cache(|| None::<RequestId>)
            .as_ref()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let status = response.status();
        let method = request.method();
        let path = redacted_path(request.uri().path().as_str());

        response.set_header(Header::new("X-Request-Id", request_id.clone()));

        response.set_header(Header::new("X-Content-Type-Options", "nosniff"));
        response.set_header(Header::new("X-Frame-Options", "DENY"));
        response.set_header(Header::new("Cache-Control", "no-store"));

        if status.class().is_server_error() || status.class().is_client_error() {
            warn!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = %status.code,
                "request completed with error"
            );
        } else {
            info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = %status.code,
                "request completed"
            );
        }
    }
}

// ── Audit guard ───────────────────────────────────────────────────────────────

/// Client IP and `User-Agent` of the caller, recorded on issued links.
pub struct ClientAudit(pub RequestAudit);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientAudit {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, ()> {
        Outcome::Success(ClientAudit(RequestAudit {
            ip_address: req.client_ip().map(|ip| ip.to_string()),
            user_agent: req.headers().get_one("User-Agent").map(|s| s.to_string()),
        }))
    }
}

impl<'a> OpenApiFromRequest<'a> for ClientAudit {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_creation() {
        let request_id = RequestId::new();
        assert!(Uuid::parse_str(&request_id.0).is_ok());
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new().0, RequestId::default().0);
    }

    #[test]
    fn validate_tokens_are_redacted() {
        assert_eq!(
            redacted_path("/api/magic-links/validate/0123456789abcdef0123456789abcdef"),
            "/api/magic-links/validate/***"
        );
        assert_eq!(redacted_path("/api/job-links/validate/abc"), "/api/job-links/validate/***");
    }

    #[test]
    fn other_paths_are_untouched() {
        assert_eq!(redacted_path("/api/job-links/job/J1"), "/api/job-links/job/J1");
        assert_eq!(redacted_path("/api/magic-links/validate"), "/api/magic-links/validate");
    }
}
