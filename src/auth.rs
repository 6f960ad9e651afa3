use crate::config::SessionConfig;
use crate::models::link::LinkKind;
use rocket::http::{Cookie, SameSite};
use rocket::request::{FromRequest, Outcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{Object, SecurityRequirement, SecurityScheme, SecuritySchemeData};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};

/// Raw generic-session credential, from the private cookie or an `Authorization: Bearer` header.
///
/// Never fails: handlers decide which message a missing credential gets.
#[derive(Debug, Clone)]
pub struct MagicSessionCredential(pub Option<String>);

/// Raw driver-session credential from the private cookie.
///
/// Job endpoints also accept `sessionToken` in the body, which takes precedence.
#[derive(Debug, Clone)]
pub struct JobSessionCredential(pub Option<String>);

impl JobSessionCredential {
    pub fn or_body(self, body_token: Option<String>) -> Option<String> {
        body_token.filter(|t| !t.is_empty()).or(self.0)
    }
}

pub(crate) fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn private_cookie(req: &Request<'_>, kind: LinkKind) -> Option<String> {
    req.cookies().get_private(kind.session_cookie()).map(|c| c.value().to_string())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MagicSessionCredential {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, ()> {
        let credential = private_cookie(req, LinkKind::Magic)
            .or_else(|| req.headers().get_one("Authorization").and_then(bearer_token).map(str::to_string));
        Outcome::Success(MagicSessionCredential(credential))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for JobSessionCredential {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, ()> {
        Outcome::Success(JobSessionCredential(private_cookie(req, LinkKind::Job)))
    }
}

fn cookie_security(kind: LinkKind, description: &str) -> rocket_okapi::Result<RequestHeaderInput> {
    let scheme_name = format!("{}SessionCookie", kind);
    let security_scheme = SecurityScheme {
        description: Some(description.to_string()),
        data: SecuritySchemeData::ApiKey {
            name: kind.session_cookie().to_string(),
            location: "cookie".to_string(),
        },
        extensions: Object::default(),
    };

    let mut security_req = SecurityRequirement::new();
    security_req.insert(scheme_name.clone(), Vec::new());

    Ok(RequestHeaderInput::Security(scheme_name, security_scheme, security_req))
}

impl<'a> OpenApiFromRequest<'a> for MagicSessionCredential {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        cookie_security(
            LinkKind::Magic,
            "Session cookie set by GET /api/magic-links/validate/{token}. A Bearer header with the session token also works.",
        )
    }
}

impl<'a> OpenApiFromRequest<'a> for JobSessionCredential {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        cookie_security(LinkKind::Job, "Driver session cookie set by GET /api/job-links/validate/{token}.")
    }
}

/// Session cookie for a freshly opened session. Lifetime matches the server-side TTL.
pub fn session_cookie(kind: LinkKind, token: String, config: &SessionConfig) -> Cookie<'static> {
    let ttl_hours = match kind {
        LinkKind::Magic => config.magic_session_ttl_hours,
        LinkKind::Job => config.job_session_ttl_hours,
    };

    Cookie::build((kind.session_cookie(), token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(config.cookie_secure)
        .path("/")
        .max_age(rocket::time::Duration::hours(ttl_hours))
        .build()
}
