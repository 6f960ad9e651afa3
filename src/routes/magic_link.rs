use crate::Config;
use crate::auth::{MagicSessionCredential, session_cookie};
use crate::database::Store;
use crate::database::stats::StatsRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::ClientAudit;
use crate::middleware::rate_limit::{MagicLinkIssueRateLimit, ValidateRateLimit};
use crate::models::audit::audit_events;
use crate::models::link::{LinkKind, Principal};
use crate::models::magic_link::{GenerateMagicLinkRequest, GenerateMagicLinkResponse, LogoutResponse, ValidateMagicLinkResponse, VerifySessionResponse};
use crate::models::stats::{MagicLinkStats, StatsResponse};
use crate::service::email::EmailService;
use crate::service::magic_link::MagicLinkService;
use crate::service::session::SessionGuard;
use rocket::State;
use rocket::http::{Cookie, CookieJar};
use rocket::serde::json::Json;
use rocket::{get, post};
use rocket_okapi::openapi;
use tracing::warn;

/// Issue a single-use sign-in link for an email and role
#[openapi(tag = "Magic Links")]
#[post("/generate", data = "<payload>")]
pub async fn generate_magic_link(
    store: &State<Store>,
    config: &State<Config>,
    _rate_limit: MagicLinkIssueRateLimit,
    audit: ClientAudit,
    payload: JsonBody<GenerateMagicLinkRequest>,
) -> Result<Json<GenerateMagicLinkResponse>, AppError> {
    let service = MagicLinkService::new(store.inner().as_ref(), config.inner());
    let issued = service.issue(&payload, &audit.0).await?;
    let expires_in = format!("{} days", issued.days);

    if payload.send_email {
        let email_service = EmailService::new(config.email.clone());
        if let Err(e) = email_service.send_magic_link_email(&issued.link.email, &issued.url, &expires_in).await {
            // The link stays valid; the caller still has it in the response.
            warn!(
                category = "audit",
                event = audit_events::LINK_DELIVERY_FAILED,
                kind = %LinkKind::Magic,
                error = ?e,
                "magic link email delivery failed"
            );
        }
    }

    Ok(Json(GenerateMagicLinkResponse {
        success: true,
        message: "Magic link generated successfully".to_string(),
        email: issued.link.email,
        token: issued.token,
        link: issued.url,
        expires_at: issued.link.expires_at,
        expires_in,
        note: "This link can only be used once".to_string(),
    }))
}

/// Consume a sign-in link and open a session
#[openapi(tag = "Magic Links")]
#[get("/validate/<token>")]
pub async fn validate_magic_link(
    store: &State<Store>,
    config: &State<Config>,
    _rate_limit: ValidateRateLimit,
    cookies: &CookieJar<'_>,
    token: &str,
) -> Result<Json<ValidateMagicLinkResponse>, AppError> {
    let service = MagicLinkService::new(store.inner().as_ref(), config.inner());
    let (link, issued) = service.validate(token).await?;

    cookies.add_private(session_cookie(LinkKind::Magic, issued.token.clone(), &config.session));

    Ok(Json(ValidateMagicLinkResponse {
        success: true,
        message: "Magic link validated successfully".to_string(),
        email: link.email,
        role: link.role,
        session_token: issued.token,
        expires_at: issued.session.expires_at,
    }))
}

/// Check the caller's session
#[openapi(tag = "Magic Links")]
#[get("/verify-session")]
pub async fn verify_session(
    store: &State<Store>,
    config: &State<Config>,
    credential: MagicSessionCredential,
) -> Result<Json<VerifySessionResponse>, AppError> {
    let credential = credential.0.ok_or_else(|| AppError::Unauthorized("No session found".to_string()))?;

    let guard = SessionGuard::new(store.inner().as_ref(), config.inner());
    let session = guard.authenticate(LinkKind::Magic, &credential).await?;
    let Some(Principal::User { email, role }) = session.map(|s| s.principal) else {
        return Err(AppError::Unauthorized("Session expired or invalid".to_string()));
    };

    Ok(Json(VerifySessionResponse {
        success: true,
        authenticated: true,
        email,
        role,
    }))
}

/// Revoke the caller's session
#[openapi(tag = "Magic Links")]
#[post("/logout")]
pub async fn logout(
    store: &State<Store>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
    credential: MagicSessionCredential,
) -> Result<Json<LogoutResponse>, AppError> {
    let credential = credential.0.ok_or_else(|| AppError::BadRequest("No session to revoke".to_string()))?;

    SessionGuard::new(store.inner().as_ref(), config.inner())
        .logout(LinkKind::Magic, &credential)
        .await?;
    cookies.remove_private(Cookie::build(LinkKind::Magic.session_cookie()).path("/").build());

    Ok(Json(LogoutResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    }))
}

/// Aggregate counts over generic links and sessions
#[openapi(tag = "Magic Links")]
#[get("/stats")]
pub async fn magic_link_stats(store: &State<Store>) -> Result<Json<StatsResponse<MagicLinkStats>>, AppError> {
    let stats = store.magic_link_stats().await?;
    Ok(Json(StatsResponse { success: true, stats }))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![generate_magic_link, validate_magic_link, verify_session, logout, magic_link_stats]
}
