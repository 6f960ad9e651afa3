use crate::Config;
use crate::database::LinkStore;
use crate::database::magic_link::MagicLinkRepository;
use crate::error::app_error::AppError;
use crate::models::audit::audit_events;
use crate::models::link::{LinkKind, Principal, RequestAudit, Role};
use crate::models::magic_link::{GenerateMagicLinkRequest, MagicLink, NewMagicLink};
use crate::models::session::IssuedSession;
use crate::service::session::SessionGuard;
use crate::service::token::{generate_token, hash_token, is_well_formed, share_url};
use chrono::{Duration, Utc};
use tracing::{error, info};
use validator::Validate;

/// A freshly issued generic link. `token` is the only copy of the raw value.
#[derive(Debug)]
pub struct IssuedMagicLink {
    pub link: MagicLink,
    pub token: String,
    pub url: String,
    pub days: i64,
}

pub struct MagicLinkService<'a> {
    pub store: &'a dyn LinkStore,
    pub config: &'a Config,
}

impl<'a> MagicLinkService<'a> {
    pub fn new(store: &'a dyn LinkStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    pub async fn issue(&self, request: &GenerateMagicLinkRequest, audit: &RequestAudit) -> Result<IssuedMagicLink, AppError> {
        request.validate()?;

        let settings = &self.config.magic_link;
        let days = request.days.unwrap_or(settings.default_days);
        if !(settings.min_days..=settings.max_days).contains(&days) {
            return Err(AppError::BadRequest(format!(
                "Invalid expiry days (must be {}-{})",
                settings.min_days, settings.max_days
            )));
        }
        let role = Role::parse(&request.role).ok_or_else(|| AppError::BadRequest("Invalid role".to_string()))?;
        let email = request.email.clone().ok_or_else(|| AppError::BadRequest("Invalid email format".to_string()))?;

        let token = generate_token();
        let new_link = NewMagicLink {
            email,
            role,
            token_hash: hash_token(&token),
            expires_at: Utc::now() + Duration::days(days),
            ip_address: audit.ip_address.clone(),
            user_agent: audit.user_agent.clone(),
        };

        let link = self.store.upsert_magic_link(&new_link).await?;
        let url = share_url(&settings.public_base_url, &settings.verify_path, &token);

        info!(
            category = "audit",
            event = audit_events::LINK_ISSUED,
            kind = %LinkKind::Magic,
            email = %link.email,
            role = %link.role,
            days,
            ip = audit.ip_address.as_deref().unwrap_or("unknown"),
            "magic link issued"
        );

        Ok(IssuedMagicLink { link, token, url, days })
    }

    /// Consumes the link exactly once and opens a session for its principal.
    pub async fn validate(&self, token: &str) -> Result<(MagicLink, IssuedSession), AppError> {
        if !is_well_formed(token) {
            return Err(AppError::BadRequest("Invalid token format".to_string()));
        }

        let Some(link) = self.store.consume_magic_link(&hash_token(token)).await? else {
            info!(category = "audit", event = audit_events::LINK_REJECTED, kind = %LinkKind::Magic, "magic link rejected");
            return Err(AppError::InvalidOrExpired(LinkKind::Magic));
        };

        info!(
            category = "audit",
            event = audit_events::LINK_CONSUMED,
            kind = %LinkKind::Magic,
            email = %link.email,
            role = %link.role,
            "magic link consumed"
        );

        let principal = Principal::User {
            email: link.email.clone(),
            role: link.role,
        };
        let session = SessionGuard::new(self.store, self.config).open(principal).await.map_err(|e| {
            // The link is already burned; the caller has to request a new one.
            error!(error = ?e, email = %link.email, "session creation failed after magic link was consumed");
            AppError::Internal("Failed to create session".to_string())
        })?;

        Ok((link, session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryStore, test_config};
    use std::sync::Arc;

    fn request(email: &str, role: &str, days: Option<i64>) -> GenerateMagicLinkRequest {
        GenerateMagicLinkRequest {
            email: Some(email.to_string()),
            role: role.to_string(),
            days,
            send_email: false,
        }
    }

    #[rocket::async_test]
    async fn generic_flow_issues_consumes_and_opens_session() {
        let store = InMemoryStore::default();
        let config = test_config();
        let service = MagicLinkService::new(&store, &config);

        let issued = service.issue(&request("a@b.com", "customer", Some(1)), &RequestAudit::default()).await.unwrap();
        let expected = Utc::now() + Duration::hours(24);
        assert!((issued.link.expires_at - expected).num_seconds().abs() < 5);
        assert!(issued.url.ends_with(&format!("/auth/verify?token={}", issued.token)));
        assert!(!issued.link.used);

        let (link, session) = service.validate(&issued.token).await.unwrap();
        assert!(link.used);
        assert!(link.used_at.is_some());
        assert_eq!(
            session.session.principal,
            Principal::User {
                email: "a@b.com".to_string(),
                role: Role::Customer
            }
        );

        let second = service.validate(&issued.token).await.unwrap_err();
        assert!(matches!(second, AppError::InvalidOrExpired(LinkKind::Magic)));

        let guard = SessionGuard::new(&store, &config);
        assert!(guard.authenticate(LinkKind::Magic, &session.token).await.unwrap().is_some());
    }

    #[rocket::async_test]
    async fn default_expiry_is_three_days() {
        let store = InMemoryStore::default();
        let config = test_config();
        let service = MagicLinkService::new(&store, &config);

        let issued = service.issue(&request("a@b.com", "admin", None), &RequestAudit::default()).await.unwrap();
        assert_eq!(issued.days, 3);
        assert!(issued.link.expires_at > Utc::now() + Duration::days(3) - Duration::minutes(1));
    }

    #[rocket::async_test]
    async fn role_enumeration_is_enforced() {
        let store = InMemoryStore::default();
        let config = test_config();
        let service = MagicLinkService::new(&store, &config);

        let err = service.issue(&request("a@b.com", "superuser", Some(3)), &RequestAudit::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid role");
        assert!(service.issue(&request("a@b.com", "driver", Some(3)), &RequestAudit::default()).await.is_ok());
    }

    #[rocket::async_test]
    async fn day_range_is_enforced() {
        let store = InMemoryStore::default();
        let config = test_config();
        let service = MagicLinkService::new(&store, &config);

        for days in [0, 6, -1] {
            let err = service.issue(&request("a@b.com", "admin", Some(days)), &RequestAudit::default()).await.unwrap_err();
            assert_eq!(err.to_string(), "Invalid expiry days (must be 1-5)");
        }
        assert_eq!(store.magic_link_count().await, 0);
    }

    #[rocket::async_test]
    async fn invalid_email_is_rejected_without_store_write() {
        let store = InMemoryStore::default();
        let config = test_config();
        let service = MagicLinkService::new(&store, &config);

        let err = service.issue(&request("not-an-email", "admin", Some(1)), &RequestAudit::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid email format");
        assert_eq!(store.magic_link_count().await, 0);
    }

    #[rocket::async_test]
    async fn reissue_for_same_email_supersedes_previous_link() {
        let store = InMemoryStore::default();
        let config = test_config();
        let service = MagicLinkService::new(&store, &config);
        let audit = RequestAudit::default();

        let first = service.issue(&request("a@b.com", "customer", Some(1)), &audit).await.unwrap();
        let second = service.issue(&request("a@b.com", "admin", Some(2)), &audit).await.unwrap();

        assert!(matches!(service.validate(&first.token).await, Err(AppError::InvalidOrExpired(_))));
        let (link, _) = service.validate(&second.token).await.unwrap();
        assert_eq!(link.role, Role::Admin);
        assert_eq!(store.magic_link_count().await, 1);
    }

    #[rocket::async_test]
    async fn audit_metadata_is_recorded() {
        let store = InMemoryStore::default();
        let config = test_config();
        let service = MagicLinkService::new(&store, &config);
        let audit = RequestAudit {
            ip_address: Some("10.1.2.3".to_string()),
            user_agent: Some("curl/8".to_string()),
        };

        let issued = service.issue(&request("a@b.com", "customer", None), &audit).await.unwrap();
        assert_eq!(issued.link.ip_address.as_deref(), Some("10.1.2.3"));
        assert_eq!(issued.link.user_agent.as_deref(), Some("curl/8"));
    }

    #[rocket::async_test]
    async fn malformed_token_is_rejected_before_lookup() {
        let store = InMemoryStore::default();
        let config = test_config();
        let service = MagicLinkService::new(&store, &config);

        let err = service.validate("too-short").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid token format");
        assert_eq!(store.lookup_count(), 0);
    }

    #[rocket::async_test]
    async fn unknown_used_and_expired_tokens_share_one_error() {
        let store = InMemoryStore::default();
        let config = test_config();
        let service = MagicLinkService::new(&store, &config);
        let audit = RequestAudit::default();

        let unknown = service.validate(&generate_token()).await.unwrap_err().to_string();

        let used = service.issue(&request("u@b.com", "customer", None), &audit).await.unwrap();
        service.validate(&used.token).await.unwrap();
        let used = service.validate(&used.token).await.unwrap_err().to_string();

        let expired = service.issue(&request("e@b.com", "customer", None), &audit).await.unwrap();
        store.expire_magic_link("e@b.com").await;
        let expired = service.validate(&expired.token).await.unwrap_err().to_string();

        assert_eq!(unknown, "Invalid or expired magic link");
        assert_eq!(unknown, used);
        assert_eq!(unknown, expired);
    }

    #[rocket::async_test]
    async fn expired_token_stays_invalid_even_if_unused() {
        let store = InMemoryStore::default();
        let config = test_config();
        let service = MagicLinkService::new(&store, &config);

        let issued = service.issue(&request("a@b.com", "driver", None), &RequestAudit::default()).await.unwrap();
        store.expire_magic_link("a@b.com").await;

        assert!(matches!(service.validate(&issued.token).await, Err(AppError::InvalidOrExpired(LinkKind::Magic))));
        assert_eq!(store.active_session_count(LinkKind::Magic).await, 0);
    }

    #[rocket::async_test]
    async fn concurrent_validation_succeeds_exactly_once() {
        let store = Arc::new(InMemoryStore::default());
        let config = Arc::new(test_config());
        let issued = MagicLinkService::new(store.as_ref(), &config)
            .issue(&request("race@b.com", "customer", None), &RequestAudit::default())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let config = config.clone();
            let token = issued.token.clone();
            handles.push(tokio::spawn(async move {
                MagicLinkService::new(store.as_ref(), &config).validate(&token).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert!(matches!(e, AppError::InvalidOrExpired(LinkKind::Magic))),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(store.active_session_count(LinkKind::Magic).await, 1);
    }

    #[rocket::async_test]
    async fn session_failure_after_consumption_is_a_hard_error() {
        let store = InMemoryStore::default();
        let config = test_config();
        let service = MagicLinkService::new(&store, &config);

        let issued = service.issue(&request("a@b.com", "customer", None), &RequestAudit::default()).await.unwrap();
        store.fail_session_creation(true);

        let err = service.validate(&issued.token).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        store.fail_session_creation(false);
        assert!(matches!(service.validate(&issued.token).await, Err(AppError::InvalidOrExpired(_))));
    }
}
