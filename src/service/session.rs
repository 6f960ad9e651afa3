use crate::Config;
use crate::database::LinkStore;
use crate::database::session::SessionRepository;
use crate::error::app_error::AppError;
use crate::models::audit::audit_events;
use crate::models::link::{LinkKind, Principal};
use crate::models::session::{IssuedSession, NewSession, Session};
use crate::service::token::{generate_token, hash_token, is_well_formed};
use chrono::{Duration, Utc};
use tracing::{info, warn};

/// Opens, resolves and revokes sessions for both link families.
pub struct SessionGuard<'a> {
    pub store: &'a dyn LinkStore,
    pub config: &'a Config,
}

impl<'a> SessionGuard<'a> {
    pub fn new(store: &'a dyn LinkStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    pub fn ttl(&self, kind: LinkKind) -> Duration {
        match kind {
            LinkKind::Magic => Duration::hours(self.config.session.magic_session_ttl_hours),
            LinkKind::Job => Duration::hours(self.config.session.job_session_ttl_hours),
        }
    }

    /// Only call once the originating link transition has been stored.
    pub async fn open(&self, principal: Principal) -> Result<IssuedSession, AppError> {
        let kind = principal.kind();
        let token = generate_token();
        let new_session = NewSession {
            principal,
            token_hash: hash_token(&token),
            expires_at: Utc::now() + self.ttl(kind),
        };

        let session = self.store.create_session(&new_session).await?;

        info!(
            category = "audit",
            event = audit_events::SESSION_CREATED,
            kind = %kind,
            email = %session.principal.email(),
            expires_at = %session.expires_at,
            "session created"
        );

        Ok(IssuedSession { token, session })
    }

    /// Looks the credential up without refreshing its activity time.
    pub async fn resolve(&self, kind: LinkKind, credential: &str) -> Result<Option<Session>, AppError> {
        if !is_well_formed(credential) {
            return Ok(None);
        }
        self.store.get_active_session(kind, &hash_token(credential)).await
    }

    /// Resolves the credential and bumps `last_activity` on success.
    pub async fn authenticate(&self, kind: LinkKind, credential: &str) -> Result<Option<Session>, AppError> {
        let session = self.resolve(kind, credential).await?;
        match &session {
            Some(_) => self.touch(kind, credential).await,
            None => info!(category = "audit", event = audit_events::SESSION_REJECTED, kind = %kind, "session rejected"),
        }
        Ok(session)
    }

    /// Job session bound to `job_id`; sessions for other jobs resolve to `None`.
    pub async fn resolve_driver(&self, job_id: &str, credential: &str) -> Result<Option<Session>, AppError> {
        let session = self.resolve(LinkKind::Job, credential).await?;
        Ok(session.filter(|s| matches!(&s.principal, Principal::Driver { job_id: bound, .. } if bound == job_id)))
    }

    /// Best effort; a failed update never fails the caller.
    pub async fn touch(&self, kind: LinkKind, credential: &str) {
        if let Err(e) = self.store.touch_session(kind, &hash_token(credential)).await {
            warn!(error = %e, kind = %kind, "failed to refresh session activity");
        }
    }

    /// Deleting an unknown or already deleted session is not an error.
    pub async fn logout(&self, kind: LinkKind, credential: &str) -> Result<(), AppError> {
        let removed = self.store.delete_session(kind, &hash_token(credential)).await?;
        info!(category = "audit", event = audit_events::LOGOUT, kind = %kind, removed, "session revoked");
        Ok(())
    }

    pub async fn prune_expired(&self) -> Result<u64, AppError> {
        self.store.delete_expired_sessions().await
    }
}
