use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::link::{LinkKind, Principal, Role};
use crate::models::session::{NewSession, Session};
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: &NewSession) -> Result<Session, AppError>;
    /// Unexpired session for the credential digest, if any.
    async fn get_active_session(&self, kind: LinkKind, token_hash: &str) -> Result<Option<Session>, AppError>;
    async fn touch_session(&self, kind: LinkKind, token_hash: &str) -> Result<(), AppError>;
    /// Returns whether a row was removed.
    async fn delete_session(&self, kind: LinkKind, token_hash: &str) -> Result<bool, AppError>;
    async fn delete_expired_sessions(&self) -> Result<u64, AppError>;
}

#[derive(Debug, sqlx::FromRow)]
struct MagicSessionRow {
    email: String,
    role: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl TryFrom<MagicSessionRow> for Session {
    type Error = AppError;

    fn try_from(row: MagicSessionRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role).ok_or_else(|| AppError::Internal("unknown role stored on session".to_string()))?;
        Ok(Session {
            principal: Principal::User { email: row.email, role },
            created_at: row.created_at,
            expires_at: row.expires_at,
            last_activity: row.last_activity,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobSessionRow {
    job_id: String,
    driver_email: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl From<JobSessionRow> for Session {
    fn from(row: JobSessionRow) -> Self {
        Session {
            principal: Principal::Driver {
                job_id: row.job_id,
                driver_email: row.driver_email,
            },
            created_at: row.created_at,
            expires_at: row.expires_at,
            last_activity: row.last_activity,
        }
    }
}

fn session_table(kind: LinkKind) -> &'static str {
    match kind {
        LinkKind::Magic => "magic_link_sessions",
        LinkKind::Job => "job_sessions",
    }
}

#[async_trait::async_trait]
impl SessionRepository for PostgresRepository {
    async fn create_session(&self, session: &NewSession) -> Result<Session, AppError> {
        match &session.principal {
            Principal::User { email, role } => {
                let row = sqlx::query_as::<_, MagicSessionRow>(
                    r#"
                    INSERT INTO magic_link_sessions (token_hash, email, role, expires_at)
                    VALUES ($1, $2, $3, $4)
                    RETURNING email, role, created_at, expires_at, last_activity
                    "#,
                )
                .bind(&session.token_hash)
                .bind(email)
                .bind(role.as_str())
                .bind(session.expires_at)
                .fetch_one(&self.pool)
                .await?;

                row.try_into()
            }
            Principal::Driver { job_id, driver_email } => {
                let row = sqlx::query_as::<_, JobSessionRow>(
                    r#"
                    INSERT INTO job_sessions (token_hash, job_id, driver_email, expires_at)
                    VALUES ($1, $2, $3, $4)
                    RETURNING job_id, driver_email, created_at, expires_at, last_activity
                    "#,
                )
                .bind(&session.token_hash)
                .bind(job_id)
                .bind(driver_email)
                .bind(session.expires_at)
                .fetch_one(&self.pool)
                .await?;

                Ok(row.into())
            }
        }
    }

    async fn get_active_session(&self, kind: LinkKind, token_hash: &str) -> Result<Option<Session>, AppError> {
        match kind {
            LinkKind::Magic => {
                let row = sqlx::query_as::<_, MagicSessionRow>(
                    r#"
                    SELECT email, role, created_at, expires_at, last_activity
                    FROM magic_link_sessions
                    WHERE token_hash = $1
                      AND expires_at > NOW()
                    "#,
                )
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;

                row.map(Session::try_from).transpose()
            }
            LinkKind::Job => {
                let row = sqlx::query_as::<_, JobSessionRow>(
                    r#"
                    SELECT job_id, driver_email, created_at, expires_at, last_activity
                    FROM job_sessions
                    WHERE token_hash = $1
                      AND expires_at > NOW()
                    "#,
                )
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;

                Ok(row.map(Session::from))
            }
        }
    }

    async fn touch_session(&self, kind: LinkKind, token_hash: &str) -> Result<(), AppError> {
        let query = format!("UPDATE {} SET last_activity = NOW() WHERE token_hash = $1", session_table(kind));
        sqlx::query(&query).bind(token_hash).execute(&self.pool).await?;

        Ok(())
    }

    async fn delete_session(&self, kind: LinkKind, token_hash: &str) -> Result<bool, AppError> {
        let query = format!("DELETE FROM {} WHERE token_hash = $1", session_table(kind));
        let result = sqlx::query(&query).bind(token_hash).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self) -> Result<u64, AppError> {
        let mut removed = 0;
        for kind in [LinkKind::Magic, LinkKind::Job] {
            let query = format!("DELETE FROM {} WHERE expires_at <= NOW()", session_table(kind));
            removed += sqlx::query(&query).execute(&self.pool).await?.rows_affected();
        }

        Ok(removed)
    }
}
