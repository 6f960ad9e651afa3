use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::link::Role;
use crate::models::magic_link::{MagicLink, NewMagicLink};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait MagicLinkRepository: Send + Sync {
    /// Stores a link, replacing any earlier link for the same email.
    async fn upsert_magic_link(&self, link: &NewMagicLink) -> Result<MagicLink, AppError>;
    /// Flips `used` on an unused, unexpired link in one step. `None` if nothing matched.
    async fn consume_magic_link(&self, token_hash: &str) -> Result<Option<MagicLink>, AppError>;
}

#[derive(Debug, sqlx::FromRow)]
struct MagicLinkRow {
    id: Uuid,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used: bool,
    used_at: Option<DateTime<Utc>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl TryFrom<MagicLinkRow> for MagicLink {
    type Error = AppError;

    fn try_from(row: MagicLinkRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role).ok_or_else(|| AppError::Internal(format!("unknown role stored on magic link {}", row.id)))?;
        Ok(MagicLink {
            id: row.id,
            email: row.email,
            role,
            created_at: row.created_at,
            expires_at: row.expires_at,
            used: row.used,
            used_at: row.used_at,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
        })
    }
}

#[async_trait::async_trait]
impl MagicLinkRepository for PostgresRepository {
    async fn upsert_magic_link(&self, link: &NewMagicLink) -> Result<MagicLink, AppError> {
        let row = sqlx::query_as::<_, MagicLinkRow>(
            r#"
            INSERT INTO magic_links (email, role, token_hash, expires_at, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO UPDATE
            SET role = EXCLUDED.role,
                token_hash = EXCLUDED.token_hash,
                created_at = NOW(),
                expires_at = EXCLUDED.expires_at,
                used = FALSE,
                used_at = NULL,
                ip_address = EXCLUDED.ip_address,
                user_agent = EXCLUDED.user_agent
            RETURNING id, email, role, created_at, expires_at, used, used_at, ip_address, user_agent
            "#,
        )
        .bind(&link.email)
        .bind(link.role.as_str())
        .bind(&link.token_hash)
        .bind(link.expires_at)
        .bind(&link.ip_address)
        .bind(&link.user_agent)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn consume_magic_link(&self, token_hash: &str) -> Result<Option<MagicLink>, AppError> {
        let row = sqlx::query_as::<_, MagicLinkRow>(
            r#"
            UPDATE magic_links
            SET used = TRUE, used_at = NOW()
            WHERE token_hash = $1
              AND used = FALSE
              AND expires_at > NOW()
            RETURNING id, email, role, created_at, expires_at, used, used_at, ip_address, user_agent
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MagicLink::try_from).transpose()
    }
}
