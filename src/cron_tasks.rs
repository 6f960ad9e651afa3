use crate::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::db::init_pool;
use crate::service::location::LocationTracker;
use crate::service::session::SessionGuard;
use chrono::Utc;

/// Removes location reports older than `location.retention_days`. Returns the number removed.
pub async fn prune_locations(config: &Config) -> Result<u64, String> {
    let pool = init_pool(&config.database)
        .await
        .map_err(|err| format!("Failed to initialize database pool: {err}"))?;

    let repo = PostgresRepository::new(pool.clone());
    let removed = LocationTracker::new(&repo, config)
        .prune(Utc::now())
        .await
        .map_err(|err| format!("Failed to prune driver locations: {err:?}"));

    pool.close().await;
    removed
}

/// Removes expired sessions of both kinds. Returns the number removed.
pub async fn prune_sessions(config: &Config) -> Result<u64, String> {
    let pool = init_pool(&config.database)
        .await
        .map_err(|err| format!("Failed to initialize database pool: {err}"))?;

    let repo = PostgresRepository::new(pool.clone());
    let removed = SessionGuard::new(&repo, config)
        .prune_expired()
        .await
        .map_err(|err| format!("Failed to prune sessions: {err:?}"));

    pool.close().await;
    removed
}
