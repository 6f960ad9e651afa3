use crate::Config;
use crate::database::LinkStore;
use crate::database::location::LocationRepository;
use crate::error::app_error::AppError;
use crate::models::link::{LinkKind, Principal};
use crate::models::location::{LocationReport, NewLocationReport, Position, UpdateLocationRequest};
use crate::models::validation::is_valid_coordinates;
use crate::service::session::SessionGuard;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

pub struct LocationTracker<'a> {
    pub store: &'a dyn LinkStore,
    pub config: &'a Config,
}

impl<'a> LocationTracker<'a> {
    pub fn new(store: &'a dyn LinkStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Appends a position for `job_id`. The driver is taken from the session, never the body.
    pub async fn report(&self, job_id: &str, request: &UpdateLocationRequest, credential: Option<&str>) -> Result<LocationReport, AppError> {
        let credential = credential.ok_or_else(|| AppError::Unauthorized("No session token provided".to_string()))?;

        let guard = SessionGuard::new(self.store, self.config);
        let session = guard
            .resolve_driver(job_id, credential)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))?;
        let Principal::Driver { driver_email, .. } = session.principal else {
            return Err(AppError::Unauthorized("Invalid or expired session".to_string()));
        };

        let position = match (request.latitude, request.longitude) {
            (Some(latitude), Some(longitude)) if is_valid_coordinates(latitude, longitude) => Position {
                latitude,
                longitude,
                accuracy: request.accuracy,
                heading: request.heading,
                speed: request.speed,
            },
            _ => return Err(AppError::BadRequest("Invalid coordinates".to_string())),
        };

        let report = self
            .store
            .append_location(&NewLocationReport {
                job_id: job_id.to_string(),
                driver_email,
                position,
            })
            .await?;
        guard.touch(LinkKind::Job, credential).await;

        debug!(job_id = %job_id, "driver location recorded");
        Ok(report)
    }

    pub async fn latest(&self, job_id: &str) -> Result<LocationReport, AppError> {
        self.store
            .latest_location(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No location data available".to_string()))
    }

    /// Deletes reports older than the retention window, measured from `now`.
    pub async fn prune(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let cutoff = now - Duration::days(self.config.location.retention_days);
        let removed = self.store.delete_locations_before(cutoff).await?;
        info!(removed, cutoff = %cutoff, "pruned driver locations");
        Ok(removed)
    }
}
