use crate::Config;
use crate::database::job_link::JobLinkRepository;
use crate::database::location::LocationRepository;
use crate::database::magic_link::MagicLinkRepository;
use crate::database::session::SessionRepository;
use crate::database::stats::StatsRepository;
use crate::error::app_error::AppError;
use crate::models::job_link::{CreateJobLinkRequest, JobLink, JobStatus, NewJobLink};
use crate::models::link::LinkKind;
use crate::models::location::{LocationReport, NewLocationReport};
use crate::models::magic_link::{MagicLink, NewMagicLink};
use crate::models::session::{NewSession, Session};
use crate::models::stats::{JobLinkStats, MagicLinkStats};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Defaults with cookies that survive plain-HTTP test clients.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.session.cookie_secure = false;
    config.api.enable_swagger = false;
    config
}

pub fn job_request(job_id: &str) -> CreateJobLinkRequest {
    CreateJobLinkRequest {
        job_id: Some(job_id.to_string()),
        driver_email: Some("d@x.com".to_string()),
        driver_name: Some("Dana".to_string()),
        driver_phone: Some("+15550100".to_string()),
        pickup_address: Some("A".to_string()),
        pickup_lat: Some(1.0),
        pickup_lng: Some(1.0),
        dropoff_address: Some("B".to_string()),
        dropoff_lat: Some(2.0),
        dropoff_lng: Some(2.0),
        job_time: Some("2025-01-01T00:00:00Z".to_string()),
        fare: Some(25.0),
        ..Default::default()
    }
}

#[derive(Default)]
struct State {
    /// (token hash, link); at most one entry per email.
    magic_links: Vec<(String, MagicLink)>,
    jobs: Vec<(String, JobLink)>,
    sessions: HashMap<(LinkKind, String), Session>,
    locations: Vec<LocationReport>,
}

/// Repository held in memory with the same conditional-update semantics as Postgres.
/// Every operation runs under one lock, so check-and-set steps are atomic.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    link_lookups: AtomicUsize,
    fail_session_creation: AtomicBool,
    fail_touches: AtomicBool,
}

impl InMemoryStore {
    pub async fn magic_link_count(&self) -> usize {
        self.state.lock().await.magic_links.len()
    }

    pub async fn job_count(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    pub async fn location_count(&self) -> usize {
        self.state.lock().await.locations.len()
    }

    /// Number of token lookups that reached the store.
    pub fn lookup_count(&self) -> usize {
        self.link_lookups.load(Ordering::SeqCst)
    }

    pub async fn active_session_count(&self, kind: LinkKind) -> usize {
        let now = Utc::now();
        let state = self.state.lock().await;
        state.sessions.iter().filter(|((k, _), s)| *k == kind && s.expires_at > now).count()
    }

    pub async fn expire_magic_link(&self, email: &str) {
        let mut state = self.state.lock().await;
        for (_, link) in state.magic_links.iter_mut().filter(|(_, l)| l.email == email) {
            link.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    pub async fn expire_job(&self, job_id: &str) {
        let mut state = self.state.lock().await;
        for (_, job) in state.jobs.iter_mut().filter(|(_, j)| j.job_id == job_id) {
            job.expires_at = Utc::now() - Duration::seconds(1);
        }
    }

    pub async fn expire_session(&self, token_hash: &str) {
        let mut state = self.state.lock().await;
        for ((_, hash), session) in state.sessions.iter_mut() {
            if hash == token_hash {
                session.expires_at = Utc::now() - Duration::seconds(1);
            }
        }
    }

    pub fn fail_session_creation(&self, fail: bool) {
        self.fail_session_creation.store(fail, Ordering::SeqCst);
    }

    pub fn fail_touches(&self, fail: bool) {
        self.fail_touches.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl MagicLinkRepository for InMemoryStore {
    async fn upsert_magic_link(&self, link: &NewMagicLink) -> Result<MagicLink, AppError> {
        let mut state = self.state.lock().await;
        let stored = MagicLink {
            id: Uuid::new_v4(),
            email: link.email.clone(),
            role: link.role,
            created_at: Utc::now(),
            expires_at: link.expires_at,
            used: false,
            used_at: None,
            ip_address: link.ip_address.clone(),
            user_agent: link.user_agent.clone(),
        };

        match state.magic_links.iter_mut().find(|(_, l)| l.email == link.email) {
            Some(entry) => {
                let id = entry.1.id;
                *entry = (link.token_hash.clone(), MagicLink { id, ..stored.clone() });
                Ok(MagicLink { id, ..stored })
            }
            None => {
                state.magic_links.push((link.token_hash.clone(), stored.clone()));
                Ok(stored)
            }
        }
    }

    async fn consume_magic_link(&self, token_hash: &str) -> Result<Option<MagicLink>, AppError> {
        self.link_lookups.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let consumed = state
            .magic_links
            .iter_mut()
            .find(|(hash, link)| hash == token_hash && !link.used && now < link.expires_at)
            .map(|(_, link)| {
                link.used = true;
                link.used_at = Some(now);
                link.clone()
            });

        Ok(consumed)
    }
}

#[async_trait::async_trait]
impl JobLinkRepository for InMemoryStore {
    async fn create_job_link(&self, link: &NewJobLink) -> Result<JobLink, AppError> {
        let mut state = self.state.lock().await;
        if state.jobs.iter().any(|(_, j)| j.job_id == link.job_id) {
            return Err(AppError::Conflict(format!("Job {} already exists", link.job_id)));
        }

        let job = JobLink {
            id: Uuid::new_v4(),
            job_id: link.job_id.clone(),
            driver_email: link.driver_email.clone(),
            driver_name: link.driver_name.clone(),
            driver_phone: link.driver_phone.clone(),
            pickup: link.pickup.clone(),
            dropoff: link.dropoff.clone(),
            job_time: link.job_time,
            fare: link.fare,
            payment_status: link.payment_status.clone(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            expires_at: link.expires_at,
            accepted_at: None,
            completed_at: None,
            ip_address: link.ip_address.clone(),
            user_agent: link.user_agent.clone(),
        };
        state.jobs.push((link.token_hash.clone(), job.clone()));
        Ok(job)
    }

    async fn accept_job_link(&self, token_hash: &str) -> Result<Option<JobLink>, AppError> {
        self.link_lookups.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let accepted = state
            .jobs
            .iter_mut()
            .find(|(hash, job)| hash == token_hash && job.status != JobStatus::Completed && now < job.expires_at)
            .map(|(_, job)| {
                job.status = JobStatus::Accepted;
                job.accepted_at.get_or_insert(now);
                job.clone()
            });

        Ok(accepted)
    }

    async fn get_job_link(&self, job_id: &str) -> Result<Option<JobLink>, AppError> {
        let state = self.state.lock().await;
        Ok(state.jobs.iter().find(|(_, j)| j.job_id == job_id).map(|(_, j)| j.clone()))
    }

    async fn complete_job_link(&self, job_id: &str) -> Result<Option<JobLink>, AppError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let completed = state.jobs.iter_mut().find(|(_, j)| j.job_id == job_id).map(|(_, job)| {
            job.status = JobStatus::Completed;
            job.completed_at.get_or_insert(now);
            job.clone()
        });

        Ok(completed)
    }
}

#[async_trait::async_trait]
impl SessionRepository for InMemoryStore {
    async fn create_session(&self, session: &NewSession) -> Result<Session, AppError> {
        if self.fail_session_creation.load(Ordering::SeqCst) {
            return Err(AppError::Internal("session store unavailable".to_string()));
        }

        let now = Utc::now();
        let stored = Session {
            principal: session.principal.clone(),
            created_at: now,
            expires_at: session.expires_at,
            last_activity: now,
        };

        let mut state = self.state.lock().await;
        state
            .sessions
            .insert((session.principal.kind(), session.token_hash.clone()), stored.clone());
        Ok(stored)
    }

    async fn get_active_session(&self, kind: LinkKind, token_hash: &str) -> Result<Option<Session>, AppError> {
        let now = Utc::now();
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .get(&(kind, token_hash.to_string()))
            .filter(|s| now < s.expires_at)
            .cloned())
    }

    async fn touch_session(&self, kind: LinkKind, token_hash: &str) -> Result<(), AppError> {
        if self.fail_touches.load(Ordering::SeqCst) {
            return Err(AppError::Internal("touch failed".to_string()));
        }

        let mut state = self.state.lock().await;
        if let Some(session) = state.sessions.get_mut(&(kind, token_hash.to_string())) {
            session.last_activity = Utc::now();
        }
        Ok(())
    }

    async fn delete_session(&self, kind: LinkKind, token_hash: &str) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        Ok(state.sessions.remove(&(kind, token_hash.to_string())).is_some())
    }

    async fn delete_expired_sessions(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| now < s.expires_at);
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait::async_trait]
impl LocationRepository for InMemoryStore {
    async fn append_location(&self, report: &NewLocationReport) -> Result<LocationReport, AppError> {
        let stored = LocationReport {
            id: Uuid::new_v4(),
            job_id: report.job_id.clone(),
            driver_email: report.driver_email.clone(),
            latitude: report.position.latitude,
            longitude: report.position.longitude,
            accuracy: report.position.accuracy,
            heading: report.position.heading,
            speed: report.position.speed,
            created_at: Utc::now(),
        };

        let mut state = self.state.lock().await;
        state.locations.push(stored.clone());
        Ok(stored)
    }

    async fn latest_location(&self, job_id: &str) -> Result<Option<LocationReport>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .locations
            .iter()
            .filter(|r| r.job_id == job_id)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn delete_locations_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        let before = state.locations.len();
        state.locations.retain(|r| r.created_at >= cutoff);
        Ok((before - state.locations.len()) as u64)
    }
}

#[async_trait::async_trait]
impl StatsRepository for InMemoryStore {
    async fn magic_link_stats(&self) -> Result<MagicLinkStats, AppError> {
        let now = Utc::now();
        let state = self.state.lock().await;
        let links = state.magic_links.iter().map(|(_, l)| l);

        Ok(MagicLinkStats {
            total_generated: links.clone().count() as i64,
            total_used: links.clone().filter(|l| l.used).count() as i64,
            active_links: links.filter(|l| !l.used && now < l.expires_at).count() as i64,
            active_sessions: state
                .sessions
                .iter()
                .filter(|((k, _), s)| *k == LinkKind::Magic && now < s.expires_at)
                .count() as i64,
        })
    }

    async fn job_link_stats(&self) -> Result<JobLinkStats, AppError> {
        let now = Utc::now();
        let state = self.state.lock().await;
        let count_status = |status: JobStatus| state.jobs.iter().filter(|(_, j)| j.status == status).count() as i64;
        let mut tracked: Vec<&str> = state.locations.iter().map(|r| r.job_id.as_str()).collect();
        tracked.sort_unstable();
        tracked.dedup();

        Ok(JobLinkStats {
            total_jobs: state.jobs.len() as i64,
            completed_jobs: count_status(JobStatus::Completed),
            accepted_jobs: count_status(JobStatus::Accepted),
            pending_jobs: count_status(JobStatus::Pending),
            active_sessions: state
                .sessions
                .iter()
                .filter(|((k, _), s)| *k == LinkKind::Job && now < s.expires_at)
                .count() as i64,
            tracked_jobs: tracked.len() as i64,
        })
    }
}
