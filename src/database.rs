pub mod job_link;
pub mod location;
pub mod magic_link;
pub mod postgres_repository;
pub mod session;
pub mod stats;

use crate::database::job_link::JobLinkRepository;
use crate::database::location::LocationRepository;
use crate::database::magic_link::MagicLinkRepository;
use crate::database::session::SessionRepository;
use crate::database::stats::StatsRepository;
use std::sync::Arc;

/// Everything the link services need from storage.
pub trait LinkStore: MagicLinkRepository + JobLinkRepository + SessionRepository + LocationRepository + StatsRepository {}

impl<T> LinkStore for T where T: MagicLinkRepository + JobLinkRepository + SessionRepository + LocationRepository + StatsRepository {}

/// Shared store handle kept in Rocket managed state.
pub type Store = Arc<dyn LinkStore>;
