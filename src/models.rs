pub mod audit;
pub mod health;
pub mod job_link;
pub mod link;
pub mod location;
pub mod magic_link;
pub mod session;
pub mod stats;
pub mod validation;
