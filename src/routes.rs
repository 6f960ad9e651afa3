pub mod error;
pub mod health;
pub mod job_link;
pub mod magic_link;
