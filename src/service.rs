pub mod email;
pub mod job_link;
pub mod location;
pub mod magic_link;
pub mod session;
pub mod token;
