/// Event names carried on `category = "audit"` tracing events.
pub mod audit_events {
    // Link lifecycle
    pub const LINK_ISSUED: &str = "link_issued";
    pub const LINK_CONSUMED: &str = "link_consumed";
    pub const LINK_REJECTED: &str = "link_rejected";

    // Sessions
    pub const SESSION_CREATED: &str = "session_created";
    pub const SESSION_REJECTED: &str = "session_rejected";
    pub const LOGOUT: &str = "logout";

    // Job state machine
    pub const JOB_ACCEPTED: &str = "job_accepted";
    pub const JOB_COMPLETED: &str = "job_completed";

    // Delivery
    pub const LINK_DELIVERY_FAILED: &str = "link_delivery_failed";
}
