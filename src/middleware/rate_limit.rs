use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use tokio::sync::Mutex;
use tracing::warn;

/// Independent quotas; each source IP gets its own counter per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum RateLimitBucket {
    MagicLinkIssue,
    JobLinkIssue,
    Validate,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RateLimitKey {
    ip: String,
    bucket: RateLimitBucket,
}

#[derive(Debug, Clone)]
struct Counter {
    window_start: Instant,
    count: u32,
}

/// Process-local fixed-window request counter. State is lost on restart.
#[derive(Debug)]
pub(crate) struct RateLimiter {
    config: RateLimitConfig,
    window: Duration,
    cleanup_interval: Duration,
    counters: Mutex<HashMap<RateLimitKey, Counter>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let window = Duration::from_secs(config.window_seconds.max(1));
        let cleanup_interval = Duration::from_secs(config.cleanup_interval_seconds.max(1));

        Self {
            config,
            window,
            cleanup_interval,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn spawn_cleanup_task(self: Arc<Self>) {
        let cleanup_interval = self.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let window = self.window;
                let mut counters = self.counters.lock().await;
                counters.retain(|_, counter| now.duration_since(counter.window_start) < window);
            }
        });
    }

    async fn check(&self, ip: &str, bucket: RateLimitBucket) -> RateLimitDecision {
        // NOTE: fixed window; bursts can exceed the limit near window boundaries.
        let limit = self.limit_for_bucket(bucket);
        let now = Instant::now();
        let mut counters = self.counters.lock().await;

        let key = RateLimitKey { ip: ip.to_string(), bucket };
        let counter = counters.entry(key).or_insert_with(|| Counter { window_start: now, count: 0 });

        if now.duration_since(counter.window_start) >= self.window {
            counter.window_start = now;
            counter.count = 0;
        }

        if counter.count >= limit {
            let elapsed = now.duration_since(counter.window_start);
            return RateLimitDecision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }

        counter.count += 1;
        RateLimitDecision::Allow
    }

    fn limit_for_bucket(&self, bucket: RateLimitBucket) -> u32 {
        match bucket {
            RateLimitBucket::MagicLinkIssue => self.config.magic_issue_limit,
            RateLimitBucket::JobLinkIssue => self.config.job_issue_limit,
            RateLimitBucket::Validate => self.config.validate_limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateLimitDecision {
    Allow,
    Limited { retry_after: Duration },
}

/// Seconds until the caller's window resets; read by the 429 catcher.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RateLimitRetryAfter(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RateLimitError {
    TooManyRequests,
    MissingClientIp,
}

impl RateLimitError {
    fn status(self) -> Status {
        match self {
            RateLimitError::TooManyRequests => Status::TooManyRequests,
            RateLimitError::MissingClientIp => Status::BadRequest,
        }
    }
}

macro_rules! rate_limit_guard {
    ($(#[$doc:meta])* $name:ident => $bucket:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub(crate) struct $name;

        #[rocket::async_trait]
        impl<'r> FromRequest<'r> for $name {
            type Error = RateLimitError;

            async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
                rate_limit_request(request, $bucket).await.map(|_| $name)
            }
        }

        impl<'a> OpenApiFromRequest<'a> for $name {
            fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
                Ok(RequestHeaderInput::None)
            }

            fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
                too_many_requests_response()
            }
        }
    };
}

rate_limit_guard!(
    /// Quota on generic magic-link issuance.
    MagicLinkIssueRateLimit => RateLimitBucket::MagicLinkIssue
);
rate_limit_guard!(
    /// Quota on job-link issuance.
    JobLinkIssueRateLimit => RateLimitBucket::JobLinkIssue
);
rate_limit_guard!(
    /// Quota on token validation, shared by both link families.
    ValidateRateLimit => RateLimitBucket::Validate
);

async fn rate_limit_request(request: &Request<'_>, bucket: RateLimitBucket) -> Outcome<(), RateLimitError> {
    let limiter = match request.rocket().state::<Arc<RateLimiter>>() {
        Some(limiter) => limiter,
        None => return Outcome::Success(()),
    };

    let request_id = request
        .local_cache(|| None::<crate::middleware::RequestId>)
        .as_ref()
        .map(|r| r.0.as_str())
        .unwrap_or("unknown");

    let ip = match request.client_ip() {
        Some(ip) => ip.to_string(),
        None => {
            warn!(
                request_id = %request_id,
                method = %request.method(),
                "client ip unavailable for rate limiting"
            );
            if limiter.config.require_client_ip {
                return Outcome::Error((RateLimitError::MissingClientIp.status(), RateLimitError::MissingClientIp));
            }
            "missing-ip".to_string()
        }
    };

    match limiter.check(&ip, bucket).await {
        RateLimitDecision::Allow => Outcome::Success(()),
        RateLimitDecision::Limited { retry_after } => {
            let retry_after_secs = (retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0)).max(1);
            request.local_cache(|| Some(RateLimitRetryAfter(retry_after_secs)));
            warn!(
                request_id = %request_id,
                method = %request.method(),
                bucket = ?bucket,
                retry_after_secs = %retry_after_secs,
                "rate limit exceeded"
            );
            Outcome::Error((RateLimitError::TooManyRequests.status(), RateLimitError::TooManyRequests))
        }
    }
}

fn too_many_requests_response() -> rocket_okapi::Result<Responses> {
    let mut responses = Responses::default();
    responses.responses.insert(
        "429".to_string(),
        RefOr::Object(OpenApiResponse {
            description: "Too Many Requests".to_string(),
            ..Default::default()
        }),
    );
    Ok(responses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::error::too_many_requests;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use rocket::{catchers, get, routes};

    #[get("/limited")]
    async fn limited(_rate_limit: MagicLinkIssueRateLimit) -> Status {
        Status::Ok
    }

    fn limiter_with(magic: u32, job: u32, validate: u32, window_seconds: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            magic_issue_limit: magic,
            job_issue_limit: job,
            validate_limit: validate,
            window_seconds,
            cleanup_interval_seconds: 60,
            require_client_ip: false,
        })
    }

    #[rocket::async_test]
    async fn sixth_magic_issue_in_window_is_limited() {
        let limiter = limiter_with(5, 50, 30, 900);

        for _ in 0..5 {
            assert_eq!(limiter.check("10.0.0.1", RateLimitBucket::MagicLinkIssue).await, RateLimitDecision::Allow);
        }
        assert!(matches!(
            limiter.check("10.0.0.1", RateLimitBucket::MagicLinkIssue).await,
            RateLimitDecision::Limited { .. }
        ));
    }

    #[rocket::async_test]
    async fn buckets_and_ips_are_independent() {
        let limiter = limiter_with(1, 1, 1, 900);

        assert_eq!(limiter.check("10.0.0.1", RateLimitBucket::MagicLinkIssue).await, RateLimitDecision::Allow);
        assert_eq!(limiter.check("10.0.0.1", RateLimitBucket::JobLinkIssue).await, RateLimitDecision::Allow);
        assert_eq!(limiter.check("10.0.0.1", RateLimitBucket::Validate).await, RateLimitDecision::Allow);
        assert_eq!(limiter.check("10.0.0.2", RateLimitBucket::MagicLinkIssue).await, RateLimitDecision::Allow);
        assert!(matches!(
            limiter.check("10.0.0.1", RateLimitBucket::MagicLinkIssue).await,
            RateLimitDecision::Limited { .. }
        ));
    }

    #[rocket::async_test]
    async fn rate_limiter_resets_after_window() {
        let limiter = limiter_with(1, 1, 1, 1);

        assert_eq!(limiter.check("127.0.0.1", RateLimitBucket::Validate).await, RateLimitDecision::Allow);
        assert!(matches!(
            limiter.check("127.0.0.1", RateLimitBucket::Validate).await,
            RateLimitDecision::Limited { .. }
        ));

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(limiter.check("127.0.0.1", RateLimitBucket::Validate).await, RateLimitDecision::Allow);
    }

    #[rocket::async_test]
    async fn limited_calls_do_not_extend_the_count() {
        let limiter = limiter_with(1, 1, 1, 900);

        limiter.check("10.0.0.1", RateLimitBucket::JobLinkIssue).await;
        limiter.check("10.0.0.1", RateLimitBucket::JobLinkIssue).await;
        limiter.check("10.0.0.1", RateLimitBucket::JobLinkIssue).await;

        assert_eq!(limiter.count_for("10.0.0.1", RateLimitBucket::JobLinkIssue).await, 1);
    }

    #[rocket::async_test]
    async fn rate_limit_retry_after_header_is_set() {
        let limiter = Arc::new(limiter_with(0, 0, 0, 60));

        let rocket = rocket::build()
            .manage(limiter)
            .mount("/", routes![limited])
            .register("/", catchers![too_many_requests]);

        let client = Client::tracked(rocket).await.expect("valid rocket instance");
        let response = client.get("/limited").dispatch().await;

        assert_eq!(response.status(), Status::TooManyRequests);
        assert_eq!(response.headers().get_one("Retry-After"), Some("60"));
        assert_eq!(response.content_type(), Some(ContentType::JSON));

        let body: serde_json::Value = response.into_json().await.expect("json body");
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Too many attempts, please try again later");
    }

    impl RateLimiter {
        async fn count_for(&self, ip: &str, bucket: RateLimitBucket) -> u32 {
            let counters = self.counters.lock().await;
            counters
                .get(&RateLimitKey { ip: ip.to_string(), bucket })
                .map(|counter| counter.count)
                .unwrap_or(0)
        }
    }
}
