mod auth;
mod config;
mod cron_tasks;
mod database;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod service;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use cron_tasks::{prune_locations, prune_sessions};

use crate::db::stage_db;
use crate::middleware::RequestLogger;
use crate::middleware::rate_limit::RateLimiter;
use crate::routes as app_routes;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, http::Method};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};
use rocket_okapi::{get_openapi_route, okapi::merge::marge_spec_list};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(log_level: &str, json_format: bool) {
    // RUST_LOG overrides the configured level, e.g.
    //   RUST_LOG=debug
    //   RUST_LOG=info,ridelink::service=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    // try_init: a second rocket in the same process keeps the first subscriber.
    let _ = if json_format {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
}

fn ensure_rocket_secret_key() {
    let profile = std::env::var("ROCKET_PROFILE").unwrap_or_else(|_| "debug".to_string());

    // Session cookies are private; outside debug they must survive restarts.
    if profile != "debug" && std::env::var("ROCKET_SECRET_KEY").is_err() {
        panic!(
            "ROCKET_SECRET_KEY is required for profile '{}'. Generate one with: openssl rand -base64 32",
            profile
        );
    }
}

fn build_cors(cors_config: &config::CorsConfig) -> CorsOptions {
    let is_wildcard = cors_config.allowed_origins.len() == 1 && cors_config.allowed_origins[0] == "*";

    if is_wildcard && cors_config.allow_credentials {
        panic!(
            "Invalid CORS configuration: Cannot use wildcard origins (*) with credentials enabled. \
            Either set specific origins or disable credentials."
        );
    }

    let allowed_origins = if cors_config.allowed_origins.is_empty() {
        AllowedOrigins::some_exact::<&str>(&[])
    } else if is_wildcard {
        AllowedOrigins::all()
    } else {
        AllowedOrigins::some_exact(&cors_config.allowed_origins.iter().map(String::as_str).collect::<Vec<_>>())
    };

    CorsOptions {
        allowed_origins,
        allowed_methods: vec![Method::Get, Method::Post, Method::Options, Method::Head]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: rocket_cors::AllowedHeaders::some(&["Content-Type", "Authorization", "Accept"]),
        allow_credentials: cors_config.allow_credentials,
        ..Default::default()
    }
}

fn get_swagger_config(openapi_url: &str) -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: openapi_url.to_string(),
        ..Default::default()
    }
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return config::DEFAULT_API_BASE_PATH.to_string();
    }

    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }

    normalized
}

fn join_base_path(base_path: &str, path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let suffix = path.trim_start_matches('/');

    if base.is_empty() {
        format!("/{}", suffix)
    } else {
        format!("{}/{}", base, suffix)
    }
}

fn collect_base_paths(api_config: &config::ApiConfig) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    let mut push_unique = |path: String| {
        if !normalized.contains(&path) {
            normalized.push(path);
        }
    };

    push_unique(normalize_base_path(&api_config.base_path));

    for extra in &api_config.additional_base_paths {
        push_unique(normalize_base_path(extra));
    }

    normalized
}

struct RouteSpec {
    path: &'static str,
    routes: Vec<rocket::Route>,
    openapi: rocket_okapi::okapi::openapi3::OpenApi,
}

fn collect_route_specs() -> Vec<RouteSpec> {
    let (magic_link_routes, magic_link_openapi) = app_routes::magic_link::routes();
    let (job_link_routes, job_link_openapi) = app_routes::job_link::routes();
    let (health_routes, health_openapi) = app_routes::health::routes();

    vec![
        RouteSpec {
            path: "/magic-links",
            routes: magic_link_routes,
            openapi: magic_link_openapi,
        },
        RouteSpec {
            path: "/job-links",
            routes: job_link_routes,
            openapi: job_link_openapi,
        },
        RouteSpec {
            path: "/health",
            routes: health_routes,
            openapi: health_openapi,
        },
    ]
}

fn mount_api_routes(mut rocket: Rocket<Build>, base_path: &str, enable_swagger: bool) -> Rocket<Build> {
    let route_specs = collect_route_specs();

    if enable_swagger {
        let mut openapi_list = Vec::new();
        for spec in route_specs {
            rocket = rocket.mount(format!("{}{}", base_path, spec.path), spec.routes);
            openapi_list.push((spec.path, spec.openapi));
        }

        match marge_spec_list(&openapi_list) {
            Ok(openapi_docs) => {
                let settings = rocket_okapi::settings::OpenApiSettings::default();
                rocket = rocket.mount(base_path, vec![get_openapi_route(openapi_docs, &settings)]);

                let docs_path = join_base_path(base_path, "docs");
                let openapi_url = join_base_path(base_path, "openapi.json");
                rocket = rocket.mount(docs_path, make_swagger_ui(&get_swagger_config(&openapi_url)));
            }
            Err(err) => tracing::error!("Could not merge OpenAPI spec, docs disabled: {}", err),
        }
    } else {
        for spec in route_specs {
            rocket = rocket.mount(format!("{}{}", base_path, spec.path), spec.routes);
        }
    }

    rocket
}

fn stage_rate_limiter(rate_limit_config: config::RateLimitConfig) -> AdHoc {
    AdHoc::on_ignite("Rate Limiter", move |rocket| {
        let limiter = Arc::new(RateLimiter::new(rate_limit_config.clone()));
        limiter.clone().spawn_cleanup_task();

        Box::pin(async move { rocket.manage(limiter) })
    })
}

fn rocket_figment(config: &Config) -> rocket::figment::Figment {
    rocket::Config::figment()
        .merge(("port", config.server.port))
        .merge(("address", config.server.address.clone()))
}

/// Everything except the store: fairings, routes and catchers on every base path.
fn assemble(mut rocket: Rocket<Build>, config: Config) -> Rocket<Build> {
    match build_cors(&config.cors).to_cors() {
        Ok(cors) => rocket = rocket.attach(cors),
        Err(e) => panic!("Failed to create CORS fairing: {}", e),
    }

    rocket = rocket.attach(stage_rate_limiter(config.rate_limit.clone())).attach(RequestLogger);

    let enable_swagger = config.api.enable_swagger;
    for base_path in collect_base_paths(&config.api) {
        rocket = mount_api_routes(rocket, &base_path, enable_swagger);
        rocket = rocket.register(base_path.as_str(), app_routes::error::catchers());
    }

    rocket.manage(config)
}

pub fn build_rocket(config: Config) -> Rocket<Build> {
    init_tracing(&config.logging.level, config.logging.json_format);
    ensure_rocket_secret_key();

    let rocket = rocket::custom(rocket_figment(&config)).attach(stage_db(config.database.clone()));
    assemble(rocket, config)
}

/// Same application as [`build_rocket`] over an injected store instead of Postgres.
#[cfg(test)]
pub(crate) fn build_test_rocket(config: Config, store: database::Store) -> Rocket<Build> {
    let rocket = rocket::custom(rocket_figment(&config)).manage(store);
    assemble(rocket, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_paths_are_normalized() {
        assert_eq!(normalize_base_path(""), "/api");
        assert_eq!(normalize_base_path("v1/"), "/v1");
        assert_eq!(normalize_base_path(" /api// "), "/api");
    }

    #[test]
    fn additional_base_paths_are_deduplicated() {
        let api = config::ApiConfig {
            base_path: "/api".to_string(),
            additional_base_paths: vec!["api/".to_string(), "/v1".to_string()],
            enable_swagger: false,
        };
        assert_eq!(collect_base_paths(&api), vec!["/api".to_string(), "/v1".to_string()]);
    }

    #[test]
    fn join_base_path_handles_slashes() {
        assert_eq!(join_base_path("/api/", "/docs"), "/api/docs");
        assert_eq!(join_base_path("", "openapi.json"), "/openapi.json");
    }

    #[test]
    #[should_panic(expected = "Invalid CORS configuration")]
    fn wildcard_origins_with_credentials_are_rejected() {
        build_cors(&config::CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: true,
        });
    }

    #[rocket::async_test]
    async fn swagger_docs_are_served_when_enabled() {
        use crate::test_utils::{InMemoryStore, test_config};
        use rocket::http::Status;
        use rocket::local::asynchronous::Client;

        let mut config = test_config();
        config.api.enable_swagger = true;
        let client = Client::tracked(build_test_rocket(config, Arc::new(InMemoryStore::default())))
            .await
            .expect("valid rocket instance");

        let response = client.get("/api/openapi.json").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap_or_default();
        assert!(body.contains("/magic-links/generate"));
        assert!(body.contains("/job-links/create-for-job"));
    }
}
