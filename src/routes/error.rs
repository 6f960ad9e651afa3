use crate::error::app_error::ErrorBody;
use crate::error::json::BodyRejected;
use crate::middleware::rate_limit::RateLimitRetryAfter;
use rocket::http::Header;
use rocket::serde::json::Json;
use rocket::{Request, Responder, catch};

#[catch(400)]
pub fn bad_request(req: &Request) -> Json<ErrorBody> {
    if req.local_cache(|| None::<BodyRejected>).is_some() {
        return Json(ErrorBody::new("Invalid request body"));
    }
    Json(ErrorBody::new("Bad request"))
}

#[catch(401)]
pub fn unauthorized(_: &Request) -> Json<ErrorBody> {
    Json(ErrorBody::new("Unauthorized"))
}

#[catch(404)]
pub fn not_found(_: &Request) -> Json<ErrorBody> {
    Json(ErrorBody::new("Endpoint not found"))
}

#[catch(409)]
pub fn conflict(_: &Request) -> Json<ErrorBody> {
    Json(ErrorBody::new("Conflict"))
}

#[catch(422)]
pub fn unprocessable_entity(_: &Request) -> Json<ErrorBody> {
    Json(ErrorBody::new("Malformed request body"))
}

#[catch(500)]
pub fn internal_error(_: &Request) -> Json<ErrorBody> {
    Json(ErrorBody::new("Internal server error"))
}

#[derive(Responder)]
#[response(status = 429, content_type = "json")]
pub struct TooManyRequests {
    body: Json<ErrorBody>,
    retry_after: Header<'static>,
}

#[catch(429)]
pub fn too_many_requests(req: &Request) -> TooManyRequests {
    let retry_after = req.local_cache(|| None::<RateLimitRetryAfter>).as_ref().map(|r| r.0).unwrap_or(60);

    TooManyRequests {
        body: Json(ErrorBody::new("Too many attempts, please try again later")),
        retry_after: Header::new("Retry-After", retry_after.to_string()),
    }
}

pub fn catchers() -> Vec<rocket::Catcher> {
    rocket::catchers![bad_request, unauthorized, not_found, conflict, unprocessable_entity, too_many_requests, internal_error]
}
