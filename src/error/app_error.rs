use crate::models::link::LinkKind;
use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{Request, Response};
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error")]
    Db {
        message: String,
        #[source]
        source: sqlx::error::Error,
    },
    #[error("Internal server error")]
    Internal(String),
    #[error("{}", .0.invalid_message())]
    InvalidOrExpired(LinkKind),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{}", first_validation_message(.0))]
    ValidationError(#[from] ValidationErrors),
    #[error("Internal server error")]
    Email { message: String },
}

impl AppError {
    pub fn db(message: impl Into<String>, source: sqlx::error::Error) -> Self {
        Self::Db {
            message: message.into(),
            source,
        }
    }

    pub fn email(message: impl Into<String>) -> Self {
        Self::Email { message: message.into() }
    }
}

/// Uniform JSON body for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// One short sentence for the client: missing fields win, then the first failing field by name.
fn first_validation_message(errors: &ValidationErrors) -> String {
    let mut failures: Vec<_> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| errs.iter().map(move |err| (err.code != "required", field.clone(), err)))
        .collect();
    failures.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

    failures
        .iter()
        .find_map(|(_, _, err)| err.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid request".to_string())
}

impl From<&AppError> for Status {
    fn from(e: &AppError) -> Self {
        match e {
            AppError::Db { .. } => Status::InternalServerError,
            AppError::Internal(_) => Status::InternalServerError,
            AppError::InvalidOrExpired(_) => Status::BadRequest,
            AppError::Unauthorized(_) => Status::Unauthorized,
            AppError::BadRequest(_) => Status::BadRequest,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Conflict(_) => Status::Conflict,
            AppError::ValidationError(_) => Status::BadRequest,
            AppError::Email { .. } => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &Request<'_>) -> rocket::response::Result<'static> {
        let method = req.method();
        let path = crate::middleware::redacted_path(req.uri().path().as_str());

        let request_id = req
            .local_cache(|| None::<crate::middleware::RequestId>)
            .as_ref()
            .map(|r| r.0.as_str())
            .unwrap_or("unknown");

        let status = Status::from(&self);
        if status.class().is_server_error() {
            error!(
                error = ?self,
                request_id = %request_id,
                method = %method,
                path = %path,
                "request failed"
            );
        } else {
            tracing::debug!(
                error = %self,
                request_id = %request_id,
                method = %method,
                path = %path,
                "request rejected"
            );
        }

        let body = serde_json::to_string(&ErrorBody::new(self.to_string())).map_err(|_| Status::InternalServerError)?;

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl OpenApiResponderInner for AppError {
    fn responses(_gen: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse};
        let mut responses = Responses::default();
        for (code, description) in [
            ("400", "Bad Request"),
            ("401", "Unauthorized"),
            ("404", "Not Found"),
            ("409", "Conflict"),
            ("500", "Internal Server Error"),
        ] {
            responses.responses.insert(
                code.to_string(),
                RefOr::Object(OpenApiResponse {
                    description: description.to_string(),
                    ..Default::default()
                }),
            );
        }
        Ok(responses)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => AppError::Conflict("Resource already exists".to_string()),
            _ => AppError::db("Database error", e),
        }
    }
}
