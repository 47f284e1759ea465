use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::gateway::Resource;

pub type Result<T> = std::result::Result<T, AppError>;

/// Why an upstream collection could not be retrieved
#[derive(Debug, Clone, Error)]
pub enum FetchCause {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    Decode(String),
}

/// Failure to retrieve one upstream resource collection
#[derive(Debug, Clone, Error)]
#[error("failed to fetch {resource}: {cause}")]
pub struct FetchError {
    pub resource: Resource,
    #[source]
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(resource: Resource, cause: FetchCause) -> Self {
        Self { resource, cause }
    }

    pub fn transport(resource: Resource, err: impl ToString) -> Self {
        Self::new(resource, FetchCause::Transport(err.to_string()))
    }

    pub fn status(resource: Resource, status: u16, body: impl Into<String>) -> Self {
        Self::new(
            resource,
            FetchCause::Status {
                status,
                body: body.into(),
            },
        )
    }

    pub fn decode(resource: Resource, err: impl ToString) -> Self {
        Self::new(resource, FetchCause::Decode(err.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] FetchError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();

        HttpResponse::build(code).json(ErrorResponse {
            error: self.to_string(),
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
