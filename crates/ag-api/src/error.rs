//! Maps domain failures to HTTP responses.
//!
//! Backend failures are logged in full and shown to the user only as a
//! generic message.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use ag_core::error::AppError;
use serde_json::json;
use thiserror::Error;

pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),

    /// Malformed request body, form or path.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("template error: {0}")]
    Render(#[from] askama::Error),
}

impl From<actix_multipart::MultipartError> for ApiError {
    fn from(e: actix_multipart::MultipartError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl ApiError {
    /// Text safe to show to the user.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::App(AppError::Backend(_)) | ApiError::Render(_) => GENERIC_FAILURE.to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::App(AppError::Validation(_)) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::App(AppError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
            ApiError::App(AppError::NotFound(_, _)) => StatusCode::NOT_FOUND,
            ApiError::App(AppError::Unauthorized(_)) => StatusCode::UNAUTHORIZED,
            ApiError::App(AppError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::App(AppError::Backend(_)) | ApiError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::debug!("request rejected: {}", self);
        }
        HttpResponse::build(status).json(json!({ "error": self.public_message() }))
    }
}
