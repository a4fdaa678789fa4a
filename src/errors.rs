use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Upstream service failure: {0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound => AppError::NotFound,
            DomainError::Validation(msg) => AppError::BadRequest(msg),
            DomainError::Unauthorized => AppError::Unauthorized,
            DomainError::Forbidden(msg) => AppError::Forbidden(msg),
            DomainError::Conflict(msg) => AppError::Conflict(msg),
            DomainError::InvalidTransition(e) => AppError::InvalidTransition(e.to_string()),
            DomainError::External(msg) => AppError::BadGateway(msg),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let body = |msg: &str| serde_json::json!({ "error": msg });
        match self {
            AppError::BadRequest(_) => HttpResponse::BadRequest().json(body(&self.to_string())),
            AppError::Unauthorized => HttpResponse::Unauthorized().json(body(&self.to_string())),
            AppError::Forbidden(_) => HttpResponse::Forbidden().json(body(&self.to_string())),
            AppError::NotFound => HttpResponse::NotFound().json(body(&self.to_string())),
            AppError::Conflict(_) => HttpResponse::Conflict().json(body(&self.to_string())),
            AppError::InvalidTransition(_) => {
                HttpResponse::UnprocessableEntity().json(body(&self.to_string()))
            }
            AppError::BadGateway(_) => HttpResponse::BadGateway().json(body(&self.to_string())),
            AppError::Internal(msg) => {
                log::error!("internal error: {msg}");
                HttpResponse::InternalServerError().json(body("Internal server error"))
            }
        }
    }
}
