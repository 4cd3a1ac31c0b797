use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

use crate::domain::errors::{DomainError, ServiceError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    BadRequest { code: String, message: String },

    #[error("{message}")]
    NotFound { code: String, message: String },

    #[error("{message}")]
    Conflict { code: String, message: String },

    #[error("{message}")]
    Upstream { code: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest {
            code: "INVALID_INPUT".to_string(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            AppError::BadRequest { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Upstream { code, .. } => code,
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        let code = e.code().to_string();
        let message = e.to_string();
        match e {
            DomainError::CustomerIdRequired
            | DomainError::OrderIdRequired
            | DomainError::CartEmpty
            | DomainError::Creating(_)
            | DomainError::InvalidInput(_) => AppError::BadRequest { code, message },
            DomainError::NotFound
            | DomainError::AddressNotFound
            | DomainError::Cart(ServiceError::NotFound(_)) => AppError::NotFound { code, message },
            DomainError::AlreadyCancelled
            | DomainError::CannotBeCancelled(_)
            | DomainError::NotPending
            | DomainError::Refunding(_)
            | DomainError::InvalidTransition { .. }
            | DomainError::Updating(_)
            | DomainError::Cart(ServiceError::Rejected { .. }) => {
                AppError::Conflict { code, message }
            }
            DomainError::Payment(_) | DomainError::Cart(ServiceError::Unavailable(_)) => {
                AppError::Upstream { code, message }
            }
            DomainError::Internal(detail) => AppError::Internal(detail),
            DomainError::Storage(_) | DomainError::ReferenceUnavailable(_) => {
                AppError::Internal(message)
            }
        }
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Internal(detail) => {
                log::error!("request failed: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "code": self.code(),
            "error": message
        }))
    }
}
