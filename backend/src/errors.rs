use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

/// Failures surfaced by the range, export, ingestion and admin services.
///
/// Every variant maps onto a structured `{"error": ...}` response; none of
/// them escape a handler as an unhandled fault.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Access denied")]
    AccessDenied,
    #[error("Invalid chamber: {0}")]
    InvalidChamber(String),
    #[error("{0}")]
    Validation(String),
    #[error("No data available")]
    NoDataInWindow,
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::AccessDenied => StatusCode::FORBIDDEN,
            ServiceError::InvalidChamber(_) | ServiceError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NoDataInWindow | ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ServiceError::Internal(detail) => {
                log::error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}

impl From<DieselError> for ServiceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                ServiceError::Conflict(info.message().to_string())
            }
            DieselError::NotFound => ServiceError::NotFound("Record not found".to_string()),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ServiceError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        ServiceError::Internal(format!("Database connection error: {}", err))
    }
}
