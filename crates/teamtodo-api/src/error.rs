//! Mapping of service errors onto HTTP responses

use axum::{http::StatusCode, Json};
use teamtodo_core::{ErrorKind, ServiceError};
use tracing::{error, warn};

use crate::models::ErrorResponse;

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::BackendFailure | ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a service error, logging store and unexpected failures in full.
pub fn service_error(err: ServiceError) -> ApiError {
    let kind = err.kind();

    match kind {
        ErrorKind::BackendFailure | ErrorKind::Unexpected => {
            error!("{} ({}): {}", err.code(), kind.as_str(), err)
        }
        ErrorKind::Authorization => warn!("Denied: {}", err),
        _ => {}
    }

    let body = ErrorResponse {
        error: err.user_message(),
        code: Some(err.code().to_string()),
        kind: Some(kind.as_str().to_string()),
        remedy: err.remedy().map(str::to_string),
        detail: err.diagnostic().map(str::to_string),
    };

    (status_for(kind), Json(body))
}

/// Generic 500 for failures outside the service layer
pub fn internal_error(context: &str, err: impl std::fmt::Display) -> ApiError {
    error!("{}: {}", context, err);

    let mut body = ErrorResponse::new("Something went wrong, please try again", "UNEXPECTED_ERROR");
    body.kind = Some(ErrorKind::Unexpected.as_str().to_string());
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::SelfInvite, StatusCode::FORBIDDEN),
            (ServiceError::TeamNotFound, StatusCode::NOT_FOUND),
            (ServiceError::AlreadyMember, StatusCode::CONFLICT),
            (
                ServiceError::Unexpected("bug".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(service_error(err).0, status);
        }
    }

    #[test]
    fn test_detail_only_for_database_errors() {
        let (_, Json(body)) = service_error(ServiceError::Database {
            diagnostic: Some("23505".into()),
            message: "UNIQUE constraint failed: teams.name".into(),
        });
        assert_eq!(body.code.as_deref(), Some("DATABASE_ERROR"));
        assert_eq!(body.detail.as_deref(), Some("23505"));
        assert!(!body.error.contains("UNIQUE"));

        let (_, Json(body)) = service_error(ServiceError::AlreadyMember);
        assert!(body.detail.is_none());
        assert_eq!(body.kind.as_deref(), Some("CONFLICT"));
    }
}
