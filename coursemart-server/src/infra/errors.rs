use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use coursemart_core::{SessionError, api_types::ApiResponse};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Vec<String>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::error(self.message).with_errors(self.errors));
        (self.status, body).into_response()
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match err {
            SessionError::Unavailable(source) => {
                tracing::error!(error = ?source, "credential store unavailable");
                Self::new(status, "Service temporarily unavailable")
            }
            SessionError::Internal(detail) => {
                tracing::error!(error = %detail, "session operation failed");
                Self::new(status, "Something went wrong")
            }
            other => Self::new(status, other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                Self::bad_request("Request body missing")
            }
            other => Self::bad_request("Invalid request body").with_errors(vec![other.body_text()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_keep_their_message() {
        let err = AppError::from(SessionError::conflict("taken"));
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.message, "taken");
    }

    #[test]
    fn infrastructure_errors_are_made_generic() {
        let err = AppError::from(SessionError::Unavailable(anyhow::anyhow!(
            "pool timed out at 10.0.0.4"
        )));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.message.contains("10.0.0.4"));

        let err = AppError::from(SessionError::Internal("bad key".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Something went wrong");
    }
}
