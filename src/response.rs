use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::db::store::StoreError;
use crate::services::analysis::AnalysisError;
use crate::services::learning_path::LearningPathError;
use crate::services::llm_provider::{
    CompletionError, CREDITS_EXHAUSTED_MESSAGE, GENERIC_FAILURE_MESSAGE, RATE_LIMIT_MESSAGE,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct AppError {
    status: StatusCode,
    code: String,
    pub(crate) message: String,
    is_operational: bool,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", message)
    }

    pub fn payment_required(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::PAYMENT_REQUIRED, "CREDITS_EXHAUSTED", message)
    }

    /// A 500 whose message is still shown to the caller.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::operational(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            is_operational: false,
        }
    }

    fn operational(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            is_operational: true,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::not_found(format!("{what} not found")),
            StoreError::Conflict(message) => json_error(StatusCode::CONFLICT, "CONFLICT", message),
            other => {
                tracing::error!(error = %other, "store operation failed");
                AppError::internal(other.to_string())
            }
        }
    }
}

impl From<CompletionError> for AppError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::RateLimited => AppError::rate_limited(RATE_LIMIT_MESSAGE),
            CompletionError::CreditsExhausted => AppError::payment_required(CREDITS_EXHAUSTED_MESSAGE),
            other => {
                tracing::error!(error = %other, "completion request failed");
                AppError::failure(other.user_message())
            }
        }
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::EmptyInput => AppError::bad_request("Input content is required"),
            AnalysisError::Completion(inner) => inner.into(),
            AnalysisError::Mapping(inner) => {
                tracing::error!(error = %inner, "completion response unusable");
                AppError::failure(GENERIC_FAILURE_MESSAGE)
            }
            AnalysisError::Store(inner) => {
                tracing::error!(error = %inner, "failed to persist analysis");
                AppError::failure("Failed to store analysis")
            }
        }
    }
}

/// Learning-path failures are all reported as 500, keeping the upstream wording.
impl From<LearningPathError> for AppError {
    fn from(err: LearningPathError) -> Self {
        tracing::error!(error = %err, "learning path generation failed");
        match err {
            LearningPathError::Completion(inner) => AppError::failure(inner.user_message()),
            LearningPathError::Mapping(_) => AppError::failure(GENERIC_FAILURE_MESSAGE),
            LearningPathError::Store(_) => AppError::failure("Failed to store learning path"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_operational {
            self.message
        } else {
            "Internal server error".to_string()
        };

        let body = ErrorResponse {
            error: message,
            code: self.code,
        };

        (self.status, Json(body)).into_response()
    }
}

pub fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> AppError {
    AppError {
        status,
        code: code.into(),
        message: message.into(),
        is_operational: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_their_message() {
        let response = AppError::internal("connection reset by peer").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn store_not_found_maps_to_404() {
        let err: AppError = StoreError::NotFound("question").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "question not found");
    }

    #[test]
    fn completion_limits_keep_their_status() {
        let err: AppError = CompletionError::RateLimited.into();
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.message, "Rate limit exceeded. Please try again later.");

        let err: AppError = CompletionError::CreditsExhausted.into();
        assert_eq!(err.status, StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn learning_path_rate_limit_is_a_server_error() {
        let err: AppError = LearningPathError::Completion(CompletionError::RateLimited).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Rate limit exceeded. Please try again later.");
    }
}
