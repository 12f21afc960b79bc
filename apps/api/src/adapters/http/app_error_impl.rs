use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use verdant_types::{ApiErrorBody, ErrorCode};

use crate::app_error::AppError;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Server-side failures are errors; everything else is the caller's doing.
        match &self {
            AppError::Database(_) | AppError::Internal(_) | AppError::Gateway(_) => {
                tracing::error!(error = ?self, "Request failed");
            }
            _ => tracing::debug!(error = %self, "Request rejected"),
        }

        match self {
            AppError::Database(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError, None)
            }
            AppError::InvalidCredentials => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::InvalidCredentials, None)
            }
            AppError::Unauthorized => {
                error_resp(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, None)
            }
            AppError::Forbidden => error_resp(StatusCode::FORBIDDEN, ErrorCode::Forbidden, None),
            AppError::RateLimited => {
                error_resp(StatusCode::TOO_MANY_REQUESTS, ErrorCode::RateLimited, None)
            }
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, Some(msg))
            }
            AppError::NotFound => error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, None),
            AppError::Conflict(msg) => {
                error_resp(StatusCode::CONFLICT, ErrorCode::Conflict, Some(msg))
            }
            e @ AppError::InvalidTransition { .. } => error_resp(
                StatusCode::CONFLICT,
                ErrorCode::InvalidTransition,
                Some(e.to_string()),
            ),
            e @ AppError::ActionNotAllowed { .. } => error_resp(
                StatusCode::CONFLICT,
                ErrorCode::ActionNotAllowed,
                Some(e.to_string()),
            ),
            AppError::PaymentVerificationFailed => error_resp(
                StatusCode::BAD_REQUEST,
                ErrorCode::PaymentVerificationFailed,
                None,
            ),
            AppError::Gateway(_) => {
                error_resp(StatusCode::BAD_GATEWAY, ErrorCode::GatewayError, None)
            }
            AppError::Internal(_) => {
                error_resp(StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError, None)
            }
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: Option<String>) -> Response {
    (status, Json(ApiErrorBody { code, message })).into_response()
}
