use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use castellan_core::AppError;

mod types;

use types::ErrorResponse;

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            AppError::Validation(_)
            | AppError::InvalidLevel(_)
            | AppError::InvalidPermissionKey(_)
            | AppError::InvalidHierarchy(_)
            | AppError::CycleDetected(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_)
            | AppError::DuplicateName(_)
            | AppError::RoleInUse(_)
            | AppError::SystemRoleImmutable(_)
            | AppError::QuotaExceeded(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::PrivilegeEscalation(_) => StatusCode::FORBIDDEN,
            AppError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }

        let payload = Json(ErrorResponse::new(error_kind(&self.0), self.0.to_string()));

        (status, payload).into_response()
    }
}

fn error_kind(error: &AppError) -> &'static str {
    match error {
        AppError::Validation(_) => "validation",
        AppError::NotFound(_) => "not_found",
        AppError::Conflict(_) => "conflict",
        AppError::Unauthorized(_) => "unauthorized",
        AppError::Forbidden(_) => "permission_denied",
        AppError::Internal(_) => "internal",
        AppError::DuplicateName(_) => "duplicate_name",
        AppError::InvalidLevel(_) => "invalid_level",
        AppError::InvalidPermissionKey(_) => "invalid_permission_key",
        AppError::SystemRoleImmutable(_) => "system_role_immutable",
        AppError::RoleInUse(_) => "role_in_use",
        AppError::InvalidHierarchy(_) => "invalid_hierarchy",
        AppError::CycleDetected(_) => "cycle_detected",
        AppError::PrivilegeEscalation(_) => "privilege_escalation",
        AppError::QuotaExceeded(_) => "quota_exceeded",
        AppError::DeadlineExceeded(_) => "deadline_exceeded",
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
