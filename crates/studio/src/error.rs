//! Unified error handling for the studio API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cm_studio_core::{MediaError, StaffError};
use serde::Serialize;
use thiserror::Error;

use crate::capture::CaptureError;
use crate::services::{RemoteError, SalesError, StudioError};

/// Application-level error type for the studio API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Orchestrator failure.
    #[error(transparent)]
    Studio(#[from] StudioError),

    /// Staff or sale failure.
    #[error(transparent)]
    Sales(#[from] SalesError),

    /// Uploaded media could not be decoded.
    #[error("Invalid media: {0}")]
    Media(#[from] MediaError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Studio(err) => studio_status(err),
            Self::Sales(err) => sales_status(err),
            Self::Media(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

const fn studio_status(err: &StudioError) -> StatusCode {
    match err {
        StudioError::Validation(_) | StudioError::UnknownPreset(_) => StatusCode::BAD_REQUEST,
        StudioError::Busy(_) | StudioError::Superseded(_) => StatusCode::CONFLICT,
        StudioError::Cancelled(_) => StatusCode::REQUEST_TIMEOUT,
        StudioError::TimedOut(..) => StatusCode::GATEWAY_TIMEOUT,
        StudioError::MissingToken => StatusCode::UNAUTHORIZED,
        StudioError::EntryNotFound(_) | StudioError::Closed => StatusCode::NOT_FOUND,
        StudioError::Capture(CaptureError::PermissionDenied) => StatusCode::FORBIDDEN,
        StudioError::Capture(_) => StatusCode::BAD_REQUEST,
        StudioError::Remote {
            operation: None,
            source: RemoteError::Permission(_),
            ..
        } => StatusCode::FORBIDDEN,
        StudioError::Remote {
            source: RemoteError::RateLimited(_),
            ..
        } => StatusCode::TOO_MANY_REQUESTS,
        StudioError::Remote { .. } => StatusCode::BAD_GATEWAY,
    }
}

const fn sales_status(err: &SalesError) -> StatusCode {
    match err {
        SalesError::Staff(StaffError::NotSignedIn) => StatusCode::UNAUTHORIZED,
        SalesError::Staff(StaffError::UnknownMember(_)) | SalesError::Invalid(_) => {
            StatusCode::BAD_REQUEST
        }
        SalesError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        SalesError::Busy => StatusCode::CONFLICT,
        SalesError::Remote(_) => StatusCode::BAD_GATEWAY,
        SalesError::Interrupted(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Report server-side and upstream failures
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                source = ?std::error::Error::source(&self),
                sentry_event_id = %event_id,
                "Studio request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cm_studio_core::{Operation, SaleError, ValidationError};

    use super::*;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("workspace".to_string());
        assert_eq!(err.to_string(), "Not found: workspace");

        let err = AppError::from(StudioError::Validation(ValidationError::EmptyPrompt));
        assert_eq!(err.to_string(), "Please describe the edit.");
    }

    #[test]
    fn test_studio_error_status_codes() {
        assert_eq!(
            get_status(StudioError::Validation(ValidationError::MissingImage)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(StudioError::Busy(Operation::Edit)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(StudioError::Superseded(Operation::Caption)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(StudioError::TimedOut(Operation::Edit, Duration::from_secs(90))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            get_status(StudioError::Capture(CaptureError::PermissionDenied)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(get_status(StudioError::MissingToken), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_remote_error_status_codes() {
        let edit_failure = StudioError::Remote {
            operation: Some(Operation::Edit),
            message: "Error generating edit.".to_string(),
            source: RemoteError::Failed("500".to_string()),
        };
        assert_eq!(get_status(edit_failure), StatusCode::BAD_GATEWAY);

        let upload_denied = StudioError::Remote {
            operation: None,
            message: "denied".to_string(),
            source: RemoteError::Permission("denied".to_string()),
        };
        assert_eq!(get_status(upload_denied), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_sales_error_status_codes() {
        assert_eq!(
            get_status(SalesError::Staff(StaffError::NotSignedIn)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(SalesError::Invalid(SaleError::ZeroQuantity)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(SalesError::NotConfigured),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Internal("connection string leaked".to_string());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
