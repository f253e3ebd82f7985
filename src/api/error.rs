//! Error envelope for HTTP responses

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::PortalError;

/// Wire form: `{"error": {"code", "message", ...}}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

/// A [`PortalError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub PortalError);

impl From<PortalError> for ApiError {
    fn from(err: PortalError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(err: &PortalError) -> StatusCode {
    match err {
        PortalError::Unauthenticated | PortalError::InvalidCredential => StatusCode::UNAUTHORIZED,
        PortalError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        PortalError::NotFound(_) => StatusCode::NOT_FOUND,
        PortalError::Validation(_) | PortalError::InvalidAssignee(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PortalError::InvalidTransition(_) | PortalError::Conflict(_) | PortalError::Aborted => {
            StatusCode::CONFLICT
        }
        PortalError::SessionClosed(_) => StatusCode::LOCKED,
        PortalError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        PortalError::Upstream(_) => StatusCode::BAD_GATEWAY,
        PortalError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", err);
        } else {
            tracing::debug!("Request rejected: {}", err);
        }

        let (reason, reset_at, retry_after) = match &err {
            PortalError::SessionClosed(reason) => (Some(reason.as_str()), None, None),
            PortalError::RateLimited {
                reset_at,
                retry_after_secs,
            } => (None, Some(*reset_at), Some(*retry_after_secs)),
            _ => (None, None, None),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: err.code(),
                message: err.to_string(),
                reason,
                reset_at,
            },
        };

        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        if let Some(secs) = retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockReason;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&PortalError::InvalidCredential),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&PortalError::InvalidAssignee("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&PortalError::SessionClosed(BlockReason::AwaitingReply)),
            StatusCode::LOCKED
        );
        assert_eq!(
            status_for(&PortalError::Upstream("down".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError(PortalError::RateLimited {
            reset_at: Utc::now() + chrono::Duration::seconds(30),
            retry_after_secs: 30,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");
    }
}
