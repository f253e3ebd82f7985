//! Error taxonomy shared by every portal operation
//!
//! Each variant carries a stable code that clients can match on. HTTP status
//! mapping lives in `api::error`.

use chrono::{DateTime, Utc};

use crate::models::BlockReason;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortalError {
    #[error("missing bearer credential")]
    Unauthenticated,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid assignee: {0}")]
    InvalidAssignee(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{}", session_closed_message(.0))]
    SessionClosed(BlockReason),

    #[error("rate limited until {reset_at}")]
    RateLimited {
        reset_at: DateTime<Utc>,
        /// Seconds until `reset_at`, measured on the limiter's clock.
        retry_after_secs: u64,
    },

    #[error("upstream failure: {0}")]
    Upstream(String),

    /// Batch item skipped because another item in an atomic batch failed.
    #[error("aborted: another item in the batch failed")]
    Aborted,

    #[error("internal error: {0}")]
    Internal(String),
}

fn session_closed_message(reason: &BlockReason) -> &'static str {
    match reason {
        BlockReason::SessionEnded => "chat session has been ended by an officer",
        BlockReason::AwaitingReply => "waiting for an officer reply before sending again",
    }
}

impl PortalError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PortalError::Unauthenticated => "UNAUTHENTICATED",
            PortalError::InvalidCredential => "INVALID_CREDENTIAL",
            PortalError::PermissionDenied(_) => "PERMISSION_DENIED",
            PortalError::NotFound(_) => "NOT_FOUND",
            PortalError::Validation(_) => "VALIDATION_ERROR",
            PortalError::InvalidAssignee(_) => "INVALID_ASSIGNEE",
            PortalError::InvalidTransition(_) => "INVALID_TRANSITION",
            PortalError::Conflict(_) => "CONFLICT",
            PortalError::SessionClosed(_) => "SESSION_CLOSED",
            PortalError::RateLimited { .. } => "RATE_LIMITED",
            PortalError::Upstream(_) => "UPSTREAM_FAILURE",
            PortalError::Aborted => "ABORTED",
            PortalError::Internal(_) => "INTERNAL",
        }
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        PortalError::PermissionDenied(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        PortalError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        PortalError::NotFound(msg.into())
    }
}

pub type PortalResult<T> = Result<T, PortalError>;
