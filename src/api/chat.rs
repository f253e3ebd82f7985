//! Chat thread and session routes

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiResult, Caller};
use crate::api::error::ApiError;
use crate::chat::{PostMessage, SessionChange};
use crate::error::PortalError;
use crate::models::{CaseKind, CaseRef, ChatMessage, MessageCursor, SessionView};
use crate::portal::Portal;

/// Polling cursor: both halves or neither.
#[derive(Debug, Deserialize)]
pub struct AfterQuery {
    after_at: Option<DateTime<Utc>>,
    after_id: Option<u64>,
}

impl AfterQuery {
    fn cursor(&self) -> Result<Option<MessageCursor>, PortalError> {
        match (self.after_at, self.after_id) {
            (Some(created_at), Some(id)) => Ok(Some(MessageCursor { created_at, id })),
            (None, None) => Ok(None),
            _ => Err(PortalError::validation(
                "after_at and after_id must be given together",
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReadMark {
    cursor: Option<MessageCursor>,
}

pub async fn list_messages(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Path((kind, id)): Path<(CaseKind, u64)>,
    Query(query): Query<AfterQuery>,
) -> ApiResult<Vec<ChatMessage>> {
    let messages = portal.list_messages(&actor, CaseRef::new(kind, id), query.cursor()?)?;
    Ok(Json(messages))
}

pub async fn post_message(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Path((kind, id)): Path<(CaseKind, u64)>,
    Json(post): Json<PostMessage>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let message = portal.post_message(&actor, CaseRef::new(kind, id), post)?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_read(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Path((kind, id)): Path<(CaseKind, u64)>,
) -> ApiResult<ReadMark> {
    let cursor = portal.mark_read(&actor, CaseRef::new(kind, id))?;
    Ok(Json(ReadMark { cursor }))
}

pub async fn session(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Path((kind, id)): Path<(CaseKind, u64)>,
) -> ApiResult<SessionView> {
    Ok(Json(portal.session(&actor, CaseRef::new(kind, id))?))
}

pub async fn end_session(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Path((kind, id)): Path<(CaseKind, u64)>,
) -> ApiResult<SessionChange> {
    Ok(Json(portal.end_session(&actor, CaseRef::new(kind, id))?))
}

pub async fn resume_session(
    State(portal): State<Arc<Portal>>,
    Caller(actor): Caller,
    Path((kind, id)): Path<(CaseKind, u64)>,
) -> ApiResult<SessionChange> {
    Ok(Json(portal.resume_session(&actor, CaseRef::new(kind, id))?))
}
