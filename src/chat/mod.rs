//! Chat Thread and Session Gate
//!
//! Every case carries an append-only thread. Requesters are gated by the
//! session record and, on Request-kind cases, by the reply throttle in
//! [`gate`]. Officer replies annotate the case as being responded to.

pub mod gate;
mod session;

pub use session::SessionChange;

use std::sync::Arc;

use serde::Deserialize;

use crate::error::{PortalError, PortalResult};
use crate::models::{
    Actor, Attachment, CaseKind, CaseStatus, ChatMessage, CaseRef, MessageCursor, MessageType,
    ProcessingStage, Role,
};
use crate::store::{is_participant, CaseStore};

/// Body of a post request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostMessage {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub message_type: MessageType,
}

impl PostMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }
}

pub struct ChatService {
    store: Arc<CaseStore>,
}

impl ChatService {
    pub fn new(store: Arc<CaseStore>) -> Self {
        Self { store }
    }

    pub fn post_message(
        &self,
        actor: &Actor,
        case: CaseRef,
        post: PostMessage,
    ) -> PortalResult<ChatMessage> {
        if actor.role == Role::System || post.message_type == MessageType::System {
            return Err(PortalError::permission(
                "system messages are written by the workflow only",
            ));
        }
        if post.message_type == MessageType::Evidence && actor.role != Role::Requester {
            return Err(PortalError::permission("only the requester submits evidence"));
        }
        let body = post.body.trim().to_string();
        validate_content(&body, &post.attachments)?;

        let window = self.store.evidence_window();
        let message = self.store.write(|state, now| {
            let record = state.record_mut(case)?;
            if !is_participant(actor, &record.case) {
                return Err(PortalError::permission(format!("you are not part of {}", case)));
            }

            if post.message_type == MessageType::Evidence {
                if post.attachments.is_empty() {
                    return Err(PortalError::validation("evidence needs an attachment"));
                }
                let deadline = match (record.case.status, record.case.completed_at) {
                    (CaseStatus::Completed, Some(at)) => at + window,
                    _ => {
                        return Err(PortalError::validation(
                            "evidence can only be submitted for completed cases",
                        ))
                    }
                };
                if now > deadline {
                    return Err(PortalError::validation("the evidence window has closed"));
                }
            }

            if actor.role == Role::Requester {
                gate::requester_verdict(record, post.message_type)
                    .map_err(PortalError::SessionClosed)?;
            } else {
                if record.case.responded_at.is_none() {
                    record.case.responded_at = Some(now);
                }
                // Submitted requests stay unstaged until assignment acknowledges them.
                if record.case.kind == CaseKind::Request
                    && record.case.status == CaseStatus::Forwarded
                    && record.case.stage != Some(ProcessingStage::Processing)
                {
                    record.case.stage = Some(ProcessingStage::Processing);
                }
                record.case.updated_at = now;
            }

            let message = state.append_message(
                case,
                actor,
                body,
                post.attachments,
                post.message_type,
                now,
            )?;
            state
                .record_mut(case)?
                .read_cursors
                .insert(actor.id.clone(), message.cursor());
            Ok(message)
        })?;

        tracing::debug!("{} posted {} on {}", actor.id, message.id, case);
        Ok(message)
    }

    /// Thread in `(created_at, id)` order. With `after`, only strictly later
    /// messages are returned so polling clients can merge without duplicates.
    pub fn list_messages(
        &self,
        actor: &Actor,
        case: CaseRef,
        after: Option<MessageCursor>,
    ) -> PortalResult<Vec<ChatMessage>> {
        self.store.read(|state| {
            let record = state.record(case)?;
            if !is_participant(actor, &record.case) {
                return Err(PortalError::permission(format!("you are not part of {}", case)));
            }
            Ok(record
                .messages
                .iter()
                .filter(|m| after.map_or(true, |cursor| m.cursor() > cursor))
                .cloned()
                .collect())
        })
    }

    /// Move the caller's read cursor to the latest message.
    pub fn mark_read(&self, actor: &Actor, case: CaseRef) -> PortalResult<Option<MessageCursor>> {
        self.store.write(|state, _now| {
            let record = state.record_mut(case)?;
            if !is_participant(actor, &record.case) {
                return Err(PortalError::permission(format!("you are not part of {}", case)));
            }
            let latest = record.latest_message().map(ChatMessage::cursor);
            if let Some(cursor) = latest {
                record.read_cursors.insert(actor.id.clone(), cursor);
            }
            Ok(latest)
        })
    }
}

fn validate_content(body: &str, attachments: &[Attachment]) -> PortalResult<()> {
    if body.is_empty() && attachments.is_empty() {
        return Err(PortalError::validation(
            "a message needs a body or an attachment",
        ));
    }
    if body.is_empty() {
        return Err(PortalError::validation("attachments need a caption"));
    }
    if attachments
        .iter()
        .any(|a| a.name.trim().is_empty() || a.url.trim().is_empty())
    {
        return Err(PortalError::validation("attachments need a name and a url"));
    }
    Ok(())
}
