//! Chat message and session models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CaseRef, Role};

/// Message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    System,
    Evidence,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::System => "system",
            MessageType::Evidence => "evidence",
        }
    }
}

/// File reference carried by a message. `url` comes from the file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Chat message. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub case: CaseRef,
    pub author_id: String,
    pub author_role: Role,
    pub author_display_name: String,
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Thread sort key.
    pub fn cursor(&self) -> MessageCursor {
        MessageCursor {
            created_at: self.created_at,
            id: self.id,
        }
    }
}

/// Position in a thread; polling clients pass the last one they rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageCursor {
    pub created_at: DateTime<Utc>,
    pub id: u64,
}

/// Whether the requester may currently post on a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub is_active: bool,
    pub ended_by: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
    pub resumed_by: Option<String>,
    pub resumed_at: Option<DateTime<Utc>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            is_active: true,
            ended_by: None,
            ended_at: None,
            resumed_by: None,
            resumed_at: None,
        }
    }
}

/// Why a requester's composer is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// An officer ended the chat session.
    SessionEnded,
    /// Request-kind throttle: no staff reply since the requester's last message.
    AwaitingReply,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::SessionEnded => "session_ended",
            BlockReason::AwaitingReply => "awaiting_reply",
        }
    }
}

/// Session state plus the requester's current send verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub case: CaseRef,
    pub session: SessionState,
    pub requester_can_send: bool,
    pub blocked_reason: Option<BlockReason>,
}
