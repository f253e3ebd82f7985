//! Activity Log collaborator
//!
//! Fire-and-forget: a failing log never fails the operation that
//! triggered it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::CaseRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    CaseFiled,
    CaseAssigned,
    CaseCompleted,
    CaseRejected,
    MessagePosted,
    SessionEnded,
    SessionResumed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub actor_id: String,
    pub kind: ActivityKind,
    pub case: CaseRef,
    pub detail: Option<String>,
}

impl ActivityEvent {
    pub fn new(actor_id: &str, kind: ActivityKind, case: CaseRef, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            at,
            actor_id: actor_id.to_string(),
            kind,
            case,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub trait ActivityLog: Send + Sync {
    fn record(&self, event: &ActivityEvent) -> anyhow::Result<()>;
}

/// Writes events to the `activity` tracing target.
#[derive(Debug, Default)]
pub struct TracingActivityLog;

impl ActivityLog for TracingActivityLog {
    fn record(&self, event: &ActivityEvent) -> anyhow::Result<()> {
        let line = serde_json::to_string(event)?;
        tracing::info!(target: "activity", "{}", line);
        Ok(())
    }
}

/// Record an event, logging and dropping any failure.
pub fn record_quietly(log: &dyn ActivityLog, event: ActivityEvent) {
    if let Err(e) = log.record(&event) {
        tracing::warn!("Activity log dropped {:?} on {}: {:#}", event.kind, event.case, e);
    }
}
