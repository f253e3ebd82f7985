//! Unread Inference Engine
//!
//! "Unread" is inferred from who spoke last: a case needs an officer's
//! attention when the requester has the last word, and the requester's
//! when staff does. System notices come from staff actions and count on the
//! staff side. On top of that heuristic, a viewer's read cursor (set by
//! `mark_read` or by posting) clears the flag until a newer message lands.
//! Opening a thread without marking it read does not clear anything.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{PortalError, PortalResult};
use crate::models::{Actor, CaseKind, CaseRef, ChatMessage, Role};
use crate::store::{can_view, CaseRecord, CaseStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnreadSummary {
    pub total: usize,
    pub requests: usize,
    pub objections: usize,
    pub cases: Vec<CaseRef>,
}

pub struct UnreadEngine {
    store: Arc<CaseStore>,
}

impl UnreadEngine {
    pub fn new(store: Arc<CaseStore>) -> Self {
        Self { store }
    }

    /// Unread cases across both kinds for `viewer`.
    pub fn unread_for(&self, viewer: &Actor) -> PortalResult<UnreadSummary> {
        if viewer.role == Role::System {
            return Err(PortalError::permission("system identity has no inbox"));
        }
        let mut summary = UnreadSummary::default();
        self.store.read(|state| {
            for record in state.records().filter(|r| can_view(viewer, &r.case)) {
                if is_unread(record, viewer) {
                    summary.cases.push(record.case.case_ref());
                }
            }
        });
        summary.requests = summary
            .cases
            .iter()
            .filter(|c| c.kind == CaseKind::Request)
            .count();
        summary.objections = summary.cases.len() - summary.requests;
        summary.total = summary.cases.len();
        Ok(summary)
    }
}

fn is_unread(record: &CaseRecord, viewer: &Actor) -> bool {
    let Some(latest) = record.latest_message() else {
        return false;
    };
    if !awaits(viewer.role, latest) {
        return false;
    }
    match record.read_cursors.get(&viewer.id) {
        Some(cursor) => latest.cursor() > *cursor,
        None => true,
    }
}

/// Whether `latest` was written by the other side of the conversation.
fn awaits(viewer: Role, latest: &ChatMessage) -> bool {
    let staff_side = latest.author_role.is_staff() || latest.author_role == Role::System;
    if viewer == Role::Requester {
        staff_side
    } else {
        latest.author_role == Role::Requester
    }
}
