//! Requester send rules
//!
//! Evaluated against the persisted session record and the thread itself;
//! nothing here reads message text.

use crate::models::{BlockReason, CaseKind, MessageType, Role};
use crate::store::CaseRecord;

/// Whether the case requester may post a message of `message_type` now.
///
/// Order: first-message exception, then the session, then (Request-kind
/// only, not for evidence) the reply throttle. Objections never throttle.
pub fn requester_verdict(record: &CaseRecord, message_type: MessageType) -> Result<(), BlockReason> {
    let last_own = record
        .messages
        .iter()
        .rposition(|m| m.author_role == Role::Requester);
    let Some(last_own) = last_own else {
        // First message always goes through, even on an ended session.
        // TODO: product to confirm this exception is intended and not a
        // workaround for empty threads.
        return Ok(());
    };

    if !record.session.is_active {
        return Err(BlockReason::SessionEnded);
    }

    if record.case.kind == CaseKind::Request && message_type != MessageType::Evidence {
        let replied = record.messages[last_own + 1..]
            .iter()
            .any(|m| m.author_role.is_staff());
        if !replied {
            return Err(BlockReason::AwaitingReply);
        }
    }
    Ok(())
}
