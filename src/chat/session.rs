//! Session Gate control: officers end and resume a case's chat session

use serde::Serialize;

use super::{gate, ChatService};
use crate::error::{PortalError, PortalResult};
use crate::models::{Actor, CaseRef, ChatMessage, MessageType, SessionView};
use crate::store::{can_resolve, is_participant, notices, CaseRecord};

/// A session flip and the notice recorded for it.
#[derive(Debug, Clone, Serialize)]
pub struct SessionChange {
    pub session: SessionView,
    pub notice: ChatMessage,
}

impl ChatService {
    pub fn session(&self, actor: &Actor, case: CaseRef) -> PortalResult<SessionView> {
        self.store.read(|state| {
            let record = state.record(case)?;
            if !is_participant(actor, &record.case) {
                return Err(PortalError::permission(format!("you are not part of {}", case)));
            }
            Ok(view(record))
        })
    }

    pub fn end_session(&self, actor: &Actor, case: CaseRef) -> PortalResult<SessionChange> {
        self.set_active(actor, case, false)
    }

    pub fn resume_session(&self, actor: &Actor, case: CaseRef) -> PortalResult<SessionChange> {
        self.set_active(actor, case, true)
    }

    /// Flip `is_active` and append the matching notice in one write.
    fn set_active(&self, actor: &Actor, case: CaseRef, active: bool) -> PortalResult<SessionChange> {
        if !actor.role.is_staff() {
            return Err(PortalError::permission("only officers control chat sessions"));
        }

        let change = self.store.write(|state, now| {
            let record = state.record_mut(case)?;
            if !can_resolve(actor, &record.case) {
                return Err(PortalError::permission(format!(
                    "you cannot control the session of {}",
                    case
                )));
            }
            if record.session.is_active == active {
                return Err(PortalError::InvalidTransition(format!(
                    "session of {} is already {}",
                    case,
                    if active { "active" } else { "ended" }
                )));
            }

            record.session.is_active = active;
            let body = if active {
                record.session.resumed_by = Some(actor.id.clone());
                record.session.resumed_at = Some(now);
                notices::session_resumed(&actor.display_name)
            } else {
                record.session.ended_by = Some(actor.id.clone());
                record.session.ended_at = Some(now);
                notices::session_ended(&actor.display_name)
            };

            let notice = state.append_notice(case, body, now)?;
            let session = view(state.record(case)?);
            Ok(SessionChange { session, notice })
        })?;

        tracing::info!(
            "Session of {} {} by {}",
            case,
            if active { "resumed" } else { "ended" },
            actor.id
        );
        Ok(change)
    }
}

fn view(record: &CaseRecord) -> SessionView {
    let verdict = gate::requester_verdict(record, MessageType::Text);
    SessionView {
        case: record.case.case_ref(),
        session: record.session.clone(),
        requester_can_send: verdict.is_ok(),
        blocked_reason: verdict.err(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::PostMessage;
    use crate::models::{BlockReason, Role};
    use crate::store::test_support::*;
    use crate::store::NewCase;

    #[test]
    fn test_end_and_resume_emit_one_notice_each() {
        let (store, _clock) = store_with_clock();
        let chat = ChatService::new(store.clone());
        let case = file_request(&store);
        forward(&store, case);

        let ended = chat.end_session(&officer(), case).unwrap();
        assert!(!ended.session.session.is_active);
        assert_eq!(ended.session.session.ended_by.as_deref(), Some("ppid-1"));
        assert_eq!(ended.notice.author_role, Role::System);
        assert!(ended.notice.body.contains("diakhiri"));

        assert!(matches!(
            chat.end_session(&officer(), case),
            Err(PortalError::InvalidTransition(_))
        ));

        let resumed = chat.resume_session(&lead(), case).unwrap();
        assert!(resumed.session.session.is_active);
        assert!(resumed.notice.body.contains("dilanjutkan"));

        let notices = chat
            .list_messages(&admin(), case, None)
            .unwrap()
            .into_iter()
            .filter(|m| m.message_type == MessageType::System)
            .count();
        assert_eq!(notices, 2);
    }

    #[test]
    fn test_session_control_is_staff_only() {
        let (store, _clock) = store_with_clock();
        let chat = ChatService::new(store.clone());
        let case = file_request(&store);
        forward(&store, case);

        assert!(matches!(
            chat.end_session(&requester(), case),
            Err(PortalError::PermissionDenied(_))
        ));
        assert!(matches!(
            chat.end_session(&other_officer(), case),
            Err(PortalError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_ended_session_blocks_requester_except_first_message() {
        let (store, _clock) = store_with_clock();
        let chat = ChatService::new(store.clone());
        let parent = file_request(&store);
        let objection = store
            .create_case(&requester(), NewCase::objection(parent.id, "keberatan"))
            .unwrap()
            .case_ref();
        store.write(|state, now| {
            let record = state.record_mut(objection).unwrap();
            record.case.status = crate::models::CaseStatus::Forwarded;
            record.case.assigned_officer_id = Some(officer().id);
            record.case.touch(now);
        });

        chat.end_session(&admin(), objection).unwrap();
        // Opening message goes through even though the session is ended.
        chat.post_message(&requester(), objection, PostMessage::text("halo"))
            .unwrap();
        assert_eq!(
            chat.post_message(&requester(), objection, PostMessage::text("halo?")),
            Err(PortalError::SessionClosed(BlockReason::SessionEnded))
        );
        let view = chat.session(&requester(), objection).unwrap();
        assert!(!view.requester_can_send);
        assert_eq!(view.blocked_reason, Some(BlockReason::SessionEnded));

        // Officers still talk while the session is ended.
        chat.post_message(&officer(), objection, PostMessage::text("mohon tunggu"))
            .unwrap();

        chat.resume_session(&admin(), objection).unwrap();
        chat.post_message(&requester(), objection, PostMessage::text("baik"))
            .unwrap();
        chat.post_message(&requester(), objection, PostMessage::text("lagi"))
            .unwrap();
    }

    #[test]
    fn test_session_view_reports_awaiting_reply() {
        let (store, _clock) = store_with_clock();
        let chat = ChatService::new(store.clone());
        let case = file_request(&store);

        assert!(chat.session(&requester(), case).unwrap().requester_can_send);
        chat.post_message(&requester(), case, PostMessage::text("halo"))
            .unwrap();
        let view = chat.session(&requester(), case).unwrap();
        assert_eq!(view.blocked_reason, Some(BlockReason::AwaitingReply));
    }
}
