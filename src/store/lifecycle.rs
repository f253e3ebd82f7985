//! Case creation, lookup and the resolution transitions
//!
//! `Submitted -> Forwarded` is owned by the assignment router; this file
//! covers the rest of the machine: `Forwarded -> Completed | Rejected`.

use serde::{Deserialize, Serialize};

use super::{can_resolve, can_view, CaseStore};
use crate::error::{PortalError, PortalResult};
use crate::models::{Actor, Case, CaseFilter, CaseKind, CaseRef, CaseStatus, ChatMessage, Role};
use crate::store::notices;

/// Input for [`CaseStore::create_case`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewCase {
    pub kind: CaseKind,
    pub body: String,
    #[serde(default)]
    pub parent_request_id: Option<u64>,
}

impl NewCase {
    pub fn request(body: impl Into<String>) -> Self {
        Self {
            kind: CaseKind::Request,
            body: body.into(),
            parent_request_id: None,
        }
    }

    pub fn objection(parent_request_id: u64, body: impl Into<String>) -> Self {
        Self {
            kind: CaseKind::Objection,
            body: body.into(),
            parent_request_id: Some(parent_request_id),
        }
    }
}

/// Result of a resolution: the updated case and the notice posted for it.
#[derive(Debug, Clone, Serialize)]
pub struct Transition {
    pub case: Case,
    pub notice: ChatMessage,
}

impl CaseStore {
    pub fn create_case(&self, actor: &Actor, new: NewCase) -> PortalResult<Case> {
        if actor.role != Role::Requester {
            return Err(PortalError::permission("only requesters file cases"));
        }
        let body = new.body.trim().to_string();
        if body.is_empty() {
            return Err(PortalError::validation("case body must not be empty"));
        }

        self.write(|state, now| {
            match (new.kind, new.parent_request_id) {
                (CaseKind::Request, Some(_)) => {
                    return Err(PortalError::validation(
                        "a request cannot reference a parent request",
                    ));
                }
                (CaseKind::Objection, None) => {
                    return Err(PortalError::validation(
                        "an objection must reference the request it objects to",
                    ));
                }
                (CaseKind::Objection, Some(parent)) => {
                    let parent = state.record(CaseRef::request(parent))?;
                    if parent.case.requester_id != actor.id {
                        return Err(PortalError::permission(
                            "objections can only be filed against your own requests",
                        ));
                    }
                }
                (CaseKind::Request, None) => {}
            }

            let id = state.allocate_case_id(new.kind);
            let case = Case {
                id,
                kind: new.kind,
                parent_request_id: new.parent_request_id,
                requester_id: actor.id.clone(),
                requester_name: actor.display_name.clone(),
                status: CaseStatus::Submitted,
                assigned_officer_id: None,
                body,
                resolution_note: None,
                stage: None,
                responded_at: None,
                completed_at: None,
                version: 1,
                created_at: now,
                updated_at: now,
            };
            state.insert(case.clone());
            tracing::info!("Filed {} by {}", case.case_ref(), actor.id);
            Ok(case)
        })
    }

    pub fn get_case(&self, actor: &Actor, case: CaseRef) -> PortalResult<Case> {
        self.read(|state| {
            let record = state.record(case)?;
            if !can_view(actor, &record.case) {
                return Err(PortalError::permission(format!("{} is not visible to you", case)));
            }
            Ok(record.case.clone())
        })
    }

    /// Cases visible to `actor` matching `filter`, oldest first.
    pub fn list_cases(&self, actor: &Actor, filter: &CaseFilter) -> PortalResult<Vec<Case>> {
        if actor.role == Role::System {
            return Err(PortalError::permission("system identity cannot list cases"));
        }
        let mut cases: Vec<Case> = self.read(|state| {
            state
                .records()
                .map(|r| &r.case)
                .filter(|c| can_view(actor, c) && filter.matches(c))
                .cloned()
                .collect()
        });
        cases.sort_by(|a, b| (a.created_at, a.kind, a.id).cmp(&(b.created_at, b.kind, b.id)));
        Ok(cases)
    }

    /// `Forwarded -> Completed`. The note is optional; the requester is told
    /// to submit usage evidence within the evidence window.
    pub fn complete(
        &self,
        actor: &Actor,
        case: CaseRef,
        note: Option<String>,
        expected_version: Option<u64>,
    ) -> PortalResult<Transition> {
        let note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let window = self.evidence_window();

        self.write(|state, now| {
            let record = state.record_mut(case)?;
            check_resolution(actor, &record.case, CaseStatus::Completed, expected_version)?;

            record.case.status = CaseStatus::Completed;
            record.case.resolution_note = note.clone();
            record.case.completed_at = Some(now);
            record.case.touch(now);
            let updated = record.case.clone();

            let body = notices::completion(
                updated.kind,
                note.as_deref(),
                now + window,
                window.num_days(),
            );
            let notice = state.append_notice(case, body, now)?;
            tracing::info!("{} completed by {}", case, actor.id);
            Ok(Transition {
                case: updated,
                notice,
            })
        })
    }

    /// `Forwarded -> Rejected`. A non-empty note is mandatory and is quoted
    /// in the notice.
    pub fn reject(
        &self,
        actor: &Actor,
        case: CaseRef,
        note: &str,
        expected_version: Option<u64>,
    ) -> PortalResult<Transition> {
        let note = note.trim().to_string();

        self.write(|state, now| {
            let record = state.record_mut(case)?;
            if !can_resolve(actor, &record.case) {
                return Err(PortalError::permission(format!("you cannot resolve {}", case)));
            }
            if note.is_empty() {
                return Err(PortalError::validation("a rejection requires a note"));
            }
            check_resolution(actor, &record.case, CaseStatus::Rejected, expected_version)?;

            record.case.status = CaseStatus::Rejected;
            record.case.resolution_note = Some(note.clone());
            record.case.touch(now);
            let updated = record.case.clone();

            let notice = state.append_notice(case, notices::rejection(updated.kind, &note), now)?;
            tracing::info!("{} rejected by {}", case, actor.id);
            Ok(Transition {
                case: updated,
                notice,
            })
        })
    }
}

fn check_resolution(
    actor: &Actor,
    case: &Case,
    target: CaseStatus,
    expected_version: Option<u64>,
) -> PortalResult<()> {
    if !can_resolve(actor, case) {
        return Err(PortalError::permission(format!(
            "you cannot resolve {}",
            case.case_ref()
        )));
    }
    if !case.status.can_advance_to(target) {
        return Err(PortalError::InvalidTransition(format!(
            "{} is {}; cannot move to {}",
            case.case_ref(),
            case.status,
            target
        )));
    }
    if let Some(expected) = expected_version {
        if expected != case.version {
            return Err(PortalError::Conflict(format!(
                "{} changed (version {}, expected {})",
                case.case_ref(),
                case.version,
                expected
            )));
        }
    }
    Ok(())
}
