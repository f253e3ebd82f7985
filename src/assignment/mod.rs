//! Assignment Router
//!
//! Routes `Submitted` cases to officers. The officer write and the
//! `Submitted -> Forwarded` step commit together, and only while the case
//! is still `Submitted`: a second concurrent assignment gets `Conflict`
//! instead of overwriting the first.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::directory::DirectoryService;
use crate::error::{PortalError, PortalResult};
use crate::models::{
    Actor, Case, CaseKind, CaseRef, CaseStatus, OfficerDirectoryEntry, ProcessingStage,
};
use crate::store::{CaseStore, StoreState};

/// Per-item outcome of [`AssignmentRouter::assign_bulk`].
#[derive(Debug, Clone, Serialize)]
pub struct BulkItemResult {
    pub case_id: u64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case: Option<Case>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BulkItemError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkItemError {
    pub code: &'static str,
    pub message: String,
}

impl From<&PortalError> for BulkItemError {
    fn from(err: &PortalError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

pub struct AssignmentRouter {
    store: Arc<CaseStore>,
    directory: Arc<DirectoryService>,
}

impl AssignmentRouter {
    pub fn new(store: Arc<CaseStore>, directory: Arc<DirectoryService>) -> Self {
        Self { store, directory }
    }

    /// Assign one case. `expected_version`, when given, must match too.
    pub fn assign(
        &self,
        actor: &Actor,
        case: CaseRef,
        officer_id: &str,
        expected_version: Option<u64>,
    ) -> PortalResult<Case> {
        let officer = self.resolve(actor, officer_id)?;
        let assigned = self
            .store
            .write(|state, now| apply(state, case, &officer, expected_version, now))?;
        tracing::info!("{} assigned to {} by {}", case, officer.id, actor.id);
        Ok(assigned)
    }

    /// Assign many cases of one kind to one officer under a single lock.
    ///
    /// With `atomic`, the first failing item aborts the batch: nothing is
    /// written and every other item reports `ABORTED`. Without it, passing
    /// items are written and failures are reported alongside.
    pub fn assign_bulk(
        &self,
        actor: &Actor,
        kind: CaseKind,
        case_ids: &[u64],
        officer_id: &str,
        atomic: bool,
    ) -> PortalResult<Vec<BulkItemResult>> {
        if case_ids.is_empty() {
            return Err(PortalError::validation("no cases given"));
        }
        let officer = self.resolve(actor, officer_id)?;

        let results = self.store.write(|state, now| {
            let mut outcomes: Vec<PortalResult<()>> = Vec::with_capacity(case_ids.len());
            let mut seen = HashSet::new();
            for &id in case_ids {
                let case = CaseRef::new(kind, id);
                let outcome = if !seen.insert(id) {
                    Err(PortalError::Conflict(format!("{} listed twice", case)))
                } else {
                    precheck(state, case, None)
                };
                outcomes.push(outcome);
            }

            let any_failed = outcomes.iter().any(|o| o.is_err());
            if atomic && any_failed {
                return case_ids
                    .iter()
                    .zip(outcomes)
                    .map(|(&id, outcome)| {
                        let err = outcome.err().unwrap_or(PortalError::Aborted);
                        failure(id, &err)
                    })
                    .collect::<Vec<_>>();
            }

            case_ids
                .iter()
                .zip(outcomes)
                .map(|(&id, outcome)| {
                    let result = outcome
                        .and_then(|_| apply(state, CaseRef::new(kind, id), &officer, None, now));
                    match result {
                        Ok(case) => BulkItemResult {
                            case_id: id,
                            ok: true,
                            case: Some(case),
                            error: None,
                        },
                        Err(err) => failure(id, &err),
                    }
                })
                .collect()
        });

        let succeeded = results.iter().filter(|r| r.ok).count();
        tracing::info!(
            "Bulk assignment of {} {} case(s) to {} by {}: {} succeeded",
            case_ids.len(),
            kind.as_str(),
            officer.id,
            actor.id,
            succeeded
        );
        Ok(results)
    }

    fn resolve(&self, actor: &Actor, officer_id: &str) -> PortalResult<OfficerDirectoryEntry> {
        if !actor.role.can_route() {
            return Err(PortalError::permission(
                "only a lead officer or admin can assign cases",
            ));
        }
        self.directory.find_officer(officer_id)
    }
}

fn failure(case_id: u64, err: &PortalError) -> BulkItemResult {
    BulkItemResult {
        case_id,
        ok: false,
        case: None,
        error: Some(err.into()),
    }
}

/// Precondition: the case exists, is still `Submitted` and, if asked,
/// still at `expected_version`.
fn precheck(state: &StoreState, case: CaseRef, expected_version: Option<u64>) -> PortalResult<()> {
    let current = &state.record(case)?.case;
    if current.status != CaseStatus::Submitted {
        let holder = current.assigned_officer_id.as_deref().unwrap_or("nobody");
        return Err(PortalError::Conflict(format!(
            "{} is already assigned to {} ({})",
            case, holder, current.status
        )));
    }
    if let Some(expected) = expected_version {
        if current.version != expected {
            return Err(PortalError::Conflict(format!(
                "{} changed (version {}, expected {})",
                case, current.version, expected
            )));
        }
    }
    Ok(())
}

fn apply(
    state: &mut StoreState,
    case: CaseRef,
    officer: &OfficerDirectoryEntry,
    expected_version: Option<u64>,
    now: chrono::DateTime<chrono::Utc>,
) -> PortalResult<Case> {
    precheck(state, case, expected_version)?;
    let record = state.record_mut(case)?;
    record.case.assigned_officer_id = Some(officer.id.clone());
    record.case.status = CaseStatus::Forwarded;
    if record.case.kind == CaseKind::Request {
        record.case.stage = Some(ProcessingStage::Acknowledged);
    }
    record.case.touch(now);
    Ok(record.case.clone())
}
