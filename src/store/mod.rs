//! Case Store
//!
//! Single-writer store for cases and everything hanging off them: the chat
//! log, the session record and per-viewer read cursors. All state sits
//! behind one `RwLock`, so each operation that touches several of those
//! (assignment plus status, transition plus its system notice, session flip
//! plus its notice) commits in one critical section.

mod access;
mod lifecycle;
pub mod notices;
pub mod snapshot;

pub use access::{can_resolve, can_view, is_participant};
pub use lifecycle::{NewCase, Transition};
pub use snapshot::StoreSnapshot;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{PortalError, PortalResult};
use crate::models::{
    Actor, Attachment, Case, CaseKind, CaseRef, ChatMessage, MessageCursor, MessageType,
    SessionState,
};

/// Everything owned by one case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case: Case,
    /// Append-only, kept in `(created_at, id)` order.
    pub messages: Vec<ChatMessage>,
    pub session: SessionState,
    /// Last message each viewer marked read, keyed by subject id.
    #[serde(default)]
    pub read_cursors: HashMap<String, MessageCursor>,
}

impl CaseRecord {
    pub fn latest_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

/// Mutable store contents. Only reachable through [`CaseStore::read`] and
/// [`CaseStore::write`].
#[derive(Debug, Default)]
pub struct StoreState {
    cases: BTreeMap<CaseRef, CaseRecord>,
    next_request_id: u64,
    next_objection_id: u64,
    next_message_id: u64,
}

impl StoreState {
    pub fn record(&self, case: CaseRef) -> PortalResult<&CaseRecord> {
        self.cases
            .get(&case)
            .ok_or_else(|| PortalError::not_found(format!("{} does not exist", case)))
    }

    pub fn record_mut(&mut self, case: CaseRef) -> PortalResult<&mut CaseRecord> {
        self.cases
            .get_mut(&case)
            .ok_or_else(|| PortalError::not_found(format!("{} does not exist", case)))
    }

    pub fn records(&self) -> impl Iterator<Item = &CaseRecord> {
        self.cases.values()
    }

    fn allocate_case_id(&mut self, kind: CaseKind) -> u64 {
        let counter = match kind {
            CaseKind::Request => &mut self.next_request_id,
            CaseKind::Objection => &mut self.next_objection_id,
        };
        *counter += 1;
        *counter
    }

    fn insert(&mut self, case: Case) {
        self.cases.insert(
            case.case_ref(),
            CaseRecord {
                case,
                messages: Vec::new(),
                session: SessionState::default(),
                read_cursors: HashMap::new(),
            },
        );
    }

    /// Append a message to a case's log.
    ///
    /// `created_at` never goes below the thread's latest message, so the log
    /// stays sorted even if the clock steps backwards.
    pub fn append_message(
        &mut self,
        case: CaseRef,
        author: &Actor,
        body: String,
        attachments: Vec<Attachment>,
        message_type: MessageType,
        now: DateTime<Utc>,
    ) -> PortalResult<ChatMessage> {
        self.next_message_id += 1;
        let id = self.next_message_id;
        let record = self.record_mut(case)?;
        let created_at = match record.messages.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };
        let message = ChatMessage {
            id,
            case,
            author_id: author.id.clone(),
            author_role: author.role,
            author_display_name: author.display_name.clone(),
            body,
            attachments,
            message_type,
            created_at,
        };
        record.messages.push(message.clone());
        Ok(message)
    }

    /// Append a workflow notice authored by the System role.
    pub fn append_notice(
        &mut self,
        case: CaseRef,
        body: String,
        now: DateTime<Utc>,
    ) -> PortalResult<ChatMessage> {
        self.append_message(
            case,
            &Actor::system(),
            body,
            Vec::new(),
            MessageType::System,
            now,
        )
    }
}

/// Shared handle to the store.
pub struct CaseStore {
    state: RwLock<StoreState>,
    clock: Arc<dyn Clock>,
    evidence_window: Duration,
    dirty: AtomicBool,
}

impl CaseStore {
    pub fn new(clock: Arc<dyn Clock>, evidence_window_days: i64) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            clock,
            evidence_window: Duration::days(evidence_window_days),
            dirty: AtomicBool::new(false),
        }
    }

    /// Rebuild a store from a snapshot written by [`CaseStore::snapshot`].
    pub fn from_snapshot(
        snapshot: StoreSnapshot,
        clock: Arc<dyn Clock>,
        evidence_window_days: i64,
    ) -> Self {
        let store = Self::new(clock, evidence_window_days);
        {
            let mut state = store.state.write().unwrap_or_else(|e| e.into_inner());
            state.next_request_id = snapshot.next_request_id;
            state.next_objection_id = snapshot.next_objection_id;
            state.next_message_id = snapshot.next_message_id;
            for record in snapshot.records {
                state.cases.insert(record.case.case_ref(), record);
            }
        }
        store
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.read(|state| StoreSnapshot {
            next_request_id: state.next_request_id,
            next_objection_id: state.next_objection_id,
            next_message_id: state.next_message_id,
            records: state.cases.values().cloned().collect(),
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn evidence_window(&self) -> Duration {
        self.evidence_window
    }

    /// Run `f` under the read lock.
    ///
    /// A poisoned lock is recovered: every write either commits whole or
    /// returns an error before mutating.
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        let guard = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    /// Run `f` under the write lock with the current time.
    pub fn write<R>(&self, f: impl FnOnce(&mut StoreState, DateTime<Utc>) -> R) -> R {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();
        self.dirty.store(true, Ordering::Release);
        f(&mut guard, now)
    }

    /// Whether anything was written since the last [`CaseStore::take_dirty`].
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Flag the store for the next flush again, e.g. after a failed save.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::Role;

    pub fn store_with_clock() -> (Arc<CaseStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::fixed());
        let store = Arc::new(CaseStore::new(clock.clone(), 30));
        (store, clock)
    }

    pub fn requester() -> Actor {
        Actor::new("warga-1", Role::Requester, "Budi Santoso")
    }

    pub fn other_requester() -> Actor {
        Actor::new("warga-2", Role::Requester, "Ani Lestari")
    }

    pub fn officer() -> Actor {
        Actor::new("ppid-1", Role::CaseOfficerTier1, "Sari Wulandari")
    }

    pub fn other_officer() -> Actor {
        Actor::new("ppid-2", Role::CaseOfficerTier2, "Dewi Anggraini")
    }

    pub fn lead() -> Actor {
        Actor::new("ppid-lead", Role::CaseOfficerLead, "Hendra Gunawan")
    }

    pub fn admin() -> Actor {
        Actor::new("admin", Role::Admin, "Admin PPID")
    }

    /// File a request as [`requester`] and return its ref.
    pub fn file_request(store: &CaseStore) -> CaseRef {
        store
            .create_case(&requester(), NewCase::request("Salinan APBD 2023"))
            .unwrap()
            .case_ref()
    }

    /// Force a case to Forwarded with [`officer`] assigned, bypassing the router.
    pub fn forward(store: &CaseStore, case: CaseRef) {
        store.write(|state, now| {
            let record = state.record_mut(case).unwrap();
            record.case.status = crate::models::CaseStatus::Forwarded;
            record.case.assigned_officer_id = Some(officer().id);
            record.case.touch(now);
        });
    }
}
