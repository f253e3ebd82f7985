//! Case models shared by information requests and objections

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The two case kinds sharing one status machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseKind {
    Request,
    Objection,
}

impl CaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseKind::Request => "request",
            CaseKind::Objection => "objection",
        }
    }
}

/// Case status. `Completed` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Submitted,
    Forwarded,
    Completed,
    Rejected,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Submitted => "submitted",
            CaseStatus::Forwarded => "forwarded",
            CaseStatus::Completed => "completed",
            CaseStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseStatus::Completed | CaseStatus::Rejected)
    }

    /// Whether `next` is the single forward step allowed from `self`.
    pub fn can_advance_to(&self, next: CaseStatus) -> bool {
        matches!(
            (self, next),
            (CaseStatus::Submitted, CaseStatus::Forwarded)
                | (CaseStatus::Forwarded, CaseStatus::Completed)
                | (CaseStatus::Forwarded, CaseStatus::Rejected)
        )
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-only sub-stage annotation. Never drives transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStage {
    /// A Lead or Admin routed the request to an officer.
    Acknowledged,
    /// An officer has replied in the chat.
    Processing,
}

/// Address of a case: ids are unique per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseRef {
    pub kind: CaseKind,
    pub id: u64,
}

impl CaseRef {
    pub fn new(kind: CaseKind, id: u64) -> Self {
        Self { kind, id }
    }

    pub fn request(id: u64) -> Self {
        Self::new(CaseKind::Request, id)
    }

    pub fn objection(id: u64) -> Self {
        Self::new(CaseKind::Objection, id)
    }
}

impl fmt::Display for CaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind.as_str(), self.id)
    }
}

/// A request or objection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: u64,
    pub kind: CaseKind,
    /// Objections only: the request being objected to.
    pub parent_request_id: Option<u64>,
    pub requester_id: String,
    pub requester_name: String,
    pub status: CaseStatus,
    pub assigned_officer_id: Option<String>,
    pub body: String,
    pub resolution_note: Option<String>,
    pub stage: Option<ProcessingStage>,
    pub responded_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Bumped on status and assignment writes; clients echo it back as
    /// `expected_version`.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    pub fn case_ref(&self) -> CaseRef {
        CaseRef::new(self.kind, self.id)
    }

    /// Bookkeeping after any mutation.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

/// Filter for case listings. All fields are ANDed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseFilter {
    pub kind: Option<CaseKind>,
    pub status: Option<CaseStatus>,
    pub requester_id: Option<String>,
    pub officer_id: Option<String>,
}

impl CaseFilter {
    pub fn matches(&self, case: &Case) -> bool {
        self.kind.map_or(true, |k| k == case.kind)
            && self.status.map_or(true, |s| s == case.status)
            && self
                .requester_id
                .as_deref()
                .map_or(true, |r| r == case.requester_id)
            && self
                .officer_id
                .as_deref()
                .map_or(true, |o| case.assigned_officer_id.as_deref() == Some(o))
    }
}
