//! Caller roles and account projections

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PortalError;

/// Role of a caller or message author.
///
/// Parsed once at the Auth boundary; nothing downstream compares role strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Role {
    Requester,
    CaseOfficerTier1,
    CaseOfficerTier2,
    CaseOfficerLead,
    Admin,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Requester => "requester",
            Role::CaseOfficerTier1 => "case_officer_tier1",
            Role::CaseOfficerTier2 => "case_officer_tier2",
            Role::CaseOfficerLead => "case_officer_lead",
            Role::Admin => "admin",
            Role::System => "system",
        }
    }

    /// Tier1, Tier2 and Lead: the roles a case can be assigned to.
    pub fn is_officer(&self) -> bool {
        matches!(
            self,
            Role::CaseOfficerTier1 | Role::CaseOfficerTier2 | Role::CaseOfficerLead
        )
    }

    /// Officers plus Admin: everyone who answers requesters.
    pub fn is_staff(&self) -> bool {
        self.is_officer() || *self == Role::Admin
    }

    /// Lead and Admin see and route every case.
    pub fn can_route(&self) -> bool {
        matches!(self, Role::CaseOfficerLead | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "requester" | "pemohon" | "user" => Ok(Role::Requester),
            "case_officer_tier1" | "tier1" | "ppid_pelaksana" => Ok(Role::CaseOfficerTier1),
            "case_officer_tier2" | "tier2" | "ppid_pembantu" => Ok(Role::CaseOfficerTier2),
            "case_officer_lead" | "lead" | "ppid_utama" | "atasan_ppid" => {
                Ok(Role::CaseOfficerLead)
            }
            "admin" => Ok(Role::Admin),
            "system" => Ok(Role::System),
            other => Err(PortalError::Validation(format!("unknown role: {}", other))),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = PortalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Authenticated caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    pub display_name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            display_name: display_name.into(),
        }
    }

    /// Author identity used for workflow-generated messages.
    pub fn system() -> Self {
        Self::new("system", Role::System, "Sistem")
    }
}

/// Account record owned by the account-management collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub employee_no: String,
    pub role: Role,
}

/// Read-only directory projection of an officer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerDirectoryEntry {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub employee_no: String,
    pub role: Role,
}

impl OfficerDirectoryEntry {
    /// Project an account; `None` for non-officer roles.
    pub fn from_account(account: &Account) -> Option<Self> {
        if !account.role.is_officer() {
            return None;
        }
        Some(Self {
            id: account.id.clone(),
            display_name: account.display_name.clone(),
            email: account.email.clone(),
            employee_no: account.employee_no.clone(),
            role: account.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_ignores_case_and_separators() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(
            "Case-Officer-Lead".parse::<Role>().unwrap(),
            Role::CaseOfficerLead
        );
        assert_eq!("PPID_PELAKSANA".parse::<Role>().unwrap(), Role::CaseOfficerTier1);
        assert!("director".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_deserializes_mixed_case() {
        let role: Role = serde_json::from_str("\"CASE_OFFICER_TIER2\"").unwrap();
        assert_eq!(role, Role::CaseOfficerTier2);
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"case_officer_tier2\"");
    }

    #[test]
    fn test_role_capabilities() {
        assert!(Role::CaseOfficerTier2.is_officer());
        assert!(!Role::Admin.is_officer());
        assert!(Role::Admin.is_staff());
        assert!(!Role::Requester.is_staff());
        assert!(!Role::System.is_staff());
        assert!(Role::CaseOfficerLead.can_route());
        assert!(!Role::CaseOfficerTier1.can_route());
    }

    #[test]
    fn test_directory_projection_skips_non_officers() {
        let admin = Account {
            id: "a1".into(),
            display_name: "Admin".into(),
            email: "admin@example.go.id".into(),
            employee_no: String::new(),
            role: Role::Admin,
        };
        assert!(OfficerDirectoryEntry::from_account(&admin).is_none());

        let officer = Account {
            role: Role::CaseOfficerTier1,
            ..admin
        };
        let entry = OfficerDirectoryEntry::from_account(&officer).unwrap();
        assert_eq!(entry.role, Role::CaseOfficerTier1);
    }
}
