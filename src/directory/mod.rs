//! Officer directory
//!
//! Read-only, paginated projection over the account-management
//! collaborator. Only officer roles are ever returned.

mod accounts;

pub use accounts::InMemoryAccounts;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::DirectoryConfig;
use crate::error::{PortalError, PortalResult};
use crate::models::{Account, OfficerDirectoryEntry};

/// Filter passed to the account collaborator.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    /// Case-insensitive substring over name, email and employee number.
    pub search: Option<String>,
    pub officers_only: bool,
}

impl AccountFilter {
    pub fn matches(&self, account: &Account) -> bool {
        if self.officers_only && !account.role.is_officer() {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                account.display_name.to_lowercase().contains(&needle)
                    || account.email.to_lowercase().contains(&needle)
                    || account.employee_no.to_lowercase().contains(&needle)
            }
        }
    }
}

/// One page of accounts plus the unpaged total.
#[derive(Debug, Clone)]
pub struct AccountPage {
    pub items: Vec<Account>,
    pub total: usize,
}

/// Account-management collaborator.
///
/// Implementations report outages as `PortalError::Upstream`.
pub trait AccountDirectory: Send + Sync {
    fn find_many(&self, filter: &AccountFilter, skip: usize, take: usize)
        -> PortalResult<AccountPage>;
    fn find_by_id(&self, id: &str) -> PortalResult<Option<Account>>;
}

/// One page of the officer directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficerPage {
    pub items: Vec<OfficerDirectoryEntry>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub has_more: bool,
}

/// Directory Service.
pub struct DirectoryService {
    accounts: Arc<dyn AccountDirectory>,
    config: DirectoryConfig,
}

impl DirectoryService {
    pub fn new(accounts: Arc<dyn AccountDirectory>, config: DirectoryConfig) -> Self {
        Self { accounts, config }
    }

    /// Offset pagination: `skip = (page - 1) * page_size`.
    pub fn list_officers(
        &self,
        search: Option<&str>,
        page: Option<usize>,
        page_size: Option<usize>,
    ) -> PortalResult<OfficerPage> {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size.max(1));
        let skip = (page - 1).saturating_mul(page_size);

        let filter = AccountFilter {
            search: search.map(str::to_string),
            officers_only: true,
        };
        let found = retry_once(|| self.accounts.find_many(&filter, skip, page_size))?;
        let items: Vec<OfficerDirectoryEntry> = found
            .items
            .iter()
            .filter_map(OfficerDirectoryEntry::from_account)
            .collect();
        let has_more = skip + items.len() < found.total;

        tracing::debug!(
            "Directory page {} (size {}): {} of {} officers",
            page,
            page_size,
            items.len(),
            found.total
        );
        Ok(OfficerPage {
            items,
            page,
            page_size,
            total: found.total,
            has_more,
        })
    }

    /// Resolve an assignee. Non-officer accounts and unknown ids are
    /// `InvalidAssignee`.
    pub fn find_officer(&self, id: &str) -> PortalResult<OfficerDirectoryEntry> {
        let account = retry_once(|| self.accounts.find_by_id(id))?
            .ok_or_else(|| PortalError::InvalidAssignee(format!("no account {}", id)))?;
        OfficerDirectoryEntry::from_account(&account).ok_or_else(|| {
            PortalError::InvalidAssignee(format!(
                "{} has role {} and cannot be assigned cases",
                id, account.role
            ))
        })
    }
}

/// Run a directory call, repeating it once after an `Upstream` failure.
fn retry_once<T>(mut call: impl FnMut() -> PortalResult<T>) -> PortalResult<T> {
    match call() {
        Err(PortalError::Upstream(reason)) => {
            tracing::warn!("Account directory unavailable ({}), retrying once", reason);
            call()
        }
        other => other,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::Role;

    /// 25 officers (`officer-01` .. `officer-25`) plus an admin and a requester.
    pub fn seeded_accounts() -> Vec<Account> {
        let mut accounts: Vec<Account> = (1..=25)
            .map(|i| Account {
                id: format!("officer-{:02}", i),
                display_name: format!("Petugas {:02}", i),
                email: format!("petugas{:02}@ppid.example.go.id", i),
                employee_no: format!("NIP{:04}", 1000 + i),
                role: match i % 3 {
                    0 => Role::CaseOfficerLead,
                    1 => Role::CaseOfficerTier1,
                    _ => Role::CaseOfficerTier2,
                },
            })
            .collect();
        accounts.push(Account {
            id: "admin".into(),
            display_name: "Admin PPID".into(),
            email: "admin@ppid.example.go.id".into(),
            employee_no: String::new(),
            role: Role::Admin,
        });
        accounts.push(Account {
            id: "warga-1".into(),
            display_name: "Budi Santoso".into(),
            email: "budi@example.com".into(),
            employee_no: String::new(),
            role: Role::Requester,
        });
        accounts
    }

    pub fn directory() -> DirectoryService {
        DirectoryService::new(
            Arc::new(InMemoryAccounts::new(seeded_accounts())),
            DirectoryConfig::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_pagination_over_25_officers() {
        let dir = directory();

        let p1 = dir.list_officers(None, Some(1), Some(10)).unwrap();
        assert_eq!(p1.items.len(), 10);
        assert!(p1.has_more);
        assert_eq!(p1.total, 25);

        let p2 = dir.list_officers(None, Some(2), Some(10)).unwrap();
        assert_eq!(p2.items.len(), 10);
        assert!(p2.has_more);
        assert_ne!(p1.items[0].id, p2.items[0].id);

        let p3 = dir.list_officers(None, Some(3), Some(10)).unwrap();
        assert_eq!(p3.items.len(), 5);
        assert!(!p3.has_more);

        let p4 = dir.list_officers(None, Some(4), Some(10)).unwrap();
        assert!(p4.items.is_empty());
        assert!(!p4.has_more);
    }

    #[test]
    fn test_search_matches_name_email_or_employee_no() {
        let dir = directory();

        let by_name = dir.list_officers(Some("petugas 07"), None, None).unwrap();
        assert_eq!(by_name.total, 1);
        assert_eq!(by_name.items[0].id, "officer-07");

        let by_email = dir.list_officers(Some("PETUGAS12@"), None, None).unwrap();
        assert_eq!(by_email.items[0].id, "officer-12");

        let by_nip = dir.list_officers(Some("nip1020"), None, None).unwrap();
        assert_eq!(by_nip.items[0].id, "officer-20");

        // Admin and requester accounts never show up.
        let by_domain = dir.list_officers(Some("example"), Some(1), Some(100)).unwrap();
        assert_eq!(by_domain.total, 25);
    }

    #[test]
    fn test_page_arguments_are_clamped() {
        let dir = directory();
        let page = dir.list_officers(None, Some(0), Some(10_000)).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 100);
        assert_eq!(page.items.len(), 25);
        assert!(!page.has_more);
    }

    /// Fails the first `failures` calls with `Upstream`.
    struct FlakyAccounts {
        inner: InMemoryAccounts,
        failures: std::sync::atomic::AtomicUsize,
    }

    impl FlakyAccounts {
        fn new(failures: usize) -> Self {
            Self {
                inner: InMemoryAccounts::new(seeded_accounts()),
                failures: std::sync::atomic::AtomicUsize::new(failures),
            }
        }

        fn trip(&self) -> PortalResult<()> {
            use std::sync::atomic::Ordering;
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(PortalError::Upstream("directory timeout".into()));
            }
            Ok(())
        }
    }

    impl AccountDirectory for FlakyAccounts {
        fn find_many(
            &self,
            filter: &AccountFilter,
            skip: usize,
            take: usize,
        ) -> PortalResult<AccountPage> {
            self.trip()?;
            self.inner.find_many(filter, skip, take)
        }

        fn find_by_id(&self, id: &str) -> PortalResult<Option<Account>> {
            self.trip()?;
            self.inner.find_by_id(id)
        }
    }

    #[test]
    fn test_upstream_failure_is_retried_once() {
        let dir = DirectoryService::new(Arc::new(FlakyAccounts::new(1)), DirectoryConfig::default());
        assert_eq!(dir.list_officers(None, None, None).unwrap().total, 25);

        let dir = DirectoryService::new(Arc::new(FlakyAccounts::new(2)), DirectoryConfig::default());
        assert!(matches!(
            dir.find_officer("officer-01"),
            Err(PortalError::Upstream(_))
        ));
    }

    #[test]
    fn test_find_officer() {
        let dir = directory();
        assert_eq!(dir.find_officer("officer-03").unwrap().id, "officer-03");
        assert!(matches!(
            dir.find_officer("admin"),
            Err(PortalError::InvalidAssignee(_))
        ));
        assert!(matches!(
            dir.find_officer("ghost"),
            Err(PortalError::InvalidAssignee(_))
        ));
    }
}
