//! In-process account directory seeded from config

use std::collections::HashMap;

use super::{AccountDirectory, AccountFilter, AccountPage};
use crate::error::PortalResult;
use crate::models::Account;

/// Accounts held in memory, ordered by display name then id.
pub struct InMemoryAccounts {
    ordered: Vec<Account>,
    by_id: HashMap<String, usize>,
}

impl InMemoryAccounts {
    pub fn new(mut accounts: Vec<Account>) -> Self {
        accounts.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        let by_id = accounts
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.clone(), i))
            .collect();
        Self {
            ordered: accounts,
            by_id,
        }
    }
}

impl AccountDirectory for InMemoryAccounts {
    fn find_many(
        &self,
        filter: &AccountFilter,
        skip: usize,
        take: usize,
    ) -> PortalResult<AccountPage> {
        let matching: Vec<&Account> = self.ordered.iter().filter(|a| filter.matches(a)).collect();
        let total = matching.len();
        let items = matching.into_iter().skip(skip).take(take).cloned().collect();
        Ok(AccountPage { items, total })
    }

    fn find_by_id(&self, id: &str) -> PortalResult<Option<Account>> {
        Ok(self.by_id.get(id).map(|&i| self.ordered[i].clone()))
    }
}
