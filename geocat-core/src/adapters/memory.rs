//! In-memory repository implementation
//!
//! Same semantics as the DuckDB adapter, without any storage. Used for
//! service tests and dry runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::domain::result::{Error, Result};
use crate::domain::User;
use crate::ports::UserRepository;

#[derive(Default)]
struct Store {
    users: BTreeMap<i32, User>,
    next_user_id: i32,
    next_address_id: i32,
}

/// Repository backed by a map of users keyed by id
#[derive(Default)]
pub struct InMemoryUserRepository {
    store: Mutex<Store>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }
}

impl UserRepository for InMemoryUserRepository {
    fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    fn save_user(&self, user: &User) -> Result<User> {
        user.validate().map_err(Error::validation)?;

        let mut store = self.lock()?;

        if store
            .users
            .values()
            .any(|u| u.username == user.username && u.id != user.id)
        {
            return Err(Error::conflict(format!(
                "username '{}' is already taken",
                user.username
            )));
        }

        let owned_addresses: HashSet<i32> = if user.id == 0 {
            HashSet::new()
        } else {
            let existing = store
                .users
                .get(&user.id)
                .ok_or_else(|| Error::not_found(format!("user with id {}", user.id)))?;
            existing.addresses.iter().map(|a| a.id).collect()
        };

        let mut saved = user.clone();
        if saved.id == 0 {
            store.next_user_id += 1;
            saved.id = store.next_user_id;
        }
        let mut kept = HashSet::new();
        for address in &mut saved.addresses {
            if address.id == 0 || !owned_addresses.contains(&address.id) || kept.contains(&address.id) {
                store.next_address_id += 1;
                address.id = store.next_address_id;
            }
            kept.insert(address.id);
        }

        store.users.insert(saved.id, saved.clone());
        Ok(saved)
    }

    fn delete_user(&self, id: i32) -> Result<bool> {
        Ok(self.lock()?.users.remove(&id).is_some())
    }

    fn find_user_by_id(&self, id: i32) -> Result<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut matches: Vec<User> = self
            .lock()?
            .users
            .values()
            .filter(|u| u.emails.contains(email))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(matches.into_iter().next())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.lock()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    fn count_users(&self) -> Result<i64> {
        Ok(self.lock()?.users.len() as i64)
    }
}
