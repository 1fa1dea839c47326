//! User domain model

use std::collections::{BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::address::{merge_field, Address};
use super::authority::Authority;
use super::profile::Profile;
use super::security::UserSecurity;

/// Maximum stored length of [`User::kind`]
pub const KIND_MAX_LEN: usize = 16;

/// Read-only view the authentication layer needs from an account
pub trait UserDetails {
    fn username(&self) -> &str;

    /// Stored password hash as text
    fn password(&self) -> String;

    fn authorities(&self) -> Vec<Authority>;

    fn is_account_non_expired(&self) -> bool;

    fn is_account_non_locked(&self) -> bool;

    fn is_credentials_non_expired(&self) -> bool;

    fn is_enabled(&self) -> bool;
}

/// A catalog user.
///
/// Used both for sign-in (through [`UserDetails`]) and for controlling
/// access to catalog records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Storage identifier, 0 until persisted
    #[serde(default)]
    pub id: i32,
    /// Required, unique across all users
    pub username: String,
    pub surname: Option<String>,
    pub name: Option<String>,
    /// Sorted, so "first" is stable between calls
    #[serde(default)]
    pub emails: BTreeSet<String>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    pub organisation: Option<String>,
    /// Free-form category such as GOV or CONTRACTOR
    pub kind: Option<String>,
    /// Required on persisted users; absent on patches
    pub profile: Option<Profile>,
    #[serde(default)]
    pub security: UserSecurity,
}

impl User {
    /// Create a new user with the required fields
    pub fn new(username: impl Into<String>, profile: Profile) -> Self {
        Self {
            id: 0,
            username: username.into(),
            surname: None,
            name: None,
            emails: BTreeSet::new(),
            addresses: Vec::new(),
            organisation: None,
            kind: None,
            profile: Some(profile),
            security: UserSecurity::new(),
        }
    }

    /// A user with nothing set, used as a merge source for partial updates
    pub fn patch() -> Self {
        Self {
            profile: None,
            ..Self::new(String::new(), Profile::Guest)
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_surname(mut self, surname: impl Into<String>) -> Self {
        self.surname = Some(surname.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.emails.insert(email.into());
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.addresses.push(address);
        self
    }

    pub fn with_organisation(mut self, organisation: impl Into<String>) -> Self {
        self.organisation = Some(organisation.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_security(mut self, security: UserSecurity) -> Self {
        self.security = security;
        self
    }

    /// The "primary" email: first element of the email set.
    ///
    /// There is no designated primary flag, so this is only meaningful for
    /// users with a single address.
    pub fn email(&self) -> Option<&str> {
        self.emails.iter().next().map(String::as_str)
    }

    /// First address, if any
    pub fn primary_address(&self) -> Option<&Address> {
        self.addresses.first()
    }

    /// First address, inserting a blank one when the user has none
    pub fn ensure_primary_address(&mut self) -> &mut Address {
        if self.addresses.is_empty() {
            self.addresses.push(Address::new());
        }
        &mut self.addresses[0]
    }

    /// Validate user data before persisting
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.trim().is_empty() {
            return Err("username cannot be empty");
        }
        if self.profile.is_none() {
            return Err("profile is required");
        }
        if self
            .kind
            .as_ref()
            .is_some_and(|k| k.chars().count() > KIND_MAX_LEN)
        {
            return Err("kind cannot be longer than 16 characters");
        }
        Ok(())
    }

    /// Merge all data from `other` into this user.
    ///
    /// Scalar fields are copied when `merge_null_data` is set or `other` has
    /// a value (an empty username counts as no value). Emails are always
    /// replaced. Addresses are reconciled by id: matches are merged in place,
    /// addresses missing from `other` are dropped, and the rest of `other`'s
    /// addresses are appended. Security data follows the same null policy.
    pub fn merge_user(&mut self, other: &User, merge_null_data: bool) {
        if merge_null_data || !other.username.is_empty() {
            self.username = other.username.clone();
        }
        merge_field(&mut self.surname, &other.surname, merge_null_data);
        merge_field(&mut self.name, &other.name, merge_null_data);
        merge_field(&mut self.organisation, &other.organisation, merge_null_data);
        merge_field(&mut self.kind, &other.kind, merge_null_data);
        merge_field(&mut self.profile, &other.profile, merge_null_data);

        self.emails.clone_from(&other.emails);

        self.reconcile_addresses(&other.addresses, merge_null_data);

        self.security.merge_security(&other.security, merge_null_data);
    }

    fn reconcile_addresses(&mut self, others: &[Address], merge_null_data: bool) {
        // Each incoming address can be claimed by one existing address only
        let mut unmatched: HashMap<i32, VecDeque<usize>> = HashMap::new();
        for (idx, other) in others.iter().enumerate() {
            unmatched.entry(other.id).or_default().push_back(idx);
        }
        let mut claimed = vec![false; others.len()];

        self.addresses.retain_mut(|address| {
            let Some(idx) = unmatched.get_mut(&address.id).and_then(VecDeque::pop_front) else {
                return false;
            };
            address.merge_address(&others[idx], merge_null_data);
            claimed[idx] = true;
            true
        });

        self.addresses.extend(
            others
                .iter()
                .zip(claimed)
                .filter(|(_, was_claimed)| !was_claimed)
                .map(|(address, _)| address.clone()),
        );
    }
}

impl UserDetails for User {
    fn username(&self) -> &str {
        &self.username
    }

    fn password(&self) -> String {
        self.security
            .password
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default()
    }

    fn authorities(&self) -> Vec<Authority> {
        match self.profile {
            Some(profile) => profile.all_names().into_iter().map(Authority::new).collect(),
            None => Vec::new(),
        }
    }

    // No expiry or locking is tracked for catalog accounts
    fn is_account_non_expired(&self) -> bool {
        true
    }

    fn is_account_non_locked(&self) -> bool {
        true
    }

    fn is_credentials_non_expired(&self) -> bool {
        true
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
