//! User service - account administration and sign-in checks

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::domain::result::Error;
use crate::domain::{Address, Profile, User, UserDetails, UserSecurity};
use crate::ports::UserRepository;

/// Input for [`UserService::create_user`]
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    /// Falls back to the configured default profile
    pub profile: Option<Profile>,
    pub password: Option<String>,
    pub emails: Vec<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub organisation: Option<String>,
    pub kind: Option<String>,
    pub addresses: Vec<Address>,
}

impl NewUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }
}

/// User administration on top of a [`UserRepository`]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    default_profile: Profile,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>, default_profile: Profile) -> Self {
        Self {
            repository,
            default_profile,
        }
    }

    /// Create and store a new user, hashing the password if one is given
    pub fn create_user(&self, new_user: NewUser) -> Result<User> {
        let mut security = UserSecurity::new();
        if let Some(password) = new_user.password.as_deref() {
            security.set_password(password)?;
        }

        let mut user = User::new(
            new_user.username,
            new_user.profile.unwrap_or(self.default_profile),
        )
        .with_security(security);
        user.name = new_user.name;
        user.surname = new_user.surname;
        user.organisation = new_user.organisation;
        user.kind = new_user.kind;
        user.emails.extend(new_user.emails);
        user.addresses = new_user.addresses;

        let saved = self.repository.save_user(&user)?;
        Ok(saved)
    }

    /// Look a user up by username, failing when it doesn't exist
    pub fn get_user(&self, username: &str) -> Result<User> {
        self.repository
            .find_user_by_username(username)?
            .ok_or_else(|| Error::not_found(format!("user '{}'", username)).into())
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.repository.find_user_by_email(email)?)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.repository.list_users()?)
    }

    pub fn count_users(&self) -> Result<i64> {
        Ok(self.repository.count_users()?)
    }

    /// Merge `patch` into the stored user and save.
    ///
    /// Follows [`User::merge_user`]: the email set and the address list are
    /// taken from `patch` as a whole, so callers wanting to keep them must
    /// copy them into the patch.
    pub fn update_user(&self, username: &str, patch: &User, merge_null_data: bool) -> Result<User> {
        let mut user = self.get_user(username)?;
        user.merge_user(patch, merge_null_data);
        let saved = self
            .repository
            .save_user(&user)
            .with_context(|| format!("Failed to update user '{}'", username))?;
        Ok(saved)
    }

    pub fn set_password(&self, username: &str, password: &str) -> Result<()> {
        let mut user = self.get_user(username)?;
        user.security.set_password(password)?;
        self.repository.save_user(&user)?;
        Ok(())
    }

    /// Check credentials. Returns the user when the password matches and the
    /// account may sign in, None otherwise.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.repository.find_user_by_username(username)? else {
            return Ok(None);
        };

        let allowed = user.is_enabled()
            && user.is_account_non_expired()
            && user.is_account_non_locked()
            && user.is_credentials_non_expired();

        if allowed && user.security.verify_password(password) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Append an address to the user's addresses
    pub fn add_address(&self, username: &str, address: Address) -> Result<User> {
        let mut user = self.get_user(username)?;
        user.addresses.push(address);
        Ok(self.repository.save_user(&user)?)
    }

    /// Return the user's primary address, creating a blank one if needed
    pub fn ensure_primary_address(&self, username: &str) -> Result<Address> {
        let mut user = self.get_user(username)?;
        if user.primary_address().is_some() {
            return Ok(user.addresses.swap_remove(0));
        }
        user.ensure_primary_address();
        let mut saved = self.repository.save_user(&user)?;
        Ok(saved.addresses.swap_remove(0))
    }

    /// Delete a user and everything it owns. Returns false if unknown.
    pub fn delete_user(&self, username: &str) -> Result<bool> {
        match self.repository.find_user_by_username(username)? {
            Some(user) => Ok(self.repository.delete_user(user.id)?),
            None => Ok(false),
        }
    }
}
