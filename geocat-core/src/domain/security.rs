//! User security domain model - password hash and credential metadata

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::address::merge_field;
use super::result::{Error, Result};

/// Salt length in bytes for new password hashes
const SALT_LEN: usize = 16;

/// Security sub-record owned by exactly one user.
///
/// Only password hashes are stored (Argon2id PHC strings kept as bytes),
/// never the password itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSecurity {
    #[serde(skip_serializing, default)]
    pub password: Option<Vec<u8>>,
    pub security_notes: Option<String>,
    /// Where credentials live when not local (e.g. "LDAP")
    pub auth_type: Option<String>,
}

impl UserSecurity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash `plain` with Argon2id and a fresh random salt
    pub fn hash_password(plain: &str) -> Result<Vec<u8>> {
        let salt_bytes: [u8; SALT_LEN] = rand::thread_rng().gen();
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| Error::Other(format!("Failed to encode salt: {}", e)))?;
        let hash = Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| Error::Other(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string().into_bytes())
    }

    /// Replace the stored hash with a hash of `plain`
    pub fn set_password(&mut self, plain: &str) -> Result<()> {
        self.password = Some(Self::hash_password(plain)?);
        Ok(())
    }

    /// Check `plain` against the stored hash.
    /// Returns false when no hash is stored or it cannot be parsed.
    pub fn verify_password(&self, plain: &str) -> bool {
        let Some(bytes) = self.password.as_deref() else {
            return false;
        };
        let Ok(encoded) = std::str::from_utf8(bytes) else {
            return false;
        };
        match PasswordHash::new(encoded) {
            Ok(parsed) => Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    pub fn has_password(&self) -> bool {
        self.password.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Copy data from `other` using the same null policy as user merges
    pub fn merge_security(&mut self, other: &UserSecurity, merge_null_data: bool) {
        merge_field(&mut self.password, &other.password, merge_null_data);
        merge_field(&mut self.security_notes, &other.security_notes, merge_null_data);
        merge_field(&mut self.auth_type, &other.auth_type, merge_null_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let mut security = UserSecurity::new();
        security.set_password("s3cret").unwrap();

        assert!(security.has_password());
        assert!(security.verify_password("s3cret"));
        assert!(!security.verify_password("wrong"));
    }

    #[test]
    fn test_hash_is_not_plaintext_and_salted() {
        let a = UserSecurity::hash_password("same").unwrap();
        let b = UserSecurity::hash_password("same").unwrap();
        assert_ne!(a, b"same".to_vec());
        assert_ne!(a, b);
        assert!(String::from_utf8(a).unwrap().starts_with("$argon2id$"));
    }

    #[test]
    fn test_verify_without_hash() {
        let security = UserSecurity::new();
        assert!(!security.verify_password(""));

        let garbage = UserSecurity {
            password: Some(b"not-a-phc-string".to_vec()),
            ..UserSecurity::new()
        };
        assert!(!garbage.verify_password("not-a-phc-string"));
    }

    #[test]
    fn test_merge_respects_null_policy() {
        let mut security = UserSecurity::new();
        security.set_password("keep-me").unwrap();
        security.auth_type = Some("LDAP".to_string());

        let patch = UserSecurity {
            security_notes: Some("reset requested".to_string()),
            ..UserSecurity::new()
        };

        security.merge_security(&patch, false);
        assert!(security.verify_password("keep-me"));
        assert_eq!(security.auth_type.as_deref(), Some("LDAP"));
        assert_eq!(security.security_notes.as_deref(), Some("reset requested"));

        security.merge_security(&patch, true);
        assert!(!security.has_password());
        assert!(security.auth_type.is_none());
    }
}
