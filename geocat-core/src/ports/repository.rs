//! Repository port - user persistence abstraction

use crate::domain::result::Result;
use crate::domain::User;

/// User persistence abstraction
///
/// Each write is one unit of work: either everything about the user
/// (emails, addresses, security record) is stored, or nothing is.
pub trait UserRepository: Send + Sync {
    // === Schema ===

    /// Create or upgrade the storage schema
    fn ensure_schema(&self) -> Result<()>;

    // === Writes ===

    /// Insert (id 0) or update a user and return the stored copy with
    /// identifiers assigned to the user and any new addresses.
    ///
    /// Addresses no longer listed on the user are deleted.
    fn save_user(&self, user: &User) -> Result<User>;

    /// Delete a user with its emails, addresses and security record.
    /// Returns false when no such user exists.
    fn delete_user(&self, id: i32) -> Result<bool>;

    // === Reads ===

    fn find_user_by_id(&self, id: i32) -> Result<Option<User>>;

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Find the user owning `email` (exact match)
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// All users, ordered by username
    fn list_users(&self) -> Result<Vec<User>>;

    fn count_users(&self) -> Result<i64>;
}
