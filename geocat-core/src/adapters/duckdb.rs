//! DuckDB repository implementation

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use duckdb::types::Type;
use duckdb::{params, Connection, ToSql};
use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{Address, Profile, User, UserSecurity};
use crate::migrations::MIGRATIONS;
use crate::ports::UserRepository;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const USER_COLUMNS: &str = "u.id, u.username, u.surname, u.name, u.organisation, u.kind, u.profile";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock")
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Error::Database(e.to_string())
    }
}

/// Row counts used to spot broken ownership links
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub users: i64,
    pub addresses: i64,
    /// Address rows no user links to
    pub orphan_addresses: i64,
    /// Users missing their security row
    pub users_without_security: i64,
    /// Email rows pointing at a deleted user
    pub dangling_emails: i64,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.orphan_addresses == 0 && self.users_without_security == 0 && self.dangling_emails == 0
    }
}

/// DuckDB repository implementation
pub struct DuckDbUserRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbUserRepository {
    /// Open (or create) the database file at `db_path`
    ///
    /// Retries with exponential backoff on file locking errors, which show up
    /// when another process has the catalog open.
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[geocat] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory_with_flags(config)?),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> anyhow::Result<Connection> {
        // Extension autoloading off: nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Path of the database file, None for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Run database migrations, returning what was applied
    pub fn run_migrations(&self) -> anyhow::Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn, MIGRATIONS).run_pending()
    }

    /// Count rows that break the ownership rules
    pub fn check_integrity(&self) -> Result<IntegrityReport> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };

        Ok(IntegrityReport {
            users: count("SELECT COUNT(*) FROM users")?,
            addresses: count("SELECT COUNT(*) FROM address")?,
            orphan_addresses: count(
                "SELECT COUNT(*) FROM address a
                 WHERE NOT EXISTS (SELECT 1 FROM user_address ua WHERE ua.address_id = a.id)",
            )?,
            users_without_security: count(
                "SELECT COUNT(*) FROM users u
                 WHERE NOT EXISTS (SELECT 1 FROM user_security s WHERE s.user_id = u.id)",
            )?,
            dangling_emails: count(
                "SELECT COUNT(*) FROM user_email e
                 WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.id = e.user_id)",
            )?,
        })
    }

    // === Loading ===

    /// Run a user query and hydrate each row with its owned records
    fn query_users(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<User>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, Self::row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            let mut user = row?;
            Self::load_owned(conn, &mut user)?;
            users.push(user);
        }
        Ok(users)
    }

    fn row_to_user(row: &duckdb::Row) -> duckdb::Result<User> {
        // 0: id, 1: username, 2: surname, 3: name, 4: organisation, 5: kind, 6: profile
        let profile: String = row.get(6)?;
        let profile = profile
            .parse::<Profile>()
            .map_err(|e| duckdb::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            surname: row.get(2)?,
            name: row.get(3)?,
            emails: BTreeSet::new(),
            addresses: Vec::new(),
            organisation: row.get(4)?,
            kind: row.get(5)?,
            profile: Some(profile),
            security: UserSecurity::new(),
        })
    }

    fn load_owned(conn: &Connection, user: &mut User) -> Result<()> {
        let mut stmt = conn.prepare("SELECT email FROM user_email WHERE user_id = ? ORDER BY email")?;
        let emails = stmt.query_map([user.id], |row| row.get::<_, String>(0))?;
        for email in emails {
            user.emails.insert(email?);
        }

        let mut stmt = conn.prepare(
            "SELECT a.id, a.address, a.city, a.state, a.zip, a.country
             FROM address a
             JOIN user_address ua ON ua.address_id = a.id
             WHERE ua.user_id = ?
             ORDER BY a.id",
        )?;
        let addresses = stmt.query_map([user.id], |row| {
            Ok(Address {
                id: row.get(0)?,
                address: row.get(1)?,
                city: row.get(2)?,
                state: row.get(3)?,
                zip: row.get(4)?,
                country: row.get(5)?,
            })
        })?;
        for address in addresses {
            user.addresses.push(address?);
        }

        let mut stmt = conn.prepare(
            "SELECT password, security_notes, auth_type FROM user_security WHERE user_id = ?",
        )?;
        let mut security = stmt.query_map([user.id], |row| {
            Ok(UserSecurity {
                password: row.get(0)?,
                security_notes: row.get(1)?,
                auth_type: row.get(2)?,
            })
        })?;
        if let Some(found) = security.next() {
            user.security = found?;
        }

        Ok(())
    }

    fn next_id(conn: &Connection, sequence: &str) -> Result<i32> {
        let next: i64 = conn.query_row(&format!("SELECT nextval('{}')", sequence), [], |row| {
            row.get(0)
        })?;
        i32::try_from(next).map_err(|_| Error::database(format!("sequence {} overflowed", sequence)))
    }

    // === Saving ===

    fn write_addresses(conn: &Connection, user: &mut User) -> Result<()> {
        let mut stmt = conn.prepare("SELECT address_id FROM user_address WHERE user_id = ?")?;
        let owned: HashSet<i32> = stmt
            .query_map([user.id], |row| row.get::<_, i32>(0))?
            .collect::<duckdb::Result<_>>()?;

        let mut kept = HashSet::new();
        for address in &mut user.addresses {
            if address.id != 0 && owned.contains(&address.id) && !kept.contains(&address.id) {
                conn.execute(
                    "UPDATE address SET address = ?, city = ?, state = ?, zip = ?, country = ?
                     WHERE id = ?",
                    params![
                        address.address,
                        address.city,
                        address.state,
                        address.zip,
                        address.country,
                        address.id
                    ],
                )?;
            } else {
                address.id = Self::next_id(conn, "address_id_seq")?;
                conn.execute(
                    "INSERT INTO address (id, address, city, state, zip, country)
                     VALUES (?, ?, ?, ?, ?, ?)",
                    params![
                        address.id,
                        address.address,
                        address.city,
                        address.state,
                        address.zip,
                        address.country
                    ],
                )?;
                conn.execute(
                    "INSERT INTO user_address (user_id, address_id) VALUES (?, ?)",
                    params![user.id, address.id],
                )?;
            }
            kept.insert(address.id);
        }

        // Orphan removal
        for orphan in owned.difference(&kept) {
            conn.execute("DELETE FROM user_address WHERE address_id = ?", [*orphan])?;
            conn.execute("DELETE FROM address WHERE id = ?", [*orphan])?;
        }

        Ok(())
    }

    fn write_security(conn: &Connection, user: &User) -> Result<()> {
        let security = &user.security;
        let updated = conn.execute(
            "UPDATE user_security SET password = ?, security_notes = ?, auth_type = ?
             WHERE user_id = ?",
            params![security.password, security.security_notes, security.auth_type, user.id],
        )?;
        if updated == 0 {
            conn.execute(
                "INSERT INTO user_security (user_id, password, security_notes, auth_type)
                 VALUES (?, ?, ?, ?)",
                params![user.id, security.password, security.security_notes, security.auth_type],
            )?;
        }
        Ok(())
    }
}

impl UserRepository for DuckDbUserRepository {
    fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()
            .map_err(|e| Error::database(format!("Migration failed: {}", e)))?;
        Ok(())
    }

    fn save_user(&self, user: &User) -> Result<User> {
        user.validate().map_err(Error::validation)?;
        let profile = user.profile.map(|p| p.as_str()).unwrap_or_default();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let taken: i64 = tx.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ? AND id <> ?",
            params![user.username, user.id],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(Error::conflict(format!(
                "username '{}' is already taken",
                user.username
            )));
        }

        let mut saved = user.clone();
        if saved.id == 0 {
            saved.id = Self::next_id(&tx, "users_id_seq")?;
            tx.execute(
                "INSERT INTO users (id, username, surname, name, organisation, kind, profile)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    saved.id,
                    saved.username,
                    saved.surname,
                    saved.name,
                    saved.organisation,
                    saved.kind,
                    profile
                ],
            )?;
        } else {
            let mut stmt = tx.prepare("SELECT username FROM users WHERE id = ?")?;
            let current: Option<String> = stmt
                .query_map([saved.id], |row| row.get::<_, String>(0))?
                .next()
                .transpose()?;
            drop(stmt);
            let Some(current) = current else {
                return Err(Error::not_found(format!("user with id {}", saved.id)));
            };

            // Only touch the unique column when it actually changes
            if current != saved.username {
                tx.execute(
                    "UPDATE users SET username = ? WHERE id = ?",
                    params![saved.username, saved.id],
                )?;
            }
            tx.execute(
                "UPDATE users SET surname = ?, name = ?, organisation = ?, kind = ?, profile = ?
                 WHERE id = ?",
                params![
                    saved.surname,
                    saved.name,
                    saved.organisation,
                    saved.kind,
                    profile,
                    saved.id
                ],
            )?;
        }

        tx.execute("DELETE FROM user_email WHERE user_id = ?", [saved.id])?;
        for email in &saved.emails {
            tx.execute(
                "INSERT INTO user_email (user_id, email) VALUES (?, ?)",
                params![saved.id, email],
            )?;
        }

        Self::write_addresses(&tx, &mut saved)?;
        Self::write_security(&tx, &saved)?;

        tx.commit()?;
        Ok(saved)
    }

    fn delete_user(&self, id: i32) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM address WHERE id IN (SELECT address_id FROM user_address WHERE user_id = ?)",
            [id],
        )?;
        tx.execute("DELETE FROM user_address WHERE user_id = ?", [id])?;
        tx.execute("DELETE FROM user_email WHERE user_id = ?", [id])?;
        tx.execute("DELETE FROM user_security WHERE user_id = ?", [id])?;
        let deleted = tx.execute("DELETE FROM users WHERE id = ?", [id])?;

        tx.commit()?;
        Ok(deleted > 0)
    }

    fn find_user_by_id(&self, id: i32) -> Result<Option<User>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM users u WHERE u.id = ?", USER_COLUMNS);
        Ok(Self::query_users(&conn, &sql, params![id])?.into_iter().next())
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM users u WHERE u.username = ?", USER_COLUMNS);
        Ok(Self::query_users(&conn, &sql, params![username])?.into_iter().next())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM users u
             WHERE u.id IN (SELECT user_id FROM user_email WHERE email = ?)
             ORDER BY u.username
             LIMIT 1",
            USER_COLUMNS
        );
        Ok(Self::query_users(&conn, &sql, params![email])?.into_iter().next())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM users u ORDER BY u.username", USER_COLUMNS);
        Self::query_users(&conn, &sql, params![])
    }

    fn count_users(&self) -> Result<i64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> DuckDbUserRepository {
        let repo = DuckDbUserRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable_error("IO Error: Could not set lock on file"));
        assert!(!is_retryable_error("Catalog Error: Table does not exist"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let repo = repo();
        let mut user = User::new("alice", Profile::Reviewer)
            .with_name("Alice")
            .with_kind("GOV")
            .with_email("alice@example.org")
            .with_address(Address::new().with_city("Rome"));
        user.security.set_password("pw").unwrap();

        let saved = repo.save_user(&user).unwrap();
        assert!(saved.id > 0);
        assert!(saved.addresses[0].id > 0);

        let loaded = repo.find_user_by_username("alice").unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert!(loaded.security.verify_password("pw"));
    }

    #[test]
    fn test_unknown_stored_profile_is_an_error() {
        let repo = repo();
        repo.lock()
            .unwrap()
            .execute(
                "INSERT INTO users (id, username, profile) VALUES (42, 'legacy', 'Superuser')",
                [],
            )
            .unwrap();

        let err = repo.find_user_by_username("legacy").unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert!(repo.list_users().is_err());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let repo = repo();
        let result = repo.run_migrations().unwrap();
        assert!(result.applied.is_empty());
    }

    #[test]
    fn test_integrity_of_fresh_db() {
        let repo = repo();
        repo.save_user(&User::new("bob", Profile::Guest)).unwrap();
        let report = repo.check_integrity().unwrap();
        assert_eq!(report.users, 1);
        assert!(report.is_healthy());
    }
}
