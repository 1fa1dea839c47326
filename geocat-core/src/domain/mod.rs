//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation and merge logic - no I/O or external dependencies.

mod address;
mod authority;
mod profile;
pub mod result;
mod security;
mod user;

pub use address::Address;
pub use authority::Authority;
pub use profile::Profile;
pub use security::UserSecurity;
pub use user::{User, UserDetails, KIND_MAX_LEN};
