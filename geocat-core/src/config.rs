//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "users": { "defaultProfile": "RegisteredUser", "mergeNullData": false }
//! }
//! ```
//! Keys this crate doesn't manage are preserved on save.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::domain::Profile;

/// Env var overriding the default profile for new users
pub const DEFAULT_PROFILE_ENV: &str = "GEOCAT_DEFAULT_PROFILE";

pub const SETTINGS_FILENAME: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    users: UserSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserSettings {
    #[serde(default = "default_profile")]
    default_profile: Profile,
    #[serde(default)]
    merge_null_data: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

fn default_profile() -> Profile {
    Profile::RegisteredUser
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            default_profile: default_profile(),
            merge_null_data: false,
            other: HashMap::new(),
        }
    }
}

/// geocat configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    /// Profile given to users created without one
    pub default_profile: Profile,
    /// Default null policy for user updates
    pub merge_null_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: default_profile(),
            merge_null_data: false,
        }
    }
}

impl Config {
    /// Load config from the data directory.
    ///
    /// A missing, unreadable or malformed settings file falls back to
    /// defaults. `GEOCAT_DEFAULT_PROFILE` overrides the file's default profile.
    pub fn load(data_dir: &Path) -> Result<Self> {
        Self::load_with_override(data_dir, std::env::var(DEFAULT_PROFILE_ENV).ok())
    }

    fn load_with_override(data_dir: &Path, profile_override: Option<String>) -> Result<Self> {
        let raw: SettingsFile = std::fs::read_to_string(data_dir.join(SETTINGS_FILENAME))
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        let default_profile = match profile_override {
            Some(name) => name.parse::<Profile>().map_err(|_| {
                Error::config(format!("{}: unknown profile '{}'", DEFAULT_PROFILE_ENV, name))
            })?,
            None => raw.users.default_profile,
        };

        Ok(Self {
            default_profile,
            merge_null_data: raw.users.merge_null_data,
        })
    }

    /// Save config to the data directory, keeping unmanaged settings
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join(SETTINGS_FILENAME);

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        settings.users.default_profile = self.default_profile;
        settings.users.merge_null_data = self.merge_null_data;

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempdir().unwrap();
        let config = Config::load_with_override(dir.path(), None).unwrap();
        assert!(!config.merge_null_data);
        assert_eq!(config.default_profile, Profile::RegisteredUser);
    }

    #[test]
    fn test_file_values_are_read() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILENAME),
            r#"{"users":{"defaultProfile":"Editor","mergeNullData":true}}"#,
        )
        .unwrap();

        let config = Config::load_with_override(dir.path(), None).unwrap();
        assert_eq!(config.default_profile, Profile::Editor);
        assert!(config.merge_null_data);
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        std::fs::write(
            &path,
            r#"{"theme":"dark","users":{"defaultProfile":"Guest","ldap":true}}"#,
        )
        .unwrap();

        let mut config = Config::load_with_override(dir.path(), None).unwrap();
        config.merge_null_data = true;
        config.save(dir.path()).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["theme"], "dark");
        assert_eq!(saved["users"]["ldap"], true);
        assert_eq!(saved["users"]["defaultProfile"], "Guest");
        assert_eq!(saved["users"]["mergeNullData"], true);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILENAME), "{not json").unwrap();
        let config = Config::load_with_override(dir.path(), None).unwrap();
        assert!(!config.merge_null_data);
        assert_eq!(config.default_profile, Profile::RegisteredUser);
    }

    #[test]
    fn test_unreadable_file_falls_back() {
        let dir = tempdir().unwrap();
        // A directory where the file should be cannot be read as a string
        std::fs::create_dir(dir.path().join(SETTINGS_FILENAME)).unwrap();
        let config = Config::load_with_override(dir.path(), None).unwrap();
        assert_eq!(config.default_profile, Profile::RegisteredUser);
    }

    // The only test in this crate that touches the process environment
    #[test]
    fn test_env_overrides_default_profile() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILENAME),
            r#"{"users":{"defaultProfile":"Guest"}}"#,
        )
        .unwrap();

        let previous = std::env::var(DEFAULT_PROFILE_ENV).ok();

        std::env::set_var(DEFAULT_PROFILE_ENV, "reviewer");
        let overridden = Config::load(dir.path());

        std::env::set_var(DEFAULT_PROFILE_ENV, "Superuser");
        let invalid = Config::load(dir.path());

        std::env::remove_var(DEFAULT_PROFILE_ENV);
        let from_file = Config::load(dir.path());

        if let Some(value) = previous {
            std::env::set_var(DEFAULT_PROFILE_ENV, value);
        }

        assert_eq!(overridden.unwrap().default_profile, Profile::Reviewer);
        assert_eq!(from_file.unwrap().default_profile, Profile::Guest);

        let err = invalid.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
        assert!(err.to_string().contains("Superuser"));
    }
}
