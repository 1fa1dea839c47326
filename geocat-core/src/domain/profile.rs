//! Profile domain model - user role levels

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::result::Error;

/// Role level assigned to a user.
///
/// Profiles form a hierarchy: a profile grants its own name plus the names of
/// every profile below it (see [`Profile::all`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Profile {
    Administrator,
    UserAdmin,
    Reviewer,
    Editor,
    RegisteredUser,
    Guest,
    Monitor,
}

impl Profile {
    /// Every profile, in declaration order
    pub const ALL: [Profile; 7] = [
        Profile::Administrator,
        Profile::UserAdmin,
        Profile::Reviewer,
        Profile::Editor,
        Profile::RegisteredUser,
        Profile::Guest,
        Profile::Monitor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Administrator => "Administrator",
            Profile::UserAdmin => "UserAdmin",
            Profile::Reviewer => "Reviewer",
            Profile::Editor => "Editor",
            Profile::RegisteredUser => "RegisteredUser",
            Profile::Guest => "Guest",
            Profile::Monitor => "Monitor",
        }
    }

    /// Direct parents (the profiles that include this one)
    pub fn parents(&self) -> &'static [Profile] {
        match self {
            Profile::Administrator => &[],
            Profile::UserAdmin => &[Profile::Administrator],
            Profile::Reviewer => &[Profile::UserAdmin],
            Profile::Editor => &[Profile::Reviewer],
            Profile::RegisteredUser => &[Profile::Editor],
            Profile::Guest => &[Profile::RegisteredUser],
            Profile::Monitor => &[Profile::Administrator],
        }
    }

    /// Direct children (the profiles this one includes)
    pub fn children(&self) -> Vec<Profile> {
        Self::ALL
            .iter()
            .copied()
            .filter(|p| p.parents().contains(self))
            .collect()
    }

    /// This profile followed by every profile it includes, depth first
    pub fn all(&self) -> Vec<Profile> {
        let mut out = Vec::new();
        self.collect_all(&mut out);
        out
    }

    fn collect_all(&self, out: &mut Vec<Profile>) {
        if out.contains(self) {
            return;
        }
        out.push(*self);
        for child in self.children() {
            child.collect_all(out);
        }
    }

    /// Names of [`Profile::all`], in the same order
    pub fn all_names(&self) -> Vec<String> {
        self.all().iter().map(|p| p.as_str().to_string()).collect()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = Error;

    /// Case-insensitive lookup by name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::validation(format!("unknown profile '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_administrator_includes_everything() {
        let names = Profile::Administrator.all_names();
        assert_eq!(
            names,
            vec![
                "Administrator",
                "UserAdmin",
                "Reviewer",
                "Editor",
                "RegisteredUser",
                "Guest",
                "Monitor"
            ]
        );
    }

    #[test]
    fn test_leaf_profiles() {
        assert_eq!(Profile::Guest.all_names(), vec!["Guest"]);
        assert_eq!(Profile::Monitor.all_names(), vec!["Monitor"]);
    }

    #[test]
    fn test_editor_chain() {
        assert_eq!(
            Profile::Editor.all(),
            vec![Profile::Editor, Profile::RegisteredUser, Profile::Guest]
        );
        assert_eq!(Profile::Editor.parents(), &[Profile::Reviewer]);
    }

    #[test]
    fn test_children() {
        assert_eq!(
            Profile::Administrator.children(),
            vec![Profile::UserAdmin, Profile::Monitor]
        );
        assert!(Profile::Guest.children().is_empty());
    }

    #[test]
    fn test_parse_ignores_case() {
        assert_eq!("editor".parse::<Profile>().unwrap(), Profile::Editor);
        assert_eq!(" USERADMIN ".parse::<Profile>().unwrap(), Profile::UserAdmin);
        assert!("superuser".parse::<Profile>().is_err());
    }
}
