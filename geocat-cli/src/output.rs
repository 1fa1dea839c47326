//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};

use geocat_core::{Address, User};

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Render an optional field, dimmed dash when missing
pub fn opt(value: &Option<String>) -> String {
    match value {
        Some(v) => v.clone(),
        None => "-".dimmed().to_string(),
    }
}

/// One-line rendering of an address
pub fn format_address(address: &Address) -> String {
    let parts: Vec<&str> = [
        &address.address,
        &address.zip,
        &address.city,
        &address.state,
        &address.country,
    ]
    .into_iter()
    .filter_map(|p| p.as_deref())
    .collect();

    if parts.is_empty() {
        "(blank)".to_string()
    } else {
        parts.join(", ")
    }
}

/// Full name, falling back to the username
pub fn display_name(user: &User) -> String {
    match (&user.name, &user.surname) {
        (Some(name), Some(surname)) => format!("{} {}", name, surname),
        (Some(name), None) => name.clone(),
        (None, Some(surname)) => surname.clone(),
        (None, None) => user.username.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocat_core::Profile;

    #[test]
    fn test_format_address() {
        let address = Address::new().with_city("Rome").with_country("IT");
        assert_eq!(format_address(&address), "Rome, IT");
        assert_eq!(format_address(&Address::new()), "(blank)");
    }

    #[test]
    fn test_display_name() {
        let user = User::new("jdoe", Profile::Guest);
        assert_eq!(display_name(&user), "jdoe");
        assert_eq!(display_name(&user.with_name("John").with_surname("Doe")), "John Doe");
    }
}
