//! User commands - create, inspect, update and remove catalog users

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::{Confirm, Password};

use geocat_core::{Address, LogEvent, LoggingService, NewUser, Profile, User, UserDetails};

use super::{get_context, log_event};
use crate::output;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user
    Add {
        /// Unique username
        username: String,
        /// Profile (defaults to the configured default profile)
        #[arg(long)]
        profile: Option<String>,
        /// Email address (repeatable)
        #[arg(long = "email")]
        emails: Vec<String>,
        /// First name
        #[arg(long)]
        name: Option<String>,
        /// Surname / last name
        #[arg(long)]
        surname: Option<String>,
        #[arg(long)]
        organisation: Option<String>,
        /// User category, e.g. GOV or CONTRACTOR (max 16 chars)
        #[arg(long)]
        kind: Option<String>,
        /// Password (prompted for when omitted)
        #[arg(long, env = "GEOCAT_PASSWORD")]
        password: Option<String>,
        /// Create the user without a password
        #[arg(long, conflicts_with = "password")]
        no_password: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one user
    Show {
        username: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Update user fields. Unset fields are kept unless --merge-null is given.
    /// Emails are replaced only when --email is passed.
    Update {
        username: String,
        /// New username
        #[arg(long)]
        rename: Option<String>,
        #[arg(long)]
        profile: Option<String>,
        /// Replace all email addresses (repeatable)
        #[arg(long = "email")]
        emails: Vec<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        surname: Option<String>,
        #[arg(long)]
        organisation: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        /// Clear every profile field not given on the command line
        #[arg(long)]
        merge_null: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change a user's password
    Passwd {
        username: String,
        /// New password (prompted for when omitted)
        #[arg(long, env = "GEOCAT_PASSWORD")]
        password: Option<String>,
    },

    /// Add an address to a user
    Address {
        username: String,
        /// Street address
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        state: Option<String>,
        #[arg(long)]
        zip: Option<String>,
        #[arg(long)]
        country: Option<String>,
    },

    /// Check a user's credentials
    Login {
        username: String,
        /// Password (prompted for when omitted)
        #[arg(long, env = "GEOCAT_PASSWORD")]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a user and everything it owns
    Delete {
        username: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl UserCommands {
    /// Command name and the username it targets, for logging
    pub fn describe(&self) -> (&'static str, &str) {
        match self {
            UserCommands::Add { username, .. } => ("user add", username),
            UserCommands::List { .. } => ("user list", ""),
            UserCommands::Show { username, .. } => ("user show", username),
            UserCommands::Update { username, .. } => ("user update", username),
            UserCommands::Passwd { username, .. } => ("user passwd", username),
            UserCommands::Address { username, .. } => ("user address", username),
            UserCommands::Login { username, .. } => ("user login", username),
            UserCommands::Delete { username, .. } => ("user delete", username),
        }
    }
}

fn parse_profile(name: Option<&str>) -> Result<Option<Profile>> {
    match name {
        Some(n) => Ok(Some(n.parse::<Profile>()?)),
        None => Ok(None),
    }
}

fn prompt_password(confirm: bool) -> Result<String> {
    let mut prompt = Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords don't match");
    }
    Ok(prompt.interact()?)
}

fn print_user(user: &User, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(user)?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Id".to_string(), user.id.to_string()]);
    table.add_row(vec!["Username".to_string(), user.username.clone()]);
    table.add_row(vec!["Name".to_string(), output::opt(&user.name)]);
    table.add_row(vec!["Surname".to_string(), output::opt(&user.surname)]);
    table.add_row(vec!["Organisation".to_string(), output::opt(&user.organisation)]);
    table.add_row(vec!["Kind".to_string(), output::opt(&user.kind)]);
    table.add_row(vec![
        "Profile".to_string(),
        user.profile.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
    ]);
    table.add_row(vec![
        "Emails".to_string(),
        user.emails.iter().cloned().collect::<Vec<_>>().join("\n"),
    ]);
    table.add_row(vec![
        "Addresses".to_string(),
        user.addresses
            .iter()
            .map(output::format_address)
            .collect::<Vec<_>>()
            .join("\n"),
    ]);
    table.add_row(vec![
        "Password".to_string(),
        if user.security.has_password() { "set" } else { "not set" }.to_string(),
    ]);
    if let Some(auth_type) = &user.security.auth_type {
        table.add_row(vec!["Auth type".to_string(), auth_type.clone()]);
    }
    println!("{}", table);
    Ok(())
}

pub fn run(command: UserCommands, logger: &Option<LoggingService>) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.user_service;

    match command {
        UserCommands::Add {
            username,
            profile,
            emails,
            name,
            surname,
            organisation,
            kind,
            password,
            no_password,
            json,
        } => {
            let profile = parse_profile(profile.as_deref())?;
            let password = match (password, no_password) {
                (Some(p), _) => Some(p),
                (None, true) => None,
                (None, false) => Some(prompt_password(true)?),
            };

            let user = service.create_user(NewUser {
                username,
                profile,
                password,
                emails,
                name,
                surname,
                organisation,
                kind,
                addresses: Vec::new(),
            })?;
            log_event(logger, LogEvent::new("user_created").with_username(&user.username));

            if json {
                print_user(&user, true)?;
            } else {
                output::success(&format!(
                    "Created user '{}' ({})",
                    user.username,
                    user.profile.map(|p| p.as_str()).unwrap_or("-")
                ));
            }
        }

        UserCommands::List { json } => {
            let users = service.list_users()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
                return Ok(());
            }
            if users.is_empty() {
                println!("No users found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Id", "Username", "Name", "Email", "Profile", "Organisation"]);
            for user in &users {
                table.add_row(vec![
                    user.id.to_string(),
                    user.username.clone(),
                    output::display_name(user),
                    user.email().unwrap_or("-").to_string(),
                    user.profile.map(|p| p.to_string()).unwrap_or_default(),
                    output::opt(&user.organisation),
                ]);
            }
            println!("{}", table);
            println!("{} user(s)", users.len());
        }

        UserCommands::Show { username, json } => {
            let user = service.get_user(&username)?;
            print_user(&user, json)?;
        }

        UserCommands::Update {
            username,
            rename,
            profile,
            emails,
            name,
            surname,
            organisation,
            kind,
            merge_null,
            json,
        } => {
            let current = service.get_user(&username)?;
            let merge_null_data = merge_null || ctx.config.merge_null_data;

            let mut patch = User::patch();
            patch.username = rename.unwrap_or_else(|| current.username.clone());
            patch.profile = parse_profile(profile.as_deref())?;
            patch.name = name;
            patch.surname = surname;
            patch.organisation = organisation;
            patch.kind = kind;
            // Email set and addresses are always taken from the patch
            patch.emails = if emails.is_empty() {
                current.emails.clone()
            } else {
                emails.into_iter().collect()
            };
            patch.addresses = current.addresses.clone();
            patch.security = current.security.clone();

            if merge_null_data && patch.profile.is_none() {
                bail!("--profile is required with --merge-null (a user must keep a profile)");
            }

            let user = service.update_user(&username, &patch, merge_null_data)?;
            log_event(logger, LogEvent::new("user_updated").with_username(&user.username));

            if json {
                print_user(&user, true)?;
            } else {
                output::success(&format!("Updated user '{}'", user.username));
            }
        }

        UserCommands::Passwd { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password(true)?,
            };
            service.set_password(&username, &password)?;
            log_event(logger, LogEvent::new("password_changed").with_username(&username));
            output::success(&format!("Password updated for '{}'", username));
        }

        UserCommands::Address {
            username,
            address,
            city,
            state,
            zip,
            country,
        } => {
            let new_address = Address {
                id: 0,
                address,
                city,
                state,
                zip,
                country,
            };
            if new_address.is_blank() {
                let primary = service.ensure_primary_address(&username)?;
                output::warning(&format!(
                    "No fields given; primary address is {}",
                    output::format_address(&primary)
                ));
                return Ok(());
            }

            let user = service.add_address(&username, new_address)?;
            log_event(logger, LogEvent::new("address_added").with_username(&username));
            output::success(&format!(
                "'{}' now has {} address(es)",
                user.username,
                user.addresses.len()
            ));
        }

        UserCommands::Login {
            username,
            password,
            json,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password(false)?,
            };

            match service.authenticate(&username, &password)? {
                Some(user) => {
                    log_event(logger, LogEvent::new("login_succeeded").with_username(&username));
                    let authorities: Vec<String> =
                        user.authorities().iter().map(|a| a.to_string()).collect();
                    if json {
                        println!(
                            "{}",
                            serde_json::json!({
                                "authenticated": true,
                                "username": user.username,
                                "authorities": authorities,
                            })
                        );
                    } else {
                        output::success(&format!("Credentials accepted for '{}'", username));
                        println!("  Authorities: {}", authorities.join(", "));
                    }
                }
                None => {
                    log_event(
                        logger,
                        LogEvent::new("login_failed")
                            .with_username(&username)
                            .with_error("invalid credentials"),
                    );
                    if json {
                        println!("{}", serde_json::json!({ "authenticated": false }));
                    }
                    bail!("Invalid username or password");
                }
            }
        }

        UserCommands::Delete { username, force } => {
            let user = service.get_user(&username)?;

            if !force
                && !Confirm::new()
                    .with_prompt(format!(
                        "Delete user '{}' and {} address(es)?",
                        user.username,
                        user.addresses.len()
                    ))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }

            if service.delete_user(&username)? {
                log_event(logger, LogEvent::new("user_deleted").with_username(&username));
                output::success(&format!("Deleted user '{}'", username));
            } else {
                println!("{}", format!("User '{}' was already gone", username).dimmed());
            }
        }
    }

    Ok(())
}
