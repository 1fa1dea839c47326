//! geocat CLI - manage catalog user accounts from the terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{doctor, get_logger, log_event, logs, profile, user};
use geocat_core::{LogEvent, LoggingService};

/// geocat - catalog user administration
#[derive(Parser)]
#[command(name = "geocat", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },

    /// List profiles and what each one grants
    Profiles {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the activity log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// Check database integrity
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::User { command } => command.describe().0,
            Commands::Profiles { .. } => "profiles",
            Commands::Logs { .. } => "logs",
            Commands::Doctor { .. } => "doctor",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logger = get_logger();

    let name = cli.command.name();
    let username = match &cli.command {
        Commands::User { command } => Some(command.describe().1.to_string()),
        _ => None,
    };

    // The logs command manages the log itself
    let logged = !matches!(cli.command, Commands::Logs { .. });
    if logged {
        if let Some(l) = &logger {
            let _ = l.log_command(name);
        }
    }

    match run(cli, &logger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if logged {
                let mut event = LogEvent::new("command_failed")
                    .with_command(name)
                    .with_error(e.to_string())
                    .with_error_details(format!("{:?}", e));
                if let Some(u) = username.filter(|u| !u.is_empty()) {
                    event = event.with_username(u);
                }
                log_event(&logger, event);
            }
            output::error(&format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, logger: &Option<LoggingService>) -> Result<()> {
    match cli.command {
        Commands::User { command } => user::run(command, logger),
        Commands::Profiles { json } => profile::run(json),
        Commands::Logs { command } => logs::run(command),
        Commands::Doctor { json } => doctor::run(json),
    }
}
