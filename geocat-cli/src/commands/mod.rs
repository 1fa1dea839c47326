//! CLI command implementations

pub mod doctor;
pub mod logs;
pub mod profile;
pub mod user;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use geocat_core::{CatalogContext, EntryPoint, LogEvent, LoggingService};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Data directory from GEOCAT_DIR, else ~/.geocat
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("GEOCAT_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".geocat"))
        .ok_or_else(|| anyhow!("Could not find home directory; set GEOCAT_DIR"))
}

/// Open the catalog, creating the data directory if needed
pub fn get_context() -> Result<CatalogContext> {
    let data_dir = get_data_dir()?;

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    CatalogContext::new(&data_dir).context("Failed to open the catalog")
}
