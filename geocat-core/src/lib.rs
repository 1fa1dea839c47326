//! geocat core - user accounts for a metadata catalog
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (User, Address, UserSecurity, Profile)
//! - **ports**: Trait definitions for external dependencies (UserRepository)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, in-memory)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbUserRepository;
use config::Config;
use ports::UserRepository;
use services::UserService;

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result as CoreResult};
pub use domain::{Address, Authority, Profile, User, UserDetails, UserSecurity};
pub use services::{EntryPoint, LogEvent, LoggingService, NewUser};

/// File name of the catalog database inside the data directory
pub const DB_FILENAME: &str = "geocat.duckdb";

/// Main context for geocat operations
///
/// Holds the configuration, the database connection and the services built
/// on top of it.
pub struct CatalogContext {
    pub config: Config,
    pub repository: Arc<DuckDbUserRepository>,
    pub user_service: UserService,
}

impl CatalogContext {
    /// Open the catalog in `data_dir`, creating the schema if needed
    pub fn new(data_dir: &Path) -> Result<Self> {
        if !data_dir.join(config::SETTINGS_FILENAME).exists() {
            Config::default().save(data_dir)?;
        }
        let config = Config::load(data_dir)?;

        let db_path = data_dir.join(DB_FILENAME);
        let repository = Arc::new(DuckDbUserRepository::new(&db_path)?);
        repository.ensure_schema()?;

        let user_service = UserService::new(
            Arc::clone(&repository) as Arc<dyn UserRepository>,
            config.default_profile,
        );

        Ok(Self {
            config,
            repository,
            user_service,
        })
    }
}
