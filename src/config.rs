//! Runtime configuration for the `roster` binary.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::db::Database;

/// Environment variable naming the roster database file.
pub const DB_ENV: &str = "GROUP_ROSTER_DB";

const APP_NAME: &str = "group-roster";
const DB_FILE: &str = "roster.db";
const DEFAULT_LOG_FILTER: &str = "group_roster=info,tower_http=debug";

#[derive(Debug, Clone)]
pub struct RosterConfig {
    pub database_path: PathBuf,
}

impl RosterConfig {
    /// Use `database_path` if given (the CLI flag, which already falls back
    /// to [`DB_ENV`]), otherwise the platform data directory.
    pub fn resolve(database_path: Option<PathBuf>) -> Result<Self> {
        let database_path = match database_path {
            Some(path) => path,
            None => default_database_path()?,
        };
        Ok(Self { database_path })
    }

    /// Open the database and make sure both collections exist.
    ///
    /// Must complete before the first engine call.
    pub fn open_database(&self) -> Result<Database> {
        let db = Database::open(self.database_path.clone()).with_context(|| {
            format!(
                "Failed to open roster database at {}",
                self.database_path.display()
            )
        })?;
        db.migrate()?;
        Ok(db)
    }
}

fn default_database_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", APP_NAME)
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join(DB_FILE))
}

/// `RUST_LOG` if set, otherwise the crate's default filter.
pub fn log_filter() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into())
}
