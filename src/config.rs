//! Application configuration.
//!
//! The database path is the only process-wide setting. It is resolved
//! here and passed explicitly into `db::init_db`, never read from ambient
//! state deeper in the stack, so tests stay hermetic.

use serde::Deserialize;
use std::path::PathBuf;

/// Configuration file structure for config.toml
#[derive(Debug, Deserialize)]
struct AppConfig {
    database: Option<DatabaseConfig>,
}

#[derive(Debug, Deserialize)]
struct DatabaseConfig {
    path: Option<String>,
}

/// Default location of the study database.
pub const DEFAULT_DB_PATH: &str = "data/japanese.db";

/// Load the database path with priority: config.toml > .env > default.
pub fn load_database_path() -> PathBuf {
    // Pull a .env file into the environment if one exists
    let _ = dotenvy::dotenv();

    let from_toml = std::fs::read_to_string("config.toml")
        .ok()
        .and_then(|contents| toml::from_str::<AppConfig>(&contents).ok())
        .and_then(|config| config.database)
        .and_then(|db| db.path);
    if let Some(path) = from_toml {
        tracing::info!("Using database from config.toml: {}", path);
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var("DATABASE_PATH") {
        tracing::info!("Using database from DATABASE_PATH env: {}", path);
        return PathBuf::from(path);
    }

    let default = PathBuf::from(DEFAULT_DB_PATH);
    tracing::info!("Using default database path: {}", default.display());
    default
}

/// Default limit for a review session when none is given.
pub const DEFAULT_SESSION_LIMIT: usize = 20;

/// Most-reviewed table size in the stats display.
pub const MOST_REVIEWED_LIMIT: usize = 10;
