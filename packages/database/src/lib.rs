#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `PostGIS`-backed delivery zone store and schema migrations.
//!
//! Uses `switchy_database` for raw `PostGIS` queries and `switchy_schema`
//! for the embedded SQL migrations that create the `delivery_zones` table
//! and its `find_zone_containing` lookup function.

pub mod db;
pub mod zones;

use include_dir::{Dir, include_dir};
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

pub use zones::PostgisZoneStore;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur during database setup.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// Missing or malformed connection settings.
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong with the settings.
        message: String,
    },

    /// The database could not be reached.
    #[error("Connection error: {message}")]
    Connection {
        /// Error reported by the connection layer.
        message: String,
    },
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns [`DbError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("Delivery zone migrations completed successfully");
    Ok(())
}
