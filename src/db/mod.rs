pub mod migrations;
pub mod models;
pub mod store;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize the SQLite database: create the data directory if needed,
/// open (or create) the database file behind a connection pool, enable WAL
/// mode and foreign-key enforcement, and prepare the schema.
pub async fn init_db(data_dir: &str) -> Result<SqlitePool, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;

    let db_path = Path::new(data_dir).join("relay.db");
    let options = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true)
        // WAL mode for better concurrent read performance
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await?;

    migrations::run(&pool).await?;

    tracing::info!("Database initialized at {}", db_path.display());

    Ok(pool)
}
