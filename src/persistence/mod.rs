//! Persistence Layer
//!
//! SQLite store for the game core via sqlx. The pool handle is created
//! here and injected into every repository; there is no module-level
//! singleton, so tests can run against `sqlite::memory:` pools.
//!
//! # Tables
//! - `companies` — immutable catalog of tradable companies
//! - `game_sessions` — one row per playthrough (balance, year, lifecycle)
//! - `session_companies` — the fixed company subset visible to a session
//! - `holdings` — current-year ledger entries per session
//! - `stock_prices` — one immutable price per (company, year)
//! - `news` — one news item per (company, year)
//! - `user_stats` — per-user aggregates written on session completion

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Store failure taxonomy. Always surfaced to the caller, never swallowed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("integrity error: {0}")]
    Integrity(String),
}

/// Initialize the database connection pool and run migrations.
///
/// # Arguments
/// - `database_url`: SQLite URL (e.g. "sqlite://data/stockrush.db" or
///   "sqlite::memory:" in tests)
pub async fn init_database(database_url: &str) -> Result<DbPool, StoreError> {
    info!("Initializing database: {}", database_url);

    // Ensure data directory exists for file-backed databases
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Connection(sqlx::Error::Configuration(Box::new(e))))?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .log_statements(tracing::log::LevelFilter::Debug);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized");

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), StoreError> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            company_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to create companies table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS game_sessions (
            session_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active', 'completed')),
            start_balance REAL NOT NULL,
            current_balance REAL NOT NULL CHECK(current_balance >= 0.0),
            start_year INTEGER NOT NULL,
            current_year INTEGER NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            completed_at DATETIME
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to create game_sessions table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_companies (
            session_id INTEGER NOT NULL,
            company_id INTEGER NOT NULL,
            PRIMARY KEY (session_id, company_id),
            FOREIGN KEY (session_id) REFERENCES game_sessions(session_id),
            FOREIGN KEY (company_id) REFERENCES companies(company_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        StoreError::Migration(format!("Failed to create session_companies table: {}", e))
    })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS holdings (
            session_id INTEGER NOT NULL,
            company_id INTEGER NOT NULL,
            year INTEGER NOT NULL,
            quantity INTEGER NOT NULL CHECK(quantity >= 0),
            avg_price REAL NOT NULL,
            PRIMARY KEY (session_id, company_id),
            FOREIGN KEY (session_id) REFERENCES game_sessions(session_id),
            FOREIGN KEY (company_id) REFERENCES companies(company_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to create holdings table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stock_prices (
            company_id INTEGER NOT NULL,
            year INTEGER NOT NULL,
            price REAL NOT NULL CHECK(price > 0.0),
            PRIMARY KEY (company_id, year),
            FOREIGN KEY (company_id) REFERENCES companies(company_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to create stock_prices table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS news (
            company_id INTEGER NOT NULL,
            year INTEGER NOT NULL,
            headline TEXT NOT NULL,
            content TEXT NOT NULL,
            PRIMARY KEY (company_id, year),
            FOREIGN KEY (company_id) REFERENCES companies(company_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to create news table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_stats (
            user_id INTEGER PRIMARY KEY,
            total_games INTEGER NOT NULL DEFAULT 0,
            best_profit_rate REAL,
            cumulative_profit_rate REAL NOT NULL DEFAULT 0.0,
            points REAL NOT NULL DEFAULT 0.0 CHECK(points >= 0.0)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| StoreError::Migration(format!("Failed to create user_stats table: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON game_sessions(user_id)")
        .execute(pool)
        .await
        .map_err(|e| StoreError::Migration(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_status ON game_sessions(status)")
        .execute(pool)
        .await
        .map_err(|e| StoreError::Migration(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_holdings_session ON holdings(session_id)")
        .execute(pool)
        .await
        .map_err(|e| StoreError::Migration(format!("Failed to create index: {}", e)))?;

    info!("Database migrations completed");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_init() {
        let pool = init_database("sqlite::memory:").await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let pool = init_database("sqlite::memory:").await.unwrap();

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN \
             ('companies', 'game_sessions', 'session_companies', 'holdings', \
              'stock_prices', 'news', 'user_stats')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(result.0, 7);
    }
}
