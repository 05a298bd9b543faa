//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create migrations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_tracked_products", CREATE_TRACKED_PRODUCTS_TABLE)?;
    run_migration(conn, "002_observations", CREATE_OBSERVATIONS_TABLE)?;
    run_migration(conn, "003_price_history", CREATE_PRICE_HISTORY_TABLE)?;
    run_migration(conn, "004_search_cache", CREATE_SEARCH_CACHE_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    // Check if migration already applied
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_TRACKED_PRODUCTS_TABLE: &str = r#"
CREATE TABLE tracked_products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    url TEXT,
    target_price REAL NOT NULL,
    current_price REAL,
    lowest_price REAL,
    highest_price REAL,
    best_marketplace TEXT,
    last_checked_at TEXT,
    tracking_enabled INTEGER NOT NULL DEFAULT 1,
    auto_update_enabled INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

const CREATE_OBSERVATIONS_TABLE: &str = r#"
CREATE TABLE marketplace_observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER NOT NULL,
    marketplace TEXT NOT NULL,
    url TEXT,
    price REAL NOT NULL,
    in_stock INTEGER NOT NULL DEFAULT 1,
    confidence REAL NOT NULL DEFAULT 1.0,
    image_url TEXT,
    last_checked_at TEXT NOT NULL,
    UNIQUE(product_id, marketplace)
);
CREATE INDEX IF NOT EXISTS idx_observations_product ON marketplace_observations(product_id);
"#;

const CREATE_PRICE_HISTORY_TABLE: &str = r#"
CREATE TABLE price_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER NOT NULL,
    price REAL NOT NULL,
    source TEXT NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_history_product ON price_history(product_id);
"#;

const CREATE_SEARCH_CACHE_TABLE: &str = r#"
CREATE TABLE search_cache (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    marketplace TEXT NOT NULL,
    results_json TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    expires_at TEXT NOT NULL,
    UNIQUE(query, marketplace)
);
CREATE INDEX IF NOT EXISTS idx_search_cache_expiry ON search_cache(expires_at);
"#;
