//! Search cache persistence
//!
//! Rows are keyed by (query, marketplace) with an absolute expiry timestamp.
//! A put is a destructive replace; the unique index plus
//! `ON CONFLICT ... DO UPDATE` guarantees at most one row per key.

use crate::db::sqlite::models::SearchCacheEntry;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// Look up an entry regardless of expiry; the caller decides freshness.
pub fn get_entry(
    conn: &Connection,
    query: &str,
    marketplace: &str,
) -> Result<Option<SearchCacheEntry>> {
    let entry = conn
        .query_row(
            "SELECT id, query, marketplace, results_json, created_at, expires_at
             FROM search_cache
             WHERE query = ?1 AND marketplace = ?2",
            params![query, marketplace],
            |row| {
                Ok(SearchCacheEntry {
                    id: row.get(0)?,
                    query: row.get(1)?,
                    marketplace: row.get(2)?,
                    results_json: row.get(3)?,
                    created_at: row.get(4)?,
                    expires_at: row.get(5)?,
                })
            },
        )
        .optional()?;

    Ok(entry)
}

/// Replace any existing entry for the key with a fresh one
pub fn put_entry(
    conn: &Connection,
    query: &str,
    marketplace: &str,
    results_json: &str,
    created_at: &str,
    expires_at: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO search_cache (query, marketplace, results_json, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(query, marketplace) DO UPDATE SET
             results_json = excluded.results_json,
             created_at = excluded.created_at,
             expires_at = excluded.expires_at",
        params![query, marketplace, results_json, created_at, expires_at],
    )?;

    Ok(())
}

/// Delete all entries expired as of `now`; returns how many went away.
/// One DELETE statement, so concurrent sweeps are safe and idempotent.
pub fn evict_expired(conn: &Connection, now: &str) -> Result<usize> {
    let removed = conn.execute("DELETE FROM search_cache WHERE expires_at < ?1", params![now])?;

    Ok(removed)
}
