//! Price history persistence (append-only)

use crate::db::sqlite::models::PriceHistoryEntry;
use crate::error::Result;
use rusqlite::{params, Connection};

/// Append one price observation row
pub fn append_entry(
    conn: &Connection,
    product_id: i64,
    price: f64,
    source: &str,
    now: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO price_history (product_id, price, source, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![product_id, price, source, now],
    )?;

    Ok(())
}

/// Recent history for a product, newest first
pub fn list_for_product(
    conn: &Connection,
    product_id: i64,
    limit: usize,
) -> Result<Vec<PriceHistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, product_id, price, source, recorded_at
         FROM price_history
         WHERE product_id = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )?;

    let entries = stmt
        .query_map(params![product_id, limit as i64], |row| {
            Ok(PriceHistoryEntry {
                id: row.get(0)?,
                product_id: row.get(1)?,
                price: row.get(2)?,
                source: row.get(3)?,
                recorded_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(entries)
}

/// Total history rows for a product
pub fn count_for_product(conn: &Connection, product_id: i64) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM price_history WHERE product_id = ?1",
        params![product_id],
        |row| row.get(0),
    )?;

    Ok(count)
}
