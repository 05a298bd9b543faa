//! Marketplace observation persistence
//!
//! Observations are keyed by (product_id, marketplace); upserts make replays
//! of the same update run idempotent.

use crate::db::sqlite::models::MarketplaceObservation;
use crate::error::Result;
use crate::marketplaces::types::ObservationInput;
use rusqlite::{params, Connection, OptionalExtension};

fn row_to_observation(row: &rusqlite::Row<'_>) -> rusqlite::Result<MarketplaceObservation> {
    Ok(MarketplaceObservation {
        id: row.get(0)?,
        product_id: row.get(1)?,
        marketplace: row.get(2)?,
        url: row.get(3)?,
        price: row.get(4)?,
        in_stock: row.get(5)?,
        confidence: row.get(6)?,
        image_url: row.get(7)?,
        last_checked_at: row.get(8)?,
    })
}

const OBSERVATION_COLUMNS: &str =
    "id, product_id, marketplace, url, price, in_stock, confidence, image_url, last_checked_at";

/// Upsert a single observation by its natural key
pub fn upsert_observation(
    conn: &Connection,
    product_id: i64,
    obs: &ObservationInput,
    now: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO marketplace_observations
             (product_id, marketplace, url, price, in_stock, confidence, image_url, last_checked_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(product_id, marketplace) DO UPDATE SET
             url = COALESCE(excluded.url, url),
             price = excluded.price,
             in_stock = excluded.in_stock,
             confidence = excluded.confidence,
             image_url = COALESCE(excluded.image_url, image_url),
             last_checked_at = excluded.last_checked_at",
        params![
            product_id,
            obs.marketplace,
            obs.url,
            obs.price,
            obs.in_stock,
            obs.confidence,
            obs.image_url,
            now,
        ],
    )?;

    Ok(())
}

/// All observations for a product, cheapest first
pub fn list_observations(conn: &Connection, product_id: i64) -> Result<Vec<MarketplaceObservation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM marketplace_observations WHERE product_id = ?1 ORDER BY price",
        OBSERVATION_COLUMNS
    ))?;

    let observations = stmt
        .query_map(params![product_id], row_to_observation)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(observations)
}

/// One marketplace's observation of a product, if any
pub fn get_observation(
    conn: &Connection,
    product_id: i64,
    marketplace: &str,
) -> Result<Option<MarketplaceObservation>> {
    let observation = conn
        .query_row(
            &format!(
                "SELECT {} FROM marketplace_observations
                 WHERE product_id = ?1 AND marketplace = ?2",
                OBSERVATION_COLUMNS
            ),
            params![product_id, marketplace],
            row_to_observation,
        )
        .optional()?;

    Ok(observation)
}
