//! Tracked product persistence
//!
//! `apply_observation_batch` is the single write path for reconciled price
//! fields; everything it touches happens inside one transaction so that
//! overlapping update runs for the same product cannot interleave a
//! read-compute-write and lose an extrema update.

use crate::db::sqlite::models::{NewProduct, TrackedProduct};
use crate::error::{EngineError, Result};
use crate::marketplaces::types::ObservationInput;
use rusqlite::{params, Connection, OptionalExtension};

/// Prices after a reconciled batch has been applied, plus the prior state
/// the alert decision needs.
#[derive(Debug, Clone)]
pub struct AppliedPrices {
    pub previous_price: Option<f64>,
    pub target_price: f64,
    pub current_price: f64,
    pub lowest_price: f64,
    pub highest_price: f64,
}

fn row_to_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrackedProduct> {
    Ok(TrackedProduct {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        target_price: row.get(3)?,
        current_price: row.get(4)?,
        lowest_price: row.get(5)?,
        highest_price: row.get(6)?,
        best_marketplace: row.get(7)?,
        last_checked_at: row.get(8)?,
        tracking_enabled: row.get(9)?,
        auto_update_enabled: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

const PRODUCT_COLUMNS: &str = "id, name, url, target_price, current_price, lowest_price, \
     highest_price, best_marketplace, last_checked_at, tracking_enabled, \
     auto_update_enabled, created_at, updated_at";

/// Start tracking a new product
pub fn create_product(conn: &Connection, req: &NewProduct) -> Result<TrackedProduct> {
    conn.execute(
        "INSERT INTO tracked_products (name, url, target_price) VALUES (?1, ?2, ?3)",
        params![req.name, req.url, req.target_price],
    )?;

    let id = conn.last_insert_rowid();
    tracing::info!("Tracking new product: {} ({})", req.name, id);

    get_product(conn, id)?.ok_or_else(|| EngineError::NotFound(format!("product {}", id)))
}

/// Get a product by id
pub fn get_product(conn: &Connection, id: i64) -> Result<Option<TrackedProduct>> {
    let product = conn
        .query_row(
            &format!("SELECT {} FROM tracked_products WHERE id = ?1", PRODUCT_COLUMNS),
            params![id],
            row_to_product,
        )
        .optional()?;

    Ok(product)
}

/// List products with tracking enabled
pub fn list_tracked_products(conn: &Connection) -> Result<Vec<TrackedProduct>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tracked_products WHERE tracking_enabled = 1 ORDER BY id",
        PRODUCT_COLUMNS
    ))?;

    let products = stmt
        .query_map([], row_to_product)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(products)
}

/// Update the user's target price
pub fn update_target_price(conn: &Connection, id: i64, target_price: f64) -> Result<()> {
    let rows = conn.execute(
        "UPDATE tracked_products SET target_price = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![target_price, id],
    )?;

    if rows == 0 {
        return Err(EngineError::NotFound(format!("product {}", id)));
    }
    Ok(())
}

/// Toggle tracking / auto-update flags
pub fn set_flags(
    conn: &Connection,
    id: i64,
    tracking_enabled: Option<bool>,
    auto_update_enabled: Option<bool>,
) -> Result<()> {
    if let Some(tracking) = tracking_enabled {
        conn.execute(
            "UPDATE tracked_products SET tracking_enabled = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![tracking, id],
        )?;
    }
    if let Some(auto_update) = auto_update_enabled {
        conn.execute(
            "UPDATE tracked_products SET auto_update_enabled = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![auto_update, id],
        )?;
    }
    Ok(())
}

/// Apply a reconciled observation batch to a product in one transaction:
/// upsert each marketplace observation, append one history row per
/// observation, and fold the authoritative price into the product's
/// current/lowest/highest fields.
///
/// The caller has already chosen `current_price` (the batch minimum) and
/// `best_marketplace`; this function owns the durable write.
pub fn apply_observation_batch(
    conn: &mut Connection,
    product_id: i64,
    current_price: f64,
    best_marketplace: &str,
    observations: &[ObservationInput],
    now: &str,
) -> Result<AppliedPrices> {
    let tx = conn.transaction()?;

    let (previous_price, target_price, prior_lowest, prior_highest): (
        Option<f64>,
        f64,
        Option<f64>,
        Option<f64>,
    ) = tx
        .query_row(
            "SELECT current_price, target_price, lowest_price, highest_price
             FROM tracked_products WHERE id = ?1",
            params![product_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?
        .ok_or_else(|| EngineError::NotFound(format!("product {}", product_id)))?;

    // First observed price seeds both extrema.
    let lowest_price = prior_lowest.map_or(current_price, |p| p.min(current_price));
    let highest_price = prior_highest.map_or(current_price, |p| p.max(current_price));

    {
        let mut upsert = tx.prepare(
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
        )?;

        let mut append = tx.prepare(
            "INSERT INTO price_history (product_id, price, source, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        for obs in observations {
            upsert.execute(params![
                product_id,
                obs.marketplace,
                obs.url,
                obs.price,
                obs.in_stock,
                obs.confidence,
                obs.image_url,
                now,
            ])?;
            append.execute(params![product_id, obs.price, obs.marketplace, now])?;
        }
    }

    tx.execute(
        "UPDATE tracked_products SET
             current_price = ?1,
             lowest_price = ?2,
             highest_price = ?3,
             best_marketplace = ?4,
             last_checked_at = ?5,
             updated_at = datetime('now')
         WHERE id = ?6",
        params![
            current_price,
            lowest_price,
            highest_price,
            best_marketplace,
            now,
            product_id
        ],
    )?;

    tx.commit()?;

    Ok(AppliedPrices {
        previous_price,
        target_price,
        current_price,
        lowest_price,
        highest_price,
    })
}
