//! SQLite database module

pub mod models;
mod migrations;
mod products;
mod observations;
mod history;
mod search_cache;

pub use products::AppliedPrices;

use crate::error::Result;
use crate::marketplaces::types::ObservationInput;
use models::*;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Create new SQLite database connection
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// In-memory database, used by tests
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Product Methods ==========

    /// Start tracking a product
    pub fn create_product(&self, req: &NewProduct) -> Result<TrackedProduct> {
        let conn = self.conn.lock();
        products::create_product(&conn, req)
    }

    /// Get a product by id
    pub fn get_product(&self, id: i64) -> Result<Option<TrackedProduct>> {
        let conn = self.conn.lock();
        products::get_product(&conn, id)
    }

    /// List products with tracking enabled
    pub fn list_tracked_products(&self) -> Result<Vec<TrackedProduct>> {
        let conn = self.conn.lock();
        products::list_tracked_products(&conn)
    }

    /// Update the user's target price
    pub fn update_target_price(&self, id: i64, target_price: f64) -> Result<()> {
        let conn = self.conn.lock();
        products::update_target_price(&conn, id, target_price)
    }

    /// Toggle tracking / auto-update flags
    pub fn set_product_flags(
        &self,
        id: i64,
        tracking_enabled: Option<bool>,
        auto_update_enabled: Option<bool>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        products::set_flags(&conn, id, tracking_enabled, auto_update_enabled)
    }

    /// Apply a reconciled observation batch (single transaction)
    pub fn apply_observation_batch(
        &self,
        product_id: i64,
        current_price: f64,
        best_marketplace: &str,
        observations: &[ObservationInput],
        now: &str,
    ) -> Result<AppliedPrices> {
        let mut conn = self.conn.lock();
        products::apply_observation_batch(
            &mut conn,
            product_id,
            current_price,
            best_marketplace,
            observations,
            now,
        )
    }

    // ========== Observation Methods ==========

    /// Upsert a single observation by (product_id, marketplace)
    pub fn upsert_observation(
        &self,
        product_id: i64,
        obs: &ObservationInput,
        now: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        observations::upsert_observation(&conn, product_id, obs, now)
    }

    /// All observations for a product, cheapest first
    pub fn list_observations(&self, product_id: i64) -> Result<Vec<MarketplaceObservation>> {
        let conn = self.conn.lock();
        observations::list_observations(&conn, product_id)
    }

    /// One marketplace's observation of a product
    pub fn get_observation(
        &self,
        product_id: i64,
        marketplace: &str,
    ) -> Result<Option<MarketplaceObservation>> {
        let conn = self.conn.lock();
        observations::get_observation(&conn, product_id, marketplace)
    }

    // ========== History Methods ==========

    /// Append one price history row
    pub fn append_history(&self, product_id: i64, price: f64, source: &str, now: &str) -> Result<()> {
        let conn = self.conn.lock();
        history::append_entry(&conn, product_id, price, source, now)
    }

    /// Recent history for a product, newest first
    pub fn history_for_product(&self, product_id: i64, limit: usize) -> Result<Vec<PriceHistoryEntry>> {
        let conn = self.conn.lock();
        history::list_for_product(&conn, product_id, limit)
    }

    /// Total history rows for a product
    pub fn history_count(&self, product_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        history::count_for_product(&conn, product_id)
    }

    // ========== Search Cache Methods ==========

    /// Look up a cache entry (expiry is the caller's concern)
    pub fn cache_get(&self, query: &str, marketplace: &str) -> Result<Option<SearchCacheEntry>> {
        let conn = self.conn.lock();
        search_cache::get_entry(&conn, query, marketplace)
    }

    /// Destructively replace the entry for a key
    pub fn cache_put(
        &self,
        query: &str,
        marketplace: &str,
        results_json: &str,
        created_at: &str,
        expires_at: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        search_cache::put_entry(&conn, query, marketplace, results_json, created_at, expires_at)
    }

    /// Delete expired entries, returning the count removed
    pub fn cache_evict_expired(&self, now: &str) -> Result<usize> {
        let conn = self.conn.lock();
        search_cache::evict_expired(&conn, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product(db: &SqliteDb) -> TrackedProduct {
        db.create_product(&NewProduct {
            name: "Test Widget".to_string(),
            url: Some("https://example.com/widget".to_string()),
            target_price: 50.0,
        })
        .unwrap()
    }

    #[test]
    fn test_create_and_get_product() {
        let db = SqliteDb::in_memory().unwrap();
        let product = sample_product(&db);

        assert_eq!(product.name, "Test Widget");
        assert_eq!(product.target_price, 50.0);
        assert!(product.current_price.is_none());
        assert!(product.tracking_enabled);
        assert!(product.auto_update_enabled);

        let loaded = db.get_product(product.id).unwrap().unwrap();
        assert_eq!(loaded.id, product.id);
        assert!(db.get_product(9999).unwrap().is_none());
    }

    #[test]
    fn test_update_target_price_missing_product() {
        let db = SqliteDb::in_memory().unwrap();
        assert!(db.update_target_price(42, 10.0).is_err());
    }

    #[test]
    fn test_observation_upsert_is_idempotent() {
        let db = SqliteDb::in_memory().unwrap();
        let product = sample_product(&db);

        let obs = ObservationInput {
            marketplace: "walmart".to_string(),
            price: 42.0,
            url: Some("https://walmart.example/w".to_string()),
            image_url: None,
            in_stock: true,
            confidence: 0.9,
        };

        db.upsert_observation(product.id, &obs, "2026-01-01T00:00:00Z").unwrap();
        let updated = ObservationInput { price: 39.5, ..obs };
        db.upsert_observation(product.id, &updated, "2026-01-02T00:00:00Z").unwrap();

        let all = db.list_observations(product.id).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].price, 39.5);
        assert_eq!(all[0].url.as_deref(), Some("https://walmart.example/w"));
    }

    #[test]
    fn test_apply_observation_batch_seeds_extrema() {
        let db = SqliteDb::in_memory().unwrap();
        let product = sample_product(&db);

        let obs = vec![ObservationInput {
            marketplace: "amazon".to_string(),
            price: 45.0,
            url: None,
            image_url: None,
            in_stock: true,
            confidence: 1.0,
        }];

        let applied = db
            .apply_observation_batch(product.id, 45.0, "amazon", &obs, "2026-01-01T00:00:00Z")
            .unwrap();

        assert_eq!(applied.previous_price, None);
        assert_eq!(applied.lowest_price, 45.0);
        assert_eq!(applied.highest_price, 45.0);

        let loaded = db.get_product(product.id).unwrap().unwrap();
        assert_eq!(loaded.current_price, Some(45.0));
        assert_eq!(loaded.best_marketplace.as_deref(), Some("amazon"));
        assert_eq!(db.history_count(product.id).unwrap(), 1);
    }

    #[test]
    fn test_list_tracked_respects_flags() {
        let db = SqliteDb::in_memory().unwrap();
        let keep = sample_product(&db);
        let pause = db
            .create_product(&NewProduct {
                name: "Paused Widget".to_string(),
                url: None,
                target_price: 5.0,
            })
            .unwrap();

        db.set_product_flags(pause.id, Some(false), None).unwrap();

        let tracked = db.list_tracked_products().unwrap();
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].id, keep.id);
    }

    #[test]
    fn test_history_listing_newest_first() {
        let db = SqliteDb::in_memory().unwrap();
        let product = sample_product(&db);

        db.append_history(product.id, 10.0, "amazon", "2026-01-01T00:00:00Z").unwrap();
        db.append_history(product.id, 9.0, "walmart", "2026-01-02T00:00:00Z").unwrap();
        db.append_history(product.id, 8.0, "amazon", "2026-01-03T00:00:00Z").unwrap();

        let recent = db.history_for_product(product.id, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].price, 8.0);
        assert_eq!(recent[1].price, 9.0);
        assert_eq!(db.history_count(product.id).unwrap(), 3);
    }

    #[test]
    fn test_get_observation_by_marketplace() {
        let db = SqliteDb::in_memory().unwrap();
        let product = sample_product(&db);

        let obs = ObservationInput {
            marketplace: "target".to_string(),
            price: 19.99,
            url: None,
            image_url: None,
            in_stock: false,
            confidence: 0.75,
        };
        db.upsert_observation(product.id, &obs, "2026-01-01T00:00:00Z").unwrap();

        let loaded = db.get_observation(product.id, "target").unwrap().unwrap();
        assert_eq!(loaded.price, 19.99);
        assert!(!loaded.in_stock);
        assert!(db.get_observation(product.id, "amazon").unwrap().is_none());
    }

    #[test]
    fn test_cache_put_is_destructive_replace() {
        let db = SqliteDb::in_memory().unwrap();

        db.cache_put("widget", "amazon", "[1]", "t0", "t9").unwrap();
        db.cache_put("widget", "amazon", "[2]", "t1", "t9").unwrap();

        let entry = db.cache_get("widget", "amazon").unwrap().unwrap();
        assert_eq!(entry.results_json, "[2]");
    }

    #[test]
    fn test_cache_evict_expired_exact() {
        let db = SqliteDb::in_memory().unwrap();

        db.cache_put("a", "amazon", "[]", "t", "2026-01-01T00:00:00Z").unwrap();
        db.cache_put("b", "amazon", "[]", "t", "2026-03-01T00:00:00Z").unwrap();

        let removed = db.cache_evict_expired("2026-02-01T00:00:00Z").unwrap();
        assert_eq!(removed, 1);
        assert!(db.cache_get("a", "amazon").unwrap().is_none());
        assert!(db.cache_get("b", "amazon").unwrap().is_some());

        // Sweeping again removes nothing
        assert_eq!(db.cache_evict_expired("2026-02-01T00:00:00Z").unwrap(), 0);
    }
}
