//! SQLite database models

use serde::{Deserialize, Serialize};

/// A product the user is tracking for price drops.
///
/// Price fields (`current_price`, `lowest_price`, `highest_price`,
/// `best_marketplace`) are mutated only by the reconciliation engine; the
/// owning application edits the name, target price and flags. Whenever all
/// three are set, `lowest_price <= current_price <= highest_price` holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedProduct {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
    pub target_price: f64,
    pub current_price: Option<f64>,
    pub lowest_price: Option<f64>,
    pub highest_price: Option<f64>,
    /// Marketplace currently offering the best price; points into the
    /// observation set, the price itself is denormalized for fast reads.
    pub best_marketplace: Option<String>,
    pub last_checked_at: Option<String>,
    pub tracking_enabled: bool,
    pub auto_update_enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Request to start tracking a product
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub url: Option<String>,
    pub target_price: f64,
}

/// One marketplace's latest view of a tracked product.
/// Unique per (product_id, marketplace); updated in place on each check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceObservation {
    pub id: i64,
    pub product_id: i64,
    pub marketplace: String,
    pub url: Option<String>,
    pub price: f64,
    pub in_stock: bool,
    /// Match quality between query and found product, in [0,1]
    pub confidence: f64,
    pub image_url: Option<String>,
    pub last_checked_at: String,
}

/// Append-only price history row; one per successful observation applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub product_id: i64,
    pub price: f64,
    pub source: String,
    pub recorded_at: String,
}

/// Cached search results for one (query, marketplace) pair.
/// The query is stored lower-cased; `results_json` holds a serialized
/// `Vec<SearchResult>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCacheEntry {
    pub id: i64,
    pub query: String,
    pub marketplace: String,
    pub results_json: String,
    pub created_at: String,
    pub expires_at: String,
}
