//! Time-boxed search result cache
//!
//! Wraps the persisted `search_cache` table with key normalization, TTL
//! checks and serialization. Cache trouble is never the caller's problem:
//! read errors degrade to a miss and write errors are logged and dropped.

use crate::db::sqlite::SqliteDb;
use crate::error::{EngineError, Result};
use crate::marketplaces::types::SearchResult;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

/// TTL cache of adapter search results, keyed by (normalized query, marketplace)
pub struct ResultCache {
    db: Arc<SqliteDb>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(db: Arc<SqliteDb>, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// Case variants of the same query share one entry.
    fn normalize(query: &str) -> String {
        query.trim().to_lowercase()
    }

    /// Cached results for the key, or `None` on miss, expiry, or any cache
    /// failure.
    pub fn get(&self, query: &str, marketplace: &str) -> Option<Vec<SearchResult>> {
        let key = Self::normalize(query);

        let entry = match self.db.cache_get(&key, marketplace) {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!("Cache read failed for {}/{}: {}", key, marketplace, e);
                return None;
            }
        };

        let now = Utc::now().to_rfc3339();
        if entry.expires_at < now {
            return None;
        }

        match serde_json::from_str(&entry.results_json) {
            Ok(results) => Some(results),
            Err(e) => {
                tracing::warn!("Cache entry for {}/{} is corrupt: {}", key, marketplace, e);
                None
            }
        }
    }

    /// Store results with the default TTL, destructively replacing any
    /// existing entry for the key.
    pub fn put(&self, query: &str, marketplace: &str, results: &[SearchResult]) {
        self.put_with_ttl(query, marketplace, results, self.ttl);
    }

    /// Store with an explicit TTL. Tests pass a zero TTL to exercise expiry
    /// without a clock.
    pub fn put_with_ttl(
        &self,
        query: &str,
        marketplace: &str,
        results: &[SearchResult],
        ttl: Duration,
    ) {
        let key = Self::normalize(query);

        let json = match serde_json::to_string(results) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry for {}: {}", key, e);
                return;
            }
        };

        let now = Utc::now();
        let expires = now + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::zero());

        if let Err(e) = self.db.cache_put(
            &key,
            marketplace,
            &json,
            &now.to_rfc3339(),
            &expires.to_rfc3339(),
        ) {
            tracing::warn!("Cache write failed for {}/{}: {}", key, marketplace, e);
        }
    }

    /// Sweep expired entries; returns how many were removed.
    pub fn evict_expired(&self) -> Result<usize> {
        let removed = self
            .db
            .cache_evict_expired(&Utc::now().to_rfc3339())
            .map_err(|e| EngineError::Cache(e.to_string()))?;
        if removed > 0 {
            tracing::info!("Evicted {} expired search cache entries", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> ResultCache {
        ResultCache::new(
            Arc::new(SqliteDb::in_memory().unwrap()),
            Duration::from_secs(24 * 60 * 60),
        )
    }

    fn results(price: f64) -> Vec<SearchResult> {
        vec![SearchResult {
            name: "Widget".to_string(),
            price,
            url: "https://example.com/widget".to_string(),
            image_url: None,
            marketplace: "amazon".to_string(),
            in_stock: true,
        }]
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let cache = cache();
        cache.put("Widget", "amazon", &results(19.99));

        let hit = cache.get("widget", "amazon").unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].price, 19.99);
    }

    #[test]
    fn test_case_variants_share_an_entry() {
        let cache = cache();
        cache.put("WIDGET", "amazon", &results(10.0));

        assert!(cache.get("Widget", "amazon").is_some());
        assert!(cache.get("  widget ", "amazon").is_some());
        assert!(cache.get("widget", "walmart").is_none());
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = cache();
        cache.put_with_ttl("widget", "amazon", &results(10.0), Duration::ZERO);

        assert!(cache.get("widget", "amazon").is_none());
    }

    #[test]
    fn test_evict_removes_only_expired() {
        let cache = cache();
        cache.put_with_ttl("stale", "amazon", &results(10.0), Duration::ZERO);
        cache.put("fresh", "amazon", &results(20.0));

        assert_eq!(cache.evict_expired().unwrap(), 1);
        assert!(cache.get("fresh", "amazon").is_some());
        assert_eq!(cache.evict_expired().unwrap(), 0);
    }

    #[test]
    fn test_put_replaces_previous_entry() {
        let cache = cache();
        cache.put("widget", "amazon", &results(10.0));
        cache.put("widget", "amazon", &results(8.5));

        let hit = cache.get("widget", "amazon").unwrap();
        assert_eq!(hit[0].price, 8.5);
    }
}
