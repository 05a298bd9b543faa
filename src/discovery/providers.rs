//! Search providers
//!
//! The discovery fallback chain is an explicit, ordered list of providers,
//! each answering one question: can you produce results for this query?
//! A provider that is not configured (or has nothing to say) returns
//! `Skip` and the chain moves on.
//!
//! Standard chain order:
//! 1. [`StructuredSearchProvider`] — one cross-marketplace API call
//! 2. [`MarketplaceFanout`] — concurrent per-marketplace adapter calls
//! 3. [`DemoProvider`] — synthesized data so the system is exercisable
//!    with no credentials at all

use crate::config::EngineConfig;
use crate::discovery::cache::ResultCache;
use crate::discovery::rate_limiter::RateLimiter;
use crate::error::{EngineError, Result};
use crate::marketplaces::types::SearchResult;
use crate::marketplaces::MarketplaceRegistry;
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Options for a discovery search
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub max_results: usize,
    /// Whether cached results may be served. Price-verification callers
    /// (the update worker) pass `false` so syncs never see stale data.
    pub use_cache: bool,
    /// Marketplace ids to query; empty means all registered marketplaces.
    pub marketplaces: Vec<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 10,
            use_cache: true,
            marketplaces: Vec::new(),
        }
    }
}

/// Unified discovery response: merged results plus per-marketplace failures.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// marketplace id -> failure reason; a failed marketplace never aborts
    /// the others
    pub errors: HashMap<String, String>,
    /// True when every returned result came from the cache
    pub cached: bool,
    /// Which provider answered ("structured", "marketplaces", "demo")
    pub provider: String,
}

/// What a provider had to say about a query
pub enum ProviderVerdict {
    /// Provider is unconfigured or found nothing it can claim; try the next one
    Skip,
    /// Provider answered; the chain stops here
    Found(SearchResponse),
}

/// One strategy in the discovery fallback chain
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_search(&self, query: &str, opts: &SearchOptions) -> Result<ProviderVerdict>;
}

// ============================================================================
// Structured cross-marketplace provider
// ============================================================================

const STRUCTURED_SEARCH_URL: &str = "https://serpapi.com/search";

/// Cross-marketplace shopping search (SerpAPI-style). Preferred when
/// configured because one network call covers every marketplace.
pub struct StructuredSearchProvider {
    client: Client,
    api_key: Option<String>,
}

impl StructuredSearchProvider {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(config.http_timeout)
                .build()
                .expect("Failed to create HTTP client"),
            api_key: config.structured_search_api_key.clone(),
        }
    }

    /// Normalize a storefront display name to our marketplace id
    fn marketplace_id(source: &str) -> String {
        let lower = source.to_lowercase();
        if lower.contains("amazon") {
            "amazon".to_string()
        } else if lower.contains("walmart") {
            "walmart".to_string()
        } else if lower.contains("target") {
            "target".to_string()
        } else if lower.contains("best buy") || lower.contains("bestbuy") {
            "bestbuy".to_string()
        } else {
            lower.split_whitespace().collect::<Vec<_>>().join("-")
        }
    }
}

#[async_trait]
impl SearchProvider for StructuredSearchProvider {
    fn name(&self) -> &'static str {
        "structured"
    }

    async fn try_search(&self, query: &str, opts: &SearchOptions) -> Result<ProviderVerdict> {
        let Some(api_key) = &self.api_key else {
            return Ok(ProviderVerdict::Skip);
        };

        let response = self
            .client
            .get(STRUCTURED_SEARCH_URL)
            .query(&[
                ("engine", "google_shopping"),
                ("q", query),
                ("api_key", api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EngineError::FetchFailed(format!(
                "structured search returned {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct ShoppingResponse {
            #[serde(default)]
            shopping_results: Vec<ShoppingResult>,
        }

        #[derive(Deserialize)]
        struct ShoppingResult {
            title: String,
            extracted_price: Option<f64>,
            link: Option<String>,
            thumbnail: Option<String>,
            source: Option<String>,
        }

        let parsed: ShoppingResponse = response.json().await?;

        let results: Vec<SearchResult> = parsed
            .shopping_results
            .into_iter()
            .filter_map(|r| {
                let price = r.extracted_price?;
                if price <= 0.0 {
                    return None;
                }
                Some(SearchResult {
                    name: r.title,
                    price,
                    url: r.link.unwrap_or_default(),
                    image_url: r.thumbnail,
                    marketplace: Self::marketplace_id(r.source.as_deref().unwrap_or("unknown")),
                    in_stock: true,
                })
            })
            .take(opts.max_results)
            .collect();

        if results.is_empty() {
            // Nothing to claim; let the per-marketplace adapters try
            return Ok(ProviderVerdict::Skip);
        }

        Ok(ProviderVerdict::Found(SearchResponse {
            results,
            errors: HashMap::new(),
            cached: false,
            provider: self.name().to_string(),
        }))
    }
}

// ============================================================================
// Per-marketplace fan-out provider
// ============================================================================

/// Concurrent fan-out to every requested marketplace adapter, each call
/// passing through the result cache (opt-in) and the per-source rate limiter.
pub struct MarketplaceFanout {
    registry: Arc<MarketplaceRegistry>,
    limiter: Arc<RateLimiter>,
    cache: Arc<ResultCache>,
}

enum FanoutOutcome {
    Cached(Vec<SearchResult>),
    Live(Vec<SearchResult>),
    Unavailable,
    Failed(String),
}

impl MarketplaceFanout {
    pub fn new(
        registry: Arc<MarketplaceRegistry>,
        limiter: Arc<RateLimiter>,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            registry,
            limiter,
            cache,
        }
    }

    async fn search_one(
        &self,
        id: &str,
        query: &str,
        opts: &SearchOptions,
    ) -> FanoutOutcome {
        let Some(adapter) = self.registry.get(id) else {
            return FanoutOutcome::Failed(format!("unknown marketplace: {}", id));
        };

        if opts.use_cache {
            if let Some(results) = self.cache.get(query, id) {
                tracing::debug!("Cache hit for {}/{}", query, id);
                return FanoutOutcome::Cached(results);
            }
        }

        let outcome = self
            .limiter
            .execute(id, adapter.search(query, opts.max_results))
            .await;

        match outcome {
            Ok(results) => {
                if !results.is_empty() && opts.use_cache {
                    self.cache.put(query, id, &results);
                }
                FanoutOutcome::Live(results)
            }
            Err(e) if e.is_expected() => FanoutOutcome::Unavailable,
            Err(e) => {
                tracing::warn!("Marketplace {} search failed: {}", id, e);
                FanoutOutcome::Failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl SearchProvider for MarketplaceFanout {
    fn name(&self) -> &'static str {
        "marketplaces"
    }

    async fn try_search(&self, query: &str, opts: &SearchOptions) -> Result<ProviderVerdict> {
        if !self.registry.any_configured() {
            return Ok(ProviderVerdict::Skip);
        }

        let requested: Vec<String> = if opts.marketplaces.is_empty() {
            self.registry.ids()
        } else {
            opts.marketplaces.clone()
        };

        let calls = requested
            .iter()
            .map(|id| async { (id.clone(), self.search_one(id, query, opts).await) });
        let outcomes = futures_util::future::join_all(calls).await;

        let mut response = SearchResponse {
            provider: self.name().to_string(),
            ..Default::default()
        };
        let mut live_calls = 0usize;
        let mut cache_hits = 0usize;

        for (id, outcome) in outcomes {
            match outcome {
                FanoutOutcome::Cached(results) => {
                    cache_hits += 1;
                    response.results.extend(results);
                }
                FanoutOutcome::Live(results) => {
                    live_calls += 1;
                    response.results.extend(results);
                }
                FanoutOutcome::Unavailable => {}
                FanoutOutcome::Failed(reason) => {
                    response.errors.insert(id, reason);
                }
            }
        }

        response.cached = cache_hits > 0 && live_calls == 0;

        Ok(ProviderVerdict::Found(response))
    }
}

// ============================================================================
// Demo provider
// ============================================================================

const DEMO_MARKETPLACES: &[(&str, f64)] = &[
    ("amazon", 1.00),
    ("walmart", 0.93),
    ("target", 1.05),
    ("bestbuy", 1.10),
];

/// Credential-free fallback: synthesizes one plausible entry per major
/// marketplace so the system can be demonstrated end to end. Results are
/// tagged with `provider = "demo"` and must never appear in a credentialed
/// deployment (the chain only reaches this provider when everything above
/// it skipped).
pub struct DemoProvider {
    delay: Duration,
}

impl DemoProvider {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            delay: config.demo_delay,
        }
    }
}

#[async_trait]
impl SearchProvider for DemoProvider {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn try_search(&self, query: &str, _opts: &SearchOptions) -> Result<ProviderVerdict> {
        // Simulate real lookup latency
        tokio::time::sleep(self.delay).await;

        let (base_price, jitters) = {
            let mut rng = rand::thread_rng();
            let base: f64 = rng.gen_range(20.0..120.0);
            let jitters: Vec<f64> = (0..DEMO_MARKETPLACES.len())
                .map(|_| rng.gen_range(0.97..1.03))
                .collect();
            (base, jitters)
        };

        let results = DEMO_MARKETPLACES
            .iter()
            .zip(jitters)
            .map(|((marketplace, factor), jitter)| SearchResult {
                name: query.to_string(),
                price: (base_price * factor * jitter * 100.0).round() / 100.0,
                url: format!(
                    "https://demo.invalid/{}/{}",
                    marketplace,
                    urlencoding::encode(query)
                ),
                image_url: None,
                marketplace: marketplace.to_string(),
                in_stock: true,
            })
            .collect();

        Ok(ProviderVerdict::Found(SearchResponse {
            results,
            errors: HashMap::new(),
            cached: false,
            provider: self.name().to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marketplace_id_normalization() {
        assert_eq!(StructuredSearchProvider::marketplace_id("Amazon.com"), "amazon");
        assert_eq!(StructuredSearchProvider::marketplace_id("Walmart"), "walmart");
        assert_eq!(StructuredSearchProvider::marketplace_id("Best Buy"), "bestbuy");
        assert_eq!(StructuredSearchProvider::marketplace_id("Joe's Store"), "joe's-store");
    }

    #[tokio::test]
    async fn test_structured_provider_skips_without_key() {
        let provider = StructuredSearchProvider::new(&EngineConfig::default());
        let verdict = provider
            .try_search("widget", &SearchOptions::default())
            .await
            .unwrap();
        assert!(matches!(verdict, ProviderVerdict::Skip));
    }

    #[tokio::test]
    async fn test_demo_provider_one_entry_per_marketplace() {
        let mut config = EngineConfig::default();
        config.demo_delay = Duration::ZERO;
        let provider = DemoProvider::new(&config);

        let verdict = provider
            .try_search("Widget", &SearchOptions::default())
            .await
            .unwrap();

        let ProviderVerdict::Found(response) = verdict else {
            panic!("demo provider must always answer");
        };

        assert_eq!(response.provider, "demo");
        assert_eq!(response.results.len(), DEMO_MARKETPLACES.len());
        for result in &response.results {
            assert!(result.price > 0.0);
            assert_eq!(result.name, "Widget");
        }
    }

    #[tokio::test]
    async fn test_fanout_skips_without_any_credential() {
        let config = EngineConfig::default();
        let db = Arc::new(crate::db::sqlite::SqliteDb::in_memory().unwrap());
        let fanout = MarketplaceFanout::new(
            Arc::new(MarketplaceRegistry::new(&config)),
            Arc::new(RateLimiter::new(Duration::from_millis(1))),
            Arc::new(ResultCache::new(db, config.cache_ttl)),
        );

        let verdict = fanout
            .try_search("widget", &SearchOptions::default())
            .await
            .unwrap();
        assert!(matches!(verdict, ProviderVerdict::Skip));
    }
}
