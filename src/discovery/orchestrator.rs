//! Discovery orchestrator
//!
//! Walks the provider chain in priority order and returns the first answer,
//! with results sorted cheapest first. Provider-level failures are logged
//! and the chain falls through to the next provider, so a broken structured
//! API degrades to per-marketplace search rather than an error.

use crate::config::EngineConfig;
use crate::discovery::cache::ResultCache;
use crate::discovery::providers::{
    DemoProvider, MarketplaceFanout, ProviderVerdict, SearchOptions, SearchProvider,
    SearchResponse, StructuredSearchProvider,
};
use crate::discovery::rate_limiter::RateLimiter;
use crate::error::{EngineError, Result};
use crate::marketplaces::MarketplaceRegistry;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub struct DiscoveryOrchestrator {
    providers: Vec<Arc<dyn SearchProvider>>,
}

impl DiscoveryOrchestrator {
    /// Build the standard chain: structured search, marketplace fan-out,
    /// demo data.
    pub fn new(
        registry: Arc<MarketplaceRegistry>,
        limiter: Arc<RateLimiter>,
        cache: Arc<ResultCache>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            providers: vec![
                Arc::new(StructuredSearchProvider::new(config)),
                Arc::new(MarketplaceFanout::new(registry, limiter, cache)),
                Arc::new(DemoProvider::new(config)),
            ],
        }
    }

    /// Build an orchestrator over an explicit chain
    pub fn with_providers(providers: Vec<Arc<dyn SearchProvider>>) -> Self {
        Self { providers }
    }

    /// Search for a product across marketplaces. The first provider that
    /// answers wins; later providers are never invoked.
    pub async fn search_all(&self, query: &str, opts: &SearchOptions) -> Result<SearchResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::Validation(
                "search query must not be empty".to_string(),
            ));
        }

        for provider in &self.providers {
            match provider.try_search(query, opts).await {
                Ok(ProviderVerdict::Skip) => continue,
                Ok(ProviderVerdict::Found(mut response)) => {
                    sort_by_price(&mut response);
                    info!(
                        "Search '{}' answered by {} provider: {} results, {} errors",
                        query,
                        response.provider,
                        response.results.len(),
                        response.errors.len()
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        "Provider {} failed for '{}', falling through: {}",
                        provider.name(),
                        query,
                        e
                    );
                }
            }
        }

        // Reachable only with a custom chain; the standard chain ends with
        // a provider that always answers.
        Ok(SearchResponse {
            provider: "none".to_string(),
            ..Default::default()
        })
    }
}

/// Cheapest first; ties keep the order marketplaces supplied them in
fn sort_by_price(response: &mut SearchResponse) {
    response
        .results
        .sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplaces::types::SearchResult;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    struct FixedProvider {
        name: &'static str,
        verdict: fn() -> Result<ProviderVerdict>,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(name: &'static str, verdict: fn() -> Result<ProviderVerdict>) -> Arc<Self> {
            Arc::new(Self {
                name,
                verdict,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SearchProvider for FixedProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn try_search(&self, _query: &str, _opts: &SearchOptions) -> Result<ProviderVerdict> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            (self.verdict)()
        }
    }

    fn result(marketplace: &str, price: f64) -> SearchResult {
        SearchResult {
            name: "Widget".to_string(),
            price,
            url: format!("https://{}.example/widget", marketplace),
            image_url: None,
            marketplace: marketplace.to_string(),
            in_stock: true,
        }
    }

    fn found(results: Vec<SearchResult>) -> Result<ProviderVerdict> {
        Ok(ProviderVerdict::Found(SearchResponse {
            results,
            errors: HashMap::new(),
            cached: false,
            provider: "fixed".to_string(),
        }))
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let orchestrator = DiscoveryOrchestrator::with_providers(vec![]);
        let err = orchestrator
            .search_all("   ", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_first_answer_short_circuits_the_chain() {
        let first = FixedProvider::new("first", || {
            found(vec![result("amazon", 30.0)])
        });
        let second = FixedProvider::new("second", || {
            found(vec![result("walmart", 10.0)])
        });

        let orchestrator =
            DiscoveryOrchestrator::with_providers(vec![first.clone(), second.clone()]);
        let response = orchestrator
            .search_all("widget", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(response.results[0].marketplace, "amazon");
        assert_eq!(first.calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(second.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_skip_and_error_fall_through() {
        let skipper = FixedProvider::new("skipper", || Ok(ProviderVerdict::Skip));
        let failer = FixedProvider::new("failer", || {
            Err(EngineError::FetchFailed("api down".to_string()))
        });
        let answerer = FixedProvider::new("answerer", || {
            found(vec![result("target", 12.0)])
        });

        let orchestrator = DiscoveryOrchestrator::with_providers(vec![
            skipper.clone(),
            failer.clone(),
            answerer.clone(),
        ]);
        let response = orchestrator
            .search_all("widget", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(skipper.calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(failer.calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(answerer.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_results_sorted_ascending_by_price() {
        let provider = FixedProvider::new("fixed", || {
            found(vec![
                result("amazon", 99.99),
                result("walmart", 79.99),
                result("target", 89.99),
            ])
        });

        let orchestrator = DiscoveryOrchestrator::with_providers(vec![provider]);
        let response = orchestrator
            .search_all("widget", &SearchOptions::default())
            .await
            .unwrap();

        let prices: Vec<f64> = response.results.iter().map(|r| r.price).collect();
        assert_eq!(prices, vec![79.99, 89.99, 99.99]);
    }

    #[tokio::test]
    async fn test_partial_failure_returns_results_and_errors() {
        let provider = FixedProvider::new("fixed", || {
            let mut errors = HashMap::new();
            errors.insert("target".to_string(), "Fetch failed: 503".to_string());
            errors.insert("bestbuy".to_string(), "Fetch failed: 429".to_string());
            Ok(ProviderVerdict::Found(SearchResponse {
                results: vec![result("amazon", 30.0), result("walmart", 25.0)],
                errors,
                cached: false,
                provider: "fixed".to_string(),
            }))
        });

        let orchestrator = DiscoveryOrchestrator::with_providers(vec![provider]);
        let response = orchestrator
            .search_all("widget", &SearchOptions::default())
            .await
            .unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.errors.len(), 2);
        assert!(response.errors.contains_key("target"));
        assert!(response.errors.contains_key("bestbuy"));
    }

    #[tokio::test]
    async fn test_exhausted_chain_returns_empty_response() {
        let skipper = FixedProvider::new("skipper", || Ok(ProviderVerdict::Skip));
        let orchestrator = DiscoveryOrchestrator::with_providers(vec![skipper]);

        let response = orchestrator
            .search_all("widget", &SearchOptions::default())
            .await
            .unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.provider, "none");
    }
}
