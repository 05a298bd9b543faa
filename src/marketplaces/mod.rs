//! Marketplace adapters module
//!
//! One adapter per supported marketplace, polymorphic over the [`Marketplace`]
//! trait. Adapters only talk HTTP; they never touch persistent state.

pub mod types;
pub mod extract;
pub mod amazon;
pub mod walmart;
pub mod target;
pub mod bestbuy;
pub mod generic;

use crate::config::EngineConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use types::{ScrapedPrice, SearchResult};

/// Trait that all marketplace adapters implement
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Marketplace ID (e.g., "amazon", "walmart")
    fn id(&self) -> &'static str;

    /// Marketplace display name
    fn display_name(&self) -> &'static str;

    /// Whether a structured-API credential is configured for this marketplace
    fn is_configured(&self) -> bool;

    /// Search the marketplace for a product by name.
    ///
    /// An unconfigured marketplace returns `Ok(vec![])` so that fan-out
    /// aggregation treats "unsupported" distinctly from a transient failure.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;

    /// Scrape the current price from a known product URL.
    async fn scrape_price(&self, url: &str) -> Result<ScrapedPrice>;

    /// Search-results-page URL for a product name, used by the vision
    /// fallback (per-SKU pages are more aggressively bot-walled than search
    /// pages).
    fn search_page_url(&self, query: &str) -> String;
}

/// Fetch a product page body for pattern extraction.
///
/// Malformed URLs are the caller's mistake (`InvalidUrl`); a non-2xx status
/// is a transient `FetchFailed`, which fan-out aggregation records per
/// marketplace rather than propagating.
pub(crate) async fn fetch_html(client: &reqwest::Client, url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| crate::error::EngineError::InvalidUrl(format!("{}: {}", url, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(crate::error::EngineError::InvalidUrl(format!(
            "unsupported scheme: {}",
            url
        )));
    }

    let response = client.get(parsed).send().await?;

    if !response.status().is_success() {
        return Err(crate::error::EngineError::FetchFailed(format!(
            "{} returned {}",
            url,
            response.status()
        )));
    }

    Ok(response.text().await?)
}

/// Registry of all supported marketplaces
pub struct MarketplaceRegistry {
    adapters: HashMap<String, Arc<dyn Marketplace>>,
    order: Vec<String>,
}

impl MarketplaceRegistry {
    /// Create a registry with every supported marketplace adapter.
    pub fn new(config: &EngineConfig) -> Self {
        let adapters: Vec<Arc<dyn Marketplace>> = vec![
            Arc::new(amazon::AmazonAdapter::new(config)),
            Arc::new(walmart::WalmartAdapter::new(config)),
            Arc::new(target::TargetAdapter::new(config)),
            Arc::new(bestbuy::BestBuyAdapter::new(config)),
            Arc::new(generic::GenericAdapter::new(config)),
        ];

        let order: Vec<String> = adapters.iter().map(|a| a.id().to_string()).collect();
        let adapters = adapters
            .into_iter()
            .map(|a| (a.id().to_string(), a))
            .collect();

        Self { adapters, order }
    }

    /// Get an adapter by marketplace ID
    pub fn get(&self, id: &str) -> Option<Arc<dyn Marketplace>> {
        self.adapters.get(id).cloned()
    }

    /// All adapters, in registration order
    pub fn list(&self) -> Vec<Arc<dyn Marketplace>> {
        self.order
            .iter()
            .filter_map(|id| self.adapters.get(id).cloned())
            .collect()
    }

    /// All marketplace IDs, in registration order
    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Whether any marketplace has a usable credential
    pub fn any_configured(&self) -> bool {
        self.adapters.values().any(|a| a.is_configured())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contains_all_marketplaces() {
        let registry = MarketplaceRegistry::new(&EngineConfig::default());
        for id in ["amazon", "walmart", "target", "bestbuy", "generic"] {
            assert!(registry.get(id).is_some(), "missing adapter: {}", id);
        }
        assert_eq!(registry.list().len(), 5);
    }

    #[test]
    fn test_registry_unconfigured_by_default() {
        let registry = MarketplaceRegistry::new(&EngineConfig::default());
        assert!(!registry.any_configured());
    }

    #[test]
    fn test_registry_configured_with_credential() {
        let mut config = EngineConfig::default();
        config.credentials.walmart_api_key = Some("key".to_string());
        let registry = MarketplaceRegistry::new(&config);
        assert!(registry.any_configured());
        assert!(registry.get("walmart").unwrap().is_configured());
        assert!(!registry.get("amazon").unwrap().is_configured());
    }
}
