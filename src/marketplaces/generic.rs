//! Generic scrape adapter for arbitrary product URLs
//!
//! Handles products tracked by URL on storefronts without a dedicated
//! adapter. No structured API exists here, so `search` always reports the
//! source as unsupported; only the scrape path is live. Extracted prices at
//! or above 1,000,000 are rejected as implausible, since with layout-agnostic
//! patterns a stray SKU or view counter can look like a price.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::marketplaces::extract::{PatternSet, COMMON_PRICE_PATTERNS};
use crate::marketplaces::types::{ScrapedPrice, SearchResult};
use crate::marketplaces::{fetch_html, Marketplace};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

const MAX_PLAUSIBLE_PRICE: f64 = 1_000_000.0;

pub struct GenericAdapter {
    client: Client,
    patterns: PatternSet,
}

impl GenericAdapter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(config.http_timeout)
                .user_agent(config.user_agent.clone())
                .build()
                .expect("Failed to create HTTP client"),
            patterns: PatternSet::new(COMMON_PRICE_PATTERNS),
        }
    }

    /// Scrape a URL and also pull the product name from the page title,
    /// for callers that need both (e.g. first-time URL registration).
    pub async fn scrape_with_name(&self, url: &str) -> Result<(ScrapedPrice, Option<String>)> {
        let html = fetch_html(&self.client, url).await?;

        let price = self
            .patterns
            .extract(&html, Some(MAX_PLAUSIBLE_PRICE))
            .ok_or_else(|| EngineError::PriceNotFound(format!("no price pattern matched {}", url)))?;

        Ok((
            ScrapedPrice {
                price,
                currency: "USD".to_string(),
                source: "generic".to_string(),
            },
            extract_title(&html),
        ))
    }
}

/// Page title with common "| Store Name" suffixes trimmed off.
fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;

    let title = document
        .select(&selector)
        .next()
        .map(|t| t.text().collect::<String>())?;

    let cleaned = title
        .split(['|', '—'])
        .next()
        .unwrap_or(&title)
        .trim()
        .to_string();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[async_trait]
impl Marketplace for GenericAdapter {
    fn id(&self) -> &'static str {
        "generic"
    }

    fn display_name(&self) -> &'static str {
        "Other store"
    }

    fn is_configured(&self) -> bool {
        false
    }

    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchResult>> {
        // No search surface for arbitrary storefronts; contributes nothing.
        Ok(vec![])
    }

    async fn scrape_price(&self, url: &str) -> Result<ScrapedPrice> {
        let (scraped, _) = self.scrape_with_name(url).await?;
        Ok(scraped)
    }

    fn search_page_url(&self, query: &str) -> String {
        // No canonical search page; fall back to a web search.
        format!(
            "https://www.google.com/search?q={}",
            urlencoding::encode(query)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title_trims_store_suffix() {
        let html = "<html><head><title>LEGO Star Wars Set | Some Store</title></head></html>";
        assert_eq!(extract_title(html), Some("LEGO Star Wars Set".to_string()));
    }

    #[test]
    fn test_extract_title_missing() {
        assert_eq!(extract_title("<html><body></body></html>"), None);
    }

    #[test]
    fn test_generic_rejects_implausible_price() {
        let adapter = GenericAdapter::new(&EngineConfig::default());
        let html = r#"<div>"price": "9999999"</div>"#;
        assert_eq!(adapter.patterns.extract(html, Some(MAX_PLAUSIBLE_PRICE)), None);
    }
}
