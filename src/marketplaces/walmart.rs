//! Walmart marketplace adapter

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::marketplaces::extract::{PatternSet, PricePattern, COMMON_PRICE_PATTERNS};
use crate::marketplaces::types::{ScrapedPrice, SearchResult};
use crate::marketplaces::{fetch_html, Marketplace};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const SEARCH_URL: &str = "https://api.walmartlabs.com/v1/search";
const STORE_URL: &str = "https://www.walmart.com";

const WALMART_PRICE_PATTERNS: &[PricePattern] = &[
    PricePattern {
        pattern: r#""currentPrice"\s*:\s*\{\s*"price"\s*:\s*([0-9]+\.?[0-9]{0,2})"#,
        group: 1,
    },
    PricePattern {
        pattern: r#"itemprop="price"[^>]*content="([^"]+)""#,
        group: 1,
    },
];

/// Walmart adapter (Walmart Open API)
pub struct WalmartAdapter {
    client: Client,
    api_key: Option<String>,
    patterns: PatternSet,
}

impl WalmartAdapter {
    pub fn new(config: &EngineConfig) -> Self {
        let mut patterns = WALMART_PRICE_PATTERNS.to_vec();
        patterns.extend_from_slice(COMMON_PRICE_PATTERNS);

        Self {
            client: Client::builder()
                .timeout(config.http_timeout)
                .user_agent(config.user_agent.clone())
                .build()
                .expect("Failed to create HTTP client"),
            api_key: config.credentials.walmart_api_key.clone(),
            patterns: PatternSet::new(&patterns),
        }
    }
}

#[async_trait]
impl Marketplace for WalmartAdapter {
    fn id(&self) -> &'static str {
        "walmart"
    }

    fn display_name(&self) -> &'static str {
        "Walmart"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let Some(api_key) = &self.api_key else {
            tracing::debug!("Walmart search skipped: no API key configured");
            return Ok(vec![]);
        };

        let num_items = max_results.min(25).to_string();
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("apiKey", api_key.as_str()),
                ("query", query),
                ("numItems", num_items.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EngineError::FetchFailed(format!(
                "Walmart search API returned {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct SearchResponse {
            #[serde(default)]
            items: Vec<Item>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Item {
            name: String,
            sale_price: Option<f64>,
            product_url: Option<String>,
            thumbnail_image: Option<String>,
            #[serde(default)]
            stock: Option<String>,
        }

        let result: SearchResponse = response.json().await?;

        let results = result
            .items
            .into_iter()
            .filter_map(|item| {
                let price = item.sale_price?;
                if price <= 0.0 {
                    return None;
                }
                Some(SearchResult {
                    name: item.name,
                    price,
                    url: item.product_url.unwrap_or_else(|| STORE_URL.to_string()),
                    image_url: item.thumbnail_image,
                    marketplace: "walmart".to_string(),
                    in_stock: item.stock.as_deref() != Some("Not available"),
                })
            })
            .take(max_results)
            .collect();

        Ok(results)
    }

    async fn scrape_price(&self, url: &str) -> Result<ScrapedPrice> {
        let html = fetch_html(&self.client, url).await?;

        let price = self
            .patterns
            .extract(&html, None)
            .ok_or_else(|| EngineError::PriceNotFound(format!("no price pattern matched {}", url)))?;

        Ok(ScrapedPrice {
            price,
            currency: "USD".to_string(),
            source: "walmart".to_string(),
        })
    }

    fn search_page_url(&self, query: &str) -> String {
        format!("{}/search?q={}", STORE_URL, urlencoding::encode(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walmart_embedded_json_price() {
        let adapter = WalmartAdapter::new(&EngineConfig::default());
        let html = r#"{"currentPrice":{"price":24.88,"currency":"USD"}}"#;
        assert_eq!(adapter.patterns.extract(html, None), Some(24.88));
    }
}
