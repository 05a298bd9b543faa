//! Target marketplace adapter
//!
//! Uses the RedSky product search API with a configured key.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::marketplaces::extract::{PatternSet, PricePattern, COMMON_PRICE_PATTERNS};
use crate::marketplaces::types::{ScrapedPrice, SearchResult};
use crate::marketplaces::{fetch_html, Marketplace};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const SEARCH_URL: &str = "https://redsky.target.com/redsky_aggregations/v1/web/plp_search_v2";
const STORE_URL: &str = "https://www.target.com";

const TARGET_PRICE_PATTERNS: &[PricePattern] = &[
    PricePattern {
        pattern: r#""current_retail"\s*:\s*([0-9]+\.?[0-9]{0,2})"#,
        group: 1,
    },
    PricePattern {
        pattern: r#"data-test="product-price"[^>]*>\$([0-9][0-9,]*\.?[0-9]{0,2})"#,
        group: 1,
    },
];

pub struct TargetAdapter {
    client: Client,
    api_key: Option<String>,
    patterns: PatternSet,
}

impl TargetAdapter {
    pub fn new(config: &EngineConfig) -> Self {
        let mut patterns = TARGET_PRICE_PATTERNS.to_vec();
        patterns.extend_from_slice(COMMON_PRICE_PATTERNS);

        Self {
            client: Client::builder()
                .timeout(config.http_timeout)
                .user_agent(config.user_agent.clone())
                .build()
                .expect("Failed to create HTTP client"),
            api_key: config.credentials.target_api_key.clone(),
            patterns: PatternSet::new(&patterns),
        }
    }
}

#[async_trait]
impl Marketplace for TargetAdapter {
    fn id(&self) -> &'static str {
        "target"
    }

    fn display_name(&self) -> &'static str {
        "Target"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let Some(api_key) = &self.api_key else {
            tracing::debug!("Target search skipped: no API key configured");
            return Ok(vec![]);
        };

        let count = max_results.min(24).to_string();
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("key", api_key.as_str()),
                ("keyword", query),
                ("count", count.as_str()),
                ("channel", "WEB"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EngineError::FetchFailed(format!(
                "Target search API returned {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct SearchResponse {
            data: Option<SearchData>,
        }

        #[derive(Deserialize)]
        struct SearchData {
            search: SearchBlock,
        }

        #[derive(Deserialize)]
        struct SearchBlock {
            #[serde(default)]
            products: Vec<Product>,
        }

        #[derive(Deserialize)]
        struct Product {
            item: Item,
            price: Option<Price>,
        }

        #[derive(Deserialize)]
        struct Item {
            product_description: Description,
            enrichment: Option<Enrichment>,
        }

        #[derive(Deserialize)]
        struct Description {
            title: String,
        }

        #[derive(Deserialize)]
        struct Enrichment {
            buy_url: Option<String>,
            #[serde(default)]
            images: Option<Images>,
        }

        #[derive(Deserialize)]
        struct Images {
            primary_image_url: Option<String>,
        }

        #[derive(Deserialize)]
        struct Price {
            current_retail: Option<f64>,
        }

        let result: SearchResponse = response.json().await?;

        let products = result
            .data
            .map(|d| d.search.products)
            .unwrap_or_default();

        let results = products
            .into_iter()
            .filter_map(|p| {
                let price = p.price.and_then(|pr| pr.current_retail)?;
                if price <= 0.0 {
                    return None;
                }
                let enrichment = p.item.enrichment;
                let url = enrichment
                    .as_ref()
                    .and_then(|e| e.buy_url.clone())
                    .unwrap_or_else(|| STORE_URL.to_string());
                let image_url = enrichment
                    .and_then(|e| e.images)
                    .and_then(|i| i.primary_image_url);

                Some(SearchResult {
                    name: p.item.product_description.title,
                    price,
                    url,
                    image_url,
                    marketplace: "target".to_string(),
                    in_stock: true,
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
            source: "target".to_string(),
        })
    }

    fn search_page_url(&self, query: &str) -> String {
        format!("{}/s?searchTerm={}", STORE_URL, urlencoding::encode(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_retail_price_pattern() {
        let adapter = TargetAdapter::new(&EngineConfig::default());
        let html = r#"{"price":{"current_retail":15.49}}"#;
        assert_eq!(adapter.patterns.extract(html, None), Some(15.49));
    }
}
