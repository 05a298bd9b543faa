//! Amazon marketplace adapter
//!
//! Structured search goes through a product-data API gateway (Amazon's own
//! affiliate API requires request signing, so deployments configure a data
//! API key instead). Scraping applies Amazon-specific price markup patterns
//! before the common fallbacks.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::marketplaces::extract::{PatternSet, PricePattern, COMMON_PRICE_PATTERNS};
use crate::marketplaces::types::{ScrapedPrice, SearchResult};
use crate::marketplaces::{fetch_html, Marketplace};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const SEARCH_URL: &str = "https://api.rainforestapi.com/request";
const STORE_URL: &str = "https://www.amazon.com";

const AMAZON_PRICE_PATTERNS: &[PricePattern] = &[
    PricePattern {
        pattern: r#"class="a-offscreen">\$([0-9][0-9,]*\.?[0-9]{0,2})<"#,
        group: 1,
    },
    PricePattern {
        pattern: r#"id="priceblock_ourprice"[^>]*>\$([0-9][0-9,]*\.?[0-9]{0,2})"#,
        group: 1,
    },
    PricePattern {
        pattern: r#""priceAmount"\s*:\s*([0-9]+\.?[0-9]{0,2})"#,
        group: 1,
    },
];

/// Amazon adapter
pub struct AmazonAdapter {
    client: Client,
    api_key: Option<String>,
    patterns: PatternSet,
}

impl AmazonAdapter {
    pub fn new(config: &EngineConfig) -> Self {
        let mut patterns = AMAZON_PRICE_PATTERNS.to_vec();
        patterns.extend_from_slice(COMMON_PRICE_PATTERNS);

        Self {
            client: Client::builder()
                .timeout(config.http_timeout)
                .user_agent(config.user_agent.clone())
                .build()
                .expect("Failed to create HTTP client"),
            api_key: config.credentials.amazon_api_key.clone(),
            patterns: PatternSet::new(&patterns),
        }
    }
}

#[async_trait]
impl Marketplace for AmazonAdapter {
    fn id(&self) -> &'static str {
        "amazon"
    }

    fn display_name(&self) -> &'static str {
        "Amazon"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let Some(api_key) = &self.api_key else {
            tracing::debug!("Amazon search skipped: no API key configured");
            return Ok(vec![]);
        };

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("api_key", api_key.as_str()),
                ("type", "search"),
                ("amazon_domain", "amazon.com"),
                ("search_term", query),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EngineError::FetchFailed(format!(
                "Amazon search API returned {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct SearchResponse {
            #[serde(default)]
            search_results: Vec<ApiResult>,
        }

        #[derive(Deserialize)]
        struct ApiResult {
            title: String,
            link: String,
            image: Option<String>,
            price: Option<ApiPrice>,
        }

        #[derive(Deserialize)]
        struct ApiPrice {
            value: f64,
        }

        let result: SearchResponse = response.json().await?;

        let results = result
            .search_results
            .into_iter()
            .filter_map(|r| {
                let price = r.price?.value;
                if price <= 0.0 {
                    return None;
                }
                Some(SearchResult {
                    name: r.title,
                    price,
                    url: r.link,
                    image_url: r.image,
                    marketplace: "amazon".to_string(),
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
            source: "amazon".to_string(),
        })
    }

    fn search_page_url(&self, query: &str) -> String {
        format!("{}/s?k={}", STORE_URL, urlencoding::encode(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amazon_patterns() {
        let adapter = AmazonAdapter::new(&EngineConfig::default());
        let html = r#"<span class="a-offscreen">$1,234.56</span>"#;
        assert_eq!(adapter.patterns.extract(html, None), Some(1234.56));
    }

    #[test]
    fn test_search_page_url_encodes_query() {
        let adapter = AmazonAdapter::new(&EngineConfig::default());
        assert_eq!(
            adapter.search_page_url("star wars lego"),
            "https://www.amazon.com/s?k=star%20wars%20lego"
        );
    }
}
