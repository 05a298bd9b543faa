//! Best Buy marketplace adapter

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::marketplaces::extract::{PatternSet, PricePattern, COMMON_PRICE_PATTERNS};
use crate::marketplaces::types::{ScrapedPrice, SearchResult};
use crate::marketplaces::{fetch_html, Marketplace};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const API_URL: &str = "https://api.bestbuy.com/v1/products";
const STORE_URL: &str = "https://www.bestbuy.com";

const BESTBUY_PRICE_PATTERNS: &[PricePattern] = &[
    PricePattern {
        pattern: r#""customerPrice"\s*:\s*([0-9]+\.?[0-9]{0,2})"#,
        group: 1,
    },
    PricePattern {
        pattern: r#"aria-label="Your price for this item is \$([0-9][0-9,]*\.?[0-9]{0,2})""#,
        group: 1,
    },
];

/// Best Buy adapter (Best Buy Products API)
pub struct BestBuyAdapter {
    client: Client,
    api_key: Option<String>,
    patterns: PatternSet,
}

impl BestBuyAdapter {
    pub fn new(config: &EngineConfig) -> Self {
        let mut patterns = BESTBUY_PRICE_PATTERNS.to_vec();
        patterns.extend_from_slice(COMMON_PRICE_PATTERNS);

        Self {
            client: Client::builder()
                .timeout(config.http_timeout)
                .user_agent(config.user_agent.clone())
                .build()
                .expect("Failed to create HTTP client"),
            api_key: config.credentials.bestbuy_api_key.clone(),
            patterns: PatternSet::new(&patterns),
        }
    }
}

#[async_trait]
impl Marketplace for BestBuyAdapter {
    fn id(&self) -> &'static str {
        "bestbuy"
    }

    fn display_name(&self) -> &'static str {
        "Best Buy"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let Some(api_key) = &self.api_key else {
            tracing::debug!("Best Buy search skipped: no API key configured");
            return Ok(vec![]);
        };

        // Products API filter syntax: products(search=term)
        let url = format!("{}(search={})", API_URL, urlencoding::encode(query));
        let page_size = max_results.min(100).to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", api_key.as_str()),
                ("format", "json"),
                ("pageSize", page_size.as_str()),
                ("show", "name,salePrice,url,image,onlineAvailability"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EngineError::FetchFailed(format!(
                "Best Buy search API returned {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct SearchResponse {
            #[serde(default)]
            products: Vec<Product>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Product {
            name: String,
            sale_price: Option<f64>,
            url: Option<String>,
            image: Option<String>,
            #[serde(default)]
            online_availability: bool,
        }

        let result: SearchResponse = response.json().await?;

        let results = result
            .products
            .into_iter()
            .filter_map(|p| {
                let price = p.sale_price?;
                if price <= 0.0 {
                    return None;
                }
                Some(SearchResult {
                    name: p.name,
                    price,
                    url: p.url.unwrap_or_else(|| STORE_URL.to_string()),
                    image_url: p.image,
                    marketplace: "bestbuy".to_string(),
                    in_stock: p.online_availability,
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
            source: "bestbuy".to_string(),
        })
    }

    fn search_page_url(&self, query: &str) -> String {
        format!(
            "{}/site/searchpage.jsp?st={}",
            STORE_URL,
            urlencoding::encode(query)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bestbuy_customer_price_pattern() {
        let adapter = BestBuyAdapter::new(&EngineConfig::default());
        let html = r#"{"customerPrice":399.99,"regularPrice":449.99}"#;
        assert_eq!(adapter.patterns.extract(html, None), Some(399.99));
    }
}
