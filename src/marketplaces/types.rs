//! Common marketplace types

use serde::{Deserialize, Serialize};

/// A single normalized product result returned by a marketplace adapter,
/// the search cache, or the discovery orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    pub price: f64,
    pub url: String,
    pub image_url: Option<String>,
    pub marketplace: String,
    pub in_stock: bool,
}

/// Result of scraping a single known product URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPrice {
    pub price: f64,
    pub currency: String,
    pub source: String,
}

/// One source's successful view of a tracked product, ready for
/// reconciliation. Produced by the update worker from scrape, search, or
/// vision results; never constructed by adapters themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationInput {
    pub marketplace: String,
    pub price: f64,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub in_stock: bool,
    /// Quality of the match between the query and the found product, in [0,1].
    pub confidence: f64,
}

impl ObservationInput {
    /// Direct observation of a known product URL (exact match by definition).
    pub fn from_scrape(marketplace: &str, scraped: &ScrapedPrice, url: &str) -> Self {
        Self {
            marketplace: marketplace.to_string(),
            price: scraped.price,
            url: Some(url.to_string()),
            image_url: None,
            in_stock: true,
            confidence: 1.0,
        }
    }

    /// Observation recovered through name search; carries the match score.
    pub fn from_search(result: &SearchResult, confidence: f64) -> Self {
        Self {
            marketplace: result.marketplace.clone(),
            price: result.price,
            url: Some(result.url.clone()),
            image_url: result.image_url.clone(),
            in_stock: result.in_stock,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Token-overlap score between a search query and a found product name.
/// 1.0 means every query token appears in the name.
pub fn match_confidence(query: &str, name: &str) -> f64 {
    let name_lower = name.to_lowercase();
    let name_tokens: Vec<&str> = name_lower.split_whitespace().collect();

    let query_lower = query.to_lowercase();
    let query_tokens: Vec<&str> = query_lower.split_whitespace().collect();
    if query_tokens.is_empty() {
        return 0.0;
    }

    let hits = query_tokens
        .iter()
        .filter(|t| name_tokens.contains(t))
        .count();

    hits as f64 / query_tokens.len() as f64
}
