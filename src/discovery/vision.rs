//! Vision-based price extraction fallback
//!
//! Last-resort path for a marketplace whose structured and scrape paths both
//! failed. The image-recognition service itself is an external collaborator
//! behind the [`VisionExtractor`] trait; this module's responsibility is
//! building the right input and validating the shape of what comes back.
//!
//! The input is the marketplace's *search-results page* URL built from the
//! product's display name, not the original product URL. Per-SKU product
//! pages are the most aggressively bot-walled pages on every marketplace;
//! search pages are far more permissive.

use crate::error::{EngineError, Result};
use crate::marketplaces::MarketplaceRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// What the vision service saw on the page
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct VisionExtraction {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub success: bool,
    pub error: Option<String>,
}

/// A vision-extraction result that passed shape validation
#[derive(Debug, Clone)]
pub struct VerifiedExtraction {
    pub name: Option<String>,
    pub price: f64,
}

/// Opaque image-recognition boundary: page in, {name, price} out.
/// Bounded latency, no retry contract.
#[async_trait]
pub trait VisionExtractor: Send + Sync {
    async fn extract(&self, page_url: &str) -> Result<VisionExtraction>;
}

pub struct ScreenshotPriceExtractor {
    backend: Arc<dyn VisionExtractor>,
    registry: Arc<MarketplaceRegistry>,
}

impl ScreenshotPriceExtractor {
    pub fn new(backend: Arc<dyn VisionExtractor>, registry: Arc<MarketplaceRegistry>) -> Self {
        Self { backend, registry }
    }

    /// Ask the vision service what a marketplace currently charges for a
    /// product, identified by display name.
    pub async fn extract_for_product(
        &self,
        marketplace_id: &str,
        product_name: &str,
    ) -> Result<VerifiedExtraction> {
        let adapter = self.registry.get(marketplace_id).ok_or_else(|| {
            EngineError::Validation(format!("unknown marketplace: {}", marketplace_id))
        })?;

        let page_url = adapter.search_page_url(product_name);
        debug!(
            "Vision extraction for '{}' on {} via {}",
            product_name, marketplace_id, page_url
        );

        let extraction = self.backend.extract(&page_url).await?;
        Self::verify(extraction)
    }

    /// Accept only a successful extraction carrying a plausible price.
    fn verify(extraction: VisionExtraction) -> Result<VerifiedExtraction> {
        if !extraction.success {
            return Err(EngineError::PriceNotFound(
                extraction
                    .error
                    .unwrap_or_else(|| "vision service reported failure".to_string()),
            ));
        }

        let price = extraction
            .price
            .ok_or_else(|| EngineError::PriceNotFound("vision result had no price".to_string()))?;
        if !price.is_finite() || price <= 0.0 {
            return Err(EngineError::PriceNotFound(format!(
                "vision result price {} is implausible",
                price
            )));
        }

        let name = extraction
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Ok(VerifiedExtraction { name, price })
    }
}
