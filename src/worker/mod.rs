//! Background price update worker
//!
//! One invocation refreshes one tracked product:
//!
//! 1. Scrape every marketplace URL already on file, concurrently.
//! 2. For marketplaces that failed (or when nothing is on file), fall back
//!    to a name search through the discovery orchestrator, bypassing the
//!    result cache so the sync never sees stale prices.
//! 3. For marketplaces that still failed, ask the vision extractor when one
//!    is configured.
//! 4. Reconcile whatever succeeded and dispatch a summary notification.
//!
//! The run fails only when the product itself cannot be loaded; every
//! per-marketplace failure is absorbed into the report.

use crate::db::sqlite::models::TrackedProduct;
use crate::db::sqlite::SqliteDb;
use crate::discovery::vision::ScreenshotPriceExtractor;
use crate::discovery::{DiscoveryOrchestrator, RateLimiter, SearchOptions};
use crate::error::{EngineError, Result};
use crate::marketplaces::types::{match_confidence, ObservationInput};
use crate::marketplaces::MarketplaceRegistry;
use crate::notify::{Notifier, UpdateSummary};
use crate::reconcile::ReconciliationEngine;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one worker run
#[derive(Debug, Clone, serde::Serialize)]
pub struct UpdateReport {
    pub run_id: String,
    pub product_id: i64,
    pub observations_applied: usize,
    pub best_price: Option<f64>,
    pub best_marketplace: Option<String>,
    pub alert_fired: bool,
    /// marketplace id -> reason, for marketplaces no phase could recover
    pub failed: HashMap<String, String>,
}

pub struct UpdateWorker {
    db: Arc<SqliteDb>,
    registry: Arc<MarketplaceRegistry>,
    limiter: Arc<RateLimiter>,
    orchestrator: Arc<DiscoveryOrchestrator>,
    reconciler: ReconciliationEngine,
    notifier: Arc<dyn Notifier>,
    vision: Option<Arc<ScreenshotPriceExtractor>>,
}

impl UpdateWorker {
    pub fn new(
        db: Arc<SqliteDb>,
        registry: Arc<MarketplaceRegistry>,
        limiter: Arc<RateLimiter>,
        orchestrator: Arc<DiscoveryOrchestrator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let reconciler = ReconciliationEngine::new(db.clone());
        Self {
            db,
            registry,
            limiter,
            orchestrator,
            reconciler,
            notifier,
            vision: None,
        }
    }

    /// Enable the vision fallback for marketplaces that resist both scraping
    /// and search.
    pub fn with_vision(mut self, vision: Arc<ScreenshotPriceExtractor>) -> Self {
        self.vision = Some(vision);
        self
    }

    /// Refresh one tracked product and notify `recipient` with the outcome.
    pub async fn run(&self, product_id: i64, recipient: &str) -> Result<UpdateReport> {
        let run_id = uuid::Uuid::new_v4().to_string();

        let product = self
            .db
            .get_product(product_id)?
            .ok_or_else(|| EngineError::NotFound(format!("product {}", product_id)))?;

        info!(
            "Update run {} for product {} '{}'",
            run_id, product.id, product.name
        );

        let mut failed: HashMap<String, String> = HashMap::new();
        let mut observations = self.scrape_known_urls(&product, &mut failed).await;

        if !failed.is_empty() || observations.is_empty() {
            self.search_fallback(&product, &mut observations, &mut failed)
                .await;
        }

        if !failed.is_empty() {
            self.vision_fallback(&product, &mut observations, &mut failed)
                .await;
        }

        let outcome = self.reconciler.apply(product.id, &observations)?;

        let summary = UpdateSummary {
            product_id: product.id,
            product_name: product.name.clone(),
            best_price: outcome.updated_current_price,
            best_marketplace: outcome.best_marketplace.clone(),
            marketplaces_succeeded: observations.iter().map(|o| o.marketplace.clone()).collect(),
            marketplaces_failed: failed.clone(),
            price_dropped_below_target: outcome.should_alert,
        };
        if let Err(e) = self.notifier.notify(recipient, &summary).await {
            warn!("Notification for run {} failed: {}", run_id, e);
        }

        Ok(UpdateReport {
            run_id,
            product_id: product.id,
            observations_applied: observations.len(),
            best_price: outcome.updated_current_price,
            best_marketplace: outcome.best_marketplace,
            alert_fired: outcome.should_alert,
            failed,
        })
    }

    /// Phase 1: scrape every URL already on file, all marketplaces at once.
    ///
    /// A product with a canonical URL but no observation rows yet gets one
    /// generic scrape of that URL so a fresh product's first run has a
    /// direct observation to work with.
    async fn scrape_known_urls(
        &self,
        product: &TrackedProduct,
        failed: &mut HashMap<String, String>,
    ) -> Vec<ObservationInput> {
        let mut targets: Vec<(String, String)> = match self.db.list_observations(product.id) {
            Ok(existing) => existing
                .into_iter()
                .filter_map(|obs| obs.url.map(|url| (obs.marketplace, url)))
                .collect(),
            Err(e) => {
                warn!(
                    "Could not list observations for product {}: {}",
                    product.id, e
                );
                Vec::new()
            }
        };

        if targets.is_empty() {
            if let Some(url) = &product.url {
                targets.push(("generic".to_string(), url.clone()));
            }
        }

        let scrapes = targets.iter().map(|(marketplace, url)| async move {
            let outcome = match self.registry.get(marketplace) {
                Some(adapter) => {
                    self.limiter
                        .execute(marketplace, adapter.scrape_price(url))
                        .await
                }
                None => Err(EngineError::SourceUnavailable(format!(
                    "no adapter for {}",
                    marketplace
                ))),
            };
            (marketplace.clone(), url.clone(), outcome)
        });

        let mut observations = Vec::new();
        for (marketplace, url, outcome) in join_all(scrapes).await {
            match outcome {
                Ok(scraped) => {
                    debug!("Scraped {} from {}: {:.2}", marketplace, url, scraped.price);
                    observations.push(ObservationInput::from_scrape(&marketplace, &scraped, &url));
                }
                Err(e) => {
                    failed.insert(marketplace, e.to_string());
                }
            }
        }
        observations
    }

    /// Phase 2: recover failed marketplaces through a live name search.
    async fn search_fallback(
        &self,
        product: &TrackedProduct,
        observations: &mut Vec<ObservationInput>,
        failed: &mut HashMap<String, String>,
    ) {
        let opts = SearchOptions {
            use_cache: false,
            ..Default::default()
        };

        let response = match self.orchestrator.search_all(&product.name, &opts).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Search fallback for product {} failed: {}", product.id, e);
                return;
            }
        };

        // Results arrive cheapest first, so the first match per marketplace
        // is also the best one.
        for result in &response.results {
            if observations.iter().any(|o| o.marketplace == result.marketplace) {
                continue;
            }

            let confidence = match_confidence(&product.name, &result.name);
            observations.push(ObservationInput::from_search(result, confidence));
            failed.remove(&result.marketplace);
        }

        for (marketplace, reason) in response.errors {
            failed.entry(marketplace).or_insert(reason);
        }
    }

    /// Phase 3: vision extraction for anything still unrecovered.
    async fn vision_fallback(
        &self,
        product: &TrackedProduct,
        observations: &mut Vec<ObservationInput>,
        failed: &mut HashMap<String, String>,
    ) {
        let Some(vision) = &self.vision else {
            return;
        };

        let pending: Vec<String> = failed.keys().cloned().collect();
        for marketplace in pending {
            let outcome = self
                .limiter
                .execute(
                    &marketplace,
                    vision.extract_for_product(&marketplace, &product.name),
                )
                .await;

            match outcome {
                Ok(verified) => {
                    let confidence = verified
                        .name
                        .as_deref()
                        .map(|n| match_confidence(&product.name, n))
                        .unwrap_or(0.5);
                    observations.push(ObservationInput {
                        marketplace: marketplace.clone(),
                        price: verified.price,
                        url: None,
                        image_url: None,
                        in_stock: true,
                        confidence,
                    });
                    failed.remove(&marketplace);
                }
                Err(e) => {
                    debug!("Vision fallback for {} failed: {}", marketplace, e);
                    failed.insert(marketplace, e.to_string());
                }
            }
        }
    }
}
