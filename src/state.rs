//! Engine state
//!
//! One struct wires the whole engine together: database, marketplace
//! registry, rate limiter, cache and orchestrator, all behind `Arc` so the
//! embedding application can share it across tasks.

use crate::config::EngineConfig;
use crate::db::sqlite::SqliteDb;
use crate::discovery::vision::{ScreenshotPriceExtractor, VisionExtractor};
use crate::discovery::{DiscoveryOrchestrator, RateLimiter, ResultCache};
use crate::error::Result;
use crate::marketplaces::MarketplaceRegistry;
use crate::notify::Notifier;
use crate::worker::UpdateWorker;
use std::path::Path;
use std::sync::Arc;

pub struct EngineState {
    pub config: EngineConfig,
    pub db: Arc<SqliteDb>,
    pub registry: Arc<MarketplaceRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<ResultCache>,
    pub orchestrator: Arc<DiscoveryOrchestrator>,
}

impl EngineState {
    /// Open (or create) the database at `path` and wire up every component
    /// from the given configuration.
    pub fn new(config: EngineConfig, path: &Path) -> Result<Self> {
        Self::with_db(config, Arc::new(SqliteDb::new(path)?))
    }

    /// In-memory variant, used by tests
    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        Self::with_db(config, Arc::new(SqliteDb::in_memory()?))
    }

    fn with_db(config: EngineConfig, db: Arc<SqliteDb>) -> Result<Self> {
        let registry = Arc::new(MarketplaceRegistry::new(&config));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_delay));
        let cache = Arc::new(ResultCache::new(db.clone(), config.cache_ttl));
        let orchestrator = Arc::new(DiscoveryOrchestrator::new(
            registry.clone(),
            limiter.clone(),
            cache.clone(),
            &config,
        ));

        Ok(Self {
            config,
            db,
            registry,
            limiter,
            cache,
            orchestrator,
        })
    }

    /// Build an update worker over this state.
    ///
    /// The vision backend is optional; pass one to enable the last-resort
    /// extraction path for marketplaces that resist scraping and search.
    pub fn update_worker(
        &self,
        notifier: Arc<dyn Notifier>,
        vision_backend: Option<Arc<dyn VisionExtractor>>,
    ) -> UpdateWorker {
        let worker = UpdateWorker::new(
            self.db.clone(),
            self.registry.clone(),
            self.limiter.clone(),
            self.orchestrator.clone(),
            notifier,
        );

        match vision_backend {
            Some(backend) => worker.with_vision(Arc::new(ScreenshotPriceExtractor::new(
                backend,
                self.registry.clone(),
            ))),
            None => worker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_state_wires_up() {
        let state = EngineState::in_memory(EngineConfig::default()).unwrap();
        assert_eq!(state.registry.ids().len(), 5);
        assert_eq!(state.limiter.delay(), state.config.rate_limit_delay);
    }
}
