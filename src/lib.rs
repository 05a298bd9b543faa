//! pricewatch — multi-source price discovery and reconciliation engine
//!
//! Tracks products across marketplaces (Amazon, Walmart, Target, Best Buy,
//! plus a generic scrape path), discovers current prices through a fallback
//! chain of structured search, per-marketplace APIs and vision extraction,
//! and reconciles multi-source observations into one authoritative price
//! with change-triggered alerting.
//!
//! Entry points: [`state::EngineState`] wires everything up;
//! [`worker::UpdateWorker`] runs one product refresh end to end;
//! [`discovery::DiscoveryOrchestrator`] answers ad-hoc searches.

pub mod config;
pub mod db;
pub mod discovery;
pub mod error;
pub mod marketplaces;
pub mod notify;
pub mod reconcile;
pub mod state;
pub mod worker;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use state::EngineState;

/// Install a `tracing` subscriber that honors `RUST_LOG`, defaulting to
/// `info` for this crate. Call once from the embedding application.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pricewatch=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
