//! Notification boundary
//!
//! Delivery (email, push, webhooks) is an external collaborator. From this
//! side it is fire-and-forget: a delivery failure is logged by the caller
//! and never rolls back reconciliation.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

/// Per-run summary handed to the notification collaborator
#[derive(Debug, Clone, serde::Serialize)]
pub struct UpdateSummary {
    pub product_id: i64,
    pub product_name: String,
    pub best_price: Option<f64>,
    pub best_marketplace: Option<String>,
    pub marketplaces_succeeded: Vec<String>,
    /// marketplace id -> failure reason
    pub marketplaces_failed: HashMap<String, String>,
    pub price_dropped_below_target: bool,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &str, summary: &UpdateSummary) -> Result<()>;
}

/// Default notifier: writes the summary to the log. Useful for development
/// and as the fallback when no delivery channel is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, summary: &UpdateSummary) -> Result<()> {
        info!(
            "Notify {}: product '{}' best {:?} at {:?} ({} ok, {} failed, alert={})",
            recipient,
            summary.product_name,
            summary.best_price,
            summary.best_marketplace,
            summary.marketplaces_succeeded.len(),
            summary.marketplaces_failed.len(),
            summary.price_dropped_below_target
        );
        Ok(())
    }
}
