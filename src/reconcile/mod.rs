//! Price reconciliation
//!
//! Merges one batch of per-marketplace observations into a product's
//! authoritative price state. The policy lives here; the durable write is a
//! single transaction in the database layer so that overlapping update runs
//! for the same product cannot lose each other's extrema updates.

use crate::db::sqlite::SqliteDb;
use crate::error::Result;
use crate::marketplaces::types::ObservationInput;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// What one reconciliation pass did
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ReconcileOutcome {
    pub updated_current_price: Option<f64>,
    pub best_marketplace: Option<String>,
    pub history_entries_written: usize,
    /// True when this pass moved the price from at-or-above target to below
    /// target. Repeated checks while already below target stay quiet.
    pub should_alert: bool,
}

pub struct ReconciliationEngine {
    db: Arc<SqliteDb>,
}

impl ReconciliationEngine {
    pub fn new(db: Arc<SqliteDb>) -> Self {
        Self { db }
    }

    /// Apply an observation batch to a tracked product.
    ///
    /// The authoritative price is the cheapest observation; ties keep the
    /// first observation supplied. Every observation gets a history row, not
    /// just the winner. An empty batch changes nothing.
    pub fn apply(&self, product_id: i64, observations: &[ObservationInput]) -> Result<ReconcileOutcome> {
        if observations.is_empty() {
            // Still verify the product exists so callers get a consistent
            // NotFound instead of a silent no-op for a bad id.
            self.db.get_product(product_id)?.ok_or_else(|| {
                crate::error::EngineError::NotFound(format!("product {}", product_id))
            })?;
            return Ok(ReconcileOutcome::default());
        }

        let winner = observations
            .iter()
            .skip(1)
            .fold(&observations[0], |best, obs| {
                if obs.price < best.price {
                    obs
                } else {
                    best
                }
            });

        let now = Utc::now().to_rfc3339();
        let applied = self.db.apply_observation_batch(
            product_id,
            winner.price,
            &winner.marketplace,
            observations,
            &now,
        )?;

        let should_alert = applied.current_price < applied.target_price
            && applied
                .previous_price
                .map_or(true, |prior| prior >= applied.target_price);

        info!(
            "Reconciled product {}: {} @ {:.2} ({} observations, alert={})",
            product_id,
            winner.marketplace,
            applied.current_price,
            observations.len(),
            should_alert
        );

        Ok(ReconcileOutcome {
            updated_current_price: Some(applied.current_price),
            best_marketplace: Some(winner.marketplace.clone()),
            history_entries_written: observations.len(),
            should_alert,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::models::NewProduct;

    fn setup(target_price: f64) -> (Arc<SqliteDb>, ReconciliationEngine, i64) {
        let db = Arc::new(SqliteDb::in_memory().unwrap());
        let product = db
            .create_product(&NewProduct {
                name: "Test Widget".to_string(),
                url: None,
                target_price,
            })
            .unwrap();
        let engine = ReconciliationEngine::new(db.clone());
        (db, engine, product.id)
    }

    fn obs(marketplace: &str, price: f64) -> ObservationInput {
        ObservationInput {
            marketplace: marketplace.to_string(),
            price,
            url: Some(format!("https://{}.example/widget", marketplace)),
            image_url: None,
            in_stock: true,
            confidence: 1.0,
        }
    }

    #[test]
    fn test_cheapest_observation_wins() {
        let (db, engine, id) = setup(200.0);

        let outcome = engine
            .apply(id, &[obs("amazon", 100.0), obs("walmart", 80.0), obs("target", 120.0)])
            .unwrap();

        assert_eq!(outcome.updated_current_price, Some(80.0));
        assert_eq!(outcome.best_marketplace.as_deref(), Some("walmart"));
        assert_eq!(outcome.history_entries_written, 3);
        assert_eq!(db.history_count(id).unwrap(), 3);

        let product = db.get_product(id).unwrap().unwrap();
        assert_eq!(product.current_price, Some(80.0));
        assert_eq!(product.best_marketplace.as_deref(), Some("walmart"));
    }

    #[test]
    fn test_price_tie_keeps_first_supplied() {
        let (_db, engine, id) = setup(200.0);

        let outcome = engine
            .apply(id, &[obs("target", 50.0), obs("amazon", 50.0)])
            .unwrap();

        assert_eq!(outcome.best_marketplace.as_deref(), Some("target"));
    }

    #[test]
    fn test_extrema_track_min_and_max() {
        let (db, engine, id) = setup(200.0);

        engine.apply(id, &[obs("amazon", 100.0)]).unwrap();
        engine.apply(id, &[obs("amazon", 150.0)]).unwrap();
        engine.apply(id, &[obs("amazon", 90.0)]).unwrap();

        let product = db.get_product(id).unwrap().unwrap();
        assert_eq!(product.lowest_price, Some(90.0));
        assert_eq!(product.highest_price, Some(150.0));
        assert_eq!(product.current_price, Some(90.0));
    }

    #[test]
    fn test_alert_fires_only_on_transition_below_target() {
        let (_db, engine, id) = setup(100.0);

        // No prior price and below target: alert
        let first = engine.apply(id, &[obs("amazon", 90.0)]).unwrap();
        assert!(first.should_alert);

        // Still below target: quiet
        let second = engine.apply(id, &[obs("amazon", 85.0)]).unwrap();
        assert!(!second.should_alert);

        // Back above, then dropping again: alert
        engine.apply(id, &[obs("amazon", 110.0)]).unwrap();
        let fourth = engine.apply(id, &[obs("amazon", 95.0)]).unwrap();
        assert!(fourth.should_alert);
    }

    #[test]
    fn test_at_target_is_not_below_target() {
        let (_db, engine, id) = setup(100.0);
        let outcome = engine.apply(id, &[obs("amazon", 100.0)]).unwrap();
        assert!(!outcome.should_alert);
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let (db, engine, id) = setup(100.0);

        let outcome = engine.apply(id, &[]).unwrap();
        assert_eq!(outcome.updated_current_price, None);
        assert_eq!(outcome.history_entries_written, 0);
        assert!(!outcome.should_alert);
        assert_eq!(db.history_count(id).unwrap(), 0);

        let product = db.get_product(id).unwrap().unwrap();
        assert!(product.current_price.is_none());
    }

    #[test]
    fn test_missing_product_is_an_error() {
        let db = Arc::new(SqliteDb::in_memory().unwrap());
        let engine = ReconciliationEngine::new(db);
        assert!(engine.apply(404, &[]).is_err());
        assert!(engine.apply(404, &[obs("amazon", 10.0)]).is_err());
    }
}
