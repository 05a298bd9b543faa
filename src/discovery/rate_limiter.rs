//! Per-source rate limiting
//!
//! Serializes outbound calls per source key and enforces a fixed minimum
//! delay between the completion of one call and the start of the next for
//! that key. Different keys proceed fully in parallel; within a key, callers
//! run in submission order (tokio's mutex wakes waiters FIFO). A task's error
//! is returned to its own caller and does not block the queue behind it.
//!
//! The per-key queue is unbounded; whether a bursty caller should instead see
//! rejection/backoff is an open hardening question, so no cap is imposed here.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct KeyState {
    last_completed: Option<Instant>,
}

/// Rate limiter keyed by source (marketplace id, API host, ...)
pub struct RateLimiter {
    delay: Duration,
    keys: DashMap<String, Arc<Mutex<KeyState>>>,
}

impl RateLimiter {
    /// Create a limiter with the given inter-request delay per key
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            keys: DashMap::new(),
        }
    }

    /// Run `task` under the key's slot: at most one in flight, and at least
    /// the configured delay after the previous task for this key completed.
    pub async fn execute<F, T>(&self, key: &str, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let state = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(KeyState::default())))
            .clone();

        let mut guard = state.lock().await;

        if let Some(last) = guard.last_completed {
            let since = last.elapsed();
            if since < self.delay {
                tokio::time::sleep(self.delay - since).await;
            }
        }

        let result = task.await;
        guard.last_completed = Some(Instant::now());
        result
    }

    /// The configured per-key delay
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_same_key_runs_in_order_with_spacing() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(50)));
        let order = Arc::new(Mutex::new(Vec::new()));
        let starts = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3 {
            let limiter = limiter.clone();
            let order = order.clone();
            let starts = starts.clone();
            handles.push(tokio::spawn(async move {
                limiter
                    .execute("amazon", async {
                        starts.lock().await.push(Instant::now());
                        order.lock().await.push(i);
                    })
                    .await;
            }));
            // Stagger spawns so submission order is well-defined
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2]);

        let starts = starts.lock().await;
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(50));
        }
    }

    #[tokio::test]
    async fn test_different_keys_overlap() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(200)));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for key in ["amazon", "walmart", "target"] {
            let limiter = limiter.clone();
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            handles.push(tokio::spawn(async move {
                limiter
                    .execute(key, async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_in_flight.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(max_in_flight.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_error_does_not_poison_the_queue() {
        let limiter = RateLimiter::new(Duration::from_millis(1));

        let first: Result<(), &str> = limiter.execute("key", async { Err("boom") }).await;
        assert!(first.is_err());

        let second: Result<u32, &str> = limiter.execute("key", async { Ok(7) }).await;
        assert_eq!(second.unwrap(), 7);
    }
}
