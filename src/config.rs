//! Engine configuration
//!
//! All credentials and tunables arrive through environment variables with the
//! `PRICEWATCH_` prefix. A missing credential is not an error: the matching
//! source simply contributes nothing (it is reported as unavailable, never as
//! a transient failure).

use std::time::Duration;

/// Per-marketplace API credentials. `None` means that marketplace's
/// structured API is unavailable and its adapter returns empty result sets.
#[derive(Debug, Clone, Default)]
pub struct MarketplaceCredentials {
    pub amazon_api_key: Option<String>,
    pub walmart_api_key: Option<String>,
    pub target_api_key: Option<String>,
    pub bestbuy_api_key: Option<String>,
}

impl MarketplaceCredentials {
    /// Whether at least one marketplace API is usable.
    pub fn any_configured(&self) -> bool {
        self.amazon_api_key.is_some()
            || self.walmart_api_key.is_some()
            || self.target_api_key.is_some()
            || self.bestbuy_api_key.is_some()
    }
}

/// Engine-wide configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-marketplace API keys
    pub credentials: MarketplaceCredentials,

    /// Cross-marketplace structured search key (SerpAPI-style). When present,
    /// one call covers every marketplace and per-marketplace adapters are
    /// skipped for discovery.
    pub structured_search_api_key: Option<String>,

    /// Vision extraction service key. Absent means the screenshot fallback is
    /// never attempted.
    pub vision_api_key: Option<String>,

    /// Minimum delay between outbound calls to the same source
    pub rate_limit_delay: Duration,

    /// How long cached search results stay valid
    pub cache_ttl: Duration,

    /// Outbound HTTP request timeout
    pub http_timeout: Duration,

    /// User agent sent on scrape requests
    pub user_agent: String,

    /// Artificial latency of the credential-free demo provider
    pub demo_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            credentials: MarketplaceCredentials::default(),
            structured_search_api_key: None,
            vision_api_key: None,
            rate_limit_delay: Duration::from_millis(1000),
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            http_timeout: Duration::from_secs(30),
            user_agent: "PriceWatch/1.0 (wishlist price tracker)".to_string(),
            demo_delay: Duration::from_millis(800),
        }
    }
}

impl EngineConfig {
    /// Build configuration from `PRICEWATCH_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            credentials: MarketplaceCredentials {
                amazon_api_key: env_opt("PRICEWATCH_AMAZON_API_KEY"),
                walmart_api_key: env_opt("PRICEWATCH_WALMART_API_KEY"),
                target_api_key: env_opt("PRICEWATCH_TARGET_API_KEY"),
                bestbuy_api_key: env_opt("PRICEWATCH_BESTBUY_API_KEY"),
            },
            structured_search_api_key: env_opt("PRICEWATCH_SEARCH_API_KEY"),
            vision_api_key: env_opt("PRICEWATCH_VISION_API_KEY"),
            rate_limit_delay: env_millis("PRICEWATCH_RATE_LIMIT_MS")
                .unwrap_or(defaults.rate_limit_delay),
            cache_ttl: env_secs("PRICEWATCH_CACHE_TTL_SECS").unwrap_or(defaults.cache_ttl),
            http_timeout: env_secs("PRICEWATCH_HTTP_TIMEOUT_SECS")
                .unwrap_or(defaults.http_timeout),
            user_agent: env_opt("PRICEWATCH_USER_AGENT").unwrap_or(defaults.user_agent),
            demo_delay: env_millis("PRICEWATCH_DEMO_DELAY_MS").unwrap_or(defaults.demo_delay),
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_opt(key)?.parse().ok().map(Duration::from_millis)
}

fn env_secs(key: &str) -> Option<Duration> {
    env_opt(key)?.parse().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.rate_limit_delay, Duration::from_millis(1000));
        assert_eq!(config.cache_ttl, Duration::from_secs(86400));
        assert!(!config.credentials.any_configured());
        assert!(config.structured_search_api_key.is_none());
    }

    #[test]
    fn test_any_configured() {
        let mut creds = MarketplaceCredentials::default();
        assert!(!creds.any_configured());
        creds.bestbuy_api_key = Some("key".to_string());
        assert!(creds.any_configured());
    }
}
