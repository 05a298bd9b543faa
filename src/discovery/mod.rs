//! Price discovery: cache, rate limiting, the provider fallback chain and
//! the vision-based last resort.

pub mod cache;
pub mod orchestrator;
pub mod providers;
pub mod rate_limiter;
pub mod vision;

pub use cache::ResultCache;
pub use orchestrator::DiscoveryOrchestrator;
pub use providers::{ProviderVerdict, SearchOptions, SearchProvider, SearchResponse};
pub use rate_limiter::RateLimiter;
pub use vision::{ScreenshotPriceExtractor, VisionExtraction, VisionExtractor};
