use custodia_escrow::EscrowManager;
use custodia_order::{DisputeResolver, OrderCoordinator, TransactionRepository};
use custodia_store::{EventLog, RedisClient};
use std::sync::Arc;

use crate::metrics::Metrics;

/// Verification-side auth settings. Token lifetime is the issuer's
/// concern; expiry is checked from the token's own `exp` claim.
#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone, Copy)]
pub struct RateLimitSettings {
    pub requests: i64,
    pub window_seconds: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<OrderCoordinator>,
    pub resolver: Arc<DisputeResolver>,
    pub escrows: EscrowManager,
    pub transactions: Arc<dyn TransactionRepository>,
    pub events: Arc<EventLog>,
    pub metrics: Arc<Metrics>,
    /// None disables rate limiting (tests, local runs without Redis).
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitSettings,
}
