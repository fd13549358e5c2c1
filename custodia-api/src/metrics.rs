use axum::extract::State;
use axum::http::StatusCode;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::state::AppState;

/// Counters for the business operations the service performs. Exposed
/// on `/metrics` in Prometheus text format.
pub struct Metrics {
    registry: Registry,
    pub orders_created: IntCounter,
    pub order_status_changes: IntCounterVec,
    pub escrow_settlements: IntCounterVec,
    pub disputes_opened: IntCounter,
    pub disputes_resolved: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created =
            IntCounter::new("custodia_orders_created_total", "Orders created").unwrap();
        let order_status_changes = IntCounterVec::new(
            Opts::new(
                "custodia_order_status_changes_total",
                "Order status transitions by target status",
            ),
            &["status"],
        )
        .unwrap();
        let escrow_settlements = IntCounterVec::new(
            Opts::new(
                "custodia_escrow_settlements_total",
                "Escrow settlements by outcome",
            ),
            &["outcome"],
        )
        .unwrap();
        let disputes_opened =
            IntCounter::new("custodia_disputes_opened_total", "Disputes opened").unwrap();
        let disputes_resolved =
            IntCounter::new("custodia_disputes_resolved_total", "Disputes resolved").unwrap();

        registry.register(Box::new(orders_created.clone())).unwrap();
        registry
            .register(Box::new(order_status_changes.clone()))
            .unwrap();
        registry
            .register(Box::new(escrow_settlements.clone()))
            .unwrap();
        registry.register(Box::new(disputes_opened.clone())).unwrap();
        registry
            .register(Box::new(disputes_resolved.clone()))
            .unwrap();

        Self {
            registry,
            orders_created,
            order_status_changes,
            escrow_settlements,
            disputes_opened,
            disputes_resolved,
        }
    }

    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .gather()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
