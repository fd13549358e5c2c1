use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Escrow status. `Released` and `Refunded` are terminal; funds held in
/// escrow end up in exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Held,
    Released,
    Refunded,
}

impl EscrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowStatus::Held => "held",
            EscrowStatus::Released => "released",
            EscrowStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<EscrowStatus> {
        match value {
            "held" => Some(EscrowStatus::Held),
            "released" => Some(EscrowStatus::Released),
            "refunded" => Some(EscrowStatus::Refunded),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EscrowStatus::Released | EscrowStatus::Refunded)
    }
}

/// Funds held for exactly one order until delivery is confirmed or a
/// dispute resolves the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: i64,
    pub status: EscrowStatus,
    pub hold_date: DateTime<Utc>,
    pub release_date: Option<DateTime<Utc>>,
}

impl Escrow {
    pub fn hold(order_id: Uuid, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            amount,
            status: EscrowStatus::Held,
            hold_date: Utc::now(),
            release_date: None,
        }
    }
}
