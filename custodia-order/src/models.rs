use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order status in the delivery lifecycle. Forward-only along
/// pending → processing → dispatched → delivered; cancellation exits
/// from pending and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Dispatched,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Dispatched => "dispatched",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<OrderStatus> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "dispatched" => Some(OrderStatus::Dispatched),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Position along the forward delivery chain; cancelled sits off it.
    pub fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Processing => Some(1),
            OrderStatus::Dispatched => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn can_transition(&self, to: OrderStatus) -> bool {
        matches!(
            (self, to),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Processing, OrderStatus::Dispatched)
                | (OrderStatus::Dispatched, OrderStatus::Delivered)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

/// A purchase. `amount` is unit price x quantity, computed once at
/// creation; it and `escrow_id` never change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub product_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: u32,
    pub amount: i64,
    pub escrow_id: Uuid,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        product_id: Uuid,
        buyer_id: Uuid,
        seller_id: Uuid,
        quantity: u32,
        amount: i64,
        escrow_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            product_id,
            buyer_id,
            seller_id,
            quantity,
            amount,
            escrow_id,
            status: OrderStatus::Pending,
            tracking_number: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Status of the denormalized reporting mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Disputed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Disputed => "disputed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<TransactionStatus> {
        match value {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "disputed" => Some(TransactionStatus::Disputed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}

/// Reporting mirror of an order and its escrow. Never authoritative:
/// Order and Escrow are the sources of truth, this record just makes
/// per-user listing cheap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub product_id: Uuid,
    pub escrow_id: Uuid,
    pub amount: i64,
    pub status: TransactionStatus,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn mirror(order: &Order) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            product_id: order.product_id,
            escrow_id: order.escrow_id,
            amount: order.amount,
            status: TransactionStatus::Pending,
            tracking_number: order.tracking_number.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_only() {
        use OrderStatus::*;

        assert!(Pending.can_transition(Processing));
        assert!(Processing.can_transition(Dispatched));
        assert!(Dispatched.can_transition(Delivered));
        assert!(Pending.can_transition(Cancelled));

        // No backward moves, no skips, no exits from terminal states.
        assert!(!Processing.can_transition(Pending));
        assert!(!Pending.can_transition(Dispatched));
        assert!(!Pending.can_transition(Delivered));
        assert!(!Processing.can_transition(Cancelled));
        assert!(!Dispatched.can_transition(Cancelled));
        assert!(!Delivered.can_transition(Processing));
        assert!(!Delivered.can_transition(Cancelled));
        assert!(!Cancelled.can_transition(Processing));
        assert!(!Cancelled.can_transition(Delivered));
    }

    #[test]
    fn test_valid_transitions_are_monotonic() {
        use OrderStatus::*;

        for from in [Pending, Processing, Dispatched, Delivered] {
            for to in [Pending, Processing, Dispatched, Delivered] {
                if from.can_transition(to) {
                    assert!(to.rank().unwrap() > from.rank().unwrap());
                }
            }
        }
    }

    #[test]
    fn test_status_round_trip() {
        use OrderStatus::*;

        for status in [Pending, Processing, Dispatched, Delivered, Cancelled] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("shipped"), None);
    }
}
