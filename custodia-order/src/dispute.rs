use crate::models::{Order, OrderStatus, TransactionStatus};
use crate::repository::{DisputeRepository, OrderRepository, TransactionRepository};
use chrono::{DateTime, Utc};
use custodia_catalog::InventoryGateway;
use custodia_core::identity::Actor;
use custodia_core::policy::{self, Action, Stakeholders};
use custodia_core::store::{StoreError, Versioned};
use custodia_core::{CoreError, CoreResult};
use custodia_escrow::{EscrowManager, EscrowStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Dispute status. pending → in_review → resolved, or pending →
/// resolved directly; resolved → closed is the only exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Pending,
    InReview,
    Resolved,
    Closed,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Pending => "pending",
            DisputeStatus::InReview => "in_review",
            DisputeStatus::Resolved => "resolved",
            DisputeStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<DisputeStatus> {
        match value {
            "pending" => Some(DisputeStatus::Pending),
            "in_review" => Some(DisputeStatus::InReview),
            "resolved" => Some(DisputeStatus::Resolved),
            "closed" => Some(DisputeStatus::Closed),
            _ => None,
        }
    }

    pub fn can_transition(&self, to: DisputeStatus) -> bool {
        matches!(
            (self, to),
            (DisputeStatus::Pending, DisputeStatus::InReview)
                | (DisputeStatus::Pending, DisputeStatus::Resolved)
                | (DisputeStatus::InReview, DisputeStatus::Resolved)
                | (DisputeStatus::Resolved, DisputeStatus::Closed)
        )
    }
}

/// How an arbitrator settles a dispute. `Split` carries the fraction of
/// the escrowed amount owed back to the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    Release,
    Refund,
    Split { refund_ratio: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: Uuid,
    pub order_id: Uuid,
    pub raised_by: Uuid,
    pub reason: String,
    pub status: DisputeStatus,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dispute {
    pub fn open(order_id: Uuid, raised_by: Uuid, reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id,
            raised_by,
            reason: reason.into(),
            status: DisputeStatus::Pending,
            resolution: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Intercepts an in-flight order/escrow pair and produces a terminal
/// resolution, forcing the order transition that keeps the escrow and
/// order invariants aligned.
pub struct DisputeResolver {
    disputes: Arc<dyn DisputeRepository>,
    orders: Arc<dyn OrderRepository>,
    transactions: Arc<dyn TransactionRepository>,
    escrows: EscrowManager,
    inventory: Arc<dyn InventoryGateway>,
}

impl DisputeResolver {
    pub fn new(
        disputes: Arc<dyn DisputeRepository>,
        orders: Arc<dyn OrderRepository>,
        transactions: Arc<dyn TransactionRepository>,
        escrows: EscrowManager,
        inventory: Arc<dyn InventoryGateway>,
    ) -> Self {
        Self {
            disputes,
            orders,
            transactions,
            escrows,
            inventory,
        }
    }

    /// Opens a dispute. Only a stakeholder of the order may raise one,
    /// only while the escrow is still held, and only one open dispute
    /// may exist per order.
    pub async fn open(
        &self,
        order_id: Uuid,
        reason: impl Into<String>,
        actor: Actor,
    ) -> CoreResult<Dispute> {
        let order = self.load_order(order_id).await?.record;
        let parties = Stakeholders::of(order.buyer_id, order.seller_id);
        if !policy::can(actor.role, actor.id, Action::OpenDispute, &parties) {
            return Err(CoreError::Forbidden(
                "only the buyer or seller of the order can raise a dispute".into(),
            ));
        }

        let escrow = self.escrows.find_by_order(order_id).await?;
        if escrow.status != EscrowStatus::Held {
            return Err(CoreError::Conflict(format!(
                "escrow for order {} is already {}; settled transactions cannot be disputed",
                order_id,
                escrow.status.as_str()
            )));
        }
        if self.disputes.find_open_by_order(order_id).await?.is_some() {
            return Err(CoreError::Conflict(format!(
                "an open dispute already exists for order {}",
                order_id
            )));
        }

        let dispute = Dispute::open(order_id, actor.id, reason);
        self.disputes.insert(&dispute).await?;

        if let Err(err) = self
            .transactions
            .mirror_status(order_id, TransactionStatus::Disputed, None)
            .await
        {
            tracing::warn!(order_id = %order_id, error = %err, "transaction mirror update failed");
        }

        tracing::info!(dispute_id = %dispute.id, order_id = %order_id, "dispute opened");
        Ok(dispute)
    }

    /// Moves a pending dispute into review. Arbitration capability only.
    pub async fn begin_review(&self, dispute_id: Uuid, actor: Actor) -> CoreResult<Dispute> {
        self.require_arbitration(actor, Action::ReviewDispute)?;
        let Versioned { record, version } = self.load_dispute(dispute_id).await?;

        if !record.status.can_transition(DisputeStatus::InReview) {
            return Err(CoreError::InvalidTransition {
                from: record.status.as_str(),
                to: DisputeStatus::InReview.as_str(),
            });
        }

        self.disputes
            .update(dispute_id, DisputeStatus::InReview, None, version)
            .await?;
        Ok(Dispute {
            status: DisputeStatus::InReview,
            updated_at: Utc::now(),
            ..record
        })
    }

    /// Settles the dispute and, through it, the escrow and the order.
    /// Release pays the seller and forces the order to delivered;
    /// refund pays the buyer back and forces cancellation. Split
    /// records both shares in the resolution and releases the escrow;
    /// actual partial disbursement has no escrow primitive yet and is
    /// handled out of band from the recorded amounts.
    pub async fn resolve(
        &self,
        dispute_id: Uuid,
        outcome: DisputeOutcome,
        actor: Actor,
    ) -> CoreResult<Dispute> {
        self.require_arbitration(actor, Action::ResolveDispute)?;
        let Versioned { record, version } = self.load_dispute(dispute_id).await?;

        if !record.status.can_transition(DisputeStatus::Resolved) {
            return Err(CoreError::InvalidTransition {
                from: record.status.as_str(),
                to: DisputeStatus::Resolved.as_str(),
            });
        }

        let order = self.load_order(record.order_id).await?.record;

        let (resolution, mirror) = match outcome {
            DisputeOutcome::Release => {
                self.escrows.release(order.escrow_id).await?;
                self.force_order_status(&order, OrderStatus::Delivered)
                    .await?;
                (
                    format!("released {} to seller", order.amount),
                    TransactionStatus::Completed,
                )
            }
            DisputeOutcome::Refund => {
                self.escrows.refund(order.escrow_id).await?;
                // Goods never moved if the order was still pending.
                if order.status == OrderStatus::Pending {
                    self.inventory
                        .release(order.product_id, order.quantity)
                        .await?;
                }
                self.force_order_status(&order, OrderStatus::Cancelled)
                    .await?;
                (
                    format!("refunded {} to buyer", order.amount),
                    TransactionStatus::Cancelled,
                )
            }
            DisputeOutcome::Split { refund_ratio } => {
                if !(0.0..=1.0).contains(&refund_ratio) || !refund_ratio.is_finite() {
                    return Err(CoreError::Validation(
                        "refund_ratio must be between 0 and 1".into(),
                    ));
                }
                let buyer_share = (order.amount as f64 * refund_ratio).round() as i64;
                let seller_share = order.amount - buyer_share;
                self.escrows.release(order.escrow_id).await?;
                self.force_order_status(&order, OrderStatus::Delivered)
                    .await?;
                (
                    format!(
                        "split: {} to buyer, {} to seller",
                        buyer_share, seller_share
                    ),
                    TransactionStatus::Completed,
                )
            }
        };

        self.disputes
            .update(
                dispute_id,
                DisputeStatus::Resolved,
                Some(resolution.clone()),
                version,
            )
            .await?;

        if let Err(err) = self
            .transactions
            .mirror_status(order.id, mirror, None)
            .await
        {
            tracing::warn!(order_id = %order.id, error = %err, "transaction mirror update failed");
        }

        tracing::info!(dispute_id = %dispute_id, order_id = %order.id, resolution, "dispute resolved");
        Ok(Dispute {
            status: DisputeStatus::Resolved,
            resolution: Some(resolution),
            updated_at: Utc::now(),
            ..record
        })
    }

    /// The only path to `closed`. Idempotent: closing a closed dispute
    /// is a no-op.
    pub async fn close(&self, dispute_id: Uuid, actor: Actor) -> CoreResult<Dispute> {
        self.require_arbitration(actor, Action::CloseDispute)?;
        let Versioned { record, version } = self.load_dispute(dispute_id).await?;

        if record.status == DisputeStatus::Closed {
            return Ok(record);
        }
        if !record.status.can_transition(DisputeStatus::Closed) {
            return Err(CoreError::InvalidTransition {
                from: record.status.as_str(),
                to: DisputeStatus::Closed.as_str(),
            });
        }

        self.disputes
            .update(
                dispute_id,
                DisputeStatus::Closed,
                record.resolution.clone(),
                version,
            )
            .await?;
        Ok(Dispute {
            status: DisputeStatus::Closed,
            updated_at: Utc::now(),
            ..record
        })
    }

    pub async fn get(&self, dispute_id: Uuid, actor: Actor) -> CoreResult<Dispute> {
        let dispute = self.load_dispute(dispute_id).await?.record;
        let order = self.load_order(dispute.order_id).await?.record;
        let parties = Stakeholders::of(order.buyer_id, order.seller_id);
        if !policy::can(actor.role, actor.id, Action::ReadOrder, &parties) {
            return Err(CoreError::Forbidden(
                "not a stakeholder of this dispute".into(),
            ));
        }
        Ok(dispute)
    }

    pub async fn list_by_order(&self, order_id: Uuid, actor: Actor) -> CoreResult<Vec<Dispute>> {
        let order = self.load_order(order_id).await?.record;
        let parties = Stakeholders::of(order.buyer_id, order.seller_id);
        if !policy::can(actor.role, actor.id, Action::ReadOrder, &parties) {
            return Err(CoreError::Forbidden(
                "not a stakeholder of this order".into(),
            ));
        }
        Ok(self.disputes.list_by_order(order_id).await?)
    }

    fn require_arbitration(&self, actor: Actor, action: Action) -> CoreResult<()> {
        if !policy::can(actor.role, actor.id, action, &Stakeholders::default()) {
            return Err(CoreError::Forbidden(
                "arbitration capability required".into(),
            ));
        }
        Ok(())
    }

    async fn load_dispute(&self, id: Uuid) -> CoreResult<Versioned<Dispute>> {
        self.disputes
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("dispute {}", id)))
    }

    async fn load_order(&self, id: Uuid) -> CoreResult<Versioned<Order>> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", id)))
    }

    /// Dispute resolutions move the order outside the normal seller
    /// path, so this bypasses the transition table but still respects
    /// the version stamp. A concurrent writer that landed the same
    /// status resolves as success.
    async fn force_order_status(&self, order: &Order, target: OrderStatus) -> CoreResult<()> {
        for _ in 0..3 {
            let current = self.load_order(order.id).await?;
            if current.record.status == target {
                return Ok(());
            }
            match self
                .orders
                .update_status(
                    order.id,
                    target,
                    current.record.tracking_number.clone(),
                    current.version,
                )
                .await
            {
                Ok(()) => return Ok(()),
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(CoreError::Conflict(format!(
            "order {} kept losing version checks during dispute resolution",
            order.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispute_transitions() {
        use DisputeStatus::*;

        assert!(Pending.can_transition(InReview));
        assert!(Pending.can_transition(Resolved));
        assert!(InReview.can_transition(Resolved));
        assert!(Resolved.can_transition(Closed));

        assert!(!Pending.can_transition(Closed));
        assert!(!InReview.can_transition(Closed));
        assert!(!InReview.can_transition(Pending));
        assert!(!Resolved.can_transition(InReview));
        assert!(!Closed.can_transition(Resolved));
    }

    #[test]
    fn test_status_round_trip() {
        use DisputeStatus::*;

        for status in [Pending, InReview, Resolved, Closed] {
            assert_eq!(DisputeStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DisputeStatus::parse("escalated"), None);
    }
}
