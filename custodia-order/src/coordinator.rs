use crate::models::{Order, OrderStatus, TransactionRecord, TransactionStatus};
use crate::repository::{OrderRepository, TransactionRepository};
use custodia_catalog::InventoryGateway;
use custodia_core::identity::Actor;
use custodia_core::policy::{self, Action, Stakeholders};
use custodia_core::store::{StoreError, Versioned};
use custodia_core::{CoreError, CoreResult};
use custodia_escrow::{Escrow, EscrowManager};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub buyer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
}

/// Drives the Order lifecycle, coordinating the Inventory Gateway and
/// the Escrow Manager. Cross-entity writes either go through one store
/// unit or run as a saga with a compensating stock release.
pub struct OrderCoordinator {
    inventory: Arc<dyn InventoryGateway>,
    escrows: EscrowManager,
    orders: Arc<dyn OrderRepository>,
    transactions: Arc<dyn TransactionRepository>,
}

impl OrderCoordinator {
    pub fn new(
        inventory: Arc<dyn InventoryGateway>,
        escrows: EscrowManager,
        orders: Arc<dyn OrderRepository>,
        transactions: Arc<dyn TransactionRepository>,
    ) -> Self {
        Self {
            inventory,
            escrows,
            orders,
            transactions,
        }
    }

    /// Creates an order: stock reservation, escrow hold, order record,
    /// and transaction mirror as a single logical operation. A failure
    /// after the reservation rolls the stock back before the error
    /// surfaces; no partial state is left behind.
    pub async fn create_order(&self, actor: Actor, request: CreateOrder) -> CoreResult<Order> {
        let claim = Stakeholders {
            buyer_id: Some(request.buyer_id),
            seller_id: None,
        };
        if !policy::can(actor.role, actor.id, Action::CreateOrder, &claim) {
            return Err(CoreError::Forbidden(
                "only the buyer can create an order".into(),
            ));
        }
        if request.quantity == 0 {
            return Err(CoreError::Validation("quantity must be positive".into()));
        }

        let product = self.inventory.get_product(request.product_id).await?;

        // Unit price x quantity, computed exactly once here.
        let amount = product
            .price
            .checked_mul(i64::from(request.quantity))
            .ok_or_else(|| CoreError::Validation("order amount overflows".into()))?;

        self.inventory
            .reserve(request.product_id, request.quantity)
            .await?;

        let order_id = Uuid::new_v4();
        let escrow = Escrow::hold(order_id, amount);
        let order = Order::new(
            order_id,
            request.product_id,
            request.buyer_id,
            product.seller_id,
            request.quantity,
            amount,
            escrow.id,
        );
        let record = TransactionRecord::mirror(&order);

        match self.orders.create_order_unit(&order, &escrow, &record).await {
            Ok(()) => {
                tracing::info!(order_id = %order.id, escrow_id = %escrow.id, amount, "order created");
                Ok(order)
            }
            Err(err) => {
                // Compensate the reservation so stock never leaks.
                if let Err(release_err) = self
                    .inventory
                    .release(request.product_id, request.quantity)
                    .await
                {
                    tracing::error!(
                        product_id = %request.product_id,
                        quantity = request.quantity,
                        error = %release_err,
                        "stock compensation failed after order persistence error"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Advances an order through the delivery state machine. Escrow and
    /// inventory side effects run first; the order status write is the
    /// final step and acts as the commit marker. Because the side
    /// effects are idempotent for a fixed target, a failed order write
    /// is retried rather than compensated.
    pub async fn advance_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        tracking_number: Option<String>,
        actor: Actor,
    ) -> CoreResult<Order> {
        let Versioned {
            record: order,
            version,
        } = self.load(order_id).await?;

        let parties = Stakeholders::of(order.buyer_id, order.seller_id);
        let action = if target == OrderStatus::Cancelled {
            Action::CancelOrder
        } else {
            Action::AdvanceOrder
        };
        if !policy::can(actor.role, actor.id, action, &parties) {
            return Err(CoreError::Forbidden(
                "only the seller can update order status".into(),
            ));
        }

        // Redelivery of the same transition event is a no-op.
        if order.status == target {
            return Ok(order);
        }
        if !order.status.can_transition(target) {
            return Err(CoreError::InvalidTransition {
                from: order.status.as_str(),
                to: target.as_str(),
            });
        }
        if tracking_number.is_some() && target.rank() < OrderStatus::Dispatched.rank() {
            return Err(CoreError::Validation(
                "tracking number is only set once the order is dispatched".into(),
            ));
        }

        match target {
            OrderStatus::Delivered => {
                self.escrows.release(order.escrow_id).await?;
            }
            OrderStatus::Cancelled => {
                self.escrows.refund(order.escrow_id).await?;
                self.inventory
                    .release(order.product_id, order.quantity)
                    .await?;
            }
            _ => {}
        }

        let tracking = tracking_number.or_else(|| order.tracking_number.clone());
        let updated = self
            .commit_status(&order, target, tracking.clone(), version)
            .await?;

        // Mirrored on every status change; still pending mid-delivery.
        let mirror = match target {
            OrderStatus::Delivered => TransactionStatus::Completed,
            OrderStatus::Cancelled => TransactionStatus::Cancelled,
            _ => TransactionStatus::Pending,
        };
        self.mirror_transaction(order.id, mirror, tracking).await;

        Ok(updated)
    }

    pub async fn get_order(&self, order_id: Uuid, actor: Actor) -> CoreResult<Order> {
        let order = self.load(order_id).await?.record;
        let parties = Stakeholders::of(order.buyer_id, order.seller_id);
        if !policy::can(actor.role, actor.id, Action::ReadOrder, &parties) {
            return Err(CoreError::Forbidden(
                "not a stakeholder of this order".into(),
            ));
        }
        Ok(order)
    }

    pub async fn list_by_buyer(&self, actor: Actor) -> CoreResult<Vec<Order>> {
        Ok(self.orders.list_by_buyer(actor.id).await?)
    }

    pub async fn list_by_seller(&self, actor: Actor) -> CoreResult<Vec<Order>> {
        Ok(self.orders.list_by_seller(actor.id).await?)
    }

    pub async fn list_all(&self, actor: Actor) -> CoreResult<Vec<Order>> {
        if !policy::can(
            actor.role,
            actor.id,
            Action::ListAllOrders,
            &Stakeholders::default(),
        ) {
            return Err(CoreError::Forbidden("admin access required".into()));
        }
        Ok(self.orders.list_all().await?)
    }

    async fn load(&self, order_id: Uuid) -> CoreResult<Versioned<Order>> {
        self.orders
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))
    }

    /// Version-checked order write with retry on transient store
    /// failure. A lost version check against a writer that applied the
    /// same target resolves as success; anything else is a conflict for
    /// the caller to retry.
    async fn commit_status(
        &self,
        order: &Order,
        target: OrderStatus,
        tracking: Option<String>,
        version: u64,
    ) -> CoreResult<Order> {
        let mut attempts = 0;
        loop {
            match self
                .orders
                .update_status(order.id, target, tracking.clone(), version)
                .await
            {
                Ok(()) => {
                    return Ok(Order {
                        status: target,
                        tracking_number: tracking,
                        updated_at: chrono::Utc::now(),
                        ..order.clone()
                    })
                }
                Err(StoreError::VersionConflict { .. }) => {
                    let current = self.load(order.id).await?;
                    if current.record.status == target {
                        return Ok(current.record);
                    }
                    return Err(CoreError::Conflict(format!(
                        "order {} was updated concurrently",
                        order.id
                    )));
                }
                Err(StoreError::Unavailable(msg)) if attempts < 2 => {
                    attempts += 1;
                    tracing::warn!(
                        order_id = %order.id,
                        target = target.as_str(),
                        attempt = attempts,
                        error = %msg,
                        "order commit write failed, retrying"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// The mirror is reporting-only; failures are logged, never fatal.
    async fn mirror_transaction(
        &self,
        order_id: Uuid,
        status: TransactionStatus,
        tracking: Option<String>,
    ) {
        if let Err(err) = self
            .transactions
            .mirror_status(order_id, status, tracking)
            .await
        {
            tracing::warn!(order_id = %order_id, error = %err, "transaction mirror update failed");
        }
    }
}
