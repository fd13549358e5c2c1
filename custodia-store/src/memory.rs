use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custodia_core::identity::Role;
use custodia_core::store::{StoreError, Versioned};
use custodia_escrow::{Escrow, EscrowRepository, EscrowStatus};
use custodia_order::dispute::{Dispute, DisputeStatus};
use custodia_order::models::{Order, OrderStatus, TransactionRecord, TransactionStatus};
use custodia_order::repository::{DisputeRepository, OrderRepository, TransactionRepository};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory Ledger Store. Every record carries a version stamp bumped
/// on each write; conditional writes compare it and fail with
/// `VersionConflict` when stale. `create_order_unit` takes all the map
/// locks it touches, in a fixed order, so the order/escrow/transaction
/// trio lands atomically.
#[derive(Default)]
pub struct MemoryLedger {
    orders: RwLock<HashMap<Uuid, (Order, u64)>>,
    escrows: RwLock<HashMap<Uuid, (Escrow, u64)>>,
    disputes: RwLock<HashMap<Uuid, (Dispute, u64)>>,
    transactions: RwLock<HashMap<Uuid, TransactionRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl OrderRepository for MemoryLedger {
    async fn create_order_unit(
        &self,
        order: &Order,
        escrow: &Escrow,
        record: &TransactionRecord,
    ) -> Result<(), StoreError> {
        // Lock order: orders, escrows, transactions.
        let mut orders = self.orders.write().await;
        let mut escrows = self.escrows.write().await;
        let mut transactions = self.transactions.write().await;

        if orders.contains_key(&order.id) {
            return Err(StoreError::VersionConflict {
                entity: "order",
                id: order.id,
            });
        }

        orders.insert(order.id, (order.clone(), 1));
        escrows.insert(escrow.id, (escrow.clone(), 1));
        transactions.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Versioned<Order>>, StoreError> {
        Ok(self.orders.read().await.get(&id).map(|(o, v)| Versioned {
            record: o.clone(),
            version: *v,
        }))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        tracking_number: Option<String>,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        let (order, version) = orders
            .get_mut(&id)
            .ok_or(StoreError::VersionConflict { entity: "order", id })?;
        if *version != expected_version {
            return Err(StoreError::VersionConflict { entity: "order", id });
        }
        order.status = status;
        order.tracking_number = tracking_number;
        order.updated_at = Utc::now();
        *version += 1;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        Ok(sorted_by_creation(
            self.orders.read().await.values().map(|(o, _)| o.clone()),
        ))
    }

    async fn list_by_buyer(&self, buyer_id: Uuid) -> Result<Vec<Order>, StoreError> {
        Ok(sorted_by_creation(
            self.orders
                .read()
                .await
                .values()
                .filter(|(o, _)| o.buyer_id == buyer_id)
                .map(|(o, _)| o.clone()),
        ))
    }

    async fn list_by_seller(&self, seller_id: Uuid) -> Result<Vec<Order>, StoreError> {
        Ok(sorted_by_creation(
            self.orders
                .read()
                .await
                .values()
                .filter(|(o, _)| o.seller_id == seller_id)
                .map(|(o, _)| o.clone()),
        ))
    }
}

#[async_trait]
impl EscrowRepository for MemoryLedger {
    async fn insert(&self, escrow: &Escrow) -> Result<(), StoreError> {
        self.escrows
            .write()
            .await
            .insert(escrow.id, (escrow.clone(), 1));
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Versioned<Escrow>>, StoreError> {
        Ok(self.escrows.read().await.get(&id).map(|(e, v)| Versioned {
            record: e.clone(),
            version: *v,
        }))
    }

    async fn find_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Versioned<Escrow>>, StoreError> {
        Ok(self
            .escrows
            .read()
            .await
            .values()
            .find(|(e, _)| e.order_id == order_id)
            .map(|(e, v)| Versioned {
                record: e.clone(),
                version: *v,
            }))
    }

    async fn settle(
        &self,
        id: Uuid,
        status: EscrowStatus,
        release_date: DateTime<Utc>,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut escrows = self.escrows.write().await;
        let (escrow, version) = escrows
            .get_mut(&id)
            .ok_or(StoreError::VersionConflict { entity: "escrow", id })?;
        if *version != expected_version {
            return Err(StoreError::VersionConflict { entity: "escrow", id });
        }
        escrow.status = status;
        escrow.release_date = Some(release_date);
        *version += 1;
        Ok(())
    }
}

#[async_trait]
impl DisputeRepository for MemoryLedger {
    async fn insert(&self, dispute: &Dispute) -> Result<(), StoreError> {
        self.disputes
            .write()
            .await
            .insert(dispute.id, (dispute.clone(), 1));
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Versioned<Dispute>>, StoreError> {
        Ok(self.disputes.read().await.get(&id).map(|(d, v)| Versioned {
            record: d.clone(),
            version: *v,
        }))
    }

    async fn find_open_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Versioned<Dispute>>, StoreError> {
        Ok(self
            .disputes
            .read()
            .await
            .values()
            .find(|(d, _)| d.order_id == order_id && d.status != DisputeStatus::Closed)
            .map(|(d, v)| Versioned {
                record: d.clone(),
                version: *v,
            }))
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Dispute>, StoreError> {
        let mut disputes: Vec<Dispute> = self
            .disputes
            .read()
            .await
            .values()
            .filter(|(d, _)| d.order_id == order_id)
            .map(|(d, _)| d.clone())
            .collect();
        disputes.sort_by_key(|d| d.created_at);
        Ok(disputes)
    }

    async fn update(
        &self,
        id: Uuid,
        status: DisputeStatus,
        resolution: Option<String>,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut disputes = self.disputes.write().await;
        let (dispute, version) = disputes
            .get_mut(&id)
            .ok_or(StoreError::VersionConflict { entity: "dispute", id })?;
        if *version != expected_version {
            return Err(StoreError::VersionConflict { entity: "dispute", id });
        }
        dispute.status = status;
        dispute.resolution = resolution;
        dispute.updated_at = Utc::now();
        *version += 1;
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for MemoryLedger {
    async fn mirror_status(
        &self,
        order_id: Uuid,
        status: TransactionStatus,
        tracking_number: Option<String>,
    ) -> Result<(), StoreError> {
        let mut transactions = self.transactions.write().await;
        if let Some(record) = transactions.values_mut().find(|t| t.order_id == order_id) {
            record.status = status;
            if tracking_number.is_some() {
                record.tracking_number = tracking_number;
            }
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self
            .transactions
            .read()
            .await
            .values()
            .find(|t| t.order_id == order_id)
            .cloned())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        side: Role,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut records: Vec<TransactionRecord> = self
            .transactions
            .read()
            .await
            .values()
            .filter(|t| match side {
                Role::Seller => t.seller_id == user_id,
                _ => t.buyer_id == user_id,
            })
            .cloned()
            .collect();
        records.sort_by_key(|t| t.created_at);
        Ok(records)
    }
}

fn sorted_by_creation(orders: impl Iterator<Item = Order>) -> Vec<Order> {
    let mut orders: Vec<Order> = orders.collect();
    orders.sort_by_key(|o| o.created_at);
    orders
}
