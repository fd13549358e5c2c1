use crate::dispute::{Dispute, DisputeStatus};
use crate::models::{Order, OrderStatus, TransactionRecord, TransactionStatus};
use async_trait::async_trait;
use custodia_core::identity::Role;
use custodia_core::store::{StoreError, Versioned};
use custodia_escrow::Escrow;
use uuid::Uuid;

/// Ledger Store access for orders. Creation persists the order, its
/// escrow hold, and the reporting mirror as one atomic unit; status
/// writes are version-checked.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order_unit(
        &self,
        order: &Order,
        escrow: &Escrow,
        record: &TransactionRecord,
    ) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Versioned<Order>>, StoreError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        tracking_number: Option<String>,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    async fn list_all(&self) -> Result<Vec<Order>, StoreError>;

    async fn list_by_buyer(&self, buyer_id: Uuid) -> Result<Vec<Order>, StoreError>;

    async fn list_by_seller(&self, seller_id: Uuid) -> Result<Vec<Order>, StoreError>;
}

/// Ledger Store access for the reporting mirror. Non-authoritative, so
/// writes carry no version check.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn mirror_status(
        &self,
        order_id: Uuid,
        status: TransactionStatus,
        tracking_number: Option<String>,
    ) -> Result<(), StoreError>;

    async fn find_by_order(&self, order_id: Uuid)
        -> Result<Option<TransactionRecord>, StoreError>;

    /// Buyers list their purchases, sellers their sales.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        side: Role,
    ) -> Result<Vec<TransactionRecord>, StoreError>;
}

/// Ledger Store access for disputes.
#[async_trait]
pub trait DisputeRepository: Send + Sync {
    async fn insert(&self, dispute: &Dispute) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Versioned<Dispute>>, StoreError>;

    /// The open dispute (any non-closed status) for an order, if one exists.
    async fn find_open_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Versioned<Dispute>>, StoreError>;

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Dispute>, StoreError>;

    async fn update(
        &self,
        id: Uuid,
        status: DisputeStatus,
        resolution: Option<String>,
        expected_version: u64,
    ) -> Result<(), StoreError>;
}
