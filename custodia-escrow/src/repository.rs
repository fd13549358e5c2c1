use crate::models::{Escrow, EscrowStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custodia_core::store::{StoreError, Versioned};
use uuid::Uuid;

/// Ledger Store access for escrow records.
#[async_trait]
pub trait EscrowRepository: Send + Sync {
    async fn insert(&self, escrow: &Escrow) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Versioned<Escrow>>, StoreError>;

    async fn find_by_order(&self, order_id: Uuid)
        -> Result<Option<Versioned<Escrow>>, StoreError>;

    /// Compare-and-set the status against `expected_version`. Stale
    /// versions fail with `VersionConflict` so concurrent settlements
    /// serialize per escrow.
    async fn settle(
        &self,
        id: Uuid,
        status: EscrowStatus,
        release_date: DateTime<Utc>,
        expected_version: u64,
    ) -> Result<(), StoreError>;
}
