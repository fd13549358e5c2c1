use crate::models::{Escrow, EscrowStatus};
use crate::repository::EscrowRepository;
use chrono::Utc;
use custodia_core::store::{StoreError, Versioned};
use custodia_core::{CoreError, CoreResult};
use std::sync::Arc;
use uuid::Uuid;

/// Owns escrow state. `release` and `refund` are idempotent: settling
/// an escrow that already sits in the target terminal state is a no-op,
/// so reprocessing a delivery or cancellation event never double-moves
/// funds. Moving a terminal escrow to the other terminal state is fatal.
#[derive(Clone)]
pub struct EscrowManager {
    repo: Arc<dyn EscrowRepository>,
}

impl EscrowManager {
    pub fn new(repo: Arc<dyn EscrowRepository>) -> Self {
        Self { repo }
    }

    /// Administrative hold creation. The Order Coordinator normally
    /// persists the hold inside the order creation unit; this path
    /// exists for the internal escrow surface.
    pub async fn create_hold(&self, order_id: Uuid, amount: i64) -> CoreResult<Escrow> {
        if amount <= 0 {
            return Err(CoreError::Validation(
                "escrow amount must be positive".into(),
            ));
        }
        if self.repo.find_by_order(order_id).await?.is_some() {
            return Err(CoreError::Conflict(format!(
                "an escrow already exists for order {}",
                order_id
            )));
        }
        let escrow = Escrow::hold(order_id, amount);
        self.repo.insert(&escrow).await?;
        Ok(escrow)
    }

    pub async fn release(&self, id: Uuid) -> CoreResult<Escrow> {
        self.settle(id, EscrowStatus::Released).await
    }

    pub async fn refund(&self, id: Uuid) -> CoreResult<Escrow> {
        self.settle(id, EscrowStatus::Refunded).await
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Escrow> {
        Ok(self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("escrow {}", id)))?
            .record)
    }

    pub async fn find_by_order(&self, order_id: Uuid) -> CoreResult<Escrow> {
        Ok(self
            .repo
            .find_by_order(order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("escrow for order {}", order_id)))?
            .record)
    }

    async fn settle(&self, id: Uuid, target: EscrowStatus) -> CoreResult<Escrow> {
        // A lost version check means another settlement landed first;
        // re-reading routes the retry onto the no-op or the illegal
        // path, which is how racing delivery confirmation and dispute
        // resolution get serialized.
        for _ in 0..3 {
            let Versioned { record, version } = self
                .repo
                .get(id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("escrow {}", id)))?;

            if record.status == target {
                return Ok(record);
            }
            if record.status.is_terminal() {
                tracing::error!(
                    escrow_id = %id,
                    from = record.status.as_str(),
                    to = target.as_str(),
                    "illegal escrow transition; consistency alert, manual intervention required"
                );
                return Err(CoreError::IllegalEscrowTransition {
                    from: record.status.as_str(),
                    to: target.as_str(),
                });
            }

            let now = Utc::now();
            match self.repo.settle(id, target, now, version).await {
                Ok(()) => {
                    return Ok(Escrow {
                        status: target,
                        release_date: Some(now),
                        ..record
                    })
                }
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(CoreError::Conflict(format!(
            "escrow {} settlement kept losing version checks",
            id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeEscrowRepo {
        rows: Mutex<HashMap<Uuid, (Escrow, u64)>>,
    }

    #[async_trait]
    impl EscrowRepository for FakeEscrowRepo {
        async fn insert(&self, escrow: &Escrow) -> Result<(), StoreError> {
            self.rows
                .lock()
                .unwrap()
                .insert(escrow.id, (escrow.clone(), 1));
            Ok(())
        }

        async fn get(&self, id: Uuid) -> Result<Option<Versioned<Escrow>>, StoreError> {
            Ok(self.rows.lock().unwrap().get(&id).map(|(e, v)| Versioned {
                record: e.clone(),
                version: *v,
            }))
        }

        async fn find_by_order(
            &self,
            order_id: Uuid,
        ) -> Result<Option<Versioned<Escrow>>, StoreError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
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
            let mut rows = self.rows.lock().unwrap();
            let (escrow, version) = rows
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

    fn manager() -> EscrowManager {
        EscrowManager::new(Arc::new(FakeEscrowRepo::default()))
    }

    #[tokio::test]
    async fn test_hold_then_release() {
        let manager = manager();
        let escrow = manager.create_hold(Uuid::new_v4(), 500_000).await.unwrap();
        assert_eq!(escrow.status, EscrowStatus::Held);

        let released = manager.release(escrow.id).await.unwrap();
        assert_eq!(released.status, EscrowStatus::Released);
        assert!(released.release_date.is_some());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let manager = manager();
        let escrow = manager.create_hold(Uuid::new_v4(), 500_000).await.unwrap();

        manager.release(escrow.id).await.unwrap();
        let again = manager.release(escrow.id).await.unwrap();
        assert_eq!(again.status, EscrowStatus::Released);
    }

    #[tokio::test]
    async fn test_cross_terminal_transition_is_illegal() {
        let manager = manager();
        let escrow = manager.create_hold(Uuid::new_v4(), 500_000).await.unwrap();

        manager.release(escrow.id).await.unwrap();
        let err = manager.refund(escrow.id).await.unwrap_err();
        assert!(matches!(err, CoreError::IllegalEscrowTransition { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_duplicate_hold_for_order_conflicts() {
        let manager = manager();
        let order_id = Uuid::new_v4();
        manager.create_hold(order_id, 500_000).await.unwrap();

        let err = manager.create_hold(order_id, 500_000).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_find_by_order_not_found() {
        let manager = manager();
        let err = manager.find_by_order(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
