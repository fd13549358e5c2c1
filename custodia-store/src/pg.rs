use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custodia_catalog::{InventoryGateway, Product};
use custodia_core::identity::Role;
use custodia_core::store::{StoreError, Versioned};
use custodia_core::{CoreError, CoreResult};
use custodia_escrow::{Escrow, EscrowRepository, EscrowStatus};
use custodia_order::dispute::{Dispute, DisputeStatus};
use custodia_order::models::{Order, OrderStatus, TransactionRecord, TransactionStatus};
use custodia_order::repository::{DisputeRepository, OrderRepository, TransactionRepository};
use sqlx::PgPool;
use uuid::Uuid;

/// Postgres Ledger Store. Cross-entity creation uses a database
/// transaction; status writes are optimistic (`WHERE version = $n`).
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

// Row structs for type-safe querying.

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    product_id: Uuid,
    buyer_id: Uuid,
    seller_id: Uuid,
    quantity: i32,
    amount: i64,
    escrow_id: Uuid,
    status: String,
    tracking_number: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_versioned(self) -> Result<Versioned<Order>, StoreError> {
        let status = OrderStatus::parse(&self.status).ok_or_else(|| StoreError::Corrupt {
            entity: "order",
            id: self.id,
            detail: format!("unknown status {}", self.status),
        })?;
        Ok(Versioned {
            record: Order {
                id: self.id,
                product_id: self.product_id,
                buyer_id: self.buyer_id,
                seller_id: self.seller_id,
                quantity: self.quantity as u32,
                amount: self.amount,
                escrow_id: self.escrow_id,
                status,
                tracking_number: self.tracking_number,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            version: self.version as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EscrowRow {
    id: Uuid,
    order_id: Uuid,
    amount: i64,
    status: String,
    hold_date: DateTime<Utc>,
    release_date: Option<DateTime<Utc>>,
    version: i64,
}

impl EscrowRow {
    fn into_versioned(self) -> Result<Versioned<Escrow>, StoreError> {
        let status = EscrowStatus::parse(&self.status).ok_or_else(|| StoreError::Corrupt {
            entity: "escrow",
            id: self.id,
            detail: format!("unknown status {}", self.status),
        })?;
        Ok(Versioned {
            record: Escrow {
                id: self.id,
                order_id: self.order_id,
                amount: self.amount,
                status,
                hold_date: self.hold_date,
                release_date: self.release_date,
            },
            version: self.version as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DisputeRow {
    id: Uuid,
    order_id: Uuid,
    raised_by: Uuid,
    reason: String,
    status: String,
    resolution: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DisputeRow {
    fn into_versioned(self) -> Result<Versioned<Dispute>, StoreError> {
        let status = DisputeStatus::parse(&self.status).ok_or_else(|| StoreError::Corrupt {
            entity: "dispute",
            id: self.id,
            detail: format!("unknown status {}", self.status),
        })?;
        Ok(Versioned {
            record: Dispute {
                id: self.id,
                order_id: self.order_id,
                raised_by: self.raised_by,
                reason: self.reason,
                status,
                resolution: self.resolution,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            version: self.version as u64,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    order_id: Uuid,
    buyer_id: Uuid,
    seller_id: Uuid,
    product_id: Uuid,
    escrow_id: Uuid,
    amount: i64,
    status: String,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TransactionRow {
    fn into_record(self) -> Result<TransactionRecord, StoreError> {
        let status = TransactionStatus::parse(&self.status).ok_or_else(|| StoreError::Corrupt {
            entity: "transaction",
            id: self.id,
            detail: format!("unknown status {}", self.status),
        })?;
        Ok(TransactionRecord {
            id: self.id,
            order_id: self.order_id,
            buyer_id: self.buyer_id,
            seller_id: self.seller_id,
            product_id: self.product_id,
            escrow_id: self.escrow_id,
            amount: self.amount,
            status,
            tracking_number: self.tracking_number,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    seller_id: Uuid,
    name: String,
    description: Option<String>,
    price: i64,
    stock: i32,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            seller_id: row.seller_id,
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock.max(0) as u32,
            created_at: row.created_at,
        }
    }
}

const SELECT_ORDER: &str = "SELECT id, product_id, buyer_id, seller_id, quantity, amount, \
     escrow_id, status, tracking_number, version, created_at, updated_at FROM orders";

const SELECT_ESCROW: &str =
    "SELECT id, order_id, amount, status, hold_date, release_date, version FROM escrows";

const SELECT_DISPUTE: &str = "SELECT id, order_id, raised_by, reason, status, resolution, \
     version, created_at, updated_at FROM disputes";

const SELECT_TRANSACTION: &str = "SELECT id, order_id, buyer_id, seller_id, product_id, \
     escrow_id, amount, status, tracking_number, created_at, updated_at FROM transactions";

const SELECT_PRODUCT: &str =
    "SELECT id, seller_id, name, description, price, stock, created_at FROM products";

#[async_trait]
impl InventoryGateway for PgLedger {
    async fn get_product(&self, product_id: Uuid) -> CoreResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{} WHERE id = $1", SELECT_PRODUCT))
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))?;
        row.map(Product::from)
            .ok_or_else(|| CoreError::NotFound(format!("product {}", product_id)))
    }

    /// One-statement conditional decrement, so the stock check and the
    /// reservation cannot race.
    async fn reserve(&self, product_id: Uuid, quantity: u32) -> CoreResult<()> {
        let result = sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
            .bind(product_id)
            .bind(quantity as i32)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))?;

        if result.rows_affected() == 0 {
            let product = self.get_product(product_id).await?;
            return Err(CoreError::InsufficientStock {
                requested: quantity,
                available: product.stock,
            });
        }
        Ok(())
    }

    async fn release(&self, product_id: Uuid, quantity: u32) -> CoreResult<()> {
        let result = sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
            .bind(product_id)
            .bind(quantity as i32)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::StoreUnavailable(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("product {}", product_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgLedger {
    async fn create_order_unit(
        &self,
        order: &Order,
        escrow: &Escrow,
        record: &TransactionRecord,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        sqlx::query(
            "INSERT INTO orders (id, product_id, buyer_id, seller_id, quantity, amount, \
             escrow_id, status, tracking_number, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 1, $10, $11)",
        )
        .bind(order.id)
        .bind(order.product_id)
        .bind(order.buyer_id)
        .bind(order.seller_id)
        .bind(order.quantity as i32)
        .bind(order.amount)
        .bind(order.escrow_id)
        .bind(order.status.as_str())
        .bind(order.tracking_number.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        sqlx::query(
            "INSERT INTO escrows (id, order_id, amount, status, hold_date, release_date, version) \
             VALUES ($1, $2, $3, $4, $5, $6, 1)",
        )
        .bind(escrow.id)
        .bind(escrow.order_id)
        .bind(escrow.amount)
        .bind(escrow.status.as_str())
        .bind(escrow.hold_date)
        .bind(escrow.release_date)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        sqlx::query(
            "INSERT INTO transactions (id, order_id, buyer_id, seller_id, product_id, \
             escrow_id, amount, status, tracking_number, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(record.id)
        .bind(record.order_id)
        .bind(record.buyer_id)
        .bind(record.seller_id)
        .bind(record.product_id)
        .bind(record.escrow_id)
        .bind(record.amount)
        .bind(record.status.as_str())
        .bind(record.tracking_number.as_deref())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Versioned<Order>>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{} WHERE id = $1", SELECT_ORDER))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.map(OrderRow::into_versioned).transpose()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: OrderStatus,
        tracking_number: Option<String>,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $1, tracking_number = $2, version = version + 1, \
             updated_at = NOW() WHERE id = $3 AND version = $4",
        )
        .bind(status.as_str())
        .bind(tracking_number.as_deref())
        .bind(id)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        // Zero rows means the record is gone or the version is stale;
        // callers re-read and decide.
        if result.rows_affected() == 0 {
            return Err(StoreError::VersionConflict { entity: "order", id });
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        let rows =
            sqlx::query_as::<_, OrderRow>(&format!("{} ORDER BY created_at DESC", SELECT_ORDER))
                .fetch_all(&self.pool)
                .await
                .map_err(unavailable)?;
        rows.into_iter()
            .map(|row| row.into_versioned().map(|v| v.record))
            .collect()
    }

    async fn list_by_buyer(&self, buyer_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{} WHERE buyer_id = $1 ORDER BY created_at DESC",
            SELECT_ORDER
        ))
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        rows.into_iter()
            .map(|row| row.into_versioned().map(|v| v.record))
            .collect()
    }

    async fn list_by_seller(&self, seller_id: Uuid) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{} WHERE seller_id = $1 ORDER BY created_at DESC",
            SELECT_ORDER
        ))
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        rows.into_iter()
            .map(|row| row.into_versioned().map(|v| v.record))
            .collect()
    }
}

#[async_trait]
impl EscrowRepository for PgLedger {
    async fn insert(&self, escrow: &Escrow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO escrows (id, order_id, amount, status, hold_date, release_date, version) \
             VALUES ($1, $2, $3, $4, $5, $6, 1)",
        )
        .bind(escrow.id)
        .bind(escrow.order_id)
        .bind(escrow.amount)
        .bind(escrow.status.as_str())
        .bind(escrow.hold_date)
        .bind(escrow.release_date)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Versioned<Escrow>>, StoreError> {
        let row = sqlx::query_as::<_, EscrowRow>(&format!("{} WHERE id = $1", SELECT_ESCROW))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.map(EscrowRow::into_versioned).transpose()
    }

    async fn find_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Versioned<Escrow>>, StoreError> {
        let row =
            sqlx::query_as::<_, EscrowRow>(&format!("{} WHERE order_id = $1", SELECT_ESCROW))
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;
        row.map(EscrowRow::into_versioned).transpose()
    }

    async fn settle(
        &self,
        id: Uuid,
        status: EscrowStatus,
        release_date: DateTime<Utc>,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE escrows SET status = $1, release_date = $2, version = version + 1 \
             WHERE id = $3 AND version = $4",
        )
        .bind(status.as_str())
        .bind(release_date)
        .bind(id)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::VersionConflict { entity: "escrow", id });
        }
        Ok(())
    }
}

#[async_trait]
impl DisputeRepository for PgLedger {
    async fn insert(&self, dispute: &Dispute) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO disputes (id, order_id, raised_by, reason, status, resolution, \
             version, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, 1, $7, $8)",
        )
        .bind(dispute.id)
        .bind(dispute.order_id)
        .bind(dispute.raised_by)
        .bind(&dispute.reason)
        .bind(dispute.status.as_str())
        .bind(dispute.resolution.as_deref())
        .bind(dispute.created_at)
        .bind(dispute.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Versioned<Dispute>>, StoreError> {
        let row = sqlx::query_as::<_, DisputeRow>(&format!("{} WHERE id = $1", SELECT_DISPUTE))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.map(DisputeRow::into_versioned).transpose()
    }

    async fn find_open_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Versioned<Dispute>>, StoreError> {
        let row = sqlx::query_as::<_, DisputeRow>(&format!(
            "{} WHERE order_id = $1 AND status <> 'closed' LIMIT 1",
            SELECT_DISPUTE
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        row.map(DisputeRow::into_versioned).transpose()
    }

    async fn list_by_order(&self, order_id: Uuid) -> Result<Vec<Dispute>, StoreError> {
        let rows = sqlx::query_as::<_, DisputeRow>(&format!(
            "{} WHERE order_id = $1 ORDER BY created_at",
            SELECT_DISPUTE
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        rows.into_iter()
            .map(|row| row.into_versioned().map(|v| v.record))
            .collect()
    }

    async fn update(
        &self,
        id: Uuid,
        status: DisputeStatus,
        resolution: Option<String>,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE disputes SET status = $1, resolution = $2, version = version + 1, \
             updated_at = NOW() WHERE id = $3 AND version = $4",
        )
        .bind(status.as_str())
        .bind(resolution.as_deref())
        .bind(id)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::VersionConflict {
                entity: "dispute",
                id,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionRepository for PgLedger {
    async fn mirror_status(
        &self,
        order_id: Uuid,
        status: TransactionStatus,
        tracking_number: Option<String>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE transactions SET status = $1, \
             tracking_number = COALESCE($2, tracking_number), updated_at = NOW() \
             WHERE order_id = $3",
        )
        .bind(status.as_str())
        .bind(tracking_number.as_deref())
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn find_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "{} WHERE order_id = $1",
            SELECT_TRANSACTION
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        row.map(TransactionRow::into_record).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        side: Role,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let column = match side {
            Role::Seller => "seller_id",
            _ => "buyer_id",
        };
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "{} WHERE {} = $1 ORDER BY created_at",
            SELECT_TRANSACTION, column
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;
        rows.into_iter().map(TransactionRow::into_record).collect()
    }
}
