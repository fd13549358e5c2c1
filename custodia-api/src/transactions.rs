use axum::{
    extract::{Extension, Path, State},
    routing::get,
    Json, Router,
};
use custodia_core::identity::Actor;
use custodia_core::policy::{self, Action, Stakeholders};
use custodia_core::CoreError;
use custodia_order::{TransactionRecord, TransactionStatus};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub product_id: Uuid,
    pub escrow_id: Uuid,
    pub amount: i64,
    pub status: TransactionStatus,
    pub tracking_number: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<TransactionRecord> for TransactionResponse {
    fn from(record: TransactionRecord) -> Self {
        Self {
            id: record.id,
            order_id: record.order_id,
            buyer_id: record.buyer_id,
            seller_id: record.seller_id,
            product_id: record.product_id,
            escrow_id: record.escrow_id,
            amount: record.amount,
            status: record.status,
            tracking_number: record.tracking_number,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list_transactions))
        .route("/transactions/order/{order_id}", get(get_order_transaction))
}

/// GET /transactions — the caller's mirror records, buy side or sell
/// side depending on their role.
async fn list_transactions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    if !policy::can(
        actor.role,
        actor.id,
        Action::ReadTransaction,
        &Stakeholders::default(),
    ) {
        return Err(CoreError::Forbidden("transaction access denied".into()).into());
    }

    let records = state
        .transactions
        .list_for_user(actor.id, actor.role)
        .await
        .map_err(CoreError::from)?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// GET /transactions/order/:order_id
async fn get_order_transaction(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<TransactionResponse>, AppError> {
    let record = state
        .transactions
        .find_by_order(order_id)
        .await
        .map_err(CoreError::from)?
        .ok_or_else(|| CoreError::NotFound(format!("transaction for order {}", order_id)))?;

    let parties = Stakeholders::of(record.buyer_id, record.seller_id);
    if !policy::can(actor.role, actor.id, Action::ReadOrder, &parties) {
        return Err(CoreError::Forbidden("not a stakeholder of this transaction".into()).into());
    }

    Ok(Json(record.into()))
}
