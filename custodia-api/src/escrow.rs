use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use custodia_core::identity::Actor;
use custodia_core::policy::{self, Action, Stakeholders};
use custodia_core::CoreError;
use custodia_escrow::{Escrow, EscrowStatus};
use custodia_shared::models::events::EscrowSettledEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateEscrowRequest {
    pub order_id: Uuid,
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct SettleEscrowRequest {
    pub status: EscrowStatus,
}

#[derive(Debug, Serialize)]
pub struct EscrowResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: i64,
    pub status: EscrowStatus,
    pub hold_date: chrono::DateTime<chrono::Utc>,
    pub release_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Escrow> for EscrowResponse {
    fn from(escrow: Escrow) -> Self {
        Self {
            id: escrow.id,
            order_id: escrow.order_id,
            amount: escrow.amount,
            status: escrow.status,
            hold_date: escrow.hold_date,
            release_date: escrow.release_date,
        }
    }
}

/// Administrative surface. The normal escrow lifecycle is driven by the
/// coordinator and the dispute resolver; these endpoints exist for
/// back-office correction and inspection.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/escrow", post(create_escrow))
        .route("/escrow/{id}", get(get_escrow).patch(settle_escrow))
        .route("/escrow/order/{order_id}", get(get_order_escrow))
}

fn require_escrow_admin(actor: Actor) -> Result<(), AppError> {
    if !policy::can(
        actor.role,
        actor.id,
        Action::ManageEscrow,
        &Stakeholders::default(),
    ) {
        return Err(CoreError::Forbidden("escrow administration is admin-only".into()).into());
    }
    Ok(())
}

/// POST /escrow
async fn create_escrow(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateEscrowRequest>,
) -> Result<(StatusCode, Json<EscrowResponse>), AppError> {
    require_escrow_admin(actor)?;
    let escrow = state.escrows.create_hold(req.order_id, req.amount).await?;
    Ok((StatusCode::CREATED, Json(escrow.into())))
}

/// PATCH /escrow/:id
async fn settle_escrow(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(escrow_id): Path<Uuid>,
    Json(req): Json<SettleEscrowRequest>,
) -> Result<Json<EscrowResponse>, AppError> {
    require_escrow_admin(actor)?;

    let escrow = match req.status {
        EscrowStatus::Released => state.escrows.release(escrow_id).await?,
        EscrowStatus::Refunded => state.escrows.refund(escrow_id).await?,
        EscrowStatus::Held => {
            return Err(
                CoreError::Validation("an escrow cannot be moved back to held".into()).into(),
            )
        }
    };

    state
        .metrics
        .escrow_settlements
        .with_label_values(&[escrow.status.as_str()])
        .inc();
    state.events.publish(
        "escrow.settled",
        &escrow.id.to_string(),
        &EscrowSettledEvent {
            escrow_id: escrow.id,
            order_id: escrow.order_id,
            outcome: escrow.status.as_str().to_string(),
            amount: escrow.amount,
            timestamp: chrono::Utc::now().timestamp_millis(),
        },
    );

    Ok(Json(escrow.into()))
}

/// GET /escrow/:id
async fn get_escrow(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(escrow_id): Path<Uuid>,
) -> Result<Json<EscrowResponse>, AppError> {
    require_escrow_admin(actor)?;
    let escrow = state.escrows.get(escrow_id).await?;
    Ok(Json(escrow.into()))
}

/// GET /escrow/order/:order_id
async fn get_order_escrow(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<EscrowResponse>, AppError> {
    require_escrow_admin(actor)?;
    let escrow = state.escrows.find_by_order(order_id).await?;
    Ok(Json(escrow.into()))
}
