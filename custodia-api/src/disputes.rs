use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use custodia_core::identity::Actor;
use custodia_core::CoreError;
use custodia_order::{Dispute, DisputeOutcome, DisputeStatus};
use custodia_shared::models::events::{DisputeOpenedEvent, DisputeResolvedEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OpenDisputeRequest {
    pub order_id: Uuid,
    pub reason: String,
}

/// Target-status driven update: `in_review` starts arbitration,
/// `resolved` settles with the given outcome, `closed` archives.
#[derive(Debug, Deserialize)]
pub struct UpdateDisputeRequest {
    pub status: DisputeStatus,
    pub outcome: Option<DisputeOutcome>,
}

#[derive(Debug, Serialize)]
pub struct DisputeResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub raised_by: Uuid,
    pub reason: String,
    pub status: DisputeStatus,
    pub resolution: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Dispute> for DisputeResponse {
    fn from(dispute: Dispute) -> Self {
        Self {
            id: dispute.id,
            order_id: dispute.order_id,
            raised_by: dispute.raised_by,
            reason: dispute.reason,
            status: dispute.status,
            resolution: dispute.resolution,
            created_at: dispute.created_at,
            updated_at: dispute.updated_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/disputes", post(open_dispute))
        .route("/disputes/{id}", get(get_dispute).patch(update_dispute))
        .route("/disputes/order/{order_id}", get(list_order_disputes))
}

/// POST /disputes
async fn open_dispute(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<OpenDisputeRequest>,
) -> Result<(StatusCode, Json<DisputeResponse>), AppError> {
    let dispute = state.resolver.open(req.order_id, req.reason, actor).await?;

    state.metrics.disputes_opened.inc();
    state.events.publish(
        "disputes.opened",
        &dispute.id.to_string(),
        &DisputeOpenedEvent {
            dispute_id: dispute.id,
            order_id: dispute.order_id,
            raised_by: dispute.raised_by,
            timestamp: chrono::Utc::now().timestamp_millis(),
        },
    );

    Ok((StatusCode::CREATED, Json(dispute.into())))
}

/// PATCH /disputes/:id
async fn update_dispute(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(dispute_id): Path<Uuid>,
    Json(req): Json<UpdateDisputeRequest>,
) -> Result<Json<DisputeResponse>, AppError> {
    let dispute = match req.status {
        DisputeStatus::InReview => state.resolver.begin_review(dispute_id, actor).await?,
        DisputeStatus::Resolved => {
            let outcome = req.outcome.ok_or_else(|| {
                CoreError::Validation("an outcome is required to resolve a dispute".into())
            })?;
            let dispute = state.resolver.resolve(dispute_id, outcome, actor).await?;

            state.metrics.disputes_resolved.inc();
            state.events.publish(
                "disputes.resolved",
                &dispute.id.to_string(),
                &DisputeResolvedEvent {
                    dispute_id: dispute.id,
                    order_id: dispute.order_id,
                    resolution: dispute.resolution.clone().unwrap_or_default(),
                    timestamp: chrono::Utc::now().timestamp_millis(),
                },
            );
            dispute
        }
        DisputeStatus::Closed => state.resolver.close(dispute_id, actor).await?,
        DisputeStatus::Pending => {
            return Err(CoreError::Validation(
                "a dispute cannot be moved back to pending".into(),
            )
            .into())
        }
    };

    Ok(Json(dispute.into()))
}

/// GET /disputes/:id
async fn get_dispute(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(dispute_id): Path<Uuid>,
) -> Result<Json<DisputeResponse>, AppError> {
    let dispute = state.resolver.get(dispute_id, actor).await?;
    Ok(Json(dispute.into()))
}

/// GET /disputes/order/:order_id
async fn list_order_disputes(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<DisputeResponse>>, AppError> {
    let disputes = state.resolver.list_by_order(order_id, actor).await?;
    Ok(Json(disputes.into_iter().map(Into::into).collect()))
}
