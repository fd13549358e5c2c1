use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use custodia_core::identity::Actor;
use custodia_order::{CreateOrder, Order, OrderStatus};
use custodia_shared::models::events::{OrderCreatedEvent, OrderStatusChangedEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub product_id: Uuid,
    pub quantity: u32,
    pub buyer_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: u32,
    pub amount: i64,
    pub escrow_id: Uuid,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            product_id: order.product_id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            quantity: order.quantity,
            amount: order.amount,
            escrow_id: order.escrow_id,
            status: order.status,
            tracking_number: order.tracking_number,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_all_orders))
        .route("/orders/buyer", get(list_buyer_orders))
        .route("/orders/seller", get(list_seller_orders))
        .route("/orders/{id}", get(get_order).put(update_order_status))
}

/// POST /orders
async fn create_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let order = state
        .coordinator
        .create_order(
            actor,
            CreateOrder {
                buyer_id: req.buyer_id,
                product_id: req.product_id,
                quantity: req.quantity,
            },
        )
        .await?;

    state.metrics.orders_created.inc();
    state.events.publish(
        "orders.created",
        &order.id.to_string(),
        &OrderCreatedEvent {
            order_id: order.id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            product_id: order.product_id,
            quantity: order.quantity,
            amount: order.amount,
            timestamp: chrono::Utc::now().timestamp_millis(),
        },
    );

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// PUT /orders/:id
async fn update_order_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let before = state.coordinator.get_order(order_id, actor).await?;
    let order = state
        .coordinator
        .advance_status(order_id, req.status, req.tracking_number, actor)
        .await?;

    if before.status != order.status {
        state
            .metrics
            .order_status_changes
            .with_label_values(&[order.status.as_str()])
            .inc();
        state.events.publish(
            "orders.status_changed",
            &order.id.to_string(),
            &OrderStatusChangedEvent {
                order_id: order.id,
                from: before.status.as_str().to_string(),
                to: order.status.as_str().to_string(),
                actor_id: actor.id,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        );
    }

    Ok(Json(order.into()))
}

/// GET /orders/:id
async fn get_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.coordinator.get_order(order_id, actor).await?;
    Ok(Json(order.into()))
}

/// GET /orders
async fn list_all_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state.coordinator.list_all(actor).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /orders/buyer
async fn list_buyer_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state.coordinator.list_by_buyer(actor).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /orders/seller
async fn list_seller_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state.coordinator.list_by_seller(actor).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}
