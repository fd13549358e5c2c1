use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use custodia_api::metrics::Metrics;
use custodia_api::middleware::auth::Claims;
use custodia_api::state::{AppState, AuthConfig, RateLimitSettings};
use custodia_api::app;
use custodia_catalog::{InMemoryInventory, InventoryGateway, Product};
use custodia_core::identity::Role;
use custodia_escrow::EscrowManager;
use custodia_order::{DisputeResolver, OrderCoordinator};
use custodia_store::{EventLog, MemoryLedger};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-test-secret";

struct TestApp {
    router: Router,
    inventory: Arc<InMemoryInventory>,
    product: Product,
    buyer: Uuid,
    seller: Uuid,
    arbitrator: Uuid,
    admin: Uuid,
}

fn spawn_app() -> TestApp {
    let ledger = MemoryLedger::shared();
    let inventory = Arc::new(InMemoryInventory::new());
    let seller = Uuid::new_v4();
    let product = Product::new(seller, "noise-cancelling headphones", 2500, 10);
    inventory.seed(product.clone());

    let escrows = EscrowManager::new(ledger.clone());
    let coordinator = Arc::new(OrderCoordinator::new(
        inventory.clone(),
        escrows.clone(),
        ledger.clone(),
        ledger.clone(),
    ));
    let resolver = Arc::new(DisputeResolver::new(
        ledger.clone(),
        ledger.clone(),
        ledger.clone(),
        escrows.clone(),
        inventory.clone(),
    ));

    let state = AppState {
        coordinator,
        resolver,
        escrows,
        transactions: ledger,
        events: Arc::new(EventLog::new()),
        metrics: Arc::new(Metrics::new()),
        redis: None,
        auth: AuthConfig {
            secret: SECRET.to_string(),
        },
        rate_limit: RateLimitSettings {
            requests: 100,
            window_seconds: 60,
        },
    };

    TestApp {
        router: app(state),
        inventory,
        product,
        buyer: Uuid::new_v4(),
        seller,
        arbitrator: Uuid::new_v4(),
        admin: Uuid::new_v4(),
    }
}

fn token(sub: Uuid, role: Role) -> String {
    let claims = Claims {
        sub,
        email: format!("{}@example.com", role.as_str()),
        role: role.as_str().to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    bearer: Option<(Uuid, Role)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((sub, role)) = bearer {
        builder = builder.header(
            header::AUTHORIZATION,
            format!("Bearer {}", token(sub, role)),
        );
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

async fn create_order(app: &TestApp, quantity: u32) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/orders",
        Some((app.buyer, Role::Buyer)),
        Some(json!({
            "product_id": app.product.id,
            "quantity": quantity,
            "buyer_id": app.buyer,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn test_health_is_public() {
    let app = spawn_app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = spawn_app();
    let (status, _) = send(&app, Method::GET, "/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_full_order_lifecycle_over_http() {
    let app = spawn_app();
    let order = create_order(&app, 2).await;

    assert_eq!(order["amount"], 5000);
    assert_eq!(order["status"], "pending");
    let order_id = order["id"].as_str().unwrap().to_string();

    for (status_target, tracking) in [
        ("processing", None),
        ("dispatched", Some("TRK-42")),
        ("delivered", None),
    ] {
        let mut body = json!({ "status": status_target });
        if let Some(t) = tracking {
            body["tracking_number"] = json!(t);
        }
        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/orders/{}", order_id),
            Some((app.seller, Role::Seller)),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["status"], status_target);
    }

    // Delivered escrow is released; admin can see it.
    let (status, escrow) = send(
        &app,
        Method::GET,
        &format!("/escrow/order/{}", order_id),
        Some((app.admin, Role::Admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(escrow["status"], "released");
    assert_eq!(escrow["amount"], 5000);

    // The mirror shows up for the buyer.
    let (status, transactions) = send(
        &app,
        Method::GET,
        "/transactions",
        Some((app.buyer, Role::Buyer)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(transactions.as_array().unwrap().len(), 1);
    assert_eq!(transactions[0]["status"], "completed");
}

#[tokio::test]
async fn test_buyer_cannot_advance_delivery() {
    let app = spawn_app();
    let order = create_order(&app, 1).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/orders/{}", order["id"].as_str().unwrap()),
        Some((app.buyer, Role::Buyer)),
        Some(json!({ "status": "processing" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_insufficient_stock_is_bad_request() {
    let app = spawn_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/orders",
        Some((app.buyer, Role::Buyer)),
        Some(json!({
            "product_id": app.product.id,
            "quantity": 11,
            "buyer_id": app.buyer,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
}

#[tokio::test]
async fn test_invalid_transition_is_bad_request() {
    let app = spawn_app();
    let order = create_order(&app, 1).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/orders/{}", order["id"].as_str().unwrap()),
        Some((app.seller, Role::Seller)),
        Some(json!({ "status": "delivered" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_order_listing_scopes() {
    let app = spawn_app();
    create_order(&app, 1).await;

    // Admin sees everything.
    let (status, all) = send(
        &app,
        Method::GET,
        "/orders",
        Some((app.admin, Role::Admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);

    // A buyer is not an admin.
    let (status, _) = send(
        &app,
        Method::GET,
        "/orders",
        Some((app.buyer, Role::Buyer)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, own) = send(
        &app,
        Method::GET,
        "/orders/buyer",
        Some((app.buyer, Role::Buyer)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own.as_array().unwrap().len(), 1);

    let (status, sales) = send(
        &app,
        Method::GET,
        "/orders/seller",
        Some((app.seller, Role::Seller)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sales.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_dispute_flow_over_http() {
    let app = spawn_app();
    let order = create_order(&app, 3).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let (status, dispute) = send(
        &app,
        Method::POST,
        "/disputes",
        Some((app.buyer, Role::Buyer)),
        Some(json!({ "order_id": order_id, "reason": "item not as described" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", dispute);
    assert_eq!(dispute["status"], "pending");
    let dispute_id = dispute["id"].as_str().unwrap().to_string();

    // Second open dispute for the same order conflicts.
    let (status, body) = send(
        &app,
        Method::POST,
        "/disputes",
        Some((app.seller, Role::Seller)),
        Some(json!({ "order_id": order_id, "reason": "buyer is wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    // Only arbitrators resolve.
    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/disputes/{}", dispute_id),
        Some((app.buyer, Role::Buyer)),
        Some(json!({ "status": "resolved", "outcome": "refund" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, resolved) = send(
        &app,
        Method::PATCH,
        &format!("/disputes/{}", dispute_id),
        Some((app.arbitrator, Role::Arbitrator)),
        Some(json!({ "status": "resolved", "outcome": "refund" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", resolved);
    assert_eq!(resolved["status"], "resolved");
    assert!(resolved["resolution"]
        .as_str()
        .unwrap()
        .contains("refunded"));

    // Refund restocked the pending order.
    let restocked = app
        .inventory
        .get_product(app.product.id)
        .await
        .unwrap()
        .stock;
    assert_eq!(restocked, 10);

    let (status, escrow) = send(
        &app,
        Method::GET,
        &format!("/escrow/order/{}", order_id),
        Some((app.admin, Role::Admin)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(escrow["status"], "refunded");

    // Resolving without an outcome is rejected up front.
    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/disputes/{}", dispute_id),
        Some((app.arbitrator, Role::Arbitrator)),
        Some(json!({ "status": "resolved" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");

    let (status, closed) = send(
        &app,
        Method::PATCH,
        &format!("/disputes/{}", dispute_id),
        Some((app.arbitrator, Role::Arbitrator)),
        Some(json!({ "status": "closed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["status"], "closed");
}

#[tokio::test]
async fn test_dispute_read_requires_stakeholding() {
    let app = spawn_app();
    let order = create_order(&app, 1).await;

    let (status, dispute) = send(
        &app,
        Method::POST,
        "/disputes",
        Some((app.buyer, Role::Buyer)),
        Some(json!({
            "order_id": order["id"],
            "reason": "serial number does not match",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let dispute_uri = format!("/disputes/{}", dispute["id"].as_str().unwrap());

    // Another buyer with a valid token is not a party to this dispute.
    let (status, body) = send(
        &app,
        Method::GET,
        &dispute_uri,
        Some((Uuid::new_v4(), Role::Buyer)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    // The parties still can read it.
    for (sub, role) in [
        (app.buyer, Role::Buyer),
        (app.seller, Role::Seller),
        (app.arbitrator, Role::Arbitrator),
    ] {
        let (status, body) = send(&app, Method::GET, &dispute_uri, Some((sub, role)), None).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["reason"], "serial number does not match");
    }
}

#[tokio::test]
async fn test_escrow_admin_surface_is_gated() {
    let app = spawn_app();
    let order = create_order(&app, 1).await;
    let order_id = order["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/escrow/order/{}", order_id),
        Some((app.buyer, Role::Buyer)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_counters() {
    let app = spawn_app();
    create_order(&app, 1).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("custodia_orders_created_total 1"));
}
