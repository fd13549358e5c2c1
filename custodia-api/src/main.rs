use custodia_api::{
    app,
    metrics::Metrics,
    state::{AppState, AuthConfig, RateLimitSettings},
};
use custodia_escrow::EscrowManager;
use custodia_order::{DisputeResolver, OrderCoordinator};
use custodia_store::{DbClient, EventLog, PgLedger, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "custodia_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = custodia_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Custodia API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let ledger = Arc::new(PgLedger::new(db.pool.clone()));

    let redis = match RedisClient::new(&config.redis.url).await {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            tracing::warn!(error = %err, "Redis unavailable, rate limiting disabled");
            None
        }
    };

    let escrows = EscrowManager::new(ledger.clone());
    let coordinator = Arc::new(OrderCoordinator::new(
        ledger.clone(),
        escrows.clone(),
        ledger.clone(),
        ledger.clone(),
    ));
    let resolver = Arc::new(DisputeResolver::new(
        ledger.clone(),
        ledger.clone(),
        ledger.clone(),
        escrows.clone(),
        ledger.clone(),
    ));

    let app_state = AppState {
        coordinator,
        resolver,
        escrows,
        transactions: ledger,
        events: Arc::new(EventLog::new()),
        metrics: Arc::new(Metrics::new()),
        redis,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        rate_limit: RateLimitSettings {
            requests: config.rate_limit.requests,
            window_seconds: config.rate_limit.window_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
