//! HTTP server bootstrap for the Amoria settlement engine.
//!
//! This module wires together:
//! - configuration
//! - database connection pool
//! - core services (ledger store, gateway client, settlement engine,
//!   checkout initiator)
//! - the Axum router

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use crate::auth::{AuthMiddlewareState, JwtValidator};
use crate::domain::UserId;
use crate::gateway::{PayChanguClient, PayChanguConfig, ProviderGateway};
use crate::infra::{
    LedgerStore, NotificationSink, PgLedgerStore, PgNotificationSink, RateLimiter,
};
use crate::settlement::{CheckoutInitiator, SettlementEngine};

/// Verification polls allowed per tx_ref per window.
const VERIFY_MAX_ATTEMPTS: u32 = 10;
const VERIFY_WINDOW: Duration = Duration::from_secs(60);

/// Webhook pushes allowed per tx_ref per cooldown window.
const WEBHOOK_COOLDOWN: Duration = Duration::from_secs(5);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Maximum database connections.
    pub max_connections: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/amoria_settlement".to_string());

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .expect("Invalid listen address");

        let max_connections: u32 = std::env::var("MAX_DB_CONNECTIONS")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(10);

        Self {
            database_url,
            listen_addr,
            max_connections,
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub engine: Arc<SettlementEngine>,
    pub checkout: Arc<CheckoutInitiator>,
    /// Shared secret for webhook HMAC verification; None accepts unsigned
    /// payloads (backward-compatibility escape hatch).
    pub webhook_secret: Option<String>,
    /// Per-tx_ref duplicate-push collapse window.
    pub webhook_cooldown: Arc<RateLimiter>,
    /// Per-tx_ref poll limiter.
    pub verify_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Assemble the state from its capabilities; tests inject in-memory
    /// implementations here.
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn ProviderGateway>,
        notifier: Arc<dyn NotificationSink>,
        webhook_secret: Option<String>,
    ) -> Self {
        let engine = Arc::new(SettlementEngine::new(
            ledger.clone(),
            gateway.clone(),
            notifier,
        ));
        let checkout = Arc::new(CheckoutInitiator::new(ledger.clone(), gateway));

        Self {
            ledger,
            engine,
            checkout,
            webhook_secret,
            webhook_cooldown: Arc::new(RateLimiter::new(1, WEBHOOK_COOLDOWN)),
            verify_limiter: Arc::new(RateLimiter::new(VERIFY_MAX_ATTEMPTS, VERIFY_WINDOW)),
        }
    }
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Amoria settlement engine v{}", env!("CARGO_PKG_VERSION"));

    // Auth configuration
    let jwt_secret = std::env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;
    let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| "amoria-settlement".to_string());
    let audience = std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "amoria-api".to_string());
    let validator = Arc::new(JwtValidator::new(jwt_secret.as_bytes(), &issuer, &audience));
    let auth_state = AuthMiddlewareState { validator };

    // Provider configuration
    let secret_key = std::env::var("PAYCHANGU_SECRET_KEY")
        .map_err(|_| anyhow::anyhow!("PAYCHANGU_SECRET_KEY must be set"))?;
    let webhook_secret = std::env::var("PAYCHANGU_WEBHOOK_SECRET").ok();
    if webhook_secret.is_none() {
        info!("PAYCHANGU_WEBHOOK_SECRET not set; webhooks will be accepted unsigned");
    }

    let mut gateway_config = PayChanguConfig::new(secret_key).with_urls(
        std::env::var("PAYMENT_RETURN_URL").unwrap_or_default(),
        std::env::var("PAYMENT_CALLBACK_URL").unwrap_or_default(),
    );
    if let Ok(base_url) = std::env::var("PAYCHANGU_BASE_URL") {
        gateway_config = gateway_config.with_base_url(base_url);
    }
    let gateway = Arc::new(
        PayChanguClient::new(gateway_config)
            .map_err(|e| anyhow::anyhow!("failed to build gateway client: {e}"))?,
    );

    // Load configuration
    let config = Config::from_env();
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Max connections: {}", config.max_connections);

    // Connect to PostgreSQL
    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Connected to PostgreSQL");

    let migrate_on_startup = std::env::var("DB_MIGRATE_ON_STARTUP")
        .ok()
        .map(|v| {
            !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off"
            )
        })
        .unwrap_or(true);
    if migrate_on_startup {
        info!("Running database migrations...");
        crate::migrations::run_postgres(&pool).await?;
        info!("Database migrations applied");
    } else {
        info!("DB migrations skipped (DB_MIGRATE_ON_STARTUP=0)");
    }

    // Initialize services
    let ledger: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(pool.clone()));
    let notifier: Arc<dyn NotificationSink> = Arc::new(PgNotificationSink::new(pool));

    let state = AppState::new(ledger, gateway, notifier, webhook_secret);

    // Build router
    let app = build_router(auth_state)?.with_state(state);

    // Start server
    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("Amoria settlement engine is ready to accept connections");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

/// Assemble the full router: authenticated API, unauthenticated webhook
/// ingress, and health probes.
pub fn build_router(auth_state: AuthMiddlewareState) -> anyhow::Result<Router<AppState>> {
    let api = crate::api::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        crate::auth::auth_middleware,
    ));

    let mut router = Router::new()
        .merge(crate::api::webhook_router())
        .nest("/api", api)
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors_layer_from_env()? {
        router = router.layer(cors_layer);
    }

    Ok(router)
}

fn cors_layer_from_env() -> anyhow::Result<Option<CorsLayer>> {
    let origins = match std::env::var("CORS_ALLOW_ORIGINS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let origins = origins.trim();
    if origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ]),
    ))
}

/// Health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "service": "amoria-settlement",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check endpoint.
async fn readiness_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<serde_json::Value>, (axum::http::StatusCode, String)> {
    // Check database connectivity with a cheap profile read.
    match state
        .ledger
        .wallet_balance(&UserId::from_uuid(uuid::Uuid::nil()))
        .await
    {
        Ok(_) => Ok(axum::Json(serde_json::json!({
            "status": "ready",
            "database": "connected",
        }))),
        Err(e) => Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            format!("Database unavailable: {}", e),
        )),
    }
}
