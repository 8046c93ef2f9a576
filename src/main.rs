//! RelicVault Backend Server
//!
//! Backend for the RelicVault NFT-collateralized lending desk: loan
//! origination, repayment, liquidation and live health factor reporting,
//! in front of an external valuation oracle and settlement layer.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod config;
mod error;
mod handlers;
mod ledger;
mod lending;
mod models;
mod risk;
mod routes;
mod settlement;
mod state;
mod valuation;

use config::Config;
use ledger::LoanLedger;
use lending::LendingService;
use risk::RiskParameterBook;
use settlement::HttpSettlementLayer;
use state::AppState;
use valuation::HttpValuationProvider;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .init();

    tracing::info!(
        environment = config.environment.as_str(),
        database = %config.database_url_masked(),
        "Starting RelicVault backend"
    );

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!()
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database connected and migrated");

    // Load the lending policy book; collections not present here cannot be
    // borrowed against.
    let params = Arc::new(
        RiskParameterBook::load(&db_pool)
            .await
            .expect("Failed to load risk parameter book"),
    );
    if params.is_empty() {
        tracing::warn!("Risk parameter book is empty; all quotes will be rejected");
    }

    // Wire up services
    let ledger = LoanLedger::new(db_pool.clone());
    let valuation = Arc::new(HttpValuationProvider::new(
        config.valuation_oracle_url.clone(),
    ));
    let settlement = Arc::new(HttpSettlementLayer::new(config.settlement_rpc_url.clone()));
    let lending = Arc::new(LendingService::new(
        ledger.clone(),
        params.clone(),
        valuation,
        settlement,
        config.max_valuation_age_seconds,
    ));

    let app_state = AppState::new(db_pool.clone(), ledger, lending, params);

    // Create the app router
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(routes::loan_routes())
        .merge(routes::risk_param_routes())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(configure_cors(&config));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    tracing::info!("Server shutdown complete");
}

async fn root() -> &'static str {
    "RelicVault API Server"
}

/// Health check response
#[derive(serde::Serialize)]
struct HealthResponse {
    status: String,
    database: String,
    version: String,
}

/// Health check endpoint
async fn health_check(
    axum::extract::State(pool): axum::extract::State<sqlx::PgPool>,
) -> axum::Json<HealthResponse> {
    let db_status = match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    let status = if db_status == "connected" {
        "healthy"
    } else {
        "unhealthy"
    };

    axum::Json(HealthResponse {
        status: status.to_string(),
        database: db_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn configure_cors(config: &Config) -> CorsLayer {
    let allowed_origins = config.cors_allowed_origins.clone().unwrap_or_default();

    if allowed_origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
