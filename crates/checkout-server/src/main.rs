//! checkout-relay HTTP Server
//!
//! Axum-based server that takes temporary tokens from the embedded payment
//! widget and runs the two-step tokenized transaction against Payabli.

mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_payments::{
    ChargeProfile, MockGateway, PayabliGateway, PaymentGateway, TransactionWorkflow, WorkflowConfig,
};

use crate::handlers::{health_check, lookup_transaction, process_transaction};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Initialize payment gateway
    let gateway: Arc<dyn PaymentGateway> = match std::env::var("CHECKOUT_GATEWAY").as_deref() {
        Ok("mock") => {
            tracing::warn!("⚠ Using mock gateway - no real charges will be made");
            Arc::new(MockGateway::new())
        }
        _ => {
            let gateway = PayabliGateway::from_env()?;
            tracing::info!(base_url = %gateway.base_url(), "✓ Payabli configured");
            Arc::new(gateway)
        }
    };

    let workflow = TransactionWorkflow::new(gateway, WorkflowConfig::from_env()?);
    let profile = ChargeProfile::from_env()?;

    tracing::info!(
        entry_point = %workflow.config().entry_point,
        customer_id = profile.payer.customer_id,
        total_amount = %profile.terms.total_amount,
        service_fee = %profile.terms.service_fee,
        "Charge profile loaded"
    );

    // Build application state
    let state = AppState {
        workflow: Arc::new(workflow),
        profile,
    };

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 checkout-relay running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                       - Health check");
    tracing::info!("  POST /api/transaction/{{token}}       - Store token and charge");
    tracing::info!("  GET  /api/transactions/{{reference}}  - Look up a transaction");
    tracing::info!("");

    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Build the router
fn app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/transaction/{token}", post(process_transaction))
        .route("/api/transactions/{reference_id}", get(lookup_transaction))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Request span keyed by route template
///
/// The transaction path carries the temporary token, so the raw URI never
/// goes into the span.
fn request_span(request: &Request<Body>) -> Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or("<unmatched>", MatchedPath::as_str);

    tracing::info_span!("request", method = %request.method(), route)
}
