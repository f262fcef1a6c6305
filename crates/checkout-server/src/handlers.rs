//! HTTP Handlers

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{Extensions, HeaderMap, StatusCode},
    response::Html,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use checkout_payments::{PaymentError, TransactionOutcome, TransactionRequest};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gateway: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub records: Vec<Value>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateway: state.workflow.gateway().name().to_string(),
    })
}

/// Redeem the widget's temporary token and charge the stored method
///
/// Always answers 200 with a read-only input fragment the page swaps in;
/// failures are reported inside the fragment.
pub async fn process_transaction(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    extensions: Extensions,
) -> Html<String> {
    let request = TransactionRequest {
        token,
        payer: state.profile.payer,
        terms: state.profile.terms,
        network_address: client_address(&headers, &extensions),
    };

    let outcome = state.workflow.execute(request).await;
    Html(outcome_fragment(&outcome))
}

/// Look up a processed transaction by processor reference
pub async fn lookup_transaction(
    State(state): State<AppState>,
    Path(reference_id): Path<String>,
) -> Result<Json<LookupResponse>, (StatusCode, Json<ErrorResponse>)> {
    let entry_point = &state.workflow.config().entry_point;

    let records = state
        .workflow
        .gateway()
        .query_transaction(entry_point, &reference_id)
        .await
        .map_err(|e| {
            tracing::error!("Transaction lookup error: {}", e);
            let (status, code) = match &e {
                PaymentError::Unsupported(_) => (StatusCode::SERVICE_UNAVAILABLE, "LOOKUP_UNAVAILABLE"),
                _ => (StatusCode::BAD_GATEWAY, "LOOKUP_ERROR"),
            };
            (
                status,
                Json(ErrorResponse {
                    error: e.user_message().into(),
                    code: code.into(),
                }),
            )
        })?;

    Ok(Json(LookupResponse { records }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Best-effort originating address: first `X-Forwarded-For` hop, else the peer
fn client_address(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse().ok());

    forwarded.or_else(|| {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

fn outcome_fragment(outcome: &TransactionOutcome) -> String {
    let (name, invalid) = if outcome.is_success() {
        ("valid", "false")
    } else {
        ("invalid", "true")
    };
    let message = outcome.message();
    let value = html_escape::encode_double_quoted_attribute(&message);

    format!(r#"<input type="text" name="{name}" value="{value}" aria-invalid="{invalid}" readonly>"#)
}
