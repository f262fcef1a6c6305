//! Application State

use std::sync::Arc;

use checkout_payments::{ChargeProfile, TransactionWorkflow};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Two-step transaction workflow (holds the gateway)
    pub workflow: Arc<TransactionWorkflow>,

    /// Payer and charge terms applied to every transaction
    pub profile: ChargeProfile,
}
