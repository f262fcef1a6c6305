//! Payment Gateway Integration
//!
//! The two remote operations the transaction workflow depends on,
//! behind a trait so the processor can be swapped for a scripted fake.

mod mock;
mod payabli;

pub use mock::{GatewayCall, MockGateway};
pub use payabli::PayabliGateway;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{PaymentError, Result};
use crate::model::{ChargeRequest, ChargeResult, EntryPoint, StoredMethodReference, TokenRedemptionRequest};

/// Remote payment processor (Strategy pattern)
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Exchange a temporary token for a permanent stored method
    async fn redeem_temporary_token(&self, request: &TokenRedemptionRequest) -> Result<StoredMethodReference>;

    /// Charge a previously stored method
    async fn charge_stored_method(&self, request: &ChargeRequest) -> Result<ChargeResult>;

    /// Look up processed transactions by processor reference
    async fn query_transaction(&self, entry_point: &EntryPoint, reference_id: &str) -> Result<Vec<Value>> {
        let _ = (entry_point, reference_id);
        Err(PaymentError::Unsupported(format!("{} does not support transaction lookup", self.name())))
    }

    /// Gateway name
    fn name(&self) -> &str;
}
