//! Tokenized Transaction Workflow
//!
//! Redeems a temporary token into a stored method, then charges that
//! stored method. The second call needs the reference produced by the
//! first, so the two run strictly in sequence.
//!
//! ```text
//! Start ─▶ TokenExchanging ─┬─▶ TokenExchangeFailed
//!                           └─▶ TokenExchanged ─▶ Charging ─┬─▶ ChargeFailed
//!                                                           └─▶ ChargeSucceeded
//! ```
//!
//! Every failure is terminal for the invocation. Nothing is retried and a
//! stored method created in step one is left in place when the charge fails.

use std::net::IpAddr;
use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;

use crate::config::WorkflowConfig;
use crate::error::PaymentError;
use crate::gateway::PaymentGateway;
use crate::model::{
    ChargeRequest, ChargeResult, ChargeTerms, MethodKind, Payer, StoredMethodReference, TemporaryToken,
    TokenRedemptionRequest,
};

/// Message shown to the payer on success
pub const SUCCESS_MESSAGE: &str = "Payment processed successfully";

/// One transaction to run
#[derive(Clone, Debug)]
pub struct TransactionRequest {
    /// Raw token from the client widget
    pub token: String,
    pub payer: Payer,
    pub terms: ChargeTerms,

    /// Originating address; a placeholder is sent when absent
    pub network_address: Option<IpAddr>,
}

/// Terminal state an invocation ended in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    TokenExchangeFailed,
    ChargeFailed,
    ChargeSucceeded,
}

/// Why a transaction failed
#[derive(Debug)]
pub enum WorkflowFailure {
    /// Processor rejected or could not process the token exchange
    TokenRedemption(PaymentError),

    /// Exchange succeeded but carried no usable reference
    MalformedRedemption(PaymentError),

    /// Processor rejected or could not process the charge
    Charge {
        stored_method: StoredMethodReference,
        error: PaymentError,
    },
}

impl WorkflowFailure {
    pub fn error(&self) -> &PaymentError {
        match self {
            WorkflowFailure::TokenRedemption(error)
            | WorkflowFailure::MalformedRedemption(error)
            | WorkflowFailure::Charge { error, .. } => error,
        }
    }

    pub fn stage(&self) -> WorkflowStage {
        match self {
            WorkflowFailure::TokenRedemption(_) | WorkflowFailure::MalformedRedemption(_) => {
                WorkflowStage::TokenExchangeFailed
            }
            WorkflowFailure::Charge { .. } => WorkflowStage::ChargeFailed,
        }
    }

    /// Text for direct display to the payer
    pub fn message(&self) -> String {
        match self {
            WorkflowFailure::TokenRedemption(error) | WorkflowFailure::MalformedRedemption(error) => {
                format!("Token storage failed: {}", error.detail())
            }
            WorkflowFailure::Charge { error, .. } => format!("Payment failed: {}", error.detail()),
        }
    }
}

/// Combined result of one invocation
#[derive(Debug)]
pub enum TransactionOutcome {
    Success {
        stored_method: StoredMethodReference,
        charge: ChargeResult,
    },
    Failure(WorkflowFailure),
}

impl TransactionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransactionOutcome::Success { .. })
    }

    pub fn stage(&self) -> WorkflowStage {
        match self {
            TransactionOutcome::Success { .. } => WorkflowStage::ChargeSucceeded,
            TransactionOutcome::Failure(failure) => failure.stage(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            TransactionOutcome::Success { .. } => SUCCESS_MESSAGE.to_string(),
            TransactionOutcome::Failure(failure) => failure.message(),
        }
    }

    /// Stored method created during this invocation, if step one succeeded
    pub fn stored_method(&self) -> Option<&StoredMethodReference> {
        match self {
            TransactionOutcome::Success { stored_method, .. }
            | TransactionOutcome::Failure(WorkflowFailure::Charge { stored_method, .. }) => Some(stored_method),
            TransactionOutcome::Failure(_) => None,
        }
    }
}

/// Transaction workflow orchestrator
///
/// Holds no per-invocation state; one instance serves concurrent requests.
pub struct TransactionWorkflow {
    gateway: Arc<dyn PaymentGateway>,
    config: WorkflowConfig,
}

impl TransactionWorkflow {
    pub fn new(gateway: Arc<dyn PaymentGateway>, config: WorkflowConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    /// Run both steps and report one outcome
    ///
    /// Never returns an error: every failure becomes a
    /// [`TransactionOutcome::Failure`].
    pub async fn execute(&self, request: TransactionRequest) -> TransactionOutcome {
        let invocation = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            "transaction",
            %invocation,
            gateway = self.gateway.name(),
            entry_point = %self.config.entry_point,
            customer_id = request.payer.customer_id,
        );

        async move {
            let outcome = self.run(request).await;
            match &outcome {
                TransactionOutcome::Success { charge, .. } => {
                    tracing::info!(stage = ?outcome.stage(), reference_id = %charge.reference_id, "Transaction complete");
                }
                TransactionOutcome::Failure(failure) => {
                    tracing::warn!(stage = ?outcome.stage(), error = %failure.error(), "Transaction failed");
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: TransactionRequest) -> TransactionOutcome {
        let token = match TemporaryToken::parse(request.token) {
            Ok(token) => token,
            Err(error) => return TransactionOutcome::Failure(WorkflowFailure::TokenRedemption(error)),
        };

        // Step 1: temporary token -> stored method
        tracing::info!(token = %token.redacted(), "Redeeming temporary token");
        let redemption = TokenRedemptionRequest {
            payer: request.payer,
            entry_point: self.config.entry_point.clone(),
            method: MethodKind::Card,
            token,
            source: self.config.source.clone(),
            description: self.config.method_description.clone(),
        };

        let stored_method = match self.gateway.redeem_temporary_token(&redemption).await {
            Ok(reference) => reference,
            Err(error @ PaymentError::MalformedResponse(_)) => {
                return TransactionOutcome::Failure(WorkflowFailure::MalformedRedemption(error));
            }
            Err(error) => return TransactionOutcome::Failure(WorkflowFailure::TokenRedemption(error)),
        };
        tracing::info!(stored_method = %stored_method, "Token stored");

        // Step 2: charge the stored method
        let charge = ChargeRequest::for_stored_method(
            stored_method.clone(),
            request.payer,
            self.config.entry_point.clone(),
            request.terms,
            request.network_address,
        );
        tracing::info!(total_amount = %charge.terms.total_amount, "Charging stored method");

        match self.gateway.charge_stored_method(&charge).await {
            Ok(result) if result.approved => TransactionOutcome::Success {
                stored_method,
                charge: result,
            },
            Ok(result) => {
                let reason = result.result_text.unwrap_or_else(|| "charge not approved".into());
                TransactionOutcome::Failure(WorkflowFailure::Charge {
                    stored_method,
                    error: PaymentError::Declined(reason),
                })
            }
            Err(error) => TransactionOutcome::Failure(WorkflowFailure::Charge { stored_method, error }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayCall, MockGateway};
    use crate::model::EntryPoint;
    use rust_decimal_macros::dec;

    fn workflow(gateway: Arc<MockGateway>) -> TransactionWorkflow {
        let config = WorkflowConfig::new(EntryPoint::new("8cfec329267").unwrap());
        TransactionWorkflow::new(gateway, config)
    }

    fn request(token: &str) -> TransactionRequest {
        TransactionRequest {
            token: token.into(),
            payer: Payer::new(4440),
            terms: ChargeTerms::new(dec!(100.00), dec!(0)).unwrap(),
            network_address: None,
        }
    }

    fn charged_reference(gateway: &MockGateway) -> Option<StoredMethodReference> {
        gateway.calls().into_iter().find_map(|call| match call {
            GatewayCall::Charge { stored_method, .. } => Some(stored_method),
            GatewayCall::Redeem { .. } => None,
        })
    }

    #[tokio::test]
    async fn test_scenario_a_success() {
        let gateway = Arc::new(MockGateway::new().with_redemption("sm_abc").with_charge_approved());
        let outcome = workflow(gateway.clone()).execute(request("tok_live_123")).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.message(), "Payment processed successfully");
        assert_eq!(outcome.stage(), WorkflowStage::ChargeSucceeded);
        assert_eq!(charged_reference(&gateway).unwrap().as_str(), "sm_abc");
        assert!(matches!(
            &gateway.calls()[1],
            GatewayCall::Charge { total_amount, .. } if *total_amount == dec!(100.00)
        ));
    }

    #[tokio::test]
    async fn test_scenario_b_redemption_failure_skips_charge() {
        let gateway = Arc::new(MockGateway::new().with_redemption_error(PaymentError::Api {
            status: 400,
            message: "token expired".into(),
        }));
        let outcome = workflow(gateway.clone()).execute(request("tok_expired")).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.message(), "Token storage failed: token expired");
        assert_eq!(outcome.stage(), WorkflowStage::TokenExchangeFailed);
        assert_eq!(gateway.redeem_count(), 1);
        assert_eq!(gateway.charge_count(), 0);
    }

    #[tokio::test]
    async fn test_scenario_c_charge_failure_keeps_stored_method() {
        let gateway = Arc::new(
            MockGateway::new()
                .with_redemption("sm_def")
                .with_charge_error(PaymentError::Declined("card declined".into())),
        );
        let outcome = workflow(gateway.clone()).execute(request("tok_live_456")).await;

        assert_eq!(outcome.message(), "Payment failed: card declined");
        assert_eq!(outcome.stage(), WorkflowStage::ChargeFailed);
        assert_eq!(outcome.stored_method().unwrap().as_str(), "sm_def");
        // One redeem, one charge, nothing compensating afterwards.
        assert_eq!(gateway.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_reference_is_failure_without_charge() {
        let gateway = Arc::new(MockGateway::new().with_redemption(""));
        let outcome = workflow(gateway.clone()).execute(request("tok_live_789")).await;

        assert!(matches!(
            outcome,
            TransactionOutcome::Failure(WorkflowFailure::MalformedRedemption(_))
        ));
        assert!(outcome.message().starts_with("Token storage failed: "));
        assert_eq!(gateway.charge_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_token_makes_no_remote_calls() {
        let gateway = Arc::new(MockGateway::new());
        let outcome = workflow(gateway.clone()).execute(request("  ")).await;

        assert_eq!(outcome.message(), "Token storage failed: temporary token is empty");
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unapproved_result_is_charge_failure() {
        struct UnapprovedGateway;

        #[async_trait::async_trait]
        impl PaymentGateway for UnapprovedGateway {
            async fn redeem_temporary_token(
                &self,
                _request: &TokenRedemptionRequest,
            ) -> crate::Result<StoredMethodReference> {
                StoredMethodReference::from_processor("sm_ghi")
            }

            async fn charge_stored_method(&self, _request: &ChargeRequest) -> crate::Result<ChargeResult> {
                Ok(ChargeResult {
                    approved: false,
                    reference_id: "txn_1".into(),
                    auth_code: None,
                    result_text: Some("insufficient funds".into()),
                    processed_at: chrono::Utc::now(),
                })
            }

            fn name(&self) -> &str {
                "Unapproved"
            }
        }

        let config = WorkflowConfig::new(EntryPoint::new("entry").unwrap());
        let outcome = TransactionWorkflow::new(Arc::new(UnapprovedGateway), config)
            .execute(request("tok"))
            .await;

        assert_eq!(outcome.message(), "Payment failed: insufficient funds");
    }

    #[tokio::test]
    async fn test_each_invocation_charges_its_own_reference() {
        let gateway = Arc::new(MockGateway::new().with_redemption("sm_one").with_redemption("sm_two"));
        let flow = workflow(gateway.clone());

        let (first, second) = tokio::join!(flow.execute(request("tok_1")), flow.execute(request("tok_2")));
        assert!(first.is_success() && second.is_success());
        assert_ne!(first.stored_method(), second.stored_method());

        // Every charge must target the reference redeemed from that invocation's own token.
        let charges: Vec<_> = gateway
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Charge {
                    stored_method,
                    redeemed_from,
                    ..
                } => Some((stored_method, redeemed_from)),
                GatewayCall::Redeem { .. } => None,
            })
            .collect();
        assert_eq!(charges.len(), 2);

        for (outcome, token) in [(&first, "tok_1"), (&second, "tok_2")] {
            let reference = outcome.stored_method().unwrap();
            let matching: Vec<_> = charges.iter().filter(|(charged, _)| charged == reference).collect();
            assert_eq!(matching.len(), 1, "{reference} charged more than once");
            assert_eq!(matching[0].1.as_deref(), Some(token));
        }
    }

    #[tokio::test]
    async fn test_network_address_is_forwarded() {
        let gateway = Arc::new(MockGateway::new());
        let mut req = request("tok");
        req.network_address = Some("198.51.100.4".parse().unwrap());
        workflow(gateway.clone()).execute(req).await;

        assert!(matches!(
            &gateway.calls()[1],
            GatewayCall::Charge { network_address, .. } if network_address == "198.51.100.4"
        ));
    }
}
