//! Mock Payment Gateway
//!
//! Scripted in-memory gateway for tests and for running the server
//! without processor credentials. Records every call it receives.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use super::PaymentGateway;
use crate::error::{PaymentError, Result};
use crate::model::{ChargeRequest, ChargeResult, StoredMethodReference, TokenRedemptionRequest};

/// A call observed by the mock
#[derive(Clone, Debug, PartialEq)]
pub enum GatewayCall {
    Redeem {
        token: String,
        customer_id: i64,
        entry_point: String,
    },
    Charge {
        stored_method: StoredMethodReference,
        /// Token this mock redeemed into `stored_method`, if it issued it
        redeemed_from: Option<String>,
        customer_id: i64,
        entry_point: String,
        network_address: String,
        service_fee: Decimal,
        total_amount: Decimal,
    },
}

enum ChargeScript {
    Approve,
    Fail(PaymentError),
}

/// Mock gateway
///
/// Scripted outcomes are consumed in order; once a script is exhausted
/// redemptions issue `sm_mock_<n>` references and charges approve.
#[derive(Default)]
pub struct MockGateway {
    redemptions: Mutex<VecDeque<Result<String>>>,
    charges: Mutex<VecDeque<ChargeScript>>,
    calls: Mutex<Vec<GatewayCall>>,
    issued: Mutex<HashMap<StoredMethodReference, String>>,
    sequence: AtomicU64,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next redemption returns this reference (may be empty)
    pub fn with_redemption(self, reference: impl Into<String>) -> Self {
        lock(&self.redemptions).push_back(Ok(reference.into()));
        self
    }

    /// Next redemption fails with this error
    pub fn with_redemption_error(self, error: PaymentError) -> Self {
        lock(&self.redemptions).push_back(Err(error));
        self
    }

    /// Next charge is approved
    pub fn with_charge_approved(self) -> Self {
        lock(&self.charges).push_back(ChargeScript::Approve);
        self
    }

    /// Next charge fails with this error
    pub fn with_charge_error(self, error: PaymentError) -> Self {
        lock(&self.charges).push_back(ChargeScript::Fail(error));
        self
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.calls).clone()
    }

    pub fn redeem_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, GatewayCall::Redeem { .. }))
            .count()
    }

    pub fn charge_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, GatewayCall::Charge { .. }))
            .count()
    }

    fn next_id(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn redeem_temporary_token(&self, request: &TokenRedemptionRequest) -> Result<StoredMethodReference> {
        lock(&self.calls).push(GatewayCall::Redeem {
            token: request.token.as_str().to_string(),
            customer_id: request.payer.customer_id,
            entry_point: request.entry_point.as_str().to_string(),
        });

        let scripted = lock(&self.redemptions).pop_front();
        let reference = match scripted {
            Some(Ok(reference)) => StoredMethodReference::from_processor(reference)?,
            Some(Err(error)) => return Err(error),
            None => StoredMethodReference::from_processor(format!("sm_mock_{}", self.next_id()))?,
        };

        lock(&self.issued).insert(reference.clone(), request.token.as_str().to_string());
        Ok(reference)
    }

    async fn charge_stored_method(&self, request: &ChargeRequest) -> Result<ChargeResult> {
        let redeemed_from = lock(&self.issued).get(&request.stored_method).cloned();
        lock(&self.calls).push(GatewayCall::Charge {
            stored_method: request.stored_method.clone(),
            redeemed_from,
            customer_id: request.payer.customer_id,
            entry_point: request.entry_point.as_str().to_string(),
            network_address: request.network_address.clone(),
            service_fee: request.terms.service_fee,
            total_amount: request.terms.total_amount,
        });

        let scripted = lock(&self.charges).pop_front();
        match scripted {
            Some(ChargeScript::Fail(error)) => Err(error),
            Some(ChargeScript::Approve) | None => Ok(ChargeResult {
                approved: true,
                reference_id: format!("txn_mock_{}", self.next_id()),
                auth_code: Some("MOCK00".into()),
                result_text: Some("Approved".into()),
                processed_at: Utc::now(),
            }),
        }
    }

    fn name(&self) -> &str {
        "MockGateway"
    }
}

// A poisoned lock only means another test thread panicked mid-push.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChargeTerms, EntryPoint, MethodKind, Payer, TemporaryToken};
    use rust_decimal_macros::dec;

    fn redemption() -> TokenRedemptionRequest {
        TokenRedemptionRequest {
            payer: Payer::new(1),
            entry_point: EntryPoint::new("entry").unwrap(),
            method: MethodKind::Card,
            token: TemporaryToken::parse("tok").unwrap(),
            source: "web".into(),
            description: "Main card".into(),
        }
    }

    #[tokio::test]
    async fn test_scripts_are_consumed_in_order() {
        let gateway = MockGateway::new()
            .with_redemption("sm_first")
            .with_redemption_error(PaymentError::Network("down".into()));

        let first = gateway.redeem_temporary_token(&redemption()).await.unwrap();
        assert_eq!(first.as_str(), "sm_first");

        assert!(gateway.redeem_temporary_token(&redemption()).await.is_err());

        let fallback = gateway.redeem_temporary_token(&redemption()).await.unwrap();
        assert!(fallback.as_str().starts_with("sm_mock_"));
        assert_eq!(gateway.redeem_count(), 3);
    }

    #[tokio::test]
    async fn test_charge_is_recorded() {
        let gateway = MockGateway::new();
        let request = ChargeRequest::for_stored_method(
            StoredMethodReference::from_processor("sm_x").unwrap(),
            Payer::new(1),
            EntryPoint::new("entry").unwrap(),
            ChargeTerms::new(dec!(5), dec!(1)).unwrap(),
            None,
        );

        let result = gateway.charge_stored_method(&request).await.unwrap();
        assert!(result.approved);
        assert_eq!(gateway.charge_count(), 1);
        assert!(matches!(
            &gateway.calls()[0],
            GatewayCall::Charge { total_amount, .. } if *total_amount == dec!(5)
        ));
    }

    #[tokio::test]
    async fn test_charge_records_originating_token() {
        let gateway = MockGateway::new().with_redemption("sm_issued");
        let reference = gateway.redeem_temporary_token(&redemption()).await.unwrap();

        let charge = |stored_method| {
            ChargeRequest::for_stored_method(
                stored_method,
                Payer::new(1),
                EntryPoint::new("entry").unwrap(),
                ChargeTerms::new(dec!(5), dec!(0)).unwrap(),
                None,
            )
        };
        gateway.charge_stored_method(&charge(reference)).await.unwrap();
        gateway
            .charge_stored_method(&charge(StoredMethodReference::from_processor("sm_foreign").unwrap()))
            .await
            .unwrap();

        let origins: Vec<_> = gateway
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Charge { redeemed_from, .. } => Some(redeemed_from),
                GatewayCall::Redeem { .. } => None,
            })
            .collect();
        assert_eq!(origins, vec![Some("tok".to_string()), None]);
    }
}
