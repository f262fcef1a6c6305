//! Transaction Domain Types
//!
//! Request-scoped values passed between the workflow and a gateway.
//! Nothing here is persisted; the processor is the system of record.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Address sent with a charge when the caller's address is unknown
pub const UNKNOWN_NETWORK_ADDRESS: &str = "255.255.255.255";

/// Single-use token produced by the client-side payment widget
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryToken(String);

impl TemporaryToken {
    /// Parse a token, rejecting empty or whitespace-only input
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(PaymentError::InvalidInput("temporary token is empty".into()));
        }
        // Opaque to us; sent exactly as the widget produced it.
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix safe to put in logs
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(6).collect();
        format!("{prefix}…")
    }
}

// Keep full tokens out of debug output.
impl std::fmt::Debug for TemporaryToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TemporaryToken").field(&self.redacted()).finish()
    }
}

/// Permanent stored-method identifier issued by the processor
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StoredMethodReference(String);

impl StoredMethodReference {
    /// Wrap a reference returned by the processor
    ///
    /// An empty reference means the redemption response was unusable.
    pub fn from_processor(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(PaymentError::MalformedResponse(
                "token storage response did not include a stored method reference".into(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StoredMethodReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Merchant paypoint identifier scoping every call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint(String);

impl EntryPoint {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(PaymentError::Config("entry point is empty".into()));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Customer being charged
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub customer_id: i64,
}

impl Payer {
    pub fn new(customer_id: i64) -> Self {
        Self { customer_id }
    }
}

/// Fee terms for a charge, in the processor's currency unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeTerms {
    pub service_fee: Decimal,
    pub total_amount: Decimal,
}

impl ChargeTerms {
    pub fn new(total_amount: Decimal, service_fee: Decimal) -> Result<Self> {
        if total_amount.is_sign_negative() {
            return Err(PaymentError::InvalidInput(format!(
                "total amount must not be negative, got {total_amount}"
            )));
        }
        if service_fee.is_sign_negative() {
            return Err(PaymentError::InvalidInput(format!(
                "service fee must not be negative, got {service_fee}"
            )));
        }
        if service_fee > total_amount {
            return Err(PaymentError::InvalidInput(format!(
                "service fee {service_fee} exceeds total amount {total_amount}"
            )));
        }
        Ok(Self { service_fee, total_amount })
    }
}

/// Payment method kind; this workflow only handles cards
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    #[default]
    Card,
}

impl MethodKind {
    pub fn as_str(&self) -> &str {
        match self {
            MethodKind::Card => "card",
        }
    }
}

/// Who initiated a stored-method charge
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Initiator {
    #[default]
    Payor,
}

impl Initiator {
    pub fn as_str(&self) -> &str {
        match self {
            Initiator::Payor => "payor",
        }
    }
}

/// Stored-credential usage classification
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageType {
    #[default]
    Unscheduled,
}

impl UsageType {
    pub fn as_str(&self) -> &str {
        match self {
            UsageType::Unscheduled => "unscheduled",
        }
    }
}

/// Input to the token-exchange step
#[derive(Clone, Debug)]
pub struct TokenRedemptionRequest {
    pub payer: Payer,
    pub entry_point: EntryPoint,
    pub method: MethodKind,
    pub token: TemporaryToken,
    pub source: String,
    pub description: String,
}

/// Input to the charge step
///
/// Only constructible from a [`StoredMethodReference`], so a charge can
/// never be aimed at a raw temporary token.
#[derive(Clone, Debug)]
pub struct ChargeRequest {
    pub payer: Payer,
    pub entry_point: EntryPoint,
    pub network_address: String,
    pub terms: ChargeTerms,
    pub method: MethodKind,
    pub stored_method: StoredMethodReference,
    pub initiator: Initiator,
    pub usage: UsageType,
}

impl ChargeRequest {
    pub fn for_stored_method(
        stored_method: StoredMethodReference,
        payer: Payer,
        entry_point: EntryPoint,
        terms: ChargeTerms,
        network_address: Option<IpAddr>,
    ) -> Self {
        Self {
            payer,
            entry_point,
            network_address: network_address
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| UNKNOWN_NETWORK_ADDRESS.to_string()),
            terms,
            method: MethodKind::Card,
            stored_method,
            initiator: Initiator::Payor,
            usage: UsageType::Unscheduled,
        }
    }
}

/// Processor confirmation for a charge
#[derive(Clone, Debug)]
pub struct ChargeResult {
    /// Whether the processor approved the charge
    pub approved: bool,

    /// Processor-assigned transaction reference
    pub reference_id: String,

    pub auth_code: Option<String>,

    /// Processor result text, e.g. "Approved" or a decline reason
    pub result_text: Option<String>,

    pub processed_at: DateTime<Utc>,
}
