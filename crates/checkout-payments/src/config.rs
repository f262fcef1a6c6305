//! Configuration
//!
//! Everything the gateway and workflow need is passed in explicitly at
//! construction. `from_env` constructors exist for the server binary.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{PaymentError, Result};
use crate::model::{ChargeTerms, EntryPoint, Payer};

/// Processor environment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Sandbox,
    Production,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => "https://api-sandbox.payabli.com/api",
            Environment::Production => "https://api-payabli.com/api",
        }
    }
}

impl FromStr for Environment {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sandbox" => Ok(Environment::Sandbox),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(PaymentError::Config(format!("unknown environment '{other}'"))),
        }
    }
}

/// HTTP gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// API key sent as the `requestToken` header
    pub api_key: String,

    /// Base URL including the `/api` prefix
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>, environment: Environment) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: environment.base_url().to_string(),
            timeout_secs: 30,
        }
    }

    /// Point at a different base URL (local mocks, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = required(&lookup, "PAYABLI_KEY")?;
        let environment = match lookup("PAYABLI_ENVIRONMENT") {
            Some(raw) => raw.parse()?,
            None => Environment::default(),
        };

        let mut config = Self::new(api_key, environment);
        if let Some(base_url) = lookup("PAYABLI_BASE_URL") {
            config = config.with_base_url(base_url);
        }
        if let Some(raw) = lookup("PAYABLI_TIMEOUT_SECS") {
            config.timeout_secs = parse(&raw, "PAYABLI_TIMEOUT_SECS")?;
        }
        Ok(config)
    }
}

/// Fixed workflow parameters
#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub entry_point: EntryPoint,

    /// Source tag recorded on the stored method
    pub source: String,

    /// Human-readable description of the stored method
    pub method_description: String,
}

impl WorkflowConfig {
    pub fn new(entry_point: EntryPoint) -> Self {
        Self {
            entry_point,
            source: "web".into(),
            method_description: "Main card".into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let entry_point = EntryPoint::new(required(&lookup, "PAYABLI_ENTRY")?)?;
        Ok(Self::new(entry_point))
    }
}

/// Who gets charged and how much, for every transaction the server runs
#[derive(Clone, Copy, Debug)]
pub struct ChargeProfile {
    pub payer: Payer,
    pub terms: ChargeTerms,
}

impl ChargeProfile {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let customer_id: i64 = parse(&required(&lookup, "PAYABLI_CUSTOMER_ID")?, "PAYABLI_CUSTOMER_ID")?;
        let total: Decimal = parse(&required(&lookup, "CHECKOUT_TOTAL_AMOUNT")?, "CHECKOUT_TOTAL_AMOUNT")?;
        let fee = match lookup("CHECKOUT_SERVICE_FEE") {
            Some(raw) => parse(&raw, "CHECKOUT_SERVICE_FEE")?,
            None => Decimal::ZERO,
        };

        let terms = ChargeTerms::new(total, fee).map_err(|e| PaymentError::Config(e.detail().to_string()))?;
        Ok(Self {
            payer: Payer::new(customer_id),
            terms,
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| PaymentError::Config(format!("{key} not set")))
}

fn parse<T: FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| PaymentError::Config(format!("{key} has invalid value '{raw}'")))
}
