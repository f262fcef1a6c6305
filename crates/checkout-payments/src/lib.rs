//! # checkout-payments
//!
//! Tokenized card payments against the Payabli API.
//!
//! ## Two-step transaction
//!
//! The browser never sends card data to this service. A client-side widget
//! captures the card and hands us a short-lived temporary token; the
//! workflow turns that into a charge:
//!
//! ```text
//! ┌──────────┐ temp token ┌──────────────────┐ 1. TokenStorage/add ┌───────────┐
//! │  Widget  │───────────▶│ TransactionWork- │────────────────────▶│           │
//! │ (browser)│            │ flow             │◀── stored method ───│  Payabli  │
//! └──────────┘            │                  │ 2. MoneyIn/getpaid  │           │
//!       ▲                 │                  │────────────────────▶│           │
//!       └──── outcome ────│                  │◀──── confirmation ──│           │
//!                         └──────────────────┘                     └───────────┘
//! ```
//!
//! The processor calls sit behind [`PaymentGateway`], so tests and local
//! runs can use [`MockGateway`] instead of the network.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use checkout_payments::{
//!     ChargeProfile, PayabliGateway, TransactionRequest, TransactionWorkflow, WorkflowConfig,
//! };
//!
//! let gateway = Arc::new(PayabliGateway::from_env()?);
//! let workflow = TransactionWorkflow::new(gateway, WorkflowConfig::from_env()?);
//! let profile = ChargeProfile::from_env()?;
//!
//! let outcome = workflow.execute(TransactionRequest {
//!     token: "tok_live_123".into(),
//!     payer: profile.payer,
//!     terms: profile.terms,
//!     network_address: None,
//! }).await;
//!
//! println!("{}", outcome.message());
//! ```

pub mod config;
pub mod gateway;
pub mod model;
pub mod workflow;
mod error;

pub use config::{ChargeProfile, Environment, GatewayConfig, WorkflowConfig};
pub use error::{PaymentError, Result};
pub use gateway::{GatewayCall, MockGateway, PayabliGateway, PaymentGateway};
pub use model::{
    ChargeRequest, ChargeResult, ChargeTerms, EntryPoint, Payer, StoredMethodReference, TemporaryToken,
    TokenRedemptionRequest, UNKNOWN_NETWORK_ADDRESS,
};
pub use workflow::{
    TransactionOutcome, TransactionRequest, TransactionWorkflow, WorkflowFailure, WorkflowStage, SUCCESS_MESSAGE,
};
