//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Transport failure talking to the processor
    #[error("Network error: {0}")]
    Network(String),

    /// Processor rejected the request
    #[error("Processor error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Charge reached the processor but was not approved
    #[error("Declined: {0}")]
    Declined(String),

    /// Processor answered with something we could not use
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Rejected locally before any remote call
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation not offered by the configured gateway
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl PaymentError {
    /// Check if this error is retryable
    ///
    /// Only meaningful for idempotent calls such as lookups. The
    /// transaction workflow never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Network(_) => true,
            PaymentError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Detail text embedded in user-facing outcome messages
    pub fn detail(&self) -> &str {
        match self {
            PaymentError::Network(msg)
            | PaymentError::Declined(msg)
            | PaymentError::MalformedResponse(msg)
            | PaymentError::InvalidInput(msg)
            | PaymentError::Config(msg)
            | PaymentError::Unsupported(msg) => msg,
            PaymentError::Api { message, .. } => message,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            PaymentError::Network(_) => "The payment processor could not be reached. Please try again.",
            PaymentError::Api { .. } => "The payment processor rejected the request.",
            PaymentError::Declined(_) => "The payment was declined.",
            PaymentError::InvalidInput(_) => "The payment details were incomplete.",
            PaymentError::Config(_) => "Service configuration error.",
            _ => "An error occurred processing your request.",
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Network(err.to_string())
    }
}
