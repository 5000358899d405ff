//! Error types for Palisade

use thiserror::Error;

/// Core errors that can occur in Palisade
#[derive(Debug, Error)]
pub enum Error {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Ledger gateway transport and query errors
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Gateway unreachable at {url}")]
    Unreachable { url: String },

    #[error("Gateway returned error: {message}")]
    ApiError { message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Gateway request timed out after {secs}s")]
    RequestTimeout { secs: u64 },
}

/// Validation errors for user-entered amounts.
///
/// These are surfaced synchronously to the form and never reach the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Amount is empty or not a number")]
    EmptyOrNan,

    #[error("Amount must be greater than zero")]
    NonPositive,

    #[error("Amount cannot exceed {max}")]
    ExceedsMaximum { max: u64 },
}

/// Wallet signing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignError {
    #[error("Transaction rejected")]
    Rejected,

    #[error("Wallet not connected")]
    NotConnected,
}

/// Terminal and submission failures of a transaction workflow
#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    #[error("Another operation is already in progress")]
    Busy,

    #[error("Operation can no longer be cancelled")]
    NotCancellable,

    #[error("Transaction rejected")]
    SignatureRejected,

    #[error("{reason}")]
    Reverted { reason: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Wallet session errors
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Invalid wallet address: {reason}")]
    InvalidAddress { reason: String },

    #[error("Wallet not connected")]
    NotConnected,
}

/// Result type alias for Palisade operations
pub type Result<T> = std::result::Result<T, Error>;

impl AmountError {
    /// Get a form-field error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyOrNan => "empty_or_nan",
            Self::NonPositive => "non_positive",
            Self::ExceedsMaximum { .. } => "exceeds_maximum",
        }
    }
}

impl From<SignError> for WorkflowError {
    fn from(err: SignError) -> Self {
        match err {
            SignError::Rejected => Self::SignatureRejected,
            SignError::NotConnected => Self::Gateway(GatewayError::ApiError {
                message: "wallet not connected".to_string(),
            }),
        }
    }
}
