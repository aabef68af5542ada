//! # Sign Request Errors
//!
//! Error taxonomy shared by the registry and every completion flow plugged
//! into it. Whether an error is retryable is decided by the registry's
//! [`TransientClassifier`](crate::domain::classifier::TransientClassifier),
//! not by the error itself.

use shared_bus::ErrorCode;
use shared_types::{Address, RequestId};
use thiserror::Error;

/// Errors that can resolve (or fail to resolve) a sign request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignError {
    /// Unknown or already-resolved request ID.
    #[error("request {0} doesn't exist")]
    NotFound(RequestId),

    /// Another approval currently owns the request.
    #[error("request {0} is in progress")]
    InProgress(RequestId),

    /// The request was explicitly cancelled.
    #[error("transaction has been discarded")]
    Discarded,

    /// No final outcome arrived within the wait budget.
    #[error("transaction sending timed out")]
    TimedOut,

    /// The supplied password does not unlock the account.
    #[error("could not decrypt key with given password")]
    InvalidPassword,

    /// The account to unlock is unknown to the key store.
    #[error("account not found: {0}")]
    AccountNotFound(Address),

    /// No account was selected or verified for this request.
    #[error("no account selected")]
    NoAccountSelected,

    /// The request's sender differs from the verified account.
    #[error("transaction can only be sent by its creator: expected {expected}, got {actual}")]
    InvalidSender { expected: Address, actual: Address },

    /// Malformed request arguments.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// An upstream node call failed.
    #[error("upstream {op} failed: {message}")]
    Upstream { op: &'static str, message: String },

    /// An upstream node call exceeded its deadline.
    #[error("upstream {op} exceeded deadline of {timeout_ms}ms")]
    DeadlineExceeded { op: &'static str, timeout_ms: u64 },

    /// The caller's context was cancelled during an upstream call.
    #[error("upstream {op} cancelled by caller")]
    Cancelled { op: &'static str },

    /// Transaction signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// An externally produced signature is not 65 bytes.
    #[error("signature size must be 65, got {0}")]
    InvalidSignatureSize(usize),

    /// A pre-signed transaction does not carry the next nonce.
    #[error("bad nonce. expected {expected}, got {actual}")]
    BadNonce { expected: u64, actual: u64 },
}

impl SignError {
    /// Code reported to notification observers.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidPassword => ErrorCode::Password,
            Self::TimedOut => ErrorCode::Timeout,
            Self::Discarded => ErrorCode::Discarded,
            _ => ErrorCode::Default,
        }
    }
}
