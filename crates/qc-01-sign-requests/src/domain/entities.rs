//! # Sign Request Entities
//!
//! - `Request`: snapshot of a pending request plus a handle to its result slot
//! - `Response`: opaque payload produced by a successful completion
//! - `SignResult`: the outcome delivered to waiters

use crate::domain::errors::SignError;
use serde::{Deserialize, Serialize};
use shared_bus::SignRequestNotice;
use shared_types::{Hash, RequestId};
use std::time::Instant;
use tokio::sync::watch;

/// Opaque byte payload of a successful completion (e.g. a transaction hash).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Response(pub Vec<u8>);

impl Response {
    /// Borrow the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Interpret the payload as a 32-byte hash.
    #[must_use]
    pub fn to_hash(&self) -> Option<Hash> {
        Hash::from_slice(&self.0)
    }
}

impl From<Hash> for Response {
    fn from(hash: Hash) -> Self {
        Self(hash.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Response {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Outcome of a sign request. Immutable once produced.
pub type SignResult = Result<Response, SignError>;

/// Single-assignment result slot. `None` until a final outcome is recorded.
pub(crate) type ResultSlot = watch::Receiver<Option<SignResult>>;

/// A registered sign request.
///
/// Cloning is cheap; every clone observes the same result slot.
#[derive(Debug, Clone)]
pub struct Request {
    /// Unique request identifier.
    pub id: RequestId,
    /// Method tag (e.g. `eth_sendTransaction`).
    pub method: String,
    /// Arguments for notification and display.
    pub meta: serde_json::Value,
    /// Caller correlation tag copied into notifications.
    pub message_id: Option<String>,
    /// When the request was registered.
    pub created_at: Instant,
    pub(crate) result: ResultSlot,
}

impl Request {
    pub(crate) fn new(
        method: impl Into<String>,
        meta: serde_json::Value,
        message_id: Option<String>,
        result: ResultSlot,
    ) -> Self {
        Self {
            id: RequestId::new(),
            method: method.into(),
            meta,
            message_id,
            created_at: Instant::now(),
            result,
        }
    }

    /// The final outcome, if one has been recorded.
    #[must_use]
    pub fn outcome(&self) -> Option<SignResult> {
        self.result.borrow().clone()
    }

    /// True once a final outcome has been recorded.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.result.borrow().is_some()
    }

    /// Identity payload for bus events.
    #[must_use]
    pub fn notice(&self) -> SignRequestNotice {
        SignRequestNotice {
            id: self.id,
            method: self.method.clone(),
            meta: self.meta.clone(),
            message_id: self.message_id.clone(),
        }
    }
}
