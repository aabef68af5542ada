//! # Outbound Ports (Driven Ports / SPI)
//!
//! Collaborators the pipeline depends on: the upstream node that knows
//! nonces, gas and accepts raw transactions, and the account manager that
//! unlocks keys.

use crate::domain::args::CallMsg;
use crate::domain::transaction::SignedTransaction;
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use qc_01_sign_requests::SignError;
use shared_types::{Address, U256};
use std::fmt;
use thiserror::Error;

/// Error from upstream node calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// The node could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The node answered with a JSON-RPC error
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// Gateway to an Ethereum-compatible node.
///
/// Every call may fail or hang; the pipeline bounds each one with its own
/// deadline and treats failures as final for the current attempt.
#[async_trait]
pub trait UpstreamNode: Send + Sync {
    /// Next nonce for `address`, counting pending transactions.
    async fn pending_nonce_at(&self, address: Address) -> Result<u64, UpstreamError>;

    /// Suggested gas price.
    async fn suggest_gas_price(&self) -> Result<U256, UpstreamError>;

    /// Gas needed to execute `msg`.
    async fn estimate_gas(&self, msg: CallMsg) -> Result<u64, UpstreamError>;

    /// Broadcast a signed transaction.
    async fn send_raw_transaction(&self, tx: &SignedTransaction) -> Result<(), UpstreamError>;
}

/// An account unlocked by its password.
#[derive(Clone)]
pub struct SelectedAccount {
    pub address: Address,
    pub signing_key: SigningKey,
}

impl fmt::Debug for SelectedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedAccount")
            .field("address", &self.address)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

/// Account collaborator.
pub trait AccountManager: Send + Sync {
    /// Address of the account currently selected by the user, if any.
    fn selected_account_address(&self) -> Option<Address>;

    /// Unlock `address` with `password`.
    ///
    /// # Errors
    /// * `SignError::AccountNotFound` - unknown address
    /// * `SignError::InvalidPassword` - wrong password
    fn verify_account_password(
        &self,
        address: Address,
        password: &str,
    ) -> Result<SelectedAccount, SignError>;
}
