//! # Transactor Configuration
//!
//! All timeouts and limits have defaults with environment overrides:
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `QC_NETWORK_ID` | `network_id` | 1 |
//! | `QC_RPC_CALL_TIMEOUT_MS` | `rpc_call_timeout` | 60 s |
//! | `QC_SEND_TX_TIMEOUT_MS` | `send_timeout` | 300 s |
//! | `QC_MIN_GAS_LIMIT` | `min_gas_limit` | 90 000 |

use crate::domain::transaction::MAX_CHAIN_ID;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default chain ID (mainnet).
pub const DEFAULT_NETWORK_ID: u64 = 1;

/// Deadline of a single upstream call.
pub const DEFAULT_RPC_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// How long `send_transaction` waits for approval.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(300);

/// Floor applied to gas estimates.
pub const DEFAULT_MIN_GAS_LIMIT: u64 = 90_000;

/// Method tag of queued transactions.
pub const SEND_TRANSACTION_METHOD: &str = "eth_sendTransaction";

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Chain ID zero cannot be used for replay protection.
    #[error("network id must be non-zero")]
    ZeroNetworkId,

    /// Chain ID too large to encode in an EIP-155 `v`.
    #[error("network id {0} exceeds {max}", max = MAX_CHAIN_ID)]
    NetworkIdTooLarge(u64),

    /// A timeout is zero.
    #[error("{0} must be non-zero")]
    ZeroTimeout(&'static str),
}

/// Transactor configuration. Immutable once the transactor is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactorConfig {
    /// Chain ID used for EIP-155 signing.
    pub network_id: u64,
    /// Deadline of each upstream call.
    pub rpc_call_timeout: Duration,
    /// Overall wait for approval.
    pub send_timeout: Duration,
    /// Minimum gas limit when the limit is estimated.
    pub min_gas_limit: u64,
    /// Method tag attached to queued requests.
    pub method: String,
}

impl Default for TransactorConfig {
    fn default() -> Self {
        Self {
            network_id: DEFAULT_NETWORK_ID,
            rpc_call_timeout: DEFAULT_RPC_CALL_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            min_gas_limit: DEFAULT_MIN_GAS_LIMIT,
            method: SEND_TRANSACTION_METHOD.to_string(),
        }
    }
}

impl TransactorConfig {
    /// Create configuration for a chain with default timeouts.
    #[must_use]
    pub fn for_network(network_id: u64) -> Self {
        Self {
            network_id,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Missing or unparsable values fall back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let defaults = Self::default();

        Self {
            network_id: parse("QC_NETWORK_ID").unwrap_or(defaults.network_id),
            rpc_call_timeout: parse("QC_RPC_CALL_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.rpc_call_timeout),
            send_timeout: parse("QC_SEND_TX_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.send_timeout),
            min_gas_limit: parse("QC_MIN_GAS_LIMIT").unwrap_or(defaults.min_gas_limit),
            method: defaults.method,
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network_id == 0 {
            return Err(ConfigError::ZeroNetworkId);
        }
        if self.network_id > MAX_CHAIN_ID {
            return Err(ConfigError::NetworkIdTooLarge(self.network_id));
        }
        if self.rpc_call_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("rpc_call_timeout"));
        }
        if self.send_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("send_timeout"));
        }
        Ok(())
    }
}
