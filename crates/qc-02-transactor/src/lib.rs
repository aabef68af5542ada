//! # Transactor Subsystem (QC-02)
//!
//! Turns `eth_sendTransaction` calls into correctly-nonced, EIP-155 signed,
//! broadcast transactions once an approver unlocks the sending account.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): address locking, arguments, RLP and signing
//! - **Ports Layer** (`ports/`): `UpstreamNode` and `AccountManager`
//! - **Adapters Layer** (`adapters/`): `InMemoryKeyStore`
//! - **Service Layer** (`service.rs`): the `Transactor`
//!
//! ## Nonce Assignment
//!
//! All nonce-affecting work for an address runs under that address's lock.
//! The nonce is `max(local, upstream pending)` and the local value advances
//! only after a successful broadcast, so failed attempts never burn a nonce.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod context;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::InMemoryKeyStore;
pub use config::{ConfigError, TransactorConfig};
pub use context::{CallContext, CancelHandle};
pub use domain::addr_locker::{AddrGuard, AddrLocker};
pub use domain::args::{Bytes, CallMsg, SendTxArgs};
pub use domain::transaction::{
    contract_address, SignedTransaction, TransactionRequest, MAX_CHAIN_ID, SIGNATURE_LEN,
};
pub use ports::outbound::{AccountManager, SelectedAccount, UpstreamError, UpstreamNode};
pub use service::{validate_account, Transactor};
