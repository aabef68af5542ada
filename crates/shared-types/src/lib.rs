//! # Shared Types Crate
//!
//! Primitives shared by every crate of the wallet workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `Address`, `Hash` and `RequestId` are defined
//!   once here and re-used by the registry, the transactor and the bus.
//! - **Display-Friendly Serialization**: addresses and hashes serialize as
//!   `0x`-prefixed hex so request metadata can be rendered by an approval UI.

pub mod crypto;
pub mod entities;

pub use crypto::{address_from_pubkey, keccak256};
pub use entities::*;
