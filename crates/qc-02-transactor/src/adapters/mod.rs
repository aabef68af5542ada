//! # Adapters Layer
//!
//! Concrete implementations of the outbound ports.

pub mod keystore;

pub use keystore::InMemoryKeyStore;
