//! # Domain Layer
//!
//! Address locking, transaction arguments, encoding and signing. No I/O.

pub mod addr_locker;
pub mod args;
pub mod transaction;
