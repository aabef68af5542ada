//! # Domain Layer
//!
//! Request and outcome types, the error taxonomy and its classification.
//! No I/O.

pub mod classifier;
pub mod entities;
pub mod errors;
