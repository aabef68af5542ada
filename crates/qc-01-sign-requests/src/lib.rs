//! # Sign Requests Subsystem (QC-01)
//!
//! Registry of sign requests that block a caller until an approver supplies
//! credentials through a separate channel.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): `Request`, `Response`, `SignError`, transient classification
//! - **Ports Layer** (`ports/`): the `CompleteFunc` callback run on approval
//! - **Service Layer** (`service.rs`): the `PendingRequests` registry
//!
//! ## Outcome Semantics
//!
//! | Outcome | Approver | Waiter | Request |
//! |---------|----------|--------|---------|
//! | Success | receives it | receives it | removed |
//! | Transient error | receives it | keeps waiting | stays pending |
//! | Permanent error | receives it | receives it | removed |
//! | Discard / timeout | - | receives it | removed |

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use config::PendingRequestsConfig;
pub use domain::classifier::{default_transient_classifier, never_transient, TransientClassifier};
pub use domain::entities::{Request, Response, SignResult};
pub use domain::errors::SignError;
pub use ports::inbound::{CompleteFunc, FnCompleteFunc};
pub use service::{PendingRequests, RegistryStats, StatsSnapshot};
