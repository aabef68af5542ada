//! # Ports Layer
//!
//! - **Inbound**: the transactor plugs into `qc_01_sign_requests::CompleteFunc`
//! - **Outbound**: upstream node and account manager

pub mod outbound;
