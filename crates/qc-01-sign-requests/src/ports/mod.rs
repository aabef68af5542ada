//! # Ports Layer
//!
//! - **Inbound**: the completion callback plugged into each request
//! - **Outbound**: notifications go through `shared_bus::EventPublisher`

pub mod inbound;
