//! # Shared Bus - Sign Request Notifications
//!
//! Fire-and-forget delivery of sign-request lifecycle events to observers
//! (approval UIs, signal forwarders, audit logs).
//!
//! ```text
//! ┌──────────────────┐                    ┌──────────────┐
//! │ PendingRequests  │                    │ Approval UI  │
//! │                  │    publish()       │              │
//! │                  │ ──────┐            │              │
//! └──────────────────┘       │            └──────────────┘
//!                            ▼                    ↑
//!                      ┌──────────────┐          │
//!                      │  Event Bus   │          │
//!                      │              │ ─────────┘
//!                      └──────────────┘  subscribe()
//! ```
//!
//! Publishers never block on delivery and never observe whether anyone
//! received an event. Slow subscribers lag and lose events rather than
//! applying backpressure to the registry.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{ErrorCode, EventFilter, EventTopic, SignRequestEvent, SignRequestNotice};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
