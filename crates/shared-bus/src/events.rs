//! # Sign Request Events
//!
//! Lifecycle notifications emitted by the pending-request registry.

use serde::{Deserialize, Serialize};
use shared_types::RequestId;

/// Identity and display payload of the request an event refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignRequestNotice {
    /// Request identifier handed to the approver.
    pub id: RequestId,
    /// Method tag (e.g. `eth_sendTransaction`).
    pub method: String,
    /// Opaque request payload for display.
    pub meta: serde_json::Value,
    /// Caller-supplied correlation tag (e.g. a chat message id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Outcome code attached to `Resolved` and `Failed` events.
///
/// Serialized as the string codes approval UIs match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "0")]
    NoError,
    /// Any error without a dedicated code.
    #[serde(rename = "1")]
    Default,
    #[serde(rename = "2")]
    Password,
    #[serde(rename = "3")]
    Timeout,
    #[serde(rename = "4")]
    Discarded,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoError => "0",
            Self::Default => "1",
            Self::Password => "2",
            Self::Timeout => "3",
            Self::Discarded => "4",
        }
    }
}

/// All events that can be published to the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignRequestEvent {
    /// A request was registered and awaits approval.
    Enqueued(SignRequestNotice),

    /// A request reached its final outcome and left the registry.
    Resolved {
        notice: SignRequestNotice,
        /// `None` on success.
        error: Option<String>,
        error_code: ErrorCode,
    },

    /// An approval attempt failed with a retryable error.
    /// The request is still pending.
    Failed {
        notice: SignRequestNotice,
        error: String,
        error_code: ErrorCode,
    },
}

impl SignRequestEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::Enqueued(_) => EventTopic::Enqueued,
            Self::Resolved { .. } => EventTopic::Resolved,
            Self::Failed { .. } => EventTopic::Failed,
        }
    }

    /// The request this event refers to.
    #[must_use]
    pub fn notice(&self) -> &SignRequestNotice {
        match self {
            Self::Enqueued(notice)
            | Self::Resolved { notice, .. }
            | Self::Failed { notice, .. } => notice,
        }
    }

    /// Convenience accessor for the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.notice().id
    }

    /// Outcome code. `None` for `Enqueued`.
    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Enqueued(_) => None,
            Self::Resolved { error_code, .. } | Self::Failed { error_code, .. } => {
                Some(*error_code)
            }
        }
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// New request registered.
    Enqueued,
    /// Final outcome (success, permanent failure, discard, timeout).
    Resolved,
    /// Transient approval failure.
    Failed,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Methods to include. Empty means all methods.
    pub methods: Vec<String>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            methods: Vec::new(),
        }
    }

    /// Create a filter for requests of specific methods.
    #[must_use]
    pub fn methods(methods: Vec<String>) -> Self {
        Self {
            topics: Vec::new(),
            methods,
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &SignRequestEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let method_match =
            self.methods.is_empty() || self.methods.contains(&event.notice().method);

        topic_match && method_match
    }
}
