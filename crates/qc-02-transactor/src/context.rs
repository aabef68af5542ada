//! # Call Context
//!
//! Caller cancellation threaded into every upstream call made on the
//! caller's behalf. Cancelling aborts the in-flight call only; it never
//! resolves the sign request by itself.

use qc_01_sign_requests::SignError;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Cancellation scope of one `send_transaction` call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancelled: Option<watch::Receiver<bool>>,
    message_id: Option<String>,
}

/// Cancels the paired [`CallContext`]. Dropping it does not cancel.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl CallContext {
    /// A context that is never cancelled.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context cancelled through the returned handle.
    #[must_use]
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        (
            Self {
                cancelled: Some(receiver),
                message_id: None,
            },
            CancelHandle { sender },
        )
    }

    /// Tag requests queued under this context with the caller's message id.
    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .is_some_and(|receiver| *receiver.borrow())
    }

    /// Resolves once cancelled. Never resolves for a background context.
    pub async fn cancelled(&self) {
        if let Some(receiver) = &self.cancelled {
            let mut receiver = receiver.clone();
            if receiver.wait_for(|cancelled| *cancelled).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }

    /// Run one upstream call under `deadline`, racing caller cancellation.
    pub async fn call<T, E, F>(
        &self,
        op: &'static str,
        deadline: Duration,
        call: F,
    ) -> Result<T, SignError>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        if self.is_cancelled() {
            return Err(SignError::Cancelled { op });
        }

        tokio::select! {
            biased;
            _ = self.cancelled() => Err(SignError::Cancelled { op }),
            outcome = tokio::time::timeout(deadline, call) => match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(SignError::Upstream {
                    op,
                    message: err.to_string(),
                }),
                Err(_) => Err(SignError::DeadlineExceeded {
                    op,
                    timeout_ms: deadline.as_millis() as u64,
                }),
            },
        }
    }
}
