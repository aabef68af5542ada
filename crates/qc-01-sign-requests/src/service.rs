//! # Pending Requests Registry
//!
//! Bridges a caller blocked in [`PendingRequests::wait`] and an approver
//! that may retry [`PendingRequests::approve`] any number of times.
//!
//! Flow:
//! 1. The caller registers a completion with `add()` and awaits `wait()`
//! 2. The approver calls `approve()` with a password and a `verify` function
//! 3. On successful verification the completion runs outside the registry lock
//! 4. A transient outcome is returned to the approver only; the request stays
//!    pending and `wait()` keeps waiting
//! 5. A final outcome removes the request and fills its result slot once
//!
//! `discard()` and the `wait()` timeout always resolve the request finally.

use crate::config::PendingRequestsConfig;
use crate::domain::classifier::{default_transient_classifier, TransientClassifier};
use crate::domain::entities::{Request, SignResult};
use crate::domain::errors::SignError;
use crate::ports::inbound::CompleteFunc;
use parking_lot::Mutex;
use serde::Serialize;
use shared_bus::{ErrorCode, EventPublisher, SignRequestEvent};
use shared_types::RequestId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Registry bookkeeping for one request.
struct Entry<A: Send + 'static> {
    request: Request,
    /// Set while exactly one `approve` call owns the request.
    locked: bool,
    complete_func: Arc<dyn CompleteFunc<A>>,
    slot: watch::Sender<Option<SignResult>>,
}

/// Statistics for the registry.
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// Total requests registered
    pub total_added: AtomicU64,
    /// Total requests resolved by their completion (success or permanent error)
    pub total_completed: AtomicU64,
    /// Total approval attempts that failed transiently
    pub total_transient_failures: AtomicU64,
    /// Total requests discarded
    pub total_discarded: AtomicU64,
    /// Total requests forced to time out by `wait`
    pub total_timeouts: AtomicU64,
}

/// Point-in-time copy of [`RegistryStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub total_added: u64,
    pub total_completed: u64,
    pub total_transient_failures: u64,
    pub total_discarded: u64,
    pub total_timeouts: u64,
}

impl RegistryStats {
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_added: self.total_added.load(Ordering::Relaxed),
            total_completed: self.total_completed.load(Ordering::Relaxed),
            total_transient_failures: self.total_transient_failures.load(Ordering::Relaxed),
            total_discarded: self.total_discarded.load(Ordering::Relaxed),
            total_timeouts: self.total_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Registry of sign requests awaiting approval.
///
/// `A` is the verified account type passed from `verify` to the completion.
pub struct PendingRequests<A: Send + 'static> {
    /// Map of request ID to entry. Never held across an await.
    requests: Mutex<HashMap<RequestId, Entry<A>>>,
    config: PendingRequestsConfig,
    classifier: TransientClassifier,
    publisher: Option<Arc<dyn EventPublisher>>,
    stats: RegistryStats,
}

impl<A: Send + 'static> PendingRequests<A> {
    /// Create a registry with default configuration and classification.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PendingRequestsConfig::default())
    }

    #[must_use]
    pub fn with_config(config: PendingRequestsConfig) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            config,
            classifier: default_transient_classifier(),
            publisher: None,
            stats: RegistryStats::default(),
        }
    }

    /// Replace the transient error classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: TransientClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Publish lifecycle events to the given bus.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Register a new request. Never blocks.
    pub fn add(
        &self,
        method: impl Into<String>,
        meta: serde_json::Value,
        complete_func: Arc<dyn CompleteFunc<A>>,
    ) -> Request {
        self.add_with_message_id(method, meta, None, complete_func)
    }

    /// Register a new request tagged with the caller's message id.
    pub fn add_with_message_id(
        &self,
        method: impl Into<String>,
        meta: serde_json::Value,
        message_id: Option<String>,
        complete_func: Arc<dyn CompleteFunc<A>>,
    ) -> Request {
        let (slot, result) = watch::channel(None);
        let request = Request::new(method, meta, message_id, result);

        self.requests.lock().insert(
            request.id,
            Entry {
                request: request.clone(),
                locked: false,
                complete_func,
                slot,
            },
        );
        self.stats.total_added.fetch_add(1, Ordering::Relaxed);

        info!(id = %request.id, method = %request.method, "Sign request queued");
        self.notify(SignRequestEvent::Enqueued(request.notice()));

        request
    }

    /// Look up a pending request.
    pub fn get(&self, id: RequestId) -> Result<Request, SignError> {
        self.requests
            .lock()
            .get(&id)
            .map(|entry| entry.request.clone())
            .ok_or(SignError::NotFound(id))
    }

    /// Any pending request, oldest first. No side effects.
    #[must_use]
    pub fn first(&self) -> Option<Request> {
        self.requests
            .lock()
            .values()
            .min_by_key(|entry| entry.request.created_at)
            .map(|entry| entry.request.clone())
    }

    /// Number of pending requests.
    #[must_use]
    pub fn count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Check if a request is pending.
    #[must_use]
    pub fn has(&self, id: RequestId) -> bool {
        self.requests.lock().contains_key(&id)
    }

    /// Approve a request.
    ///
    /// The outcome is always returned to this caller. Only final outcomes
    /// reach waiters; a transient one leaves the request pending for a retry.
    pub async fn approve<F>(&self, id: RequestId, password: &str, verify: F) -> SignResult
    where
        F: FnOnce(&str) -> Result<A, SignError>,
    {
        let complete_func = {
            let mut requests = self.requests.lock();
            let Some(entry) = requests.get_mut(&id) else {
                return Err(SignError::NotFound(id));
            };
            if entry.locked {
                return Err(SignError::InProgress(id));
            }
            entry.locked = true;
            Arc::clone(&entry.complete_func)
        };

        let mut guard = ApprovalGuard {
            registry: self,
            id,
            armed: true,
        };

        debug!(id = %id, "Approving sign request");
        let outcome = match verify(password) {
            Ok(account) => complete_func.complete(account, password).await,
            Err(err) => {
                debug!(id = %id, error = %err, "Account verification failed");
                Err(err)
            }
        };

        guard.armed = false;
        self.complete(id, outcome.clone(), false);
        outcome
    }

    /// Discard a request. Always final.
    pub fn discard(&self, id: RequestId) -> Result<(), SignError> {
        if self.complete(id, Err(SignError::Discarded), true) {
            Ok(())
        } else {
            Err(SignError::NotFound(id))
        }
    }

    /// Wait for the final outcome of a pending request.
    ///
    /// `None` uses the configured default timeout.
    pub async fn wait(&self, id: RequestId, timeout: Option<Duration>) -> SignResult {
        let request = self.get(id)?;
        self.wait_request(&request, timeout).await
    }

    /// Wait on a request handle returned by [`add`](Self::add).
    ///
    /// Unlike [`wait`](Self::wait) this still observes the outcome when the
    /// request was resolved before the call.
    pub async fn wait_request(&self, request: &Request, timeout: Option<Duration>) -> SignResult {
        let timeout = timeout.unwrap_or(self.config.default_wait_timeout);
        let mut slot = request.result.clone();

        let resolved = match tokio::time::timeout(timeout, slot.wait_for(Option::is_some)).await {
            Ok(Ok(value)) => value.clone(),
            _ => None,
        };
        if let Some(result) = resolved {
            return result;
        }

        warn!(
            id = %request.id,
            method = %request.method,
            timeout_ms = timeout.as_millis() as u64,
            "Sign request timed out"
        );
        self.complete(request.id, Err(SignError::TimedOut), true);

        // A concurrent final outcome may have won the race.
        let result = slot.borrow().clone();
        result.unwrap_or(Err(SignError::TimedOut))
    }

    /// Get statistics
    #[must_use]
    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    #[must_use]
    pub fn config(&self) -> &PendingRequestsConfig {
        &self.config
    }

    /// Record an outcome. Returns false if the request is not pending.
    fn complete(&self, id: RequestId, outcome: SignResult, force_final: bool) -> bool {
        let transient = !force_final
            && outcome
                .as_ref()
                .err()
                .is_some_and(|err| (self.classifier)(err));

        let notice = {
            let mut requests = self.requests.lock();
            if transient {
                let Some(entry) = requests.get_mut(&id) else {
                    debug!(id = %id, "Outcome for unknown or resolved request");
                    return false;
                };
                entry.locked = false;
                entry.request.notice()
            } else {
                let Some(entry) = requests.remove(&id) else {
                    debug!(id = %id, "Outcome for unknown or resolved request");
                    return false;
                };
                entry.slot.send_if_modified(|slot| {
                    if slot.is_some() {
                        return false;
                    }
                    *slot = Some(outcome.clone());
                    true
                });
                entry.request.notice()
            }
        };

        let event = match &outcome {
            Err(err) if transient => {
                self.stats
                    .total_transient_failures
                    .fetch_add(1, Ordering::Relaxed);
                warn!(id = %id, error = %err, "Sign request failed, awaiting retry");
                SignRequestEvent::Failed {
                    notice,
                    error: err.to_string(),
                    error_code: err.error_code(),
                }
            }
            Err(err) => {
                let counter = match err {
                    SignError::Discarded => &self.stats.total_discarded,
                    SignError::TimedOut => &self.stats.total_timeouts,
                    _ => &self.stats.total_completed,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                info!(id = %id, error = %err, "Sign request resolved with error");
                SignRequestEvent::Resolved {
                    notice,
                    error: Some(err.to_string()),
                    error_code: err.error_code(),
                }
            }
            Ok(_) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                info!(id = %id, "Sign request completed");
                SignRequestEvent::Resolved {
                    notice,
                    error: None,
                    error_code: ErrorCode::NoError,
                }
            }
        };
        self.notify(event);

        true
    }

    /// Fire-and-forget publication on the current runtime.
    fn notify(&self, event: SignRequestEvent) {
        let Some(publisher) = self.publisher.clone() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    publisher.publish(event).await;
                });
            }
            Err(_) => {
                debug!(id = %event.request_id(), "No runtime, dropping notification");
            }
        }
    }
}

impl<A: Send + 'static> Default for PendingRequests<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the approval lock if `approve` unwinds or is dropped mid-flight.
struct ApprovalGuard<'a, A: Send + 'static> {
    registry: &'a PendingRequests<A>,
    id: RequestId,
    armed: bool,
}

impl<A: Send + 'static> Drop for ApprovalGuard<'_, A> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(entry) = self.registry.requests.lock().get_mut(&self.id) {
            entry.locked = false;
            debug!(id = %self.id, "Approval aborted, request unlocked");
        }
    }
}
