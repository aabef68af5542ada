//! # Transient Error Classification
//!
//! A transient outcome leaves the request pending so the approver can retry
//! with corrected input; every other outcome is final.

use crate::domain::errors::SignError;
use std::sync::Arc;

/// Decides whether a completion error is retryable.
pub type TransientClassifier = Arc<dyn Fn(&SignError) -> bool + Send + Sync>;

/// Credential and account-selection problems are transient.
/// Network, argument and signing failures are not.
#[must_use]
pub fn default_transient_classifier() -> TransientClassifier {
    Arc::new(is_credential_error)
}

fn is_credential_error(err: &SignError) -> bool {
    matches!(
        err,
        SignError::InvalidPassword
            | SignError::AccountNotFound(_)
            | SignError::NoAccountSelected
            | SignError::InvalidSender { .. }
    )
}

/// Classifier under which every error is final.
#[must_use]
pub fn never_transient() -> TransientClassifier {
    Arc::new(|_| false)
}
