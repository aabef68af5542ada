//! # Inbound Ports
//!
//! The completion callback a request carries. It runs once per approval
//! attempt, after the approver's credentials have been verified.

use crate::domain::entities::SignResult;
use async_trait::async_trait;
use std::future::Future;

/// Work performed when a request is approved.
///
/// `A` is the verified account handed over by the approver's `verify`
/// function. The password is passed through for flows that must re-derive
/// key material at completion time.
#[async_trait]
pub trait CompleteFunc<A: Send + 'static>: Send + Sync {
    /// Run the completion. Errors are classified by the registry.
    async fn complete(&self, account: A, password: &str) -> SignResult;
}

/// Adapter turning an async closure into a [`CompleteFunc`].
pub struct FnCompleteFunc<F>(F);

impl<F> FnCompleteFunc<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<A, F, Fut> CompleteFunc<A> for FnCompleteFunc<F>
where
    A: Send + 'static,
    F: Fn(A, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SignResult> + Send + 'static,
{
    async fn complete(&self, account: A, password: &str) -> SignResult {
        (self.0)(account, password.to_string()).await
    }
}
