//! Cancellation and deadline propagation for source calls.
//!
//! A [`SearchContext`] travels with every collaborator call. Cancelling a
//! context cancels all contexts derived from it; a derived context's
//! deadline never outlives its parent's.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::SourceError;

#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl SearchContext {
    /// A root context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A root context that expires `timeout` from now.
    ///
    /// A timeout too large to represent as an instant leaves the context
    /// without a deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// A root context driven by an existing token (e.g. server shutdown).
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a child that is cancelled with `self` and expires after
    /// `timeout` or at the parent's deadline, whichever is sooner.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, own) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// Derive a child that is cancelled with `self` and shares its deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context when the returned guard is dropped.
    ///
    /// Held for the lifetime of a search so that dropping the search future
    /// reaches every source call still running on its own task.
    #[must_use = "the context is cancelled as soon as the guard is dropped"]
    pub fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once this context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Drive `fut` under this context.
    ///
    /// Yields [`SourceError::Cancelled`] if the context is cancelled first and
    /// [`SourceError::Timeout`] if the deadline passes first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, SourceError>
    where
        F: Future<Output = Result<T, SourceError>>,
    {
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .unwrap_or(Err(SourceError::Timeout)),
                None => fut.await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(SourceError::Cancelled),
            outcome = bounded => outcome,
        }
    }
}
