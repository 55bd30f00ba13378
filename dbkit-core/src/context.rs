//! Caller-supplied deadline and cancellation scope.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{DbKitError, Result};

/// Bounds an operation by an optional deadline and a cancellation token.
///
/// Cloning shares the token, so cancelling one clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Context {
    /// No deadline, never cancelled unless [`Context::cancel`] is called.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().deadline_at(deadline)
    }

    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            deadline: None,
            token,
        }
    }

    /// Tighten the deadline to `timeout` from now. A later deadline never
    /// replaces an earlier one.
    pub fn timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline_at(deadline)
    }

    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fails if the context is already cancelled or past its deadline.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(DbKitError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(DbKitError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes, the deadline passes, or the token is
    /// cancelled. An already-expired context never polls `fut`.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        self.check()?;

        let cancelled = self.token.cancelled();
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = cancelled => Err(DbKitError::Cancelled),
                out = tokio::time::timeout_at(deadline, fut) => {
                    out.map_err(|_| DbKitError::DeadlineExceeded)
                }
            },
            None => tokio::select! {
                biased;
                _ = cancelled => Err(DbKitError::Cancelled),
                out = fut => Ok(out),
            },
        }
    }
}
