use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::OrderError;

// ============================================================================
// Operation Context
// ============================================================================
//
// Carries the caller's cancellation signal and deadline down to every store
// call. An aborted call surfaces as `OrderError::Internal`. Mutations are
// submitted as one atomic batch, so aborting never leaves a record without
// its index entry.
//
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// No deadline, never cancelled unless `cancel` is called
    #[cfg(test)]
    pub fn background() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    /// Tie the context to an outer token, e.g. a child of the shutdown token
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self { cancel, deadline: None }
    }

    /// Tighten the deadline; an earlier existing deadline wins
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(candidate),
            None => candidate,
        });
        self
    }

    #[cfg(test)]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[cfg(test)]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `fut` unless the context is cancelled or its deadline passes first
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T, OrderError>
    where
        F: Future<Output = Result<T, OrderError>>,
    {
        if self.is_cancelled() {
            return Err(OrderError::internal(format!("{} cancelled", operation)));
        }

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                tracing::debug!(operation, "Operation cancelled by caller");
                Err(OrderError::internal(format!("{} cancelled", operation)))
            }
            _ = expired => {
                tracing::warn!(operation, "Operation deadline exceeded");
                Err(OrderError::internal(format!("{} deadline exceeded", operation)))
            }
            result = fut => result,
        }
    }
}
