//! Bounded retry policy for persist actions
//!
//! One policy decides retryability for every persist call instead of each
//! mutation path growing its own retry loop. A call that outlives the
//! timeout is classified the same as a transport failure.

use crate::error::StoreError;
use std::future::Future;
use std::time::Duration;

/// What to do with a failed persist action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue with an incremented attempt counter
    Retry,
    /// Roll the edit back and report
    GiveUp,
}

/// Bounded-retry policy shared by all persist actions
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts allowed per action, including the first
    pub max_attempts: u32,
    /// Wall-clock bound per attempt
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Create a policy
    #[inline]
    #[must_use]
    pub fn new(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
        }
    }

    /// Decide the fate of an action whose attempt `attempts_made` failed
    #[must_use]
    pub fn decide(&self, attempts_made: u32, error: &StoreError) -> RetryDecision {
        if error.is_retryable() && attempts_made < self.max_attempts {
            RetryDecision::Retry
        } else {
            RetryDecision::GiveUp
        }
    }

    /// Run one attempt under the policy's timeout
    ///
    /// # Errors
    /// The operation's own error, or `StoreError::Unavailable` when the
    /// timeout elapses first.
    pub async fn run_with_timeout<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "persist timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capgrid_model::AllocationId;

    #[test]
    fn retryable_error_within_budget_retries() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let err = StoreError::Unavailable("down".into());

        assert_eq!(policy.decide(1, &err), RetryDecision::Retry);
        assert_eq!(policy.decide(2, &err), RetryDecision::Retry);
        assert_eq!(policy.decide(3, &err), RetryDecision::GiveUp);
    }

    #[test]
    fn non_retryable_error_gives_up_immediately() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert_eq!(
            policy.decide(1, &StoreError::NotFound(AllocationId(1))),
            RetryDecision::GiveUp
        );
        assert_eq!(
            policy.decide(1, &StoreError::Conflict(AllocationId(1))),
            RetryDecision::GiveUp
        );
    }

    #[tokio::test]
    async fn timeout_is_reported_as_unavailable() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        let result: Result<(), StoreError> = policy
            .run_with_timeout(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn fast_operation_passes_through() {
        let policy = RetryPolicy::default();
        let result = policy.run_with_timeout(async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
