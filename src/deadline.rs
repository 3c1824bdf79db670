//! Wall-clock budgets for outbound calls.
//!
//! Every network call in the bot (provider completion, transcription, file
//! download, CRM) goes through [`with_deadline`]. When the budget elapses the
//! wrapped future is dropped, which aborts the in-flight request, and the
//! caller gets a [`DeadlineExceeded`] to map into its own error type.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// The budget for an operation ran out before it completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded {
    pub operation: &'static str,
    pub budget: Duration,
}

impl fmt::Display for DeadlineExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} timed out after {}ms", self.operation, self.budget.as_millis())
    }
}

impl std::error::Error for DeadlineExceeded {}

/// Run `future` with a fixed budget.
pub async fn with_deadline<F, T>(
    operation: &'static str,
    budget: Duration,
    future: F,
) -> Result<T, DeadlineExceeded>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(budget, future).await {
        Ok(value) => Ok(value),
        Err(_) => {
            warn!("⏱ {operation} exceeded {}ms budget", budget.as_millis());
            Err(DeadlineExceeded { operation, budget })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_budget() {
        let result = with_deadline("fast", Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            42
        })
        .await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let result = with_deadline("slow", Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            42
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.operation, "slow");
        assert_eq!(err.budget, Duration::from_secs(2));
        assert_eq!(err.to_string(), "slow timed out after 2000ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_future_is_dropped() {
        struct DropFlag(std::sync::Arc<std::sync::atomic::AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let dropped = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let _ = with_deadline("hang", Duration::from_millis(100), async move {
            let _flag = flag;
            std::future::pending::<()>().await;
        })
        .await;
        assert!(dropped.load(std::sync::atomic::Ordering::SeqCst));
    }
}
