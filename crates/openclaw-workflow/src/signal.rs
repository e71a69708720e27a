//! The `approve_capability(approved: bool)` signal the Approving state
//! suspends on, with a 24-hour deadline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};

pub const APPROVAL_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Denied,
    TimedOut,
}

/// Process-wide registry of outstanding capability approvals, keyed by
/// capability request id. A signal delivered to a request id with no
/// waiter (already timed out, or never registered) is a no-op.
#[derive(Clone, Default)]
pub struct SignalRegistry {
    waiters: Arc<Mutex<HashMap<i32, oneshot::Sender<bool>>>>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait for the given capability request id and block until
    /// either `signal` delivers a decision or the deadline elapses.
    pub async fn wait_for_approval(&self, request_id: i32) -> ApprovalOutcome {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(request_id, tx);

        let outcome = match tokio::time::timeout(APPROVAL_DEADLINE, rx).await {
            Ok(Ok(true)) => ApprovalOutcome::Approved,
            Ok(Ok(false)) => ApprovalOutcome::Denied,
            Ok(Err(_)) => ApprovalOutcome::TimedOut,
            Err(_) => ApprovalOutcome::TimedOut,
        };

        self.waiters.lock().await.remove(&request_id);
        outcome
    }

    /// Deliver `approve_capability(approved)` to a waiting workflow.
    /// Returns `false` if no one was waiting (already resumed or timed out).
    pub async fn signal(&self, request_id: i32, approved: bool) -> bool {
        if let Some(sender) = self.waiters.lock().await.remove(&request_id) {
            sender.send(approved).is_ok()
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_approval_to_waiter() {
        let registry = SignalRegistry::new();
        let waiter = tokio::spawn({
            let registry = registry.clone();
            async move { registry.wait_for_approval(1).await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(registry.signal(1, true).await);

        assert_eq!(waiter.await.unwrap(), ApprovalOutcome::Approved);
    }

    #[tokio::test]
    async fn signal_with_no_waiter_is_a_no_op() {
        let registry = SignalRegistry::new();
        assert!(!registry.signal(99, true).await);
    }
}
