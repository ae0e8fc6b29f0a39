//! Human-in-the-loop approval gate.
//!
//! An automated caller records the side effect it wants to perform as a
//! pending action, then waits until a human approves or rejects it. The
//! decision is read back from the store, so the human may resolve it from
//! another process. Resolutions made through the same gate also wake local
//! waiters immediately.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use pilot_core::config::GateConfig;
use pilot_core::types::{ActionId, ActionStatus};
use pilot_storage::Store;

use crate::error::GateError;

const NO_FEEDBACK: &str = "None";
const NOT_FOUND: &str = "Action not found";
const NO_TENANT: &str = "No tenant bound";

/// Final answer for a gated action.
///
/// `TimedOut` is handled exactly like a rejection: the caller must not act.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Approved,
    Rejected(String),
    TimedOut,
}

impl GateOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, GateOutcome::Approved)
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateOutcome::Approved => f.write_str("Approved"),
            GateOutcome::Rejected(feedback) => write!(f, "Rejected: {}", feedback),
            GateOutcome::TimedOut => f.write_str("Timed out"),
        }
    }
}

pub struct ActionGate {
    store: Store,
    resolved: Arc<Notify>,
    poll_interval: Duration,
    timeout: Duration,
}

impl ActionGate {
    pub fn new(store: Store, config: &GateConfig) -> Self {
        Self::with_timing(
            store,
            Duration::from_secs(config.poll_interval_secs),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn with_timing(store: Store, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            store,
            resolved: Arc::new(Notify::new()),
            poll_interval,
            timeout,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Record an action awaiting approval. `None` when no tenant is bound.
    pub fn request_approval(
        &self,
        action_kind: &str,
        details: &str,
    ) -> Result<Option<ActionId>, GateError> {
        Ok(self.store.create_pending_action(action_kind, details)?)
    }

    /// Wait until the action is decided or `timeout` elapses.
    ///
    /// Never fails: storage errors while polling are logged and the wait
    /// continues until the deadline. A timed-out action stays pending.
    pub async fn await_resolution(
        &self,
        action_id: ActionId,
        poll_interval: Duration,
        timeout: Duration,
    ) -> GateOutcome {
        let deadline = Instant::now() + timeout;

        loop {
            // Register for wake-ups before reading, so a resolve between the
            // read and the sleep is not missed.
            let notified = self.resolved.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.store.action_status(action_id) {
                Ok(Some(state)) => match state.status {
                    ActionStatus::Approved => return GateOutcome::Approved,
                    ActionStatus::Rejected => {
                        return GateOutcome::Rejected(
                            state.feedback.unwrap_or_else(|| NO_FEEDBACK.to_string()),
                        )
                    }
                    ActionStatus::Pending => {}
                },
                Ok(None) => {
                    let reason = if self.store.tenant().is_some() {
                        NOT_FOUND
                    } else {
                        NO_TENANT
                    };
                    return GateOutcome::Rejected(reason.to_string());
                }
                Err(e) => warn!(action_id, error = %e, "Failed to poll action status"),
            }

            let now = Instant::now();
            if now >= deadline {
                info!(action_id, "Approval wait timed out");
                return GateOutcome::TimedOut;
            }

            tokio::select! {
                _ = tokio::time::sleep(poll_interval.min(deadline - now)) => {}
                _ = &mut notified => debug!(action_id, "Woken by local resolution"),
            }
        }
    }

    /// Record a decision. Returns `false` if the action was already decided
    /// or does not belong to the bound tenant.
    pub fn resolve(
        &self,
        action_id: ActionId,
        decision: ActionStatus,
        feedback: Option<&str>,
    ) -> Result<bool, GateError> {
        if decision == ActionStatus::Pending {
            return Err(GateError::InvalidDecision);
        }
        let applied = self.store.resolve_action(action_id, decision, feedback)?;
        if applied {
            self.resolved.notify_waiters();
        }
        Ok(applied)
    }

    /// Request approval and wait with the configured timing.
    pub async fn gated(&self, action_kind: &str, details: &str) -> Result<GateOutcome, GateError> {
        match self.request_approval(action_kind, details)? {
            Some(id) => Ok(self
                .await_resolution(id, self.poll_interval, self.timeout)
                .await),
            None => Ok(GateOutcome::Rejected(NO_TENANT.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_core::types::TenantId;
    use pilot_storage::Database;

    fn test_gate(tenant: Option<TenantId>) -> (tempfile::TempDir, Arc<ActionGate>) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("gate.db")).unwrap());
        let store = match tenant {
            Some(t) => Store::for_tenant(db, t),
            None => Store::new(db),
        };
        let gate = ActionGate::with_timing(
            store,
            Duration::from_millis(100),
            Duration::from_secs(1),
        );
        (dir, Arc::new(gate))
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(GateOutcome::Approved.to_string(), "Approved");
        assert_eq!(
            GateOutcome::Rejected("wrong recipient".to_string()).to_string(),
            "Rejected: wrong recipient"
        );
        assert_eq!(GateOutcome::TimedOut.to_string(), "Timed out");
        assert!(!GateOutcome::TimedOut.is_approved());
    }

    #[tokio::test]
    async fn test_times_out_and_stays_pending() {
        let (_dir, gate) = test_gate(Some(TenantId(2)));
        let id = gate.request_approval("Email Dispatch", "To: x@y.com").unwrap().unwrap();

        let started = Instant::now();
        let outcome = gate
            .await_resolution(id, Duration::from_millis(100), Duration::from_secs(1))
            .await;

        assert_eq!(outcome, GateOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_secs(3));
        let state = gate.store().action_status(id).unwrap().unwrap();
        assert_eq!(state.status, ActionStatus::Pending);
    }

    #[tokio::test]
    async fn test_local_resolve_wakes_waiter() {
        let (_dir, gate) = test_gate(Some(TenantId(2)));
        let id = gate.request_approval("Social Media Post", "Hello").unwrap().unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                gate.await_resolution(id, Duration::from_secs(30), Duration::from_secs(60))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(gate.resolve(id, ActionStatus::Approved, None).unwrap());

        // Poll interval is 30 s, so only the wake-up can finish this in time.
        let outcome = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter should be woken")
            .unwrap();
        assert_eq!(outcome, GateOutcome::Approved);
    }

    #[tokio::test]
    async fn test_rejection_without_feedback() {
        let (_dir, gate) = test_gate(Some(TenantId(2)));
        let id = gate.request_approval("x", "y").unwrap().unwrap();
        gate.resolve(id, ActionStatus::Rejected, None).unwrap();

        let outcome = gate
            .await_resolution(id, Duration::from_millis(100), Duration::from_secs(1))
            .await;
        assert_eq!(outcome, GateOutcome::Rejected("None".to_string()));
    }

    #[tokio::test]
    async fn test_missing_action_reads_as_rejected() {
        let (_dir, gate) = test_gate(Some(TenantId(2)));
        let outcome = gate
            .await_resolution(999, Duration::from_millis(100), Duration::from_secs(1))
            .await;
        assert_eq!(outcome, GateOutcome::Rejected("Action not found".to_string()));
    }

    #[tokio::test]
    async fn test_unbound_gate_rejects() {
        let (_dir, gate) = test_gate(None);
        assert!(gate.request_approval("x", "y").unwrap().is_none());
        let outcome = gate.gated("Email Dispatch", "To: x@y.com").await.unwrap();
        assert_eq!(outcome, GateOutcome::Rejected("No tenant bound".to_string()));
    }

    #[test]
    fn test_resolve_rules() {
        let (_dir, gate) = test_gate(Some(TenantId(2)));
        let id = gate.request_approval("x", "y").unwrap().unwrap();

        assert!(matches!(
            gate.resolve(id, ActionStatus::Pending, None),
            Err(GateError::InvalidDecision)
        ));
        assert!(gate.resolve(id, ActionStatus::Approved, None).unwrap());
        assert!(!gate
            .resolve(id, ActionStatus::Rejected, Some("too late"))
            .unwrap());
        assert_eq!(
            gate.store().action_status(id).unwrap().unwrap().status,
            ActionStatus::Approved
        );
    }
}
