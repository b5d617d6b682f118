//! Scheduled expiry of stale pending applications.
//!
//! A pending application never reserves its property, so expiring one is a
//! pure batch update on the applications collection with no cross-entity
//! effects.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use super::domain::ApplicationStatus;
use super::service::LeasingError;
use super::store::EntityStore;

/// Staleness window for the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub max_pending_days: i64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            max_pending_days: 30,
        }
    }
}

impl ExpiryPolicy {
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.max_pending_days)
    }

    pub fn response_text(&self) -> String {
        format!(
            "Application automatically expired after {} days of no response",
            self.max_pending_days
        )
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub expired: usize,
}

/// Batch processor invoked by the scheduler collaborator. Idempotent: once all
/// qualifying applications have been transitioned, re-running finds nothing.
pub struct ExpirySweeper<S> {
    store: Arc<S>,
    policy: ExpiryPolicy,
}

impl<S: EntityStore> ExpirySweeper<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_policy(store, ExpiryPolicy::default())
    }

    pub fn with_policy(store: Arc<S>, policy: ExpiryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.policy
    }

    /// Transition every active pending application older than the staleness
    /// window to `expired`, stamping the decision date.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, LeasingError> {
        let cutoff = self.policy.cutoff(now);
        let response = self.policy.response_text();

        let expired = self.store.in_transaction(|tx| {
            let stale = tx.pending_applications_older_than(cutoff)?;
            let count = stale.len();
            for mut application in stale {
                application.decide(
                    ApplicationStatus::Expired,
                    Some(response.clone()),
                    now,
                    false,
                );
                tx.put_application(application)
                    .map_err(|err| LeasingError::Transaction(err.to_string()))?;
            }
            Ok::<usize, LeasingError>(count)
        })?;

        if expired > 0 {
            info!(expired, "expired stale pending applications");
        }
        Ok(SweepReport { expired })
    }
}
