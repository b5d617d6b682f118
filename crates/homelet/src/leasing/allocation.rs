//! Allocation coordinator: the one place an approval mutates more than a
//! single record.
//!
//! Approving an application spans the application itself, the target property,
//! and every sibling pending application on that property. All of it runs
//! inside one store transaction, and the pending re-check happens inside that
//! same transaction, so two concurrent approvals on one property serialize:
//! the first to commit wins, the second observes a terminal status and fails.

use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, AUTO_REJECT_RESPONSE,
};
use super::service::LeasingError;
use super::store::{EntityStore, StoreError, TxScope};

/// What a settlement pass changed, for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub property_updated: bool,
    pub auto_rejected: usize,
}

/// Approve `id` as one atomic unit: re-check pending, record the decision,
/// flip the property, and auto-reject the sibling pending applications.
pub(crate) fn approve<S: EntityStore>(
    store: &S,
    id: &ApplicationId,
    response: Option<String>,
    now: DateTime<Utc>,
) -> Result<ApplicationRecord, LeasingError> {
    store.in_transaction(|tx| {
        let mut application = tx
            .application(id)?
            .ok_or(LeasingError::NotFound { entity: "application" })?;

        // The caller checked pending before entering; a concurrent decision may
        // have landed in between, so the check repeats under the transaction.
        if application.status != ApplicationStatus::Pending {
            return Err(LeasingError::InvalidState {
                status: application.status,
            });
        }

        application.decide(ApplicationStatus::Approved, response, now, false);
        tx.put_application(application.clone())
            .map_err(commit_failed)?;

        settle_property(tx, &application, now, now, AUTO_REJECT_RESPONSE)?;

        Ok(application)
    })
}

/// Apply the property flip and sibling auto-rejects an approval requires.
/// Shared with the consistency repair so both paths stay in lockstep.
pub(crate) fn settle_property(
    tx: &mut dyn TxScope,
    approved: &ApplicationRecord,
    rented_on: DateTime<Utc>,
    decided_on: DateTime<Utc>,
    rejection_response: &str,
) -> Result<SettlementOutcome, LeasingError> {
    let mut property = tx
        .property(&approved.property)?
        .ok_or(LeasingError::NotFound { entity: "property" })?;

    let needs_flip =
        property.is_available || property.current_tenant.as_ref() != Some(&approved.tenant);
    if needs_flip {
        property.make_unavailable(approved.tenant.clone(), rented_on);
        tx.put_property(property).map_err(commit_failed)?;
    }

    let siblings = tx.pending_applications_for_property(&approved.property, Some(&approved.id))?;
    let auto_rejected = siblings.len();
    for mut sibling in siblings {
        sibling.decide(
            ApplicationStatus::Rejected,
            Some(rejection_response.to_string()),
            decided_on,
            true,
        );
        tx.put_application(sibling).map_err(commit_failed)?;
    }

    Ok(SettlementOutcome {
        property_updated: needs_flip,
        auto_rejected,
    })
}

fn commit_failed(err: StoreError) -> LeasingError {
    LeasingError::Transaction(err.to_string())
}
