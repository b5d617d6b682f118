//! Consistency auditor and repair.
//!
//! The allocation coordinator keeps the application/property invariant inside
//! one transaction; this module is the safety net for records that predate it
//! or were mutated around it (legacy code paths, manual edits). `diagnose`
//! only reads; `repair` applies the same corrective writes the coordinator
//! would have applied, one transaction per property, so a failure on one
//! property never blocks repair of the rest.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::allocation;
use super::domain::{
    ApplicationId, ApplicationStatus, PropertyId, UserId, AUTO_REJECT_RESPONSE, REPAIR_NOTE,
};
use super::service::LeasingError;
use super::store::EntityStore;

/// A single detectable divergence on an approved application's property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftIssue {
    /// The property is still marked available.
    PropertyStillAvailable,
    /// `currentTenant` is unset or points at someone other than the approved
    /// tenant.
    TenantNotBound,
    /// Sibling pending applications were never auto-rejected.
    PendingSiblings { count: usize },
    /// The referenced property no longer exists.
    PropertyMissing,
}

/// All issues found for one approved application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    pub property: PropertyId,
    pub application: ApplicationId,
    pub tenant: UserId,
    pub issues: Vec<DriftIssue>,
}

/// Read-only diagnosis outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub approved_applications: usize,
    pub discrepancies: Vec<Discrepancy>,
}

/// Per-property outcome of a repair pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairEntry {
    pub property: PropertyId,
    pub application: ApplicationId,
    pub property_updated: bool,
    pub applications_auto_rejected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate repair outcome. Individual failures are reported per entry, never
/// as an all-or-nothing error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub processed: usize,
    pub properties_updated: usize,
    pub applications_auto_rejected: usize,
    pub entries: Vec<RepairEntry>,
}

/// Diagnostic and corrective routines over the three collections.
pub struct ConsistencyAuditor<S> {
    store: Arc<S>,
}

impl<S: EntityStore> ConsistencyAuditor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Scan all approved active applications and report every divergence from
    /// the allocation invariant, without mutating anything.
    pub fn diagnose(&self) -> Result<AuditReport, LeasingError> {
        let approved = self
            .store
            .active_applications_with_status(ApplicationStatus::Approved)?;
        let approved_count = approved.len();

        let mut discrepancies = Vec::new();
        for application in approved {
            let mut issues = Vec::new();

            match self.store.property(&application.property)? {
                None => issues.push(DriftIssue::PropertyMissing),
                Some(property) => {
                    if property.is_available {
                        issues.push(DriftIssue::PropertyStillAvailable);
                    }
                    if property.current_tenant.as_ref() != Some(&application.tenant) {
                        issues.push(DriftIssue::TenantNotBound);
                    }
                }
            }

            let pending = self
                .store
                .applications_for_property(&application.property, Some(ApplicationStatus::Pending))?
                .into_iter()
                .filter(|sibling| sibling.id != application.id)
                .count();
            if pending > 0 {
                issues.push(DriftIssue::PendingSiblings { count: pending });
            }

            if !issues.is_empty() {
                discrepancies.push(Discrepancy {
                    property: application.property.clone(),
                    application: application.id.clone(),
                    tenant: application.tenant.clone(),
                    issues,
                });
            }
        }

        Ok(AuditReport {
            approved_applications: approved_count,
            discrepancies,
        })
    }

    /// Apply the coordinator's corrective writes to every discrepancy found by
    /// [`ConsistencyAuditor::diagnose`].
    pub fn repair(&self, now: DateTime<Utc>) -> Result<RepairReport, LeasingError> {
        let diagnosis = self.diagnose()?;
        let mut report = RepairReport::default();
        let rejection_response = format!("{AUTO_REJECT_RESPONSE}{REPAIR_NOTE}");

        for discrepancy in diagnosis.discrepancies {
            report.processed += 1;
            let outcome = self.store.in_transaction(|tx| {
                let application = tx
                    .application(&discrepancy.application)?
                    .ok_or(LeasingError::NotFound { entity: "application" })?;
                // Someone may have resolved or archived the record since the
                // diagnosis pass; skip rather than rewrite history.
                if application.status != ApplicationStatus::Approved || !application.is_active {
                    return Ok(allocation::SettlementOutcome::default());
                }
                let rented_on = application
                    .decision_date
                    .unwrap_or(application.application_date);
                allocation::settle_property(tx, &application, rented_on, now, &rejection_response)
            });

            match outcome {
                Ok(settlement) => {
                    if settlement.property_updated {
                        report.properties_updated += 1;
                    }
                    report.applications_auto_rejected += settlement.auto_rejected;
                    report.entries.push(RepairEntry {
                        property: discrepancy.property,
                        application: discrepancy.application,
                        property_updated: settlement.property_updated,
                        applications_auto_rejected: settlement.auto_rejected,
                        error: None,
                    });
                }
                Err(err) => {
                    warn!(property = %discrepancy.property, %err, "repair failed for property");
                    report.entries.push(RepairEntry {
                        property: discrepancy.property,
                        application: discrepancy.application,
                        property_updated: false,
                        applications_auto_rejected: 0,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        info!(
            processed = report.processed,
            properties_updated = report.properties_updated,
            auto_rejected = report.applications_auto_rejected,
            "consistency repair completed"
        );
        Ok(report)
    }
}
