use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use super::allocation;
use super::domain::{
    Actor, ApplicationId, ApplicationRecord, ApplicationStatus, NewApplication, PropertyId,
    PropertyRecord, UserRole,
};
use super::notify::{NotificationEvent, Notifier};
use super::store::{EntityStore, StoreError};

const MESSAGE_MIN_CHARS: usize = 10;
const MESSAGE_MAX_CHARS: usize = 1000;
const OWNER_RESPONSE_MAX_CHARS: usize = 500;

/// Error taxonomy for leasing operations. Every variant is an expected domain
/// condition translated to a client-facing response at the boundary; only
/// `Store` represents an unexpected infrastructure failure.
#[derive(Debug, thiserror::Error)]
pub enum LeasingError {
    /// Referenced property, application, or user does not exist.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    /// Actor lacks the relationship required for this action.
    #[error("{0}")]
    Forbidden(&'static str),
    /// Requested transition is illegal from the current status.
    #[error("Cannot update application with status: {status}")]
    InvalidState { status: ApplicationStatus },
    /// An active application already exists for this tenant/property pair.
    #[error("you have already applied for this property")]
    Duplicate { existing: ApplicationId },
    /// The target property no longer satisfies the operation's precondition.
    #[error("property is not available for rent")]
    Conflict,
    /// The multi-document transaction could not commit. The approval was not
    /// applied; retrying is safe because the pending re-check is idempotent.
    #[error("allocation transaction failed: {0}")]
    Transaction(String),
    /// Intake payload failed validation bounds.
    #[error("{0}")]
    Validation(String),
    /// Store failure unrelated to the domain taxonomy.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LeasingError {
    /// Stable machine-readable kind carried on error responses.
    pub const fn kind(&self) -> &'static str {
        match self {
            LeasingError::NotFound { .. } => "not_found",
            LeasingError::Forbidden(_) => "forbidden",
            LeasingError::InvalidState { .. } => "invalid_state",
            LeasingError::Duplicate { .. } => "duplicate",
            LeasingError::Conflict => "conflict",
            LeasingError::Transaction(_) => "transaction",
            LeasingError::Validation(_) => "validation",
            LeasingError::Store(_) => "store",
        }
    }
}

/// Decision requested by an owner on a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Per-status tally used by the dashboard stats endpoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBreakdown {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub withdrawn: usize,
    pub expired: usize,
}

impl StatusBreakdown {
    pub fn tally<I: IntoIterator<Item = ApplicationStatus>>(statuses: I) -> Self {
        let mut breakdown = Self::default();
        for status in statuses {
            match status {
                ApplicationStatus::Pending => breakdown.pending += 1,
                ApplicationStatus::Approved => breakdown.approved += 1,
                ApplicationStatus::Rejected => breakdown.rejected += 1,
                ApplicationStatus::Withdrawn => breakdown.withdrawn += 1,
                ApplicationStatus::Expired => breakdown.expired += 1,
            }
        }
        breakdown
    }
}

/// Dashboard view: applications the actor submitted and applications received
/// for the actor's properties.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStats {
    pub my_applications: StatusBreakdown,
    pub received_applications: StatusBreakdown,
}

/// Monotonic application-id source owned by the service instance. Lives on the
/// service rather than in module state so each constructed stack is
/// self-contained.
#[derive(Debug)]
pub struct IdMinter {
    next: AtomicU64,
}

impl Default for IdMinter {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl IdMinter {
    fn next_application(&self) -> ApplicationId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        ApplicationId(format!("app-{id:06}"))
    }
}

/// Service composing the entity store, the allocation coordinator, and the
/// notification hook into the application lifecycle operations.
pub struct LeasingService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    ids: IdMinter,
}

impl<S, N> LeasingService<S, N>
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self {
            store,
            notifier,
            ids: IdMinter::default(),
        }
    }

    /// Submit a new application for a property on behalf of the acting tenant.
    pub fn create_application(
        &self,
        actor: &Actor,
        intake: NewApplication,
    ) -> Result<ApplicationRecord, LeasingError> {
        if actor.role != UserRole::Tenant {
            return Err(LeasingError::Forbidden(
                "only tenants can submit applications",
            ));
        }
        validate_message(&intake.message)?;

        let property = self
            .store
            .property(&intake.property)?
            .ok_or(LeasingError::NotFound { entity: "property" })?;
        if !property.is_available {
            return Err(LeasingError::Conflict);
        }
        if property.owner == actor.id {
            return Err(LeasingError::Forbidden(
                "property owners cannot apply to their own properties",
            ));
        }
        if let Some(existing) = self
            .store
            .active_application_for_pair(&actor.id, &intake.property)?
        {
            return Err(LeasingError::Duplicate {
                existing: existing.id,
            });
        }

        let record = ApplicationRecord {
            id: self.ids.next_application(),
            tenant: actor.id.clone(),
            property: property.id.clone(),
            owner: property.owner.clone(),
            status: ApplicationStatus::Pending,
            message: intake.message,
            preferred_move_in_date: intake.preferred_move_in_date,
            documents: intake.documents,
            owner_response: None,
            application_date: Utc::now(),
            decision_date: None,
            auto_rejected: false,
            is_active: true,
            tenant_info: intake.tenant_info,
        };

        // The store enforces the pair constraint again at insert time, closing
        // the race between the lookup above and this write.
        let stored = match self.store.insert_application(record) {
            Ok(stored) => stored,
            Err(StoreError::DuplicateApplication { existing }) => {
                return Err(LeasingError::Duplicate { existing })
            }
            Err(other) => return Err(other.into()),
        };

        self.send_new_application_notice(&stored, &property);
        Ok(stored)
    }

    /// Decide a pending application. Approvals run through the allocation
    /// coordinator; rejections touch the single application record.
    pub fn decide_application(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        decision: Decision,
        owner_response: Option<String>,
    ) -> Result<ApplicationRecord, LeasingError> {
        let application = self.guard_owner_decision(actor, id, owner_response.as_deref())?;
        if application.status != ApplicationStatus::Pending {
            return Err(LeasingError::InvalidState {
                status: application.status,
            });
        }

        let decided = match decision {
            Decision::Approve => {
                allocation::approve(self.store.as_ref(), id, owner_response, Utc::now())?
            }
            Decision::Reject => self.store.in_transaction(|tx| {
                let mut application = tx
                    .application(id)?
                    .ok_or(LeasingError::NotFound { entity: "application" })?;
                if application.status != ApplicationStatus::Pending {
                    return Err(LeasingError::InvalidState {
                        status: application.status,
                    });
                }
                application.decide(
                    ApplicationStatus::Rejected,
                    owner_response.clone(),
                    Utc::now(),
                    false,
                );
                tx.put_application(application.clone())
                    .map_err(|err| LeasingError::Transaction(err.to_string()))?;
                Ok(application)
            })?,
        };

        self.send_status_notice(&decided);
        Ok(decided)
    }

    /// Withdraw a pending application on behalf of the tenant who filed it.
    pub fn withdraw_application(
        &self,
        actor: &Actor,
        id: &ApplicationId,
    ) -> Result<ApplicationRecord, LeasingError> {
        let application = self
            .store
            .application(id)?
            .ok_or(LeasingError::NotFound { entity: "application" })?;
        if application.tenant != actor.id {
            return Err(LeasingError::Forbidden(
                "only the tenant who applied can withdraw the application",
            ));
        }

        self.store.in_transaction(|tx| {
            let mut application = tx
                .application(id)?
                .ok_or(LeasingError::NotFound { entity: "application" })?;
            if application.status != ApplicationStatus::Pending {
                return Err(LeasingError::InvalidState {
                    status: application.status,
                });
            }
            application.decide(ApplicationStatus::Withdrawn, None, Utc::now(), false);
            tx.put_application(application.clone())
                .map_err(|err| LeasingError::Transaction(err.to_string()))?;
            Ok(application)
        })
    }

    /// Fetch a single application. Visible to its tenant and to the property
    /// owner it was addressed to.
    pub fn get_application(
        &self,
        actor: &Actor,
        id: &ApplicationId,
    ) -> Result<ApplicationRecord, LeasingError> {
        let application = self
            .store
            .application(id)?
            .ok_or(LeasingError::NotFound { entity: "application" })?;
        if application.tenant != actor.id && application.owner != actor.id {
            return Err(LeasingError::Forbidden("access denied"));
        }
        Ok(application)
    }

    /// Applications the actor submitted, newest first.
    pub fn my_applications(
        &self,
        actor: &Actor,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, LeasingError> {
        Ok(self.store.applications_for_tenant(&actor.id, status)?)
    }

    /// Applications received for the actor's properties, newest first.
    pub fn received_applications(
        &self,
        actor: &Actor,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, LeasingError> {
        Ok(self.store.applications_for_owner(&actor.id, status)?)
    }

    /// Applications on one property; restricted to the property owner.
    pub fn property_applications(
        &self,
        actor: &Actor,
        property_id: &PropertyId,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, LeasingError> {
        let property = self
            .store
            .property(property_id)?
            .ok_or(LeasingError::NotFound { entity: "property" })?;
        if property.owner != actor.id {
            return Err(LeasingError::Forbidden(
                "only the property owner can view its applications",
            ));
        }
        Ok(self.store.applications_for_property(property_id, status)?)
    }

    /// Per-status counts for both sides of the actor's dashboard.
    pub fn application_stats(&self, actor: &Actor) -> Result<ApplicationStats, LeasingError> {
        let mine = self.store.applications_for_tenant(&actor.id, None)?;
        let received = self.store.applications_for_owner(&actor.id, None)?;
        Ok(ApplicationStats {
            my_applications: StatusBreakdown::tally(mine.into_iter().map(|record| record.status)),
            received_applications: StatusBreakdown::tally(
                received.into_iter().map(|record| record.status),
            ),
        })
    }

    /// Put a rented property back on the market. The approved application, if
    /// any, stays approved but is archived so the tenant/property pair can
    /// apply again later.
    pub fn release_property(
        &self,
        actor: &Actor,
        property_id: &PropertyId,
    ) -> Result<PropertyRecord, LeasingError> {
        if actor.role != UserRole::Owner {
            return Err(LeasingError::Forbidden("only owners can release properties"));
        }
        let property = self
            .store
            .property(property_id)?
            .ok_or(LeasingError::NotFound { entity: "property" })?;
        if property.owner != actor.id {
            return Err(LeasingError::Forbidden(
                "only the property owner can release it",
            ));
        }
        if property.is_available {
            return Err(LeasingError::Conflict);
        }

        self.store.in_transaction(|tx| {
            let mut property = tx
                .property(property_id)?
                .ok_or(LeasingError::NotFound { entity: "property" })?;
            property.make_available();
            tx.put_property(property.clone())
                .map_err(|err| LeasingError::Transaction(err.to_string()))?;

            let approved = tx.applications_for_property_with_status(
                property_id,
                ApplicationStatus::Approved,
            )?;
            for mut application in approved {
                application.is_active = false;
                tx.put_application(application)
                    .map_err(|err| LeasingError::Transaction(err.to_string()))?;
            }
            Ok(property)
        })
    }

    fn guard_owner_decision(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        owner_response: Option<&str>,
    ) -> Result<ApplicationRecord, LeasingError> {
        if actor.role != UserRole::Owner {
            return Err(LeasingError::Forbidden("only owners can decide applications"));
        }
        if let Some(response) = owner_response {
            if response.chars().count() > OWNER_RESPONSE_MAX_CHARS {
                return Err(LeasingError::Validation(format!(
                    "owner response cannot exceed {OWNER_RESPONSE_MAX_CHARS} characters"
                )));
            }
        }
        let application = self
            .store
            .application(id)?
            .ok_or(LeasingError::NotFound { entity: "application" })?;
        if application.owner != actor.id {
            return Err(LeasingError::Forbidden(
                "you can only update applications for your own properties",
            ));
        }
        Ok(application)
    }

    fn send_new_application_notice(&self, application: &ApplicationRecord, property: &PropertyRecord) {
        let Ok(Some(owner)) = self.store.user(&application.owner) else {
            warn!(application = %application.id, "owner record missing, skipping notification");
            return;
        };
        let tenant_name = match self.store.user(&application.tenant) {
            Ok(Some(tenant)) => tenant.name,
            _ => application.tenant.0.clone(),
        };
        let event = NotificationEvent::NewApplication {
            owner_email: owner.email,
            owner_name: owner.name,
            tenant_name,
            property_title: property.title.clone(),
            message: application.message.clone(),
        };
        self.dispatch(event);
    }

    fn send_status_notice(&self, application: &ApplicationRecord) {
        let Ok(Some(tenant)) = self.store.user(&application.tenant) else {
            warn!(application = %application.id, "tenant record missing, skipping notification");
            return;
        };
        let property_title = match self.store.property(&application.property) {
            Ok(Some(property)) => property.title,
            _ => application.property.0.clone(),
        };
        let event = NotificationEvent::ApplicationStatus {
            tenant_email: tenant.email,
            tenant_name: tenant.name,
            status: application.status,
            property_title,
            owner_message: application.owner_response.clone(),
        };
        self.dispatch(event);
    }

    // Notification failures are logged and swallowed: a successful decision
    // must return success even when the mail side is down.
    fn dispatch(&self, event: NotificationEvent) {
        if let Err(err) = self.notifier.notify(event) {
            warn!(%err, "failed to enqueue notification");
        }
    }
}

fn validate_message(message: &str) -> Result<(), LeasingError> {
    let length = message.trim().chars().count();
    if length < MESSAGE_MIN_CHARS {
        return Err(LeasingError::Validation(format!(
            "application message must be at least {MESSAGE_MIN_CHARS} characters"
        )));
    }
    if length > MESSAGE_MAX_CHARS {
        return Err(LeasingError::Validation(format!(
            "application message cannot exceed {MESSAGE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}
