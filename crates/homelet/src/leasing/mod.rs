//! Rental application lifecycle: intake, decisions, allocation, expiry, and
//! consistency tooling.
//!
//! The state machine is deliberately small (`pending` is the only
//! non-terminal status), but approvals have cross-entity effects, so they run
//! through the allocation coordinator rather than mutating status directly.
//! Everything coordinates through the entity store's transaction boundary;
//! there is no in-process locking shared between API instances.

pub(crate) mod allocation;
pub mod audit;
pub mod domain;
pub mod expiry;
pub mod notify;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use audit::{AuditReport, ConsistencyAuditor, Discrepancy, DriftIssue, RepairEntry, RepairReport};
pub use domain::{
    Actor, ApplicationId, ApplicationRecord, ApplicationStatus, DocumentKind, DocumentRef,
    NewApplication, PropertyId, PropertyRecord, TenantInfo, UserId, UserRecord, UserRole,
    AUTO_REJECT_RESPONSE,
};
pub use expiry::{ExpiryPolicy, ExpirySweeper, SweepReport};
pub use notify::{
    DeliveryOutcome, DrainSummary, MailQueue, MailTransport, MailWorker, NotificationEvent,
    Notifier, NotifyError,
};
pub use router::{application_router, ops_router, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
pub use service::{
    ApplicationStats, Decision, LeasingError, LeasingService, StatusBreakdown,
};
pub use store::{EntityStore, MemoryStore, StoreError, TxScope};
