//! Entity store seam: durable storage for users, properties, and applications
//! with the uniqueness constraints and the multi-document transaction
//! capability the allocation coordinator depends on.

pub mod memory;

use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, PropertyId, PropertyRecord, UserId,
    UserRecord,
};

pub use memory::MemoryStore;

/// Error enumeration for store failures. Uniqueness violations carry their own
/// variants so callers can map them to domain responses instead of a 500.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("an active application for this tenant/property pair already exists")]
    DuplicateApplication { existing: ApplicationId },
    #[error("a user with this email address already exists")]
    DuplicateUser,
    #[error("a listing with this owner and address already exists")]
    DuplicateProperty,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Mutation scope available inside a store transaction. Reads observe writes
/// staged earlier in the same scope; nothing becomes visible to other callers
/// until the transaction commits.
pub trait TxScope {
    fn application(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, StoreError>;

    fn property(&self, id: &PropertyId) -> Result<Option<PropertyRecord>, StoreError>;

    /// Active pending applications on a property, optionally excluding one id
    /// (the application being approved).
    fn pending_applications_for_property(
        &self,
        property: &PropertyId,
        exclude: Option<&ApplicationId>,
    ) -> Result<Vec<ApplicationRecord>, StoreError>;

    /// Active pending applications whose application date is before `cutoff`.
    fn pending_applications_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ApplicationRecord>, StoreError>;

    /// Active applications on a property with the given status.
    fn applications_for_property_with_status(
        &self,
        property: &PropertyId,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, StoreError>;

    fn put_application(&mut self, record: ApplicationRecord) -> Result<(), StoreError>;

    fn put_property(&mut self, record: PropertyRecord) -> Result<(), StoreError>;
}

/// Storage abstraction over the three record collections. Implementations must
/// provide serializable isolation for [`EntityStore::in_transaction`]: of two
/// concurrent transactions touching the same records, one observes the other's
/// committed writes, never an interleaving.
pub trait EntityStore: Send + Sync {
    fn user(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError>;

    /// Insert a user, enforcing email uniqueness.
    fn insert_user(&self, record: UserRecord) -> Result<UserRecord, StoreError>;

    fn property(&self, id: &PropertyId) -> Result<Option<PropertyRecord>, StoreError>;

    /// Insert a property, enforcing owner/address uniqueness.
    fn insert_property(&self, record: PropertyRecord) -> Result<PropertyRecord, StoreError>;

    fn application(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, StoreError>;

    /// Insert an application, enforcing the one-active-application-per
    /// (tenant, property) constraint.
    fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, StoreError>;

    /// The active application for a (tenant, property) pair, regardless of
    /// status, if one exists.
    fn active_application_for_pair(
        &self,
        tenant: &UserId,
        property: &PropertyId,
    ) -> Result<Option<ApplicationRecord>, StoreError>;

    /// Active applications submitted by a tenant, newest first.
    fn applications_for_tenant(
        &self,
        tenant: &UserId,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, StoreError>;

    /// Active applications received by an owner (via the creation-time owner
    /// snapshot), newest first.
    fn applications_for_owner(
        &self,
        owner: &UserId,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, StoreError>;

    /// Active applications on a property, newest first.
    fn applications_for_property(
        &self,
        property: &PropertyId,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, StoreError>;

    /// All active applications in the given status, any property.
    fn active_applications_with_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, StoreError>;

    /// Run `op` inside a single atomic transaction. Writes staged through the
    /// scope become visible only if `op` returns `Ok`; any error rolls the
    /// whole scope back and nothing is applied.
    fn in_transaction<T, E>(
        &self,
        op: impl FnOnce(&mut dyn TxScope) -> Result<T, E>,
    ) -> Result<T, E>;
}
