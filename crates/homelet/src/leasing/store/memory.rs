//! In-memory storage engine with serializable transactions.
//!
//! A single writer lock guards the collections. Transactions clone the
//! collections, run the scope against the copy, and swap it back on commit, so
//! rollback is a no-op and readers never observe a partially applied scope.
//! This is the same isolation contract a document store provides through
//! sessions, expressed at process scale.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::{EntityStore, StoreError, TxScope};
use crate::leasing::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, PropertyId, PropertyRecord, UserId,
    UserRecord,
};

#[derive(Debug, Default, Clone)]
struct Collections {
    users: BTreeMap<UserId, UserRecord>,
    properties: BTreeMap<PropertyId, PropertyRecord>,
    applications: BTreeMap<ApplicationId, ApplicationRecord>,
}

impl Collections {
    fn sorted_newest_first(mut records: Vec<ApplicationRecord>) -> Vec<ApplicationRecord> {
        records.sort_by(|a, b| b.application_date.cmp(&a.application_date));
        records
    }

    fn active_applications(
        &self,
        mut keep: impl FnMut(&ApplicationRecord) -> bool,
    ) -> Vec<ApplicationRecord> {
        let records = self
            .applications
            .values()
            .filter(|record| record.is_active && keep(record))
            .cloned()
            .collect();
        Self::sorted_newest_first(records)
    }
}

/// In-memory [`EntityStore`] used by the API binary and the test suites.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryTxScope<'a> {
    staged: &'a mut Collections,
}

impl TxScope for MemoryTxScope<'_> {
    fn application(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(self.staged.applications.get(id).cloned())
    }

    fn property(&self, id: &PropertyId) -> Result<Option<PropertyRecord>, StoreError> {
        Ok(self.staged.properties.get(id).cloned())
    }

    fn pending_applications_for_property(
        &self,
        property: &PropertyId,
        exclude: Option<&ApplicationId>,
    ) -> Result<Vec<ApplicationRecord>, StoreError> {
        Ok(self.staged.active_applications(|record| {
            record.property == *property
                && record.status == ApplicationStatus::Pending
                && exclude != Some(&record.id)
        }))
    }

    fn pending_applications_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ApplicationRecord>, StoreError> {
        Ok(self.staged.active_applications(|record| {
            record.status == ApplicationStatus::Pending && record.application_date < cutoff
        }))
    }

    fn applications_for_property_with_status(
        &self,
        property: &PropertyId,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, StoreError> {
        Ok(self
            .staged
            .active_applications(|record| record.property == *property && record.status == status))
    }

    fn put_application(&mut self, record: ApplicationRecord) -> Result<(), StoreError> {
        self.staged.applications.insert(record.id.clone(), record);
        Ok(())
    }

    fn put_property(&mut self, record: PropertyRecord) -> Result<(), StoreError> {
        self.staged.properties.insert(record.id.clone(), record);
        Ok(())
    }
}

impl EntityStore for MemoryStore {
    fn user(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        Ok(guard.users.get(id).cloned())
    }

    fn insert_user(&self, record: UserRecord) -> Result<UserRecord, StoreError> {
        let mut guard = self.collections.lock().expect("store mutex poisoned");
        let duplicate = guard
            .users
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&record.email));
        if duplicate {
            return Err(StoreError::DuplicateUser);
        }
        guard.users.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn property(&self, id: &PropertyId) -> Result<Option<PropertyRecord>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        Ok(guard.properties.get(id).cloned())
    }

    fn insert_property(&self, record: PropertyRecord) -> Result<PropertyRecord, StoreError> {
        let mut guard = self.collections.lock().expect("store mutex poisoned");
        let duplicate = guard.properties.values().any(|existing| {
            existing.owner == record.owner && existing.address.eq_ignore_ascii_case(&record.address)
        });
        if duplicate {
            return Err(StoreError::DuplicateProperty);
        }
        guard.properties.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn application(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        Ok(guard.applications.get(id).cloned())
    }

    fn insert_application(
        &self,
        record: ApplicationRecord,
    ) -> Result<ApplicationRecord, StoreError> {
        let mut guard = self.collections.lock().expect("store mutex poisoned");
        let existing = guard.applications.values().find(|candidate| {
            candidate.is_active
                && candidate.tenant == record.tenant
                && candidate.property == record.property
        });
        if let Some(existing) = existing {
            return Err(StoreError::DuplicateApplication {
                existing: existing.id.clone(),
            });
        }
        guard.applications.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn active_application_for_pair(
        &self,
        tenant: &UserId,
        property: &PropertyId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        Ok(guard
            .applications
            .values()
            .find(|record| {
                record.is_active && record.tenant == *tenant && record.property == *property
            })
            .cloned())
    }

    fn applications_for_tenant(
        &self,
        tenant: &UserId,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        Ok(guard.active_applications(|record| {
            record.tenant == *tenant && status.is_none_or(|wanted| record.status == wanted)
        }))
    }

    fn applications_for_owner(
        &self,
        owner: &UserId,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        Ok(guard.active_applications(|record| {
            record.owner == *owner && status.is_none_or(|wanted| record.status == wanted)
        }))
    }

    fn applications_for_property(
        &self,
        property: &PropertyId,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationRecord>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        Ok(guard.active_applications(|record| {
            record.property == *property && status.is_none_or(|wanted| record.status == wanted)
        }))
    }

    fn active_applications_with_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, StoreError> {
        let guard = self.collections.lock().expect("store mutex poisoned");
        Ok(guard.active_applications(|record| record.status == status))
    }

    fn in_transaction<T, E>(
        &self,
        op: impl FnOnce(&mut dyn TxScope) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut guard = self.collections.lock().expect("store mutex poisoned");
        let mut staged = guard.clone();
        let mut scope = MemoryTxScope {
            staged: &mut staged,
        };
        match op(&mut scope) {
            Ok(value) => {
                *guard = staged;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }
}
