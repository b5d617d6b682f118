use std::sync::{Arc, Mutex};

use crate::leasing::domain::{
    Actor, NewApplication, PropertyId, PropertyRecord, UserId, UserRecord, UserRole,
};
use crate::leasing::notify::{MailQueue, MailTransport, NotificationEvent, Notifier, NotifyError};
use crate::leasing::service::LeasingService;
use crate::leasing::store::{EntityStore, MemoryStore};

pub(super) const OWNER: &str = "user-olivia";
pub(super) const OTHER_OWNER: &str = "user-oscar";
pub(super) const TENANT: &str = "user-tara";
pub(super) const OTHER_TENANT: &str = "user-tom";
pub(super) const MAPLE: &str = "prop-maple";
pub(super) const BIRCH: &str = "prop-birch";
pub(super) const CEDAR: &str = "prop-cedar";

pub(super) fn user(id: &str, email: &str, role: UserRole) -> UserRecord {
    UserRecord {
        id: UserId(id.to_string()),
        name: id.trim_start_matches("user-").to_string(),
        email: email.to_string(),
        phone: "5551234567".to_string(),
        password_hash: "argon2-hash".to_string(),
        role,
        is_verified: true,
    }
}

pub(super) fn property(id: &str, owner: &str, title: &str, address: &str) -> PropertyRecord {
    PropertyRecord {
        id: PropertyId(id.to_string()),
        owner: UserId(owner.to_string()),
        title: title.to_string(),
        address: address.to_string(),
        city: "Des Moines".to_string(),
        monthly_rent: 1250,
        security_deposit: 2500,
        is_available: true,
        rented_date: None,
        current_tenant: None,
    }
}

pub(super) fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_user(user(OWNER, "olivia@example.com", UserRole::Owner))
        .expect("seed owner");
    store
        .insert_user(user(OTHER_OWNER, "oscar@example.com", UserRole::Owner))
        .expect("seed second owner");
    store
        .insert_user(user(TENANT, "tara@example.com", UserRole::Tenant))
        .expect("seed tenant");
    store
        .insert_user(user(OTHER_TENANT, "tom@example.com", UserRole::Tenant))
        .expect("seed second tenant");
    store
        .insert_property(property(
            MAPLE,
            OWNER,
            "Sunny two-bedroom near Maple Park",
            "12 Maple Street",
        ))
        .expect("seed property");
    store
        .insert_property(property(
            BIRCH,
            OWNER,
            "Top-floor studio on Birch Avenue",
            "48 Birch Avenue",
        ))
        .expect("seed second property");
    store
        .insert_property(property(
            CEDAR,
            OTHER_OWNER,
            "Cedar Court family house",
            "7 Cedar Court",
        ))
        .expect("seed third property");
    store
}

pub(super) fn build_service() -> (
    Arc<LeasingService<MemoryStore, MailQueue>>,
    Arc<MemoryStore>,
    Arc<MailQueue>,
) {
    let store = seeded_store();
    let queue = Arc::new(MailQueue::new());
    let service = Arc::new(LeasingService::new(store.clone(), queue.clone()));
    (service, store, queue)
}

pub(super) fn tenant_actor(id: &str) -> Actor {
    Actor::new(id, UserRole::Tenant)
}

pub(super) fn owner_actor(id: &str) -> Actor {
    Actor::new(id, UserRole::Owner)
}

pub(super) fn intake(property: &str) -> NewApplication {
    NewApplication {
        property: PropertyId(property.to_string()),
        message: "I'd like to rent this unit, please.".to_string(),
        preferred_move_in_date: None,
        documents: Vec::new(),
        tenant_info: None,
    }
}

/// Notifier that always fails, for verifying best-effort semantics.
#[derive(Default)]
pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _event: NotificationEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Queue("queue offline".to_string()))
    }
}

/// Transport that records delivered events and can be told to fail a number of
/// times first.
#[derive(Default)]
pub(super) struct RecordingTransport {
    pub(super) delivered: Mutex<Vec<NotificationEvent>>,
    pub(super) failures_remaining: Mutex<u32>,
}

impl RecordingTransport {
    pub(super) fn failing(times: u32) -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            failures_remaining: Mutex::new(times),
        }
    }

    pub(super) fn events(&self) -> Vec<NotificationEvent> {
        self.delivered.lock().expect("transport mutex").clone()
    }
}

impl MailTransport for RecordingTransport {
    fn deliver(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let mut remaining = self.failures_remaining.lock().expect("transport mutex");
        if *remaining > 0 {
            *remaining -= 1;
            return Err(NotifyError::Transport("smtp timeout".to_string()));
        }
        drop(remaining);
        self.delivered
            .lock()
            .expect("transport mutex")
            .push(event.clone());
        Ok(())
    }
}
