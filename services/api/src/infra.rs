use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use homelet::leasing::{
    ConsistencyAuditor, EntityStore, ExpiryPolicy, ExpirySweeper, LeasingService, MailQueue,
    MailTransport, MemoryStore, NotificationEvent, NotifyError, PropertyId, PropertyRecord,
    UserId, UserRecord, UserRole,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Everything the serve path wires together around one shared store.
pub(crate) struct LeasingStack {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) queue: Arc<MailQueue>,
    pub(crate) service: Arc<LeasingService<MemoryStore, MailQueue>>,
    pub(crate) sweeper: Arc<ExpirySweeper<MemoryStore>>,
    pub(crate) auditor: Arc<ConsistencyAuditor<MemoryStore>>,
}

pub(crate) fn build_stack(expiry: ExpiryPolicy) -> LeasingStack {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MailQueue::new());
    let service = Arc::new(LeasingService::new(store.clone(), queue.clone()));
    let sweeper = Arc::new(ExpirySweeper::with_policy(store.clone(), expiry));
    let auditor = Arc::new(ConsistencyAuditor::new(store.clone()));
    LeasingStack {
        store,
        queue,
        service,
        sweeper,
        auditor,
    }
}

/// Transport that logs instead of talking to a real mail provider. Stands in
/// until the SMTP collaborator is wired up per environment.
#[derive(Debug, Default)]
pub(crate) struct LogMailTransport;

impl MailTransport for LogMailTransport {
    fn deliver(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        info!(
            kind = event.kind(),
            recipient = event.recipient(),
            "delivering notification"
        );
        Ok(())
    }
}

fn user(id: &str, name: &str, email: &str, role: UserRole) -> UserRecord {
    UserRecord {
        id: UserId(id.to_string()),
        name: name.to_string(),
        email: email.to_string(),
        phone: "5551234567".to_string(),
        password_hash: "argon2-hash".to_string(),
        role,
        is_verified: true,
    }
}

fn listing(
    id: &str,
    owner: &str,
    title: &str,
    address: &str,
    monthly_rent: u32,
) -> PropertyRecord {
    PropertyRecord {
        id: PropertyId(id.to_string()),
        owner: UserId(owner.to_string()),
        title: title.to_string(),
        address: address.to_string(),
        city: "Des Moines".to_string(),
        monthly_rent,
        security_deposit: monthly_rent * 2,
        is_available: true,
        rented_date: None,
        current_tenant: None,
    }
}

/// Seed a store with the fixture accounts and listings used by the demo.
pub(crate) fn seed_demo_data(store: &MemoryStore) {
    for record in [
        user("user-olivia", "Olivia", "olivia@example.com", UserRole::Owner),
        user("user-tara", "Tara", "tara@example.com", UserRole::Tenant),
        user("user-tom", "Tom", "tom@example.com", UserRole::Tenant),
        user("user-tessa", "Tessa", "tessa@example.com", UserRole::Tenant),
    ] {
        store.insert_user(record).expect("demo user seeds cleanly");
    }

    for record in [
        listing(
            "prop-maple",
            "user-olivia",
            "Sunny two-bedroom near Maple Park",
            "12 Maple Street",
            1250,
        ),
        listing(
            "prop-birch",
            "user-olivia",
            "Top-floor studio on Birch Avenue",
            "48 Birch Avenue",
            950,
        ),
    ] {
        store
            .insert_property(record)
            .expect("demo property seeds cleanly");
    }
}
