use chrono::{Duration, Utc};

use super::common::*;
use crate::leasing::domain::ApplicationStatus;
use crate::leasing::expiry::{ExpiryPolicy, ExpirySweeper};
use crate::leasing::store::{EntityStore, StoreError, TxScope};

fn backdate(store: &crate::leasing::store::MemoryStore, id: &crate::leasing::domain::ApplicationId, days: i64) {
    store
        .in_transaction(|tx: &mut dyn TxScope| -> Result<(), StoreError> {
            let mut record = tx.application(id)?.expect("record present");
            record.application_date -= Duration::days(days);
            tx.put_application(record)
        })
        .expect("backdate commits");
}

#[test]
fn sweep_expires_only_stale_pending_applications() {
    let (service, store, _) = build_service();
    let stale = service
        .create_application(&tenant_actor(TENANT), intake(MAPLE))
        .expect("stale application");
    let fresh = service
        .create_application(&tenant_actor(OTHER_TENANT), intake(MAPLE))
        .expect("fresh application");
    backdate(&store, &stale.id, 31);

    let sweeper = ExpirySweeper::new(store.clone());
    let report = sweeper.sweep(Utc::now()).expect("sweep succeeds");
    assert_eq!(report.expired, 1);

    let expired = store
        .application(&stale.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(expired.status, ApplicationStatus::Expired);
    assert!(expired.decision_date.is_some());
    assert_eq!(
        expired.owner_response.as_deref(),
        Some("Application automatically expired after 30 days of no response")
    );

    let untouched = store
        .application(&fresh.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(untouched.status, ApplicationStatus::Pending);
}

#[test]
fn sweep_is_idempotent() {
    let (service, store, _) = build_service();
    let record = service
        .create_application(&tenant_actor(TENANT), intake(MAPLE))
        .expect("application created");
    backdate(&store, &record.id, 45);

    let sweeper = ExpirySweeper::new(store);
    let first = sweeper.sweep(Utc::now()).expect("first sweep");
    assert_eq!(first.expired, 1);

    let second = sweeper.sweep(Utc::now()).expect("second sweep");
    assert_eq!(second.expired, 0, "nothing left to expire");
}

#[test]
fn applications_inside_the_window_are_left_alone() {
    let (service, store, _) = build_service();
    let record = service
        .create_application(&tenant_actor(TENANT), intake(MAPLE))
        .expect("application created");
    backdate(&store, &record.id, 29);

    let sweeper = ExpirySweeper::new(store.clone());
    let report = sweeper.sweep(Utc::now()).expect("sweep succeeds");
    assert_eq!(report.expired, 0);

    let untouched = store
        .application(&record.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(untouched.status, ApplicationStatus::Pending);
}

#[test]
fn custom_policy_window_is_honored() {
    let (service, store, _) = build_service();
    let record = service
        .create_application(&tenant_actor(TENANT), intake(MAPLE))
        .expect("application created");
    backdate(&store, &record.id, 8);

    let sweeper = ExpirySweeper::with_policy(
        store,
        ExpiryPolicy {
            max_pending_days: 7,
        },
    );
    let report = sweeper.sweep(Utc::now()).expect("sweep succeeds");
    assert_eq!(report.expired, 1);
    assert!(sweeper.policy().response_text().contains("7 days"));
}

#[test]
fn decided_applications_never_expire() {
    let (service, store, _) = build_service();
    let record = service
        .create_application(&tenant_actor(TENANT), intake(MAPLE))
        .expect("application created");
    service
        .withdraw_application(&tenant_actor(TENANT), &record.id)
        .expect("withdraw succeeds");
    backdate(&store, &record.id, 60);

    let sweeper = ExpirySweeper::new(store.clone());
    let report = sweeper.sweep(Utc::now()).expect("sweep succeeds");
    assert_eq!(report.expired, 0);

    let stored = store
        .application(&record.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(stored.status, ApplicationStatus::Withdrawn);
}
