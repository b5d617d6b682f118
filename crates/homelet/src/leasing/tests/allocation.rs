use std::sync::Arc;
use std::thread;

use super::common::*;
use crate::leasing::domain::{ApplicationStatus, PropertyId, UserId, AUTO_REJECT_RESPONSE};
use crate::leasing::service::{Decision, LeasingError};
use crate::leasing::store::EntityStore;

#[test]
fn approval_flips_property_and_auto_rejects_siblings() {
    let (service, store, _) = build_service();
    let first = service
        .create_application(&tenant_actor(TENANT), intake(MAPLE))
        .expect("first application");
    let second = service
        .create_application(&tenant_actor(OTHER_TENANT), intake(MAPLE))
        .expect("second application");

    let approved = service
        .decide_application(
            &owner_actor(OWNER),
            &first.id,
            Decision::Approve,
            Some("Welcome aboard".to_string()),
        )
        .expect("approval succeeds");

    assert_eq!(approved.status, ApplicationStatus::Approved);
    assert_eq!(approved.owner_response.as_deref(), Some("Welcome aboard"));
    assert!(approved.decision_date.is_some());

    let property = store
        .property(&PropertyId(MAPLE.to_string()))
        .expect("fetch succeeds")
        .expect("property present");
    assert!(!property.is_available);
    assert_eq!(property.current_tenant, Some(UserId(TENANT.to_string())));
    assert!(property.rented_date.is_some());

    let sibling = store
        .application(&second.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(sibling.status, ApplicationStatus::Rejected);
    assert!(sibling.auto_rejected);
    assert_eq!(sibling.owner_response.as_deref(), Some(AUTO_REJECT_RESPONSE));
    assert!(sibling.decision_date.is_some());
}

#[test]
fn approving_an_auto_rejected_sibling_fails_with_invalid_state() {
    let (service, _, _) = build_service();
    let first = service
        .create_application(&tenant_actor(TENANT), intake(MAPLE))
        .expect("first application");
    let second = service
        .create_application(&tenant_actor(OTHER_TENANT), intake(MAPLE))
        .expect("second application");

    service
        .decide_application(&owner_actor(OWNER), &first.id, Decision::Approve, None)
        .expect("approval succeeds");

    match service.decide_application(&owner_actor(OWNER), &second.id, Decision::Approve, None) {
        Err(LeasingError::InvalidState {
            status: ApplicationStatus::Rejected,
        }) => {}
        other => panic!("expected invalid state, got {other:?}"),
    }
}

#[test]
fn at_most_one_application_per_property_is_ever_approved() {
    let (service, store, _) = build_service();
    let first = service
        .create_application(&tenant_actor(TENANT), intake(MAPLE))
        .expect("first application");
    let second = service
        .create_application(&tenant_actor(OTHER_TENANT), intake(MAPLE))
        .expect("second application");

    let service_a = service.clone();
    let service_b = service.clone();
    let first_id = first.id.clone();
    let second_id = second.id.clone();

    let handle_a = thread::spawn(move || {
        service_a.decide_application(
            &owner_actor(OWNER),
            &first_id,
            Decision::Approve,
            Some("Welcome aboard".to_string()),
        )
    });
    let handle_b = thread::spawn(move || {
        service_b.decide_application(
            &owner_actor(OWNER),
            &second_id,
            Decision::Approve,
            Some("Welcome aboard".to_string()),
        )
    });

    let outcome_a = handle_a.join().expect("thread a joins");
    let outcome_b = handle_b.join().expect("thread b joins");

    let successes = [&outcome_a, &outcome_b]
        .iter()
        .filter(|outcome| outcome.is_ok())
        .count();
    assert_eq!(successes, 1, "exactly one concurrent approval succeeds");

    let loser = if outcome_a.is_ok() { outcome_b } else { outcome_a };
    match loser {
        Err(LeasingError::InvalidState { status }) => {
            assert!(status.is_terminal());
        }
        other => panic!("expected invalid state for the losing approval, got {other:?}"),
    }

    let approved: Vec<_> = store
        .active_applications_with_status(ApplicationStatus::Approved)
        .expect("query succeeds")
        .into_iter()
        .filter(|record| record.property.0 == MAPLE)
        .collect();
    assert_eq!(approved.len(), 1);

    let property = store
        .property(&PropertyId(MAPLE.to_string()))
        .expect("fetch succeeds")
        .expect("property present");
    assert!(!property.is_available);
    assert_eq!(
        property.current_tenant.as_ref(),
        Some(&approved[0].tenant),
        "property bound to the single approved tenant"
    );
}

#[test]
fn approval_does_not_touch_applications_on_other_properties() {
    let (service, store, _) = build_service();
    let maple = service
        .create_application(&tenant_actor(TENANT), intake(MAPLE))
        .expect("maple application");
    let birch = service
        .create_application(&tenant_actor(OTHER_TENANT), intake(BIRCH))
        .expect("birch application");

    service
        .decide_application(&owner_actor(OWNER), &maple.id, Decision::Approve, None)
        .expect("approval succeeds");

    let untouched = store
        .application(&birch.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(untouched.status, ApplicationStatus::Pending);

    let birch_property = store
        .property(&PropertyId(BIRCH.to_string()))
        .expect("fetch succeeds")
        .expect("property present");
    assert!(birch_property.is_available);
}
