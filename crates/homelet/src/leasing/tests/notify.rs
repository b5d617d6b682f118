use std::sync::Arc;

use super::common::*;
use crate::leasing::domain::ApplicationStatus;
use crate::leasing::notify::{
    DeliveryOutcome, MailQueue, MailWorker, NotificationEvent, Notifier,
};

fn status_event() -> NotificationEvent {
    NotificationEvent::ApplicationStatus {
        tenant_email: "tara@example.com".to_string(),
        tenant_name: "tara".to_string(),
        status: ApplicationStatus::Approved,
        property_title: "Sunny two-bedroom near Maple Park".to_string(),
        owner_message: Some("Welcome aboard".to_string()),
    }
}

#[test]
fn worker_delivers_queued_events_in_order() {
    let queue = Arc::new(MailQueue::new());
    queue
        .notify(NotificationEvent::NewApplication {
            owner_email: "olivia@example.com".to_string(),
            owner_name: "olivia".to_string(),
            tenant_name: "tara".to_string(),
            property_title: "Sunny two-bedroom near Maple Park".to_string(),
            message: "I'd like to rent this unit, please.".to_string(),
        })
        .expect("enqueue succeeds");
    queue.notify(status_event()).expect("enqueue succeeds");
    assert_eq!(queue.len(), 2);

    let transport = Arc::new(RecordingTransport::default());
    let worker = MailWorker::new(queue.clone(), transport.clone());
    let summary = worker.drain();

    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.dropped, 0);
    assert!(queue.is_empty());

    let events = transport.events();
    assert_eq!(events[0].kind(), "new-application");
    assert_eq!(events[0].recipient(), "olivia@example.com");
    assert_eq!(events[1].kind(), "application-status");
}

#[test]
fn transient_transport_failure_is_retried() {
    let queue = Arc::new(MailQueue::new());
    queue.notify(status_event()).expect("enqueue succeeds");

    let transport = Arc::new(RecordingTransport::failing(1));
    let worker = MailWorker::new(queue.clone(), transport.clone());

    assert_eq!(worker.run_once(), Some(DeliveryOutcome::Requeued));
    assert_eq!(worker.run_once(), Some(DeliveryOutcome::Delivered));
    assert_eq!(worker.run_once(), None);
    assert_eq!(transport.events().len(), 1);
}

#[test]
fn attempt_budget_bounds_redelivery() {
    let queue = Arc::new(MailQueue::new());
    queue.notify(status_event()).expect("enqueue succeeds");

    let transport = Arc::new(RecordingTransport::failing(u32::MAX));
    let worker = MailWorker::new(queue.clone(), transport.clone());
    let summary = worker.drain();

    assert_eq!(summary.delivered, 0);
    assert_eq!(summary.dropped, 1);
    assert!(queue.is_empty(), "dropped event is not requeued");
    assert!(transport.events().is_empty());
}
