//! Queue-decoupled outbound notifications.
//!
//! Producers enqueue an event and return immediately; a worker drains the
//! queue toward the mail transport with a bounded redelivery budget. A slow or
//! failing transport therefore never blocks or fails the state-changing
//! operation that produced the event.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::warn;

use super::domain::ApplicationStatus;

/// Events emitted after state transitions. The event type strings mirror the
/// templates the mail collaborator renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NotificationEvent {
    /// A tenant applied; the property owner is notified.
    NewApplication {
        owner_email: String,
        owner_name: String,
        tenant_name: String,
        property_title: String,
        message: String,
    },
    /// An application left pending; the tenant is notified of the outcome.
    ApplicationStatus {
        tenant_email: String,
        tenant_name: String,
        status: ApplicationStatus,
        property_title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        owner_message: Option<String>,
    },
}

impl NotificationEvent {
    pub fn recipient(&self) -> &str {
        match self {
            NotificationEvent::NewApplication { owner_email, .. } => owner_email,
            NotificationEvent::ApplicationStatus { tenant_email, .. } => tenant_email,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::NewApplication { .. } => "new-application",
            NotificationEvent::ApplicationStatus { .. } => "application-status",
        }
    }
}

/// Error raised by the notification pipeline.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification queue unavailable: {0}")]
    Queue(String),
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Outbound notification hook called by the leasing service after state
/// transitions. Implementations must return quickly; delivery happens
/// elsewhere.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError>;
}

/// Delivery seam toward the actual mail collaborator (SMTP, provider API).
pub trait MailTransport: Send + Sync {
    fn deliver(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone)]
struct QueuedNotification {
    event: NotificationEvent,
    attempts: u32,
}

/// Durable in-process queue. Enqueue is the producer side of [`Notifier`];
/// [`MailWorker`] is the consumer.
#[derive(Debug, Default)]
pub struct MailQueue {
    pending: Mutex<VecDeque<QueuedNotification>>,
}

impl MailQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().expect("mail queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pop(&self) -> Option<QueuedNotification> {
        self.pending
            .lock()
            .expect("mail queue mutex poisoned")
            .pop_front()
    }

    fn push(&self, queued: QueuedNotification) {
        self.pending
            .lock()
            .expect("mail queue mutex poisoned")
            .push_back(queued);
    }
}

impl Notifier for MailQueue {
    fn notify(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        self.push(QueuedNotification { event, attempts: 0 });
        Ok(())
    }
}

/// What happened to a single queued notification during a worker pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Requeued,
    Dropped,
}

/// Tally for a full drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    pub delivered: usize,
    pub dropped: usize,
}

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Consumer side of the queue. Failed sends requeue until the attempt budget
/// is spent, then the event is dropped with a warning.
pub struct MailWorker<T> {
    queue: Arc<MailQueue>,
    transport: Arc<T>,
    max_attempts: u32,
}

impl<T: MailTransport> MailWorker<T> {
    pub fn new(queue: Arc<MailQueue>, transport: Arc<T>) -> Self {
        Self {
            queue,
            transport,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Deliver the next queued notification, if any.
    pub fn run_once(&self) -> Option<DeliveryOutcome> {
        let mut queued = self.queue.pop()?;
        queued.attempts += 1;
        match self.transport.deliver(&queued.event) {
            Ok(()) => Some(DeliveryOutcome::Delivered),
            Err(err) if queued.attempts < self.max_attempts => {
                warn!(
                    kind = queued.event.kind(),
                    attempts = queued.attempts,
                    %err,
                    "notification delivery failed, requeueing"
                );
                self.queue.push(queued);
                Some(DeliveryOutcome::Requeued)
            }
            Err(err) => {
                warn!(
                    kind = queued.event.kind(),
                    attempts = queued.attempts,
                    %err,
                    "notification delivery failed, dropping"
                );
                Some(DeliveryOutcome::Dropped)
            }
        }
    }

    /// Drain everything currently queued, including requeued retries.
    pub fn drain(&self) -> DrainSummary {
        let mut summary = DrainSummary::default();
        while let Some(outcome) = self.run_once() {
            match outcome {
                DeliveryOutcome::Delivered => summary.delivered += 1,
                DeliveryOutcome::Dropped => summary.dropped += 1,
                DeliveryOutcome::Requeued => {}
            }
        }
        summary
    }
}
