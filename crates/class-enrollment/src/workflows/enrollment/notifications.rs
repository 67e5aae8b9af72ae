//! Outbound class-assignment events.
//!
//! The engine publishes after its transaction commits; delivery happens in a separate
//! consumer so email outages never touch enrollment state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::domain::{ClassId, EnrollmentId, ProgramId, ProgramType, StudentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientRole {
    Teacher,
    Student,
    Parent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

/// Up to three recipient groups; each is present only when contact info exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecipients {
    pub teacher: Option<Recipient>,
    pub student: Option<Recipient>,
    pub parent: Option<Recipient>,
}

impl NotificationRecipients {
    pub fn is_empty(&self) -> bool {
        self.teacher.is_none() && self.student.is_none() && self.parent.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecipientRole, &Recipient)> {
        [
            (RecipientRole::Teacher, self.teacher.as_ref()),
            (RecipientRole::Student, self.student.as_ref()),
            (RecipientRole::Parent, self.parent.as_ref()),
        ]
        .into_iter()
        .filter_map(|(role, recipient)| recipient.map(|recipient| (role, recipient)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub class_id: ClassId,
    pub course_name: String,
    pub batch: u8,
    pub slot: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramInfo {
    pub program_id: ProgramId,
    pub name: String,
    pub program_type: ProgramType,
    pub season: String,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassAssignmentNotice {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub recipients: NotificationRecipients,
    pub class_info: ClassInfo,
    pub program_info: ProgramInfo,
    pub enrollment_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EnrollmentEvent {
    ClassAssigned(ClassAssignmentNotice),
}

/// Outbound hook the engine publishes committed events to.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: EnrollmentEvent) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification outbox closed")]
    OutboxClosed,
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Partial-success note attached to an assignment outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationStatus {
    Queued,
    NoRecipients,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "snake_case")]
pub enum DeliveryResult {
    Sent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientDelivery {
    pub role: RecipientRole,
    pub email: String,
    pub result: DeliveryResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub deliveries: Vec<RecipientDelivery>,
}

impl DispatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &RecipientDelivery> {
        self.deliveries
            .iter()
            .filter(|delivery| matches!(delivery.result, DeliveryResult::Failed(_)))
    }
}

/// Email (or other channel) adapter consuming assignment notices.
pub trait NotificationDispatcher: Send + Sync {
    fn notify_class_assignment(&self, notice: &ClassAssignmentNotice) -> DispatchReport;
}

/// Publisher backed by an unbounded channel drained by a [`NotificationWorker`].
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<EnrollmentEvent>,
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: EnrollmentEvent) -> Result<(), NotificationError> {
        self.sender
            .send(event)
            .map_err(|_| NotificationError::OutboxClosed)
    }
}

pub struct NotificationWorker<D> {
    receiver: mpsc::UnboundedReceiver<EnrollmentEvent>,
    dispatcher: Arc<D>,
}

/// Build a connected publisher/worker pair.
pub fn outbox<D>(dispatcher: Arc<D>) -> (ChannelPublisher, NotificationWorker<D>)
where
    D: NotificationDispatcher + 'static,
{
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        ChannelPublisher { sender },
        NotificationWorker {
            receiver,
            dispatcher,
        },
    )
}

impl<D> NotificationWorker<D>
where
    D: NotificationDispatcher + 'static,
{
    /// Drain events until every publisher is dropped. Returns the number of events handled.
    #[tracing::instrument(skip_all, name = "notification_worker")]
    pub async fn run(mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.receiver.recv().await {
            handled += 1;
            match event {
                EnrollmentEvent::ClassAssigned(notice) => {
                    let report = self.dispatcher.notify_class_assignment(&notice);
                    for failure in report.failures() {
                        if let DeliveryResult::Failed(reason) = &failure.result {
                            tracing::warn!(
                                enrollment_id = %notice.enrollment_id,
                                role = ?failure.role,
                                email = %failure.email,
                                %reason,
                                "class assignment notification failed"
                            );
                        }
                    }
                    tracing::debug!(
                        enrollment_id = %notice.enrollment_id,
                        delivered = report.deliveries.len(),
                        "class assignment notification dispatched"
                    );
                }
            }
        }

        tracing::info!(handled, "notification outbox closed, worker exiting");
        handled
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<usize> {
        tokio::spawn(self.run())
    }
}

/// Dispatcher that records each delivery in the log instead of sending mail.
#[derive(Debug, Default, Clone)]
pub struct LoggingDispatcher;

impl NotificationDispatcher for LoggingDispatcher {
    fn notify_class_assignment(&self, notice: &ClassAssignmentNotice) -> DispatchReport {
        let deliveries = notice
            .recipients
            .iter()
            .map(|(role, recipient)| {
                tracing::info!(
                    enrollment_id = %notice.enrollment_id,
                    ?role,
                    email = %recipient.email,
                    course = %notice.class_info.course_name,
                    "class assignment notice"
                );
                RecipientDelivery {
                    role,
                    email: recipient.email.clone(),
                    result: DeliveryResult::Sent,
                }
            })
            .collect();

        DispatchReport { deliveries }
    }
}
