//! Program enrollment, class assignment, waitlist promotion, and course history.
//!
//! Every transition runs through [`AssignmentEngine`] inside a repository transaction; the
//! student aggregate carries both its enrollments and its course history so the two are always
//! written together. Assignment notices leave through an [`EventPublisher`] after commit.

pub mod capacity;
pub mod domain;
mod engine;
pub mod error;
pub mod history;
pub mod memory;
pub mod notifications;
pub mod outcome;
pub mod permissions;
pub mod pricing;
pub mod repository;
pub mod router;
pub mod state;
pub mod waitlist;
pub mod window;

#[cfg(test)]
mod tests;

pub use capacity::OccupancyView;
pub use domain::{
    Class, ClassId, CompletionStatus, Course, CourseHistoryEntry, CourseId, EnrollmentId,
    HistoryEntryId, NewClass, PaymentStatus, PriceType, Program, ProgramEnrollment, ProgramId,
    ProgramType, Student, StudentId, Teacher, TeacherId, MAX_CLASS_CAPACITY,
};
pub use engine::AssignmentEngine;
pub use error::EnrollmentError;
pub use history::HistoryTransition;
pub use memory::{EnrollmentSnapshot, IdSequences, InMemoryEnrollmentRepository};
pub use notifications::{
    outbox, ChannelPublisher, ClassAssignmentNotice, DeliveryResult, DispatchReport,
    EnrollmentEvent, EventPublisher, LoggingDispatcher, NotificationDispatcher, NotificationError,
    NotificationRecipients, NotificationStatus, NotificationWorker, Recipient, RecipientDelivery,
    RecipientRole,
};
pub use outcome::{
    ArchiveFailure, ArchiveReport, AssignmentOptions, AssignmentOutcome, CompletionOutcome,
    EnrollmentRequest, PromotionReport, ReconcileReport, RejectedProposal, RemovalOutcome,
    UnassignOutcome,
};
pub use permissions::{Permission, PermissionDenied, PermissionGate, Role, RolePermissions};
pub use pricing::{PriceQuote, PriceSource, PriceTable, PricingResolver};
pub use repository::{EnrollmentRepository, EnrollmentStore, RepositoryError};
pub use router::{enrollment_router, ROLE_HEADER};
pub use state::{EnrollmentAction, EnrollmentState, EnrollmentStatus};
pub use waitlist::{PriorityBreakdown, PromotionProposal, WaitlistConfig, WaitlistPromoter};
pub use window::{EnrollmentWindowPolicy, WindowDecision};
