use std::fmt;

use super::domain::{ClassId, CourseId, EnrollmentId, PaymentStatus, ProgramId};
use super::repository::RepositoryError;
use super::state::{EnrollmentAction, EnrollmentState};

/// Error raised by the assignment engine.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("enrollment window closed: {reason}")]
    WindowClosed {
        days_passed: Option<i64>,
        limit_days: i64,
        reason: String,
    },
    #[error(
        "duplicate enrollment for program {program_id} (batch {}): {detail}",
        join_batches(.batches)
    )]
    DuplicateEnrollment {
        program_id: ProgramId,
        batches: Vec<u8>,
        detail: String,
    },
    #[error(
        "payment for enrollment {enrollment_id} is {}; confirm it before assigning a class",
        .payment_status.label()
    )]
    PaymentNotConfirmed {
        enrollment_id: EnrollmentId,
        payment_status: PaymentStatus,
    },
    #[error("class {class_id} is full ({occupancy}/{capacity} seats taken)")]
    CapacityExceeded {
        class_id: ClassId,
        capacity: u8,
        occupancy: usize,
    },
    #[error("class {class_id} runs batch {class_batch}, enrollment is for {enrollment_batch}")]
    BatchMismatch {
        class_id: ClassId,
        class_batch: u8,
        enrollment_batch: u8,
    },
    #[error("program {program_id} has {batches} batch(es); batch {batch} does not exist")]
    InvalidBatch {
        program_id: ProgramId,
        batch: u8,
        batches: u8,
    },
    #[error("class {class_id} belongs to program {class_program}, not {enrollment_program}")]
    ProgramMismatch {
        class_id: ClassId,
        class_program: ProgramId,
        enrollment_program: ProgramId,
    },
    #[error("class {class_id} is archived")]
    ClassArchived { class_id: ClassId },
    #[error("student is already assigned to class {class_id}")]
    AlreadyAssigned { class_id: ClassId },
    #[error("student already completed {course_name} ({course_id}); confirm to assign again")]
    PriorCompletionRequiresConfirmation {
        course_id: CourseId,
        course_name: String,
    },
    #[error("cannot {} enrollment {enrollment_id} while it is {}", .action.label(), .from.label())]
    InvalidTransition {
        enrollment_id: EnrollmentId,
        from: EnrollmentState,
        action: EnrollmentAction,
    },
    #[error("invalid class: {0}")]
    InvalidClass(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EnrollmentError {
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for API payloads.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::WindowClosed { .. } => "window_closed",
            Self::DuplicateEnrollment { .. } => "duplicate_enrollment",
            Self::PaymentNotConfirmed { .. } => "payment_not_confirmed",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::BatchMismatch { .. } => "batch_mismatch",
            Self::InvalidBatch { .. } => "invalid_batch",
            Self::ProgramMismatch { .. } => "program_mismatch",
            Self::ClassArchived { .. } => "class_archived",
            Self::AlreadyAssigned { .. } => "already_assigned",
            Self::PriorCompletionRequiresConfirmation { .. } => "prior_completion",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InvalidClass(_) => "invalid_class",
            Self::Repository(_) => "repository",
        }
    }

    /// Only storage outages are worth retrying; validation failures repeat deterministically.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Repository(RepositoryError::Unavailable(_)))
    }
}

fn join_batches(batches: &[u8]) -> String {
    batches
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
