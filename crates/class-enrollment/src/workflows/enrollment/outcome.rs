use serde::{Deserialize, Serialize};

use super::domain::{ClassId, EnrollmentId, PriceType, ProgramEnrollment, ProgramId, StudentId};
use super::history::HistoryTransition;
use super::notifications::NotificationStatus;
use super::state::EnrollmentState;
use super::waitlist::PromotionProposal;

/// Program-level sign-up request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub student_id: StudentId,
    pub program_id: ProgramId,
    pub batch_number: u8,
    #[serde(default)]
    pub payment_confirmed: bool,
    #[serde(default)]
    pub price_type: Option<PriceType>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentOptions {
    /// Operator confirmed re-enrolling a student in a course they already completed.
    #[serde(default)]
    pub acknowledge_prior_completion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentOutcome {
    pub enrollment: ProgramEnrollment,
    pub history: HistoryTransition,
    pub notification: NotificationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnassignOutcome {
    pub enrollment: ProgramEnrollment,
    pub released_class: ClassId,
    pub history: HistoryTransition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalOutcome {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub previous_state: EnrollmentState,
    pub state: EnrollmentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_class: Option<ClassId>,
    pub history: HistoryTransition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub class_id: ClassId,
    pub state: EnrollmentState,
    pub history: HistoryTransition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveFailure {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub reason: String,
    pub attempts: u32,
}

/// Result of an archive cascade. `archived` stays false while any occupant failed to complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub class_id: ClassId,
    pub archived: bool,
    pub already_archived: bool,
    pub completed: usize,
    pub failures: Vec<ArchiveFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub class_id: ClassId,
    pub capacity: u8,
    pub occupancy: usize,
    pub evicted: Vec<EnrollmentId>,
    pub roster_rebuilt: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedProposal {
    pub proposal: PromotionProposal,
    pub code: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PromotionReport {
    pub applied: Vec<AssignmentOutcome>,
    pub rejected: Vec<RejectedProposal>,
}
