use serde::{Deserialize, Serialize};

use super::domain::ClassId;

/// Stored status of a live enrollment. Terminal states delete the record instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Waitlist,
    Pending,
    Assigned { class_id: ClassId },
}

impl EnrollmentStatus {
    pub fn state(&self) -> EnrollmentState {
        match self {
            Self::Waitlist => EnrollmentState::Waitlist,
            Self::Pending => EnrollmentState::Pending,
            Self::Assigned { .. } => EnrollmentState::Assigned,
        }
    }

    pub fn class_id(&self) -> Option<&ClassId> {
        match self {
            Self::Assigned { class_id } => Some(class_id),
            Self::Waitlist | Self::Pending => None,
        }
    }
}

/// Every state an enrollment can be in, including the two terminal ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentState {
    Waitlist,
    Pending,
    Assigned,
    Completed,
    Removed,
}

impl EnrollmentState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Waitlist => "waitlist",
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Completed => "completed",
            Self::Removed => "removed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Removed)
    }

    /// Transition table. `None` means the action is not allowed from this state.
    pub const fn apply(self, action: EnrollmentAction) -> Option<EnrollmentState> {
        use EnrollmentAction as A;
        use EnrollmentState as S;

        match (self, action) {
            (S::Waitlist, A::ConfirmPayment) => Some(S::Pending),
            (S::Pending, A::RevokePayment) => Some(S::Waitlist),
            (S::Pending, A::AssignToClass) => Some(S::Assigned),
            (S::Assigned, A::UnassignFromClass) => Some(S::Pending),
            (S::Assigned, A::Evict) => Some(S::Pending),
            (S::Assigned, A::Complete) => Some(S::Completed),
            (S::Waitlist | S::Pending | S::Assigned, A::RemoveFromProgram) => Some(S::Removed),
            _ => None,
        }
    }
}

/// Actions the assignment engine can take on a single enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentAction {
    ConfirmPayment,
    RevokePayment,
    AssignToClass,
    UnassignFromClass,
    Evict,
    RemoveFromProgram,
    Complete,
}

impl EnrollmentAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ConfirmPayment => "confirm payment",
            Self::RevokePayment => "revoke payment",
            Self::AssignToClass => "assign to class",
            Self::UnassignFromClass => "unassign from class",
            Self::Evict => "evict from class",
            Self::RemoveFromProgram => "remove from program",
            Self::Complete => "mark completed",
        }
    }
}
