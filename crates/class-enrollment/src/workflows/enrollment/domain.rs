use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::state::{EnrollmentState, EnrollmentStatus};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier wrapper for programs (e.g. a season's holiday camp).
    ProgramId
);
identifier!(
    /// Identifier wrapper for concrete, time-slotted classes.
    ClassId
);
identifier!(CourseId);
identifier!(TeacherId);
identifier!(
    /// Identifier wrapper for students.
    StudentId
);
identifier!(
    /// Identifier wrapper for a student's program enrollment.
    EnrollmentId
);
identifier!(HistoryEntryId);

/// Offering formats, each with its own enrollment window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramType {
    WeekendClub,
    HolidayCamp,
}

impl ProgramType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::WeekendClub => "Weekend Club",
            Self::HolidayCamp => "Holiday Camp",
        }
    }
}

/// A season/year scoped offering split into numbered batches and time slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub name: String,
    pub program_type: ProgramType,
    pub season: String,
    pub year: i32,
    pub batches: u8,
    pub slots: Vec<String>,
    pub start_date: Option<NaiveDate>,
}

impl Program {
    pub fn has_batch(&self, batch: u8) -> bool {
        batch >= 1 && batch <= self.batches
    }

    pub fn offers_slot(&self, slot: &str) -> bool {
        self.slots.iter().any(|candidate| candidate == slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
    pub email: Option<String>,
}

/// Hard ceiling on seats in a single class.
pub const MAX_CLASS_CAPACITY: u8 = 50;

/// Capacity-bounded instance of a course within one program batch.
///
/// `students` is a read cache rebuilt from enrollments after every class-affecting
/// transition; occupancy is always derived from the enrollments themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: ClassId,
    pub program_id: ProgramId,
    pub course_id: CourseId,
    pub batch: u8,
    pub slot: String,
    pub capacity: u8,
    pub teacher_id: Option<TeacherId>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub students: Vec<StudentId>,
}

/// Inbound payload for registering a class against its program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClass {
    pub id: ClassId,
    pub program_id: ProgramId,
    pub course_id: CourseId,
    pub batch: u8,
    pub slot: String,
    pub capacity: u8,
    #[serde(default)]
    pub teacher_id: Option<TeacherId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Completed,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Completed => "COMPLETED",
        }
    }
}

/// Pricing tiers captured on each enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    FullPrice,
    SiblingDiscount,
    EarlyBird,
}

impl PriceType {
    pub const ALL: [Self; 3] = [Self::FullPrice, Self::SiblingDiscount, Self::EarlyBird];

    pub const fn label(self) -> &'static str {
        match self {
            Self::FullPrice => "FULL_PRICE",
            Self::SiblingDiscount => "SIBLING_DISCOUNT",
            Self::EarlyBird => "EARLY_BIRD",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.label() == normalized)
    }
}

/// A student's claim on one program batch, independent of a class seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEnrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub program_id: ProgramId,
    pub batch_number: u8,
    #[serde(flatten)]
    pub status: EnrollmentStatus,
    pub payment_status: PaymentStatus,
    pub price_type: PriceType,
    pub price_amount: u32,
    pub enrollment_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
}

impl ProgramEnrollment {
    pub fn state(&self) -> EnrollmentState {
        self.status.state()
    }

    pub fn class_id(&self) -> Option<&ClassId> {
        self.status.class_id()
    }

    pub fn is_payment_confirmed(&self) -> bool {
        self.payment_status == PaymentStatus::Confirmed
    }

    pub fn matches_batch(&self, program_id: &ProgramId, batch_number: u8) -> bool {
        &self.program_id == program_id && self.batch_number == batch_number
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionStatus {
    InProgress,
    Completed,
}

/// Durable record of a course a student started or finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseHistoryEntry {
    pub id: HistoryEntryId,
    pub course_id: CourseId,
    pub course_name: String,
    pub program_id: ProgramId,
    pub program_name: String,
    pub batch: u8,
    pub year: i32,
    pub completion_status: CompletionStatus,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_notes: Option<String>,
}

impl CourseHistoryEntry {
    pub fn is_in_progress_for(
        &self,
        course_id: &CourseId,
        program_id: &ProgramId,
        batch: u8,
    ) -> bool {
        self.completion_status == CompletionStatus::InProgress
            && &self.course_id == course_id
            && &self.program_id == program_id
            && self.batch == batch
    }
}

/// Student aggregate: enrollments and course history are persisted together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub parent_email: Option<String>,
    #[serde(default)]
    pub sibling_ids: Vec<StudentId>,
    #[serde(default)]
    pub is_returning_student: bool,
    #[serde(default)]
    pub enrollments: Vec<ProgramEnrollment>,
    #[serde(default)]
    pub course_history: Vec<CourseHistoryEntry>,
}

impl Student {
    pub fn new(id: StudentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: None,
            parent_email: None,
            sibling_ids: Vec::new(),
            is_returning_student: false,
            enrollments: Vec::new(),
            course_history: Vec::new(),
        }
    }

    pub fn enrollment(&self, id: &EnrollmentId) -> Option<&ProgramEnrollment> {
        self.enrollments.iter().find(|enrollment| &enrollment.id == id)
    }

    pub fn enrollment_mut(&mut self, id: &EnrollmentId) -> Option<&mut ProgramEnrollment> {
        self.enrollments
            .iter_mut()
            .find(|enrollment| &enrollment.id == id)
    }

    pub fn remove_enrollment(&mut self, id: &EnrollmentId) -> Option<ProgramEnrollment> {
        let index = self
            .enrollments
            .iter()
            .position(|enrollment| &enrollment.id == id)?;
        Some(self.enrollments.remove(index))
    }

    /// Live enrollments are the only ones stored, so any match is non-terminal.
    pub fn enrollment_for(
        &self,
        program_id: &ProgramId,
        batch_number: u8,
    ) -> Option<&ProgramEnrollment> {
        self.enrollments
            .iter()
            .find(|enrollment| enrollment.matches_batch(program_id, batch_number))
    }

    pub fn has_completed_batch(&self, program_id: &ProgramId, batch: u8) -> bool {
        self.course_history.iter().any(|entry| {
            entry.completion_status == CompletionStatus::Completed
                && &entry.program_id == program_id
                && entry.batch == batch
        })
    }

    pub fn has_completed_course(&self, course_id: &CourseId) -> bool {
        self.course_history.iter().any(|entry| {
            entry.completion_status == CompletionStatus::Completed && &entry.course_id == course_id
        })
    }

    pub fn is_seated_in(&self, class_id: &ClassId) -> bool {
        self.enrollments
            .iter()
            .any(|enrollment| enrollment.class_id() == Some(class_id))
    }
}
