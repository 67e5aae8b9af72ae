//! Course history ledger.
//!
//! Entries are opened when a student takes a class seat, completed when the class ends for
//! them, and discarded when the seat is given up. The ledger works on the student aggregate so
//! the caller persists history and enrollments in the same write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Class, CompletionStatus, Course, CourseHistoryEntry, CourseId, HistoryEntryId, Program,
    ProgramId, Student,
};
use super::repository::{EnrollmentStore, RepositoryError};

/// Everything a history entry records about the course being taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseContext {
    pub course_id: CourseId,
    pub course_name: String,
    pub program_id: ProgramId,
    pub program_name: String,
    pub batch: u8,
    pub year: i32,
}

impl CourseContext {
    pub fn new(program: &Program, class: &Class, course: &Course) -> Self {
        Self {
            course_id: course.id.clone(),
            course_name: course.name.clone(),
            program_id: program.id.clone(),
            program_name: program.name.clone(),
            batch: class.batch,
            year: program.year,
        }
    }
}

/// What happened to the ledger during a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entry_id", rename_all = "snake_case")]
pub enum HistoryTransition {
    Started(HistoryEntryId),
    /// An in-progress entry for the same course/program/batch already existed.
    Reused(HistoryEntryId),
    Completed(HistoryEntryId),
    /// No in-progress entry was found, so a completed one was written directly.
    Synthesized(HistoryEntryId),
    Discarded(HistoryEntryId),
    Untouched,
}

/// Open an in-progress entry; new entry ids are reserved from `store`.
pub(crate) fn start_course(
    store: &mut dyn EnrollmentStore,
    student: &mut Student,
    context: &CourseContext,
    now: DateTime<Utc>,
) -> Result<HistoryTransition, RepositoryError> {
    if let Some(existing) = student.course_history.iter().find(|entry| {
        entry.is_in_progress_for(&context.course_id, &context.program_id, context.batch)
    }) {
        return Ok(HistoryTransition::Reused(existing.id.clone()));
    }

    let entry = CourseHistoryEntry {
        id: store.next_history_entry_id()?,
        course_id: context.course_id.clone(),
        course_name: context.course_name.clone(),
        program_id: context.program_id.clone(),
        program_name: context.program_name.clone(),
        batch: context.batch,
        year: context.year,
        completion_status: CompletionStatus::InProgress,
        start_date: now,
        end_date: None,
        performance_notes: None,
    };
    let id = entry.id.clone();
    student.course_history.push(entry);
    Ok(HistoryTransition::Started(id))
}

/// Remove exactly the in-progress entry for the course/program/batch. Completed entries stay.
pub(crate) fn discard_in_progress(
    student: &mut Student,
    course_id: &CourseId,
    program_id: &ProgramId,
    batch: u8,
) -> HistoryTransition {
    let Some(index) = student
        .course_history
        .iter()
        .position(|entry| entry.is_in_progress_for(course_id, program_id, batch))
    else {
        return HistoryTransition::Untouched;
    };

    let removed = student.course_history.remove(index);
    HistoryTransition::Discarded(removed.id)
}

pub(crate) fn complete_course(
    store: &mut dyn EnrollmentStore,
    student: &mut Student,
    context: &CourseContext,
    now: DateTime<Utc>,
) -> Result<HistoryTransition, RepositoryError> {
    if let Some(entry) = student.course_history.iter_mut().find(|entry| {
        entry.is_in_progress_for(&context.course_id, &context.program_id, context.batch)
    }) {
        entry.completion_status = CompletionStatus::Completed;
        entry.end_date = Some(now);
        return Ok(HistoryTransition::Completed(entry.id.clone()));
    }

    let entry = CourseHistoryEntry {
        id: store.next_history_entry_id()?,
        course_id: context.course_id.clone(),
        course_name: context.course_name.clone(),
        program_id: context.program_id.clone(),
        program_name: context.program_name.clone(),
        batch: context.batch,
        year: context.year,
        completion_status: CompletionStatus::Completed,
        start_date: now,
        end_date: Some(now),
        performance_notes: None,
    };
    let id = entry.id.clone();
    student.course_history.push(entry);
    Ok(HistoryTransition::Synthesized(id))
}
