use serde::Serialize;

use super::domain::{Class, ClassId, ProgramEnrollment, StudentId};
use super::repository::{EnrollmentStore, RepositoryError};

/// Seats held in a class, derived from enrollments rather than the cached roster.
pub fn occupancy(
    store: &dyn EnrollmentStore,
    class_id: &ClassId,
) -> Result<usize, RepositoryError> {
    store.count_assigned(class_id)
}

pub fn has_availability(
    store: &dyn EnrollmentStore,
    class: &Class,
) -> Result<bool, RepositoryError> {
    Ok(occupancy(store, &class.id)? < usize::from(class.capacity))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccupancyView {
    pub class_id: ClassId,
    pub capacity: u8,
    pub occupancy: usize,
    pub available: usize,
    pub is_archived: bool,
    /// Cached roster disagrees with the enrollments.
    pub roster_drift: bool,
    /// Occupancy exceeds capacity and needs reconciliation.
    pub over_capacity: bool,
}

pub fn occupancy_view(
    store: &dyn EnrollmentStore,
    class: &Class,
) -> Result<OccupancyView, RepositoryError> {
    let assigned = store.enrollments_in_class(&class.id)?;
    let capacity = usize::from(class.capacity);
    let derived = roster_from(&assigned);

    Ok(OccupancyView {
        class_id: class.id.clone(),
        capacity: class.capacity,
        occupancy: assigned.len(),
        available: capacity.saturating_sub(assigned.len()),
        is_archived: class.is_archived,
        roster_drift: derived != class.students,
        over_capacity: assigned.len() > capacity,
    })
}

/// Enrollments to evict so the class fits its capacity, most recently assigned first.
pub(crate) fn overflow(
    mut assigned: Vec<ProgramEnrollment>,
    capacity: u8,
) -> Vec<ProgramEnrollment> {
    let capacity = usize::from(capacity);
    if assigned.len() <= capacity {
        return Vec::new();
    }

    let excess = assigned.len() - capacity;
    assigned.sort_by(|left, right| {
        right
            .assigned_at
            .cmp(&left.assigned_at)
            .then_with(|| right.id.cmp(&left.id))
    });
    assigned.truncate(excess);
    assigned
}

fn roster_from(assigned: &[ProgramEnrollment]) -> Vec<StudentId> {
    let mut ordered: Vec<&ProgramEnrollment> = assigned.iter().collect();
    ordered.sort_by(|left, right| {
        left.assigned_at
            .cmp(&right.assigned_at)
            .then_with(|| left.id.cmp(&right.id))
    });
    ordered
        .into_iter()
        .map(|enrollment| enrollment.student_id.clone())
        .collect()
}

/// Rebuild the class's cached roster from enrollments. Returns whether it changed.
pub(crate) fn rebuild_roster(
    store: &mut dyn EnrollmentStore,
    class_id: &ClassId,
) -> Result<bool, RepositoryError> {
    let Some(mut class) = store.class(class_id)? else {
        return Ok(false);
    };

    let roster = roster_from(&store.enrollments_in_class(class_id)?);
    if roster == class.students {
        return Ok(false);
    }

    class.students = roster;
    store.put_class(class)?;
    Ok(true)
}
