use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::super::domain::{ProgramEnrollment, Student, StudentId};
use super::config::WaitlistConfig;

/// Discrete contributions to an entry's priority so operators can see why it ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub returning: u32,
    pub siblings: u32,
    pub wait: u32,
    pub days_waiting: i64,
    pub total: u32,
}

pub(crate) fn score_entry(
    entry: &ProgramEnrollment,
    students: &HashMap<&StudentId, &Student>,
    today: NaiveDate,
    config: &WaitlistConfig,
) -> PriorityBreakdown {
    let student = students.get(&entry.student_id);

    let returning = match student {
        Some(student) if student.is_returning_student => config.returning_student_bonus,
        _ => 0,
    };

    let has_enrolled_sibling = student
        .map(|student| {
            student.sibling_ids.iter().any(|sibling_id| {
                students.get(sibling_id).is_some_and(|sibling| {
                    sibling
                        .enrollments
                        .iter()
                        .any(|enrollment| enrollment.program_id == entry.program_id)
                })
            })
        })
        .unwrap_or(false);
    let siblings = if has_enrolled_sibling {
        config.sibling_bonus
    } else {
        0
    };

    let days_waiting = today
        .signed_duration_since(entry.enrollment_date.date_naive())
        .num_days()
        .max(0);
    let wait = u32::try_from(days_waiting)
        .unwrap_or(u32::MAX)
        .saturating_mul(config.daily_wait_bonus)
        .min(config.max_wait_bonus);

    PriorityBreakdown {
        returning,
        siblings,
        wait,
        days_waiting,
        total: returning + siblings + wait,
    }
}
