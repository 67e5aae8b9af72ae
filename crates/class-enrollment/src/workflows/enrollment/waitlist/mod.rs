mod config;
mod priority;

pub use config::WaitlistConfig;
pub use priority::PriorityBreakdown;

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{Class, ClassId, EnrollmentId, ProgramEnrollment, Student, StudentId};
use super::state::EnrollmentState;
use priority::score_entry;

/// Proposed seat for a waiting entry. Applying it goes through normal class assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionProposal {
    pub enrollment_id: EnrollmentId,
    pub student_id: StudentId,
    pub class_id: ClassId,
    pub priority: PriorityBreakdown,
}

/// Stateless matcher pairing waiting entries with free class seats.
#[derive(Debug, Clone, Default)]
pub struct WaitlistPromoter {
    config: WaitlistConfig,
}

impl WaitlistPromoter {
    pub fn new(config: WaitlistConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WaitlistConfig {
        &self.config
    }

    /// Rank `entries` and propose the first open class of their program batch for each.
    ///
    /// Occupancy is derived from the students' enrollments; seats proposed earlier in the
    /// same run count as taken. Entries without a confirmed payment cannot be seated, so they
    /// never claim one. Nothing is mutated.
    pub fn promote(
        &self,
        classes: &[Class],
        entries: &[ProgramEnrollment],
        students: &[Student],
        today: NaiveDate,
    ) -> Vec<PromotionProposal> {
        let by_id: HashMap<&StudentId, &Student> =
            students.iter().map(|student| (&student.id, student)).collect();

        let mut occupancy: HashMap<&ClassId, usize> = HashMap::new();
        for enrollment in students.iter().flat_map(|student| student.enrollments.iter()) {
            if let Some(class_id) = enrollment.class_id() {
                *occupancy.entry(class_id).or_default() += 1;
            }
        }

        let mut candidates: Vec<&Class> =
            classes.iter().filter(|class| !class.is_archived).collect();
        candidates.sort_by(|left, right| left.id.cmp(&right.id));

        let mut ranked: Vec<(PriorityBreakdown, &ProgramEnrollment)> = entries
            .iter()
            .filter(|entry| {
                matches!(
                    entry.state(),
                    EnrollmentState::Waitlist | EnrollmentState::Pending
                ) && entry.is_payment_confirmed()
            })
            .map(|entry| (score_entry(entry, &by_id, today, &self.config), entry))
            .collect();
        ranked.sort_by(|(left_score, left), (right_score, right)| {
            right_score
                .total
                .cmp(&left_score.total)
                .then_with(|| left.enrollment_date.cmp(&right.enrollment_date))
                .then_with(|| left.id.cmp(&right.id))
        });

        let mut proposals = Vec::new();
        for (priority, entry) in ranked {
            let target = candidates.iter().find(|class| {
                class.program_id == entry.program_id
                    && class.batch == entry.batch_number
                    && occupancy.get(&class.id).copied().unwrap_or(0) < usize::from(class.capacity)
            });

            let Some(class) = target else {
                continue;
            };

            *occupancy.entry(&class.id).or_default() += 1;
            proposals.push(PromotionProposal {
                enrollment_id: entry.id.clone(),
                student_id: entry.student_id.clone(),
                class_id: class.id.clone(),
                priority,
            });
        }

        proposals
    }
}
