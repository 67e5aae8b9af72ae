use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use super::capacity::{self, OccupancyView};
use super::domain::{
    Class, ClassId, Course, CourseHistoryEntry, EnrollmentId, NewClass, PaymentStatus, PriceType,
    Program, ProgramEnrollment, ProgramId, Student, StudentId, MAX_CLASS_CAPACITY,
};
use super::error::EnrollmentError;
use super::history::{self, CourseContext, HistoryTransition};
use super::notifications::{
    ClassAssignmentNotice, ClassInfo, EnrollmentEvent, EventPublisher, NotificationRecipients,
    NotificationStatus, ProgramInfo, Recipient,
};
use super::outcome::{
    ArchiveFailure, ArchiveReport, AssignmentOptions, AssignmentOutcome, CompletionOutcome,
    EnrollmentRequest, PromotionReport, ReconcileReport, RejectedProposal, RemovalOutcome,
    UnassignOutcome,
};
use super::pricing::{PriceQuote, PriceTable, PricingResolver};
use super::repository::{EnrollmentRepository, EnrollmentStore, RepositoryError};
use super::state::{EnrollmentAction, EnrollmentState, EnrollmentStatus};
use super::waitlist::{PromotionProposal, WaitlistConfig, WaitlistPromoter};
use super::window::EnrollmentWindowPolicy;
use crate::config::EnrollmentSettings;

/// Orchestrates every enrollment transition inside a repository transaction.
pub struct AssignmentEngine<R, P> {
    repository: Arc<R>,
    events: Arc<P>,
    window: EnrollmentWindowPolicy,
    pricing: PricingResolver,
    promoter: WaitlistPromoter,
    archive_retry_attempts: u8,
}

impl<R, P> AssignmentEngine<R, P>
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(repository: Arc<R>, events: Arc<P>, settings: &EnrollmentSettings) -> Self {
        Self {
            repository,
            events,
            window: EnrollmentWindowPolicy::from(settings),
            pricing: PricingResolver::new(PriceTable::default()),
            promoter: WaitlistPromoter::default(),
            archive_retry_attempts: settings.archive_retry_attempts,
        }
    }

    pub fn with_waitlist_config(mut self, config: WaitlistConfig) -> Self {
        self.promoter = WaitlistPromoter::new(config);
        self
    }

    pub fn with_price_defaults(mut self, defaults: PriceTable) -> Self {
        self.pricing = PricingResolver::new(defaults);
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn window_policy(&self) -> &EnrollmentWindowPolicy {
        &self.window
    }

    /// Sign a student up for one program batch.
    pub fn enroll_program(
        &self,
        request: EnrollmentRequest,
        now: DateTime<Utc>,
    ) -> Result<ProgramEnrollment, EnrollmentError> {
        let enrollment = self
            .repository
            .transaction(|store| self.enroll_in(store, &request, now))?;

        tracing::info!(
            enrollment_id = %enrollment.id,
            student_id = %enrollment.student_id,
            program_id = %enrollment.program_id,
            batch = enrollment.batch_number,
            state = enrollment.state().label(),
            price = enrollment.price_amount,
            "program enrollment created"
        );
        Ok(enrollment)
    }

    fn enroll_in(
        &self,
        store: &mut dyn EnrollmentStore,
        request: &EnrollmentRequest,
        now: DateTime<Utc>,
    ) -> Result<ProgramEnrollment, EnrollmentError> {
        let mut student = require_student(&*store, &request.student_id)?;
        let program = require_program(&*store, &request.program_id)?;

        if !program.has_batch(request.batch_number) {
            return Err(EnrollmentError::InvalidBatch {
                program_id: program.id,
                batch: request.batch_number,
                batches: program.batches,
            });
        }

        let decision = self.window.can_enroll(&program, now.date_naive());
        if !decision.allowed {
            return Err(EnrollmentError::WindowClosed {
                days_passed: decision.days_passed,
                limit_days: decision.limit_days,
                reason: decision
                    .reason
                    .unwrap_or_else(|| "enrollment window closed".to_string()),
            });
        }

        let duplicate = if store
            .find_enrollment(&student.id, &program.id, request.batch_number)?
            .is_some()
        {
            Some("student already holds a live enrollment for this batch")
        } else if student.has_completed_batch(&program.id, request.batch_number) {
            Some("course history shows this batch as completed")
        } else {
            None
        };
        if let Some(detail) = duplicate {
            return Err(EnrollmentError::DuplicateEnrollment {
                program_id: program.id,
                batches: vec![request.batch_number],
                detail: detail.to_string(),
            });
        }

        let price_type = request.price_type.unwrap_or(PriceType::FullPrice);
        let price_amount = self.pricing.amount_for(&*store, price_type)?;
        let (status, payment_status) = if request.payment_confirmed {
            (EnrollmentStatus::Pending, PaymentStatus::Confirmed)
        } else {
            (EnrollmentStatus::Waitlist, PaymentStatus::Pending)
        };

        let enrollment = ProgramEnrollment {
            id: store.next_enrollment_id()?,
            student_id: student.id.clone(),
            program_id: program.id,
            batch_number: request.batch_number,
            status,
            payment_status,
            price_type,
            price_amount,
            enrollment_date: now,
            assigned_at: None,
        };

        student.enrollments.push(enrollment.clone());
        store.put_student(student)?;
        Ok(enrollment)
    }

    /// Record a payment change and move the enrollment between waitlist and pending.
    pub fn update_payment_status(
        &self,
        enrollment_id: &EnrollmentId,
        payment_status: PaymentStatus,
    ) -> Result<ProgramEnrollment, EnrollmentError> {
        let (previous, updated) = self.repository.transaction(|store| {
            let (mut student, current) = load_enrollment(&*store, enrollment_id)?;

            let status = match current.state() {
                EnrollmentState::Waitlist if payment_status == PaymentStatus::Confirmed => {
                    advance(&current, EnrollmentAction::ConfirmPayment)?;
                    EnrollmentStatus::Pending
                }
                EnrollmentState::Pending if payment_status != PaymentStatus::Confirmed => {
                    advance(&current, EnrollmentAction::RevokePayment)?;
                    EnrollmentStatus::Waitlist
                }
                _ => current.status.clone(),
            };

            let updated = update_enrollment(&mut student, enrollment_id, |entry| {
                entry.payment_status = payment_status;
                entry.status = status;
            })?;
            store.put_student(student)?;
            Ok::<_, EnrollmentError>((current.state(), updated))
        })?;

        tracing::info!(
            enrollment_id = %enrollment_id,
            payment_status = payment_status.label(),
            from = previous.label(),
            to = updated.state().label(),
            "payment status updated"
        );
        Ok(updated)
    }

    /// Seat a confirmed enrollment in a class, then publish the assignment notice.
    pub fn assign_to_class(
        &self,
        enrollment_id: &EnrollmentId,
        class_id: &ClassId,
        options: AssignmentOptions,
        now: DateTime<Utc>,
    ) -> Result<AssignmentOutcome, EnrollmentError> {
        let (enrollment, history, notice) = self
            .repository
            .transaction(|store| self.assign_in(store, enrollment_id, class_id, options, now))?;

        tracing::info!(
            enrollment_id = %enrollment.id,
            student_id = %enrollment.student_id,
            class_id = %class_id,
            "student assigned to class"
        );

        let notification = self.publish_assignment(notice);
        Ok(AssignmentOutcome {
            enrollment,
            history,
            notification,
        })
    }

    fn assign_in(
        &self,
        store: &mut dyn EnrollmentStore,
        enrollment_id: &EnrollmentId,
        class_id: &ClassId,
        options: AssignmentOptions,
        now: DateTime<Utc>,
    ) -> Result<(ProgramEnrollment, HistoryTransition, ClassAssignmentNotice), EnrollmentError> {
        let (mut student, current) = load_enrollment(&*store, enrollment_id)?;

        if !current.is_payment_confirmed() {
            return Err(EnrollmentError::PaymentNotConfirmed {
                enrollment_id: current.id,
                payment_status: current.payment_status,
            });
        }

        let class = require_class(&*store, class_id)?;

        if current.class_id() == Some(&class.id) {
            return Err(EnrollmentError::AlreadyAssigned { class_id: class.id });
        }
        advance(&current, EnrollmentAction::AssignToClass)?;

        if class.program_id != current.program_id {
            return Err(EnrollmentError::ProgramMismatch {
                class_id: class.id,
                class_program: class.program_id,
                enrollment_program: current.program_id,
            });
        }
        if class.batch != current.batch_number {
            return Err(EnrollmentError::BatchMismatch {
                class_id: class.id,
                class_batch: class.batch,
                enrollment_batch: current.batch_number,
            });
        }
        if class.is_archived {
            return Err(EnrollmentError::ClassArchived { class_id: class.id });
        }
        if student.is_seated_in(&class.id) {
            return Err(EnrollmentError::AlreadyAssigned { class_id: class.id });
        }

        let course = require_course(&*store, &class)?;
        if student.has_completed_course(&course.id) && !options.acknowledge_prior_completion {
            return Err(EnrollmentError::PriorCompletionRequiresConfirmation {
                course_id: course.id,
                course_name: course.name,
            });
        }

        if !capacity::has_availability(&*store, &class)? {
            return Err(EnrollmentError::CapacityExceeded {
                occupancy: capacity::occupancy(&*store, &class.id)?,
                class_id: class.id,
                capacity: class.capacity,
            });
        }

        let program = require_program(&*store, &current.program_id)?;
        let context = CourseContext::new(&program, &class, &course);

        let updated = update_enrollment(&mut student, enrollment_id, |entry| {
            entry.status = EnrollmentStatus::Assigned {
                class_id: class.id.clone(),
            };
            entry.assigned_at = Some(now);
        })?;
        let history = history::start_course(store, &mut student, &context, now)?;
        let notice = assignment_notice(&*store, &student, &updated, &class, &course, &program)?;

        store.put_student(student)?;
        capacity::rebuild_roster(store, &class.id)?;
        Ok((updated, history, notice))
    }

    fn publish_assignment(&self, notice: ClassAssignmentNotice) -> NotificationStatus {
        if notice.recipients.is_empty() {
            tracing::warn!(
                enrollment_id = %notice.enrollment_id,
                "no contact details on record; assignment notice skipped"
            );
            return NotificationStatus::NoRecipients;
        }

        let enrollment_id = notice.enrollment_id.clone();
        match self.events.publish(EnrollmentEvent::ClassAssigned(notice)) {
            Ok(()) => NotificationStatus::Queued,
            Err(error) => {
                tracing::warn!(
                    %enrollment_id,
                    error = %error,
                    "assignment committed but notice could not be queued"
                );
                NotificationStatus::Failed {
                    reason: error.to_string(),
                }
            }
        }
    }

    /// Give up a class seat; the enrollment returns to pending.
    pub fn unassign_from_class(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<UnassignOutcome, EnrollmentError> {
        let outcome = self.repository.transaction(|store| {
            let (mut student, current) = load_enrollment(&*store, enrollment_id)?;
            advance(&current, EnrollmentAction::UnassignFromClass)?;
            let class_id = seated_class(&current, EnrollmentAction::UnassignFromClass)?;
            let class = require_class(&*store, &class_id)?;

            let history = history::discard_in_progress(
                &mut student,
                &class.course_id,
                &current.program_id,
                class.batch,
            );
            let updated = update_enrollment(&mut student, enrollment_id, |entry| {
                entry.status = EnrollmentStatus::Pending;
                entry.assigned_at = None;
            })?;

            store.put_student(student)?;
            capacity::rebuild_roster(store, &class_id)?;
            Ok::<_, EnrollmentError>(UnassignOutcome {
                enrollment: updated,
                released_class: class_id,
                history,
            })
        })?;

        tracing::info!(
            enrollment_id = %enrollment_id,
            class_id = %outcome.released_class,
            "student unassigned from class"
        );
        Ok(outcome)
    }

    /// Remove the enrollment from its program entirely, releasing any class seat.
    pub fn unassign_from_program(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<RemovalOutcome, EnrollmentError> {
        let outcome = self.repository.transaction(|store| {
            let (mut student, current) = load_enrollment(&*store, enrollment_id)?;
            let state = advance(&current, EnrollmentAction::RemoveFromProgram)?;

            let released_class = current.class_id().cloned();
            let history = match &released_class {
                Some(class_id) => match store.class(class_id)? {
                    Some(class) => history::discard_in_progress(
                        &mut student,
                        &class.course_id,
                        &current.program_id,
                        class.batch,
                    ),
                    None => HistoryTransition::Untouched,
                },
                None => HistoryTransition::Untouched,
            };

            student.remove_enrollment(enrollment_id);
            let student_id = student.id.clone();
            store.put_student(student)?;
            if let Some(class_id) = &released_class {
                capacity::rebuild_roster(store, class_id)?;
            }

            Ok::<_, EnrollmentError>(RemovalOutcome {
                enrollment_id: current.id.clone(),
                student_id,
                previous_state: current.state(),
                state,
                released_class,
                history,
            })
        })?;

        tracing::info!(
            enrollment_id = %outcome.enrollment_id,
            from = outcome.previous_state.label(),
            "enrollment removed from program"
        );
        Ok(outcome)
    }

    /// Finish the course for a seated student. The enrollment is deleted; history keeps the fact.
    pub fn mark_completed(
        &self,
        enrollment_id: &EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome, EnrollmentError> {
        let outcome = self
            .repository
            .transaction(|store| complete_in(store, enrollment_id, now))?;

        tracing::info!(
            enrollment_id = %outcome.enrollment_id,
            class_id = %outcome.class_id,
            "enrollment completed"
        );
        Ok(outcome)
    }

    /// Complete every occupant and flag the class archived once nobody is left in it.
    pub fn archive_class(
        &self,
        class_id: &ClassId,
        now: DateTime<Utc>,
    ) -> Result<ArchiveReport, EnrollmentError> {
        let (class, occupants) = self.repository.read(|store| {
            let class = require_class(store, class_id)?;
            let occupants = store.enrollments_in_class(class_id)?;
            Ok::<_, EnrollmentError>((class, occupants))
        })?;

        if class.is_archived {
            tracing::info!(class_id = %class_id, "class already archived");
            return Ok(ArchiveReport {
                class_id: class.id,
                archived: true,
                already_archived: true,
                completed: 0,
                failures: Vec::new(),
            });
        }

        let max_attempts = u32::from(self.archive_retry_attempts) + 1;
        let mut completed = 0;
        let mut failures = Vec::new();

        for occupant in occupants {
            let mut attempts = 0;
            loop {
                attempts += 1;
                match self
                    .repository
                    .transaction(|store| complete_in(store, &occupant.id, now))
                {
                    Ok(_) => {
                        completed += 1;
                        break;
                    }
                    Err(error) if error.is_transient() && attempts < max_attempts => {
                        tracing::warn!(
                            class_id = %class_id,
                            enrollment_id = %occupant.id,
                            attempts,
                            error = %error,
                            "archive completion failed; retrying"
                        );
                    }
                    Err(error) => {
                        tracing::warn!(
                            class_id = %class_id,
                            enrollment_id = %occupant.id,
                            attempts,
                            error = %error,
                            "archive completion failed"
                        );
                        failures.push(ArchiveFailure {
                            enrollment_id: occupant.id.clone(),
                            student_id: occupant.student_id.clone(),
                            reason: error.to_string(),
                            attempts,
                        });
                        break;
                    }
                }
            }
        }

        let late_arrivals = self
            .repository
            .transaction(|store| seal_class(store, class_id))?;
        for arrival in late_arrivals {
            if failures
                .iter()
                .any(|failure| failure.enrollment_id == arrival.id)
            {
                continue;
            }
            tracing::warn!(
                class_id = %class_id,
                enrollment_id = %arrival.id,
                "student assigned while the archive was running"
            );
            failures.push(ArchiveFailure {
                enrollment_id: arrival.id,
                student_id: arrival.student_id,
                reason: "assigned to the class while the archive was running".to_string(),
                attempts: 0,
            });
        }
        let archived = failures.is_empty();

        if archived {
            tracing::info!(class_id = %class_id, completed, "class archived");
        } else {
            tracing::warn!(
                class_id = %class_id,
                completed,
                failed = failures.len(),
                "class left unarchived; occupants remain"
            );
        }

        Ok(ArchiveReport {
            class_id: class.id,
            archived,
            already_archived: false,
            completed,
            failures,
        })
    }

    /// Clear the archive flag. Completed enrollments stay completed.
    pub fn unarchive_class(&self, class_id: &ClassId) -> Result<Class, EnrollmentError> {
        let class = self.repository.transaction(|store| {
            let mut class = require_class(&*store, class_id)?;
            class.is_archived = false;
            store.put_class(class.clone())?;
            Ok::<_, EnrollmentError>(class)
        })?;

        tracing::info!(class_id = %class_id, "class unarchived");
        Ok(class)
    }

    /// Persist a new class after checking it against its program.
    pub fn register_class(&self, new_class: NewClass) -> Result<Class, EnrollmentError> {
        validate_capacity(new_class.capacity)?;

        let class = self.repository.transaction(|store| {
            if store.class(&new_class.id)?.is_some() {
                return Err(EnrollmentError::Repository(RepositoryError::Conflict));
            }

            let program = require_program(&*store, &new_class.program_id)?;
            if !program.has_batch(new_class.batch) {
                return Err(EnrollmentError::InvalidBatch {
                    program_id: program.id,
                    batch: new_class.batch,
                    batches: program.batches,
                });
            }
            if !program.offers_slot(&new_class.slot) {
                return Err(EnrollmentError::InvalidClass(format!(
                    "slot '{}' is not offered by program {}",
                    new_class.slot, program.id
                )));
            }
            if store.course(&new_class.course_id)?.is_none() {
                return Err(EnrollmentError::not_found("course", &new_class.course_id));
            }
            if let Some(teacher_id) = &new_class.teacher_id {
                if store.teacher(teacher_id)?.is_none() {
                    return Err(EnrollmentError::not_found("teacher", teacher_id));
                }
            }

            let class = Class {
                id: new_class.id.clone(),
                program_id: new_class.program_id.clone(),
                course_id: new_class.course_id.clone(),
                batch: new_class.batch,
                slot: new_class.slot.clone(),
                capacity: new_class.capacity,
                teacher_id: new_class.teacher_id.clone(),
                is_archived: false,
                students: Vec::new(),
            };
            store.put_class(class.clone())?;
            Ok::<_, EnrollmentError>(class)
        })?;

        tracing::info!(class_id = %class.id, program_id = %class.program_id, "class registered");
        Ok(class)
    }

    /// Change a class's capacity and evict any resulting overflow.
    pub fn set_class_capacity(
        &self,
        class_id: &ClassId,
        capacity: u8,
    ) -> Result<ReconcileReport, EnrollmentError> {
        validate_capacity(capacity)?;

        self.repository.transaction(|store| {
            let mut class = require_class(&*store, class_id)?;
            class.capacity = capacity;
            store.put_class(class)?;
            reconcile_in(store, class_id)
        })
    }

    /// Correct drift between enrollments, capacity, and the cached roster.
    pub fn reconcile_class(&self, class_id: &ClassId) -> Result<ReconcileReport, EnrollmentError> {
        self.repository
            .transaction(|store| reconcile_in(store, class_id))
    }

    pub fn occupancy(&self, class_id: &ClassId) -> Result<OccupancyView, EnrollmentError> {
        self.repository.read(|store| {
            let class = require_class(store, class_id)?;
            Ok(capacity::occupancy_view(store, &class)?)
        })
    }

    pub fn price_quote(&self, price_type: PriceType) -> Result<PriceQuote, EnrollmentError> {
        self.repository
            .read(|store| Ok(self.pricing.quote(store, price_type)?))
    }

    pub fn price_table(&self) -> Result<Vec<PriceQuote>, EnrollmentError> {
        self.repository.read(|store| Ok(self.pricing.table(store)?))
    }

    /// Future enrollments of this tier capture `amount`; existing ones keep their price.
    pub fn set_price_override(
        &self,
        price_type: PriceType,
        amount: u32,
    ) -> Result<PriceQuote, EnrollmentError> {
        let quote = self.repository.transaction(|store| {
            store.set_price_override(price_type, Some(amount))?;
            Ok::<_, EnrollmentError>(self.pricing.quote(&*store, price_type)?)
        })?;

        tracing::info!(price_type = price_type.label(), amount, "price override set");
        Ok(quote)
    }

    pub fn clear_price_override(
        &self,
        price_type: PriceType,
    ) -> Result<PriceQuote, EnrollmentError> {
        let quote = self.repository.transaction(|store| {
            store.set_price_override(price_type, None)?;
            Ok::<_, EnrollmentError>(self.pricing.quote(&*store, price_type)?)
        })?;

        tracing::info!(price_type = price_type.label(), "price override cleared");
        Ok(quote)
    }

    /// Admin price edit on one enrollment. Without `amount` the tier's current price is captured.
    pub fn edit_enrollment_price(
        &self,
        enrollment_id: &EnrollmentId,
        price_type: PriceType,
        amount: Option<u32>,
    ) -> Result<ProgramEnrollment, EnrollmentError> {
        let updated = self.repository.transaction(|store| {
            let (mut student, _) = load_enrollment(&*store, enrollment_id)?;
            let price_amount = match amount {
                Some(amount) => amount,
                None => self.pricing.amount_for(&*store, price_type)?,
            };
            let updated = update_enrollment(&mut student, enrollment_id, |entry| {
                entry.price_type = price_type;
                entry.price_amount = price_amount;
            })?;
            store.put_student(student)?;
            Ok::<_, EnrollmentError>(updated)
        })?;

        tracing::info!(
            enrollment_id = %enrollment_id,
            price_type = price_type.label(),
            amount = updated.price_amount,
            "enrollment price edited"
        );
        Ok(updated)
    }

    pub fn enrollment(
        &self,
        enrollment_id: &EnrollmentId,
    ) -> Result<ProgramEnrollment, EnrollmentError> {
        self.repository
            .read(|store| Ok(load_enrollment(store, enrollment_id)?.1))
    }

    pub fn course_history(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<CourseHistoryEntry>, EnrollmentError> {
        self.repository
            .read(|store| Ok(require_student(store, student_id)?.course_history))
    }

    /// Rank the program's waiting entries against open seats without changing anything.
    pub fn waitlist_proposals(
        &self,
        program_id: &ProgramId,
        today: NaiveDate,
    ) -> Result<Vec<PromotionProposal>, EnrollmentError> {
        self.repository.read(|store| {
            require_program(store, program_id)?;
            let classes = store.classes_for_program(program_id)?;
            let students = store.students()?;
            let entries: Vec<ProgramEnrollment> = students
                .iter()
                .flat_map(|student| student.enrollments.iter())
                .filter(|enrollment| &enrollment.program_id == program_id)
                .cloned()
                .collect();

            Ok(self.promoter.promote(&classes, &entries, &students, today))
        })
    }

    /// Apply proposals one assignment at a time; each is re-validated when it commits.
    pub fn apply_proposals(
        &self,
        proposals: Vec<PromotionProposal>,
        now: DateTime<Utc>,
    ) -> PromotionReport {
        let mut report = PromotionReport::default();

        for proposal in proposals {
            match self.assign_to_class(
                &proposal.enrollment_id,
                &proposal.class_id,
                AssignmentOptions::default(),
                now,
            ) {
                Ok(outcome) => report.applied.push(outcome),
                Err(error) => {
                    tracing::warn!(
                        enrollment_id = %proposal.enrollment_id,
                        class_id = %proposal.class_id,
                        error = %error,
                        "waitlist proposal rejected"
                    );
                    report.rejected.push(RejectedProposal {
                        code: error.code(),
                        reason: error.to_string(),
                        proposal,
                    });
                }
            }
        }

        report
    }
}

fn complete_in(
    store: &mut dyn EnrollmentStore,
    enrollment_id: &EnrollmentId,
    now: DateTime<Utc>,
) -> Result<CompletionOutcome, EnrollmentError> {
    let (mut student, current) = load_enrollment(&*store, enrollment_id)?;
    let state = advance(&current, EnrollmentAction::Complete)?;
    let class_id = seated_class(&current, EnrollmentAction::Complete)?;
    let class = require_class(&*store, &class_id)?;
    let course = require_course(&*store, &class)?;
    let program = require_program(&*store, &current.program_id)?;

    let context = CourseContext::new(&program, &class, &course);
    let history = history::complete_course(store, &mut student, &context, now)?;
    student.remove_enrollment(enrollment_id);
    student.is_returning_student = true;

    let student_id = student.id.clone();
    store.put_student(student)?;
    capacity::rebuild_roster(store, &class_id)?;

    Ok(CompletionOutcome {
        enrollment_id: current.id,
        student_id,
        class_id,
        state,
        history,
    })
}

/// Flag the class archived when nobody holds a seat; otherwise return the remaining occupants.
fn seal_class(
    store: &mut dyn EnrollmentStore,
    class_id: &ClassId,
) -> Result<Vec<ProgramEnrollment>, EnrollmentError> {
    let mut class = require_class(&*store, class_id)?;
    let remaining = store.enrollments_in_class(class_id)?;
    if !remaining.is_empty() {
        return Ok(remaining);
    }

    class.is_archived = true;
    class.students.clear();
    store.put_class(class)?;
    Ok(remaining)
}

fn reconcile_in(
    store: &mut dyn EnrollmentStore,
    class_id: &ClassId,
) -> Result<ReconcileReport, EnrollmentError> {
    let class = require_class(&*store, class_id)?;
    let evictions = capacity::overflow(store.enrollments_in_class(class_id)?, class.capacity);

    let mut evicted = Vec::with_capacity(evictions.len());
    for enrollment in evictions {
        advance(&enrollment, EnrollmentAction::Evict)?;
        let mut student = require_student(&*store, &enrollment.student_id)?;
        history::discard_in_progress(
            &mut student,
            &class.course_id,
            &enrollment.program_id,
            class.batch,
        );
        update_enrollment(&mut student, &enrollment.id, |entry| {
            entry.status = EnrollmentStatus::Pending;
            entry.assigned_at = None;
        })?;
        store.put_student(student)?;

        tracing::warn!(
            class_id = %class_id,
            enrollment_id = %enrollment.id,
            capacity = class.capacity,
            "class over capacity; enrollment returned to pending"
        );
        evicted.push(enrollment.id);
    }

    let roster_rebuilt = capacity::rebuild_roster(store, class_id)?;
    if roster_rebuilt && evicted.is_empty() {
        tracing::warn!(class_id = %class_id, "cached roster drifted from enrollments; rebuilt");
    }

    Ok(ReconcileReport {
        class_id: class.id,
        capacity: class.capacity,
        occupancy: store.count_assigned(class_id)?,
        evicted,
        roster_rebuilt,
    })
}

fn assignment_notice(
    store: &dyn EnrollmentStore,
    student: &Student,
    enrollment: &ProgramEnrollment,
    class: &Class,
    course: &Course,
    program: &Program,
) -> Result<ClassAssignmentNotice, RepositoryError> {
    let teacher = match &class.teacher_id {
        Some(teacher_id) => store.teacher(teacher_id)?.and_then(|teacher| {
            teacher.email.map(|email| Recipient {
                name: teacher.name,
                email,
            })
        }),
        None => None,
    };
    let student_recipient = student.email.clone().map(|email| Recipient {
        name: student.name.clone(),
        email,
    });
    let parent = student.parent_email.clone().map(|email| Recipient {
        name: format!("Parent of {}", student.name),
        email,
    });

    Ok(ClassAssignmentNotice {
        enrollment_id: enrollment.id.clone(),
        student_id: student.id.clone(),
        recipients: NotificationRecipients {
            teacher,
            student: student_recipient,
            parent,
        },
        class_info: ClassInfo {
            class_id: class.id.clone(),
            course_name: course.name.clone(),
            batch: class.batch,
            slot: class.slot.clone(),
        },
        program_info: ProgramInfo {
            program_id: program.id.clone(),
            name: program.name.clone(),
            program_type: program.program_type,
            season: program.season.clone(),
            year: program.year,
        },
        enrollment_date: enrollment.enrollment_date,
    })
}

fn advance(
    enrollment: &ProgramEnrollment,
    action: EnrollmentAction,
) -> Result<EnrollmentState, EnrollmentError> {
    let from = enrollment.state();
    from.apply(action)
        .ok_or_else(|| EnrollmentError::InvalidTransition {
            enrollment_id: enrollment.id.clone(),
            from,
            action,
        })
}

fn seated_class(
    enrollment: &ProgramEnrollment,
    action: EnrollmentAction,
) -> Result<ClassId, EnrollmentError> {
    enrollment
        .class_id()
        .cloned()
        .ok_or_else(|| EnrollmentError::InvalidTransition {
            enrollment_id: enrollment.id.clone(),
            from: enrollment.state(),
            action,
        })
}

fn validate_capacity(capacity: u8) -> Result<(), EnrollmentError> {
    if (1..=MAX_CLASS_CAPACITY).contains(&capacity) {
        Ok(())
    } else {
        Err(EnrollmentError::InvalidClass(format!(
            "capacity must be between 1 and {MAX_CLASS_CAPACITY}, got {capacity}"
        )))
    }
}

fn update_enrollment(
    student: &mut Student,
    enrollment_id: &EnrollmentId,
    change: impl FnOnce(&mut ProgramEnrollment),
) -> Result<ProgramEnrollment, EnrollmentError> {
    let entry = student
        .enrollment_mut(enrollment_id)
        .ok_or_else(|| EnrollmentError::not_found("enrollment", enrollment_id))?;
    change(entry);
    Ok(entry.clone())
}

fn load_enrollment(
    store: &dyn EnrollmentStore,
    enrollment_id: &EnrollmentId,
) -> Result<(Student, ProgramEnrollment), EnrollmentError> {
    let enrollment = store
        .enrollment(enrollment_id)?
        .ok_or_else(|| EnrollmentError::not_found("enrollment", enrollment_id))?;
    let student = require_student(store, &enrollment.student_id)?;
    Ok((student, enrollment))
}

fn require_student(
    store: &dyn EnrollmentStore,
    id: &StudentId,
) -> Result<Student, EnrollmentError> {
    store
        .student(id)?
        .ok_or_else(|| EnrollmentError::not_found("student", id))
}

fn require_program(
    store: &dyn EnrollmentStore,
    id: &ProgramId,
) -> Result<Program, EnrollmentError> {
    store
        .program(id)?
        .ok_or_else(|| EnrollmentError::not_found("program", id))
}

fn require_class(store: &dyn EnrollmentStore, id: &ClassId) -> Result<Class, EnrollmentError> {
    store
        .class(id)?
        .ok_or_else(|| EnrollmentError::not_found("class", id))
}

fn require_course(store: &dyn EnrollmentStore, class: &Class) -> Result<Course, EnrollmentError> {
    store
        .course(&class.course_id)?
        .ok_or_else(|| EnrollmentError::not_found("course", &class.course_id))
}
