use std::sync::Arc;

use super::common::*;

use crate::config::EnrollmentSettings;
use crate::workflows::enrollment::domain::{
    ClassId, CompletionStatus, CourseHistoryEntry, CourseId, EnrollmentId, HistoryEntryId,
    NewClass, PaymentStatus, PriceType, ProgramEnrollment, ProgramId, StudentId, TeacherId,
};
use crate::workflows::enrollment::memory::InMemoryEnrollmentRepository;
use crate::workflows::enrollment::error::EnrollmentError;
use crate::workflows::enrollment::history::HistoryTransition;
use crate::workflows::enrollment::notifications::{EnrollmentEvent, NotificationStatus};
use crate::workflows::enrollment::outcome::AssignmentOptions;
use crate::workflows::enrollment::repository::RepositoryError;
use crate::workflows::enrollment::state::{EnrollmentAction, EnrollmentState, EnrollmentStatus};
use crate::workflows::enrollment::AssignmentEngine;

fn assign(
    engine: &TestEngine,
    enrollment: &ProgramEnrollment,
    class_id: &str,
) -> Result<crate::workflows::enrollment::outcome::AssignmentOutcome, EnrollmentError> {
    engine.assign_to_class(
        &enrollment.id,
        &ClassId::new(class_id),
        AssignmentOptions::default(),
        now(),
    )
}

/// Ana already holds `enr-000001` and `hist-000001` from an earlier run of the service.
fn persisted_snapshot() -> InMemoryEnrollmentRepository {
    let mut snapshot = seeded_snapshot();
    let ana = snapshot
        .students
        .get_mut(&StudentId::new("s-ana"))
        .expect("ana is seeded");
    ana.enrollments.push(ProgramEnrollment {
        id: EnrollmentId::new("enr-000001"),
        student_id: ana.id.clone(),
        program_id: ProgramId::new(CAMP),
        batch_number: 1,
        status: EnrollmentStatus::Assigned {
            class_id: ClassId::new("scratch-b1"),
        },
        payment_status: PaymentStatus::Confirmed,
        price_type: PriceType::FullPrice,
        price_amount: 4000,
        enrollment_date: now(),
        assigned_at: Some(now()),
    });
    ana.course_history.push(CourseHistoryEntry {
        id: HistoryEntryId::new("hist-000001"),
        course_id: CourseId::new("scratch"),
        course_name: "Scratch Foundations".to_string(),
        program_id: ProgramId::new(CAMP),
        program_name: "Summer Holiday Code Camp".to_string(),
        batch: 1,
        year: 2025,
        completion_status: CompletionStatus::InProgress,
        start_date: now(),
        end_date: None,
        performance_notes: None,
    });
    InMemoryEnrollmentRepository::with_snapshot(snapshot)
}

fn engine_over(repository: &InMemoryEnrollmentRepository) -> TestEngine {
    AssignmentEngine::new(
        Arc::new(repository.clone()),
        Arc::new(RecordingPublisher::default()),
        &EnrollmentSettings::default(),
    )
}

#[test]
fn new_ids_skip_those_already_in_the_store() {
    let repository = persisted_snapshot();
    let engine = engine_over(&repository);

    let ben = enroll(&engine, "s-ben", 1, true);

    assert_ne!(ben.id, EnrollmentId::new("enr-000001"));
    let stored = engine.enrollment(&ben.id).expect("ben's enrollment");
    assert_eq!(stored.student_id, StudentId::new("s-ben"));

    let outcome = assign(&engine, &ben, "scratch-b1").expect("ben takes a seat");
    match outcome.history {
        HistoryTransition::Started(id) => assert_ne!(id, HistoryEntryId::new("hist-000001")),
        other => panic!("expected a new history entry, got {other:?}"),
    }

    let ana = engine
        .mark_completed(&EnrollmentId::new("enr-000001"), now())
        .expect("ana completes");
    assert_eq!(ana.student_id, StudentId::new("s-ana"));
    assert_eq!(
        stored_student(&repository, "s-ben").enrollments[0].class_id(),
        Some(&ClassId::new("scratch-b1"))
    );
}

#[test]
fn id_sequence_survives_a_restart() {
    let repository = persisted_snapshot();
    let ben = enroll(&engine_over(&repository), "s-ben", 1, true);

    let restarted = engine_over(&repository);
    let cam = enroll(&restarted, "s-cam", 1, true);

    assert_ne!(cam.id, ben.id);
    assert_ne!(cam.id, EnrollmentId::new("enr-000001"));
    let sequences = repository.snapshot().expect("snapshot").sequences;
    assert_eq!(sequences.enrollment, 3);
}

#[test]
fn confirmed_sign_up_is_pending_with_captured_price() {
    let (engine, repository, _) = build_engine();

    let enrollment = enroll(&engine, "s-ana", 1, true);

    assert_eq!(enrollment.state(), EnrollmentState::Pending);
    assert_eq!(enrollment.payment_status, PaymentStatus::Confirmed);
    assert_eq!(enrollment.price_type, PriceType::FullPrice);
    assert_eq!(enrollment.price_amount, 4000);
    assert_eq!(enrollment.enrollment_date, now());
    assert_eq!(stored_student(&repository, "s-ana").enrollments, vec![enrollment]);
}

#[test]
fn unpaid_sign_up_lands_on_the_waitlist() {
    let (engine, _, _) = build_engine();

    let enrollment = enroll(&engine, "s-ben", 1, false);

    assert_eq!(enrollment.state(), EnrollmentState::Waitlist);
    assert_eq!(enrollment.payment_status, PaymentStatus::Pending);
}

#[test]
fn second_live_enrollment_for_the_same_batch_is_rejected() {
    let (engine, _, _) = build_engine();
    enroll(&engine, "s-ana", 1, false);

    let error = engine
        .enroll_program(request("s-ana", CAMP, 1, true), now())
        .expect_err("duplicate rejected");
    match error {
        EnrollmentError::DuplicateEnrollment {
            program_id,
            batches,
            ..
        } => {
            assert_eq!(program_id, ProgramId::new(CAMP));
            assert_eq!(batches, vec![1]);
        }
        other => panic!("expected duplicate enrollment, got {other:?}"),
    }

    let other_batch = enroll(&engine, "s-ana", 2, false);
    assert_eq!(other_batch.batch_number, 2);
}

#[test]
fn completed_batch_cannot_be_enrolled_again() {
    let (engine, _, _) = build_engine();
    let seated = seat(&engine, "s-dia", "scratch-b1", 1);
    engine
        .mark_completed(&seated.id, now())
        .expect("completion succeeds");

    let error = engine
        .enroll_program(request("s-dia", CAMP, 1, true), now())
        .expect_err("completed batch rejected");
    assert_eq!(error.code(), "duplicate_enrollment");
}

#[test]
fn sign_up_validates_student_program_and_batch() {
    let (engine, _, _) = build_engine();

    let missing_student = engine
        .enroll_program(request("s-zed", CAMP, 1, true), now())
        .expect_err("unknown student");
    assert!(matches!(
        missing_student,
        EnrollmentError::NotFound { entity: "student", .. }
    ));

    let missing_program = engine
        .enroll_program(request("s-ana", "winter-camp", 1, true), now())
        .expect_err("unknown program");
    assert!(matches!(
        missing_program,
        EnrollmentError::NotFound { entity: "program", .. }
    ));

    let bad_batch = engine
        .enroll_program(request("s-ana", CAMP, 3, true), now())
        .expect_err("batch out of range");
    assert!(matches!(
        bad_batch,
        EnrollmentError::InvalidBatch {
            batch: 3,
            batches: 2,
            ..
        }
    ));
}

#[test]
fn sign_up_after_the_window_closes_is_rejected() {
    let (engine, repository, _) = build_engine();

    let error = engine
        .enroll_program(request("s-ana", CAMP, 1, true), at(date(2025, 7, 11)))
        .expect_err("window closed");
    match error {
        EnrollmentError::WindowClosed {
            days_passed,
            limit_days,
            ..
        } => {
            assert_eq!(days_passed, Some(6));
            assert_eq!(limit_days, 5);
        }
        other => panic!("expected closed window, got {other:?}"),
    }
    assert!(stored_student(&repository, "s-ana").enrollments.is_empty());

    let unscheduled = engine
        .enroll_program(request("s-ana", UNSCHEDULED, 1, true), now())
        .expect_err("programs without a start date are closed");
    assert_eq!(unscheduled.code(), "window_closed");
}

#[test]
fn unpaid_enrollment_cannot_take_a_seat_until_payment_is_confirmed() {
    let (engine, repository, events) = build_engine();
    let waiting = enroll(&engine, "s-ana", 1, false);

    let error = assign(&engine, &waiting, "scratch-b1").expect_err("payment gate");
    match &error {
        EnrollmentError::PaymentNotConfirmed { payment_status, .. } => {
            assert_eq!(*payment_status, PaymentStatus::Pending);
        }
        other => panic!("expected payment gate, got {other:?}"),
    }
    assert!(error.to_string().contains("is PENDING"));
    assert!(!error.to_string().contains("/api/"));

    let untouched = stored_student(&repository, "s-ana");
    assert_eq!(untouched.enrollments[0].state(), EnrollmentState::Waitlist);
    assert!(untouched.course_history.is_empty());
    assert!(stored_class(&repository, "scratch-b1").students.is_empty());
    assert!(events.events().is_empty());

    let confirmed = engine
        .update_payment_status(&waiting.id, PaymentStatus::Confirmed)
        .expect("payment confirmed");
    assert_eq!(confirmed.state(), EnrollmentState::Pending);

    let outcome = assign(&engine, &confirmed, "scratch-b1").expect("assignment succeeds");
    assert_eq!(
        outcome.enrollment.status,
        EnrollmentStatus::Assigned {
            class_id: ClassId::new("scratch-b1")
        }
    );
    assert_eq!(outcome.enrollment.assigned_at, Some(now()));
    assert!(matches!(outcome.history, HistoryTransition::Started(_)));
    assert_eq!(outcome.notification, NotificationStatus::Queued);

    let student = stored_student(&repository, "s-ana");
    assert_eq!(student.course_history.len(), 1);
    assert_eq!(
        student.course_history[0].completion_status,
        CompletionStatus::InProgress
    );
    assert_eq!(
        stored_class(&repository, "scratch-b1").students,
        vec![StudentId::new("s-ana")]
    );

    let published = events.events();
    assert_eq!(published.len(), 1);
    let EnrollmentEvent::ClassAssigned(notice) = &published[0];
    assert_eq!(notice.class_info.course_name, "Scratch Foundations");
    assert!(notice.recipients.teacher.is_some());
    assert!(notice.recipients.student.is_some());
    assert!(notice.recipients.parent.is_some());
}

#[test]
fn revoking_payment_returns_pending_to_the_waitlist() {
    let (engine, _, _) = build_engine();
    let pending = enroll(&engine, "s-ana", 1, true);

    let revoked = engine
        .update_payment_status(&pending.id, PaymentStatus::Pending)
        .expect("payment revoked");
    assert_eq!(revoked.state(), EnrollmentState::Waitlist);

    let seated = seat(&engine, "s-dia", "scratch-b1", 1);
    let completed_payment = engine
        .update_payment_status(&seated.id, PaymentStatus::Completed)
        .expect("assigned payment edited");
    assert_eq!(completed_payment.state(), EnrollmentState::Assigned);
    assert_eq!(completed_payment.payment_status, PaymentStatus::Completed);
}

#[test]
fn last_seat_goes_to_the_first_assignment() {
    let (engine, repository, _) = build_engine();
    let first = enroll(&engine, "s-ana", 1, true);
    let second = enroll(&engine, "s-dia", 1, true);

    assign(&engine, &first, "python-b1").expect("first seat");
    let error = assign(&engine, &second, "python-b1").expect_err("class full");

    assert!(matches!(
        error,
        EnrollmentError::CapacityExceeded {
            capacity: 1,
            occupancy: 1,
            ..
        }
    ));
    let view = engine
        .occupancy(&ClassId::new("python-b1"))
        .expect("occupancy");
    assert_eq!(view.occupancy, 1);
    assert_eq!(view.available, 0);
    assert_eq!(
        stored_student(&repository, "s-dia").enrollments[0].state(),
        EnrollmentState::Pending
    );
}

#[test]
fn assignment_checks_batch_program_and_archive_flag() {
    let (engine, _, _) = build_engine();
    let batch_two = enroll(&engine, "s-ana", 2, true);

    let mismatch = assign(&engine, &batch_two, "scratch-b1").expect_err("wrong batch");
    assert!(matches!(
        mismatch,
        EnrollmentError::BatchMismatch {
            class_batch: 1,
            enrollment_batch: 2,
            ..
        }
    ));

    let club = engine
        .enroll_program(request("s-dia", CLUB, 1, true), now())
        .expect("club enrollment");
    let wrong_program = assign(&engine, &club, "scratch-b1").expect_err("wrong program");
    assert_eq!(wrong_program.code(), "program_mismatch");

    engine
        .archive_class(&ClassId::new("scratch-b2"), now())
        .expect("empty class archives");
    let archived = assign(&engine, &batch_two, "scratch-b2").expect_err("archived class");
    assert!(matches!(archived, EnrollmentError::ClassArchived { .. }));

    let unknown = assign(&engine, &batch_two, "robotics-b2").expect_err("unknown class");
    assert!(matches!(
        unknown,
        EnrollmentError::NotFound { entity: "class", .. }
    ));
}

#[test]
fn assigning_twice_is_rejected() {
    let (engine, _, _) = build_engine();
    let seated = seat(&engine, "s-ana", "scratch-b1", 1);

    let same = assign(&engine, &seated, "scratch-b1").expect_err("same class");
    assert!(matches!(same, EnrollmentError::AlreadyAssigned { .. }));

    let other = assign(&engine, &seated, "python-b1").expect_err("already seated elsewhere");
    match other {
        EnrollmentError::InvalidTransition { from, .. } => {
            assert_eq!(from, EnrollmentState::Assigned);
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[test]
fn unassign_discards_only_the_in_progress_entry() {
    let (engine, repository, _) = build_engine();
    let first = seat(&engine, "s-ana", "scratch-b1", 1);
    engine.mark_completed(&first.id, now()).expect("completed");

    let second = enroll(&engine, "s-ana", 2, true);
    engine
        .assign_to_class(
            &second.id,
            &ClassId::new("scratch-b2"),
            AssignmentOptions {
                acknowledge_prior_completion: true,
            },
            now(),
        )
        .expect("re-assignment acknowledged");
    assert_eq!(stored_student(&repository, "s-ana").course_history.len(), 2);

    let outcome = engine
        .unassign_from_class(&second.id)
        .expect("unassign succeeds");

    assert_eq!(outcome.enrollment.state(), EnrollmentState::Pending);
    assert_eq!(outcome.enrollment.assigned_at, None);
    assert_eq!(outcome.released_class, ClassId::new("scratch-b2"));
    assert!(matches!(outcome.history, HistoryTransition::Discarded(_)));

    let student = stored_student(&repository, "s-ana");
    assert_eq!(student.course_history.len(), 1);
    assert_eq!(
        student.course_history[0].completion_status,
        CompletionStatus::Completed
    );
    assert!(stored_class(&repository, "scratch-b2").students.is_empty());
}

#[test]
fn unassign_requires_a_seat() {
    let (engine, _, _) = build_engine();
    let pending = enroll(&engine, "s-ana", 1, true);

    let error = engine
        .unassign_from_class(&pending.id)
        .expect_err("nothing to unassign");
    assert_eq!(error.code(), "invalid_transition");
}

#[test]
fn removal_from_program_releases_the_seat_and_history() {
    let (engine, repository, _) = build_engine();
    let seated = seat(&engine, "s-ana", "scratch-b1", 1);

    let outcome = engine
        .unassign_from_program(&seated.id)
        .expect("removal succeeds");

    assert_eq!(outcome.previous_state, EnrollmentState::Assigned);
    assert_eq!(outcome.state, EnrollmentState::Removed);
    assert_eq!(outcome.released_class, Some(ClassId::new("scratch-b1")));
    assert!(matches!(outcome.history, HistoryTransition::Discarded(_)));

    let student = stored_student(&repository, "s-ana");
    assert!(student.enrollments.is_empty());
    assert!(student.course_history.is_empty());
    assert!(stored_class(&repository, "scratch-b1").students.is_empty());

    let again = enroll(&engine, "s-ana", 1, false);
    assert_eq!(again.state(), EnrollmentState::Waitlist);

    let waitlisted = engine
        .unassign_from_program(&again.id)
        .expect("waitlisted removal");
    assert_eq!(waitlisted.released_class, None);
    assert_eq!(waitlisted.history, HistoryTransition::Untouched);
}

#[test]
fn completion_moves_the_fact_into_history() {
    let (engine, repository, _) = build_engine();
    let seated = seat(&engine, "s-dia", "scratch-b1", 1);
    assert!(!stored_student(&repository, "s-dia").is_returning_student);

    let outcome = engine
        .mark_completed(&seated.id, at(date(2025, 7, 12)))
        .expect("completion succeeds");

    assert_eq!(outcome.state, EnrollmentState::Completed);
    assert!(matches!(outcome.history, HistoryTransition::Completed(_)));

    let student = stored_student(&repository, "s-dia");
    assert!(student.enrollments.is_empty());
    assert!(student.is_returning_student);
    assert_eq!(student.course_history.len(), 1);
    let entry = &student.course_history[0];
    assert_eq!(entry.completion_status, CompletionStatus::Completed);
    assert_eq!(entry.start_date, now());
    assert_eq!(entry.end_date, Some(at(date(2025, 7, 12))));
    assert_eq!(entry.program_name, "Summer Holiday Code Camp");
    assert_eq!(entry.year, 2025);
    assert!(stored_class(&repository, "scratch-b1").students.is_empty());

    let missing = engine
        .mark_completed(&seated.id, now())
        .expect_err("enrollment is gone");
    assert!(matches!(missing, EnrollmentError::NotFound { .. }));
}

#[test]
fn completion_without_an_open_entry_synthesizes_one() {
    let (engine, repository, _) = build_engine();
    let seated = seat(&engine, "s-eli", "python-b1", 1);
    tamper(&repository, |store| {
        let mut student = store
            .student(&StudentId::new("s-eli"))?
            .ok_or(RepositoryError::NotFound)?;
        student.course_history.clear();
        store.put_student(student)
    });

    let outcome = engine
        .mark_completed(&seated.id, now())
        .expect("completion succeeds");

    assert!(matches!(outcome.history, HistoryTransition::Synthesized(_)));
    let history = engine
        .course_history(&StudentId::new("s-eli"))
        .expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].course_name, "Python Quest");
    assert_eq!(history[0].completion_status, CompletionStatus::Completed);
}

#[test]
fn completion_requires_an_assigned_enrollment() {
    let (engine, _, _) = build_engine();
    let pending = enroll(&engine, "s-ana", 1, true);

    let error = engine
        .mark_completed(&pending.id, now())
        .expect_err("pending cannot complete");
    assert!(matches!(
        error,
        EnrollmentError::InvalidTransition {
            from: EnrollmentState::Pending,
            action: EnrollmentAction::Complete,
            ..
        }
    ));
}

#[test]
fn repeating_a_completed_course_needs_acknowledgement() {
    let (engine, repository, _) = build_engine();
    let first = seat(&engine, "s-ana", "scratch-b1", 1);
    engine.mark_completed(&first.id, now()).expect("completed");

    let second = enroll(&engine, "s-ana", 2, true);
    let warning = assign(&engine, &second, "scratch-b2").expect_err("needs confirmation");
    match warning {
        EnrollmentError::PriorCompletionRequiresConfirmation { course_name, .. } => {
            assert_eq!(course_name, "Scratch Foundations");
        }
        other => panic!("expected prior completion warning, got {other:?}"),
    }

    let outcome = engine
        .assign_to_class(
            &second.id,
            &ClassId::new("scratch-b2"),
            AssignmentOptions {
                acknowledge_prior_completion: true,
            },
            now(),
        )
        .expect("acknowledged assignment");
    assert!(matches!(outcome.history, HistoryTransition::Started(_)));

    let history = stored_student(&repository, "s-ana").course_history;
    let statuses: Vec<CompletionStatus> =
        history.iter().map(|entry| entry.completion_status).collect();
    assert_eq!(
        statuses,
        vec![CompletionStatus::Completed, CompletionStatus::InProgress]
    );
}

#[test]
fn notification_problems_never_undo_the_assignment() {
    let (engine, repository, events) = build_engine();

    let silent = enroll(&engine, "s-ben", 1, true);
    let outcome = assign(&engine, &silent, "python-b1").expect("assignment succeeds");
    assert_eq!(outcome.notification, NotificationStatus::NoRecipients);
    assert!(events.events().is_empty());

    events.close();
    let reachable = enroll(&engine, "s-ana", 1, true);
    let outcome = assign(&engine, &reachable, "scratch-b1").expect("assignment succeeds");
    assert!(matches!(
        outcome.notification,
        NotificationStatus::Failed { .. }
    ));
    assert_eq!(
        stored_student(&repository, "s-ana").enrollments[0].state(),
        EnrollmentState::Assigned
    );
}

#[test]
fn price_edit_uses_explicit_amount_or_current_tier() {
    let (engine, _, _) = build_engine();
    let enrollment = enroll(&engine, "s-cam", 1, true);

    let sibling = engine
        .edit_enrollment_price(&enrollment.id, PriceType::SiblingDiscount, None)
        .expect("tier price captured");
    assert_eq!(sibling.price_type, PriceType::SiblingDiscount);
    assert_eq!(sibling.price_amount, 3600);

    let waived = engine
        .edit_enrollment_price(&enrollment.id, PriceType::FullPrice, Some(2500))
        .expect("explicit amount");
    assert_eq!(waived.price_amount, 2500);
}

#[test]
fn class_registration_validates_against_the_program() {
    let (engine, repository, _) = build_engine();
    let new_class = |id: &str, batch: u8, slot: &str, capacity: u8| NewClass {
        id: ClassId::new(id),
        program_id: ProgramId::new(CAMP),
        course_id: crate::workflows::enrollment::domain::CourseId::new("python"),
        batch,
        slot: slot.to_string(),
        capacity,
        teacher_id: Some(TeacherId::new("t-ada")),
    };

    let bad_slot = engine
        .register_class(new_class("python-b2", 2, "18:00-20:00", 10))
        .expect_err("slot not offered");
    assert_eq!(bad_slot.code(), "invalid_class");

    let too_big = engine
        .register_class(new_class("python-b2", 2, "13:00-16:00", 51))
        .expect_err("capacity ceiling");
    assert_eq!(too_big.code(), "invalid_class");

    let empty = engine
        .register_class(new_class("python-b2", 2, "13:00-16:00", 0))
        .expect_err("capacity floor");
    assert_eq!(empty.code(), "invalid_class");

    let bad_batch = engine
        .register_class(new_class("python-b3", 3, "13:00-16:00", 10))
        .expect_err("batch out of range");
    assert_eq!(bad_batch.code(), "invalid_batch");

    let duplicate = engine
        .register_class(new_class("python-b1", 1, "13:00-16:00", 10))
        .expect_err("id taken");
    assert!(matches!(
        duplicate,
        EnrollmentError::Repository(RepositoryError::Conflict)
    ));

    let created = engine
        .register_class(new_class("python-b2", 2, "13:00-16:00", 50))
        .expect("valid class");
    assert_eq!(created.capacity, 50);
    assert!(!created.is_archived);
    assert_eq!(stored_class(&repository, "python-b2"), created);
}

#[test]
fn shrinking_capacity_evicts_the_most_recent_assignments() {
    let (engine, repository, _) = build_engine();
    let early = enroll(&engine, "s-ana", 1, true);
    let middle = enroll(&engine, "s-dia", 1, true);
    let late = enroll(&engine, "s-eli", 1, true);
    for (enrollment, hour) in [(&early, 9), (&middle, 10), (&late, 11)] {
        engine
            .assign_to_class(
                &enrollment.id,
                &ClassId::new("scratch-b1"),
                AssignmentOptions::default(),
                at(date(2025, 7, 7)) + chrono::Duration::hours(hour - 9),
            )
            .expect("assignment succeeds");
    }

    let report = engine
        .set_class_capacity(&ClassId::new("scratch-b1"), 1)
        .expect("capacity lowered");

    assert_eq!(report.capacity, 1);
    assert_eq!(report.occupancy, 1);
    assert_eq!(report.evicted, vec![late.id.clone(), middle.id.clone()]);
    assert!(report.roster_rebuilt);

    for id in ["s-dia", "s-eli"] {
        let student = stored_student(&repository, id);
        assert_eq!(student.enrollments[0].state(), EnrollmentState::Pending);
        assert!(student.course_history.is_empty());
    }
    assert_eq!(
        stored_class(&repository, "scratch-b1").students,
        vec![StudentId::new("s-ana")]
    );

    let invalid = engine
        .set_class_capacity(&ClassId::new("scratch-b1"), 0)
        .expect_err("zero capacity");
    assert_eq!(invalid.code(), "invalid_class");
}

#[test]
fn reconcile_repairs_a_drifted_roster() {
    let (engine, repository, _) = build_engine();
    seat(&engine, "s-ana", "scratch-b1", 1);
    tamper(&repository, |store| {
        let mut class = store
            .class(&ClassId::new("scratch-b1"))?
            .ok_or(RepositoryError::NotFound)?;
        class.students = vec![StudentId::new("s-ghost")];
        store.put_class(class)
    });

    let view = engine
        .occupancy(&ClassId::new("scratch-b1"))
        .expect("occupancy");
    assert!(view.roster_drift);
    assert_eq!(view.occupancy, 1);

    let report = engine
        .reconcile_class(&ClassId::new("scratch-b1"))
        .expect("reconcile");
    assert!(report.roster_rebuilt);
    assert!(report.evicted.is_empty());
    assert_eq!(
        stored_class(&repository, "scratch-b1").students,
        vec![StudentId::new("s-ana")]
    );

    let clean = engine
        .reconcile_class(&ClassId::new("scratch-b1"))
        .expect("reconcile");
    assert!(!clean.roster_rebuilt);
}
