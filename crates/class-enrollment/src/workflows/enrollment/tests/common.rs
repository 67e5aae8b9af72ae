use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::config::EnrollmentSettings;
use crate::workflows::enrollment::domain::{
    Class, ClassId, Course, CourseId, Program, ProgramEnrollment, ProgramId, ProgramType, Student,
    StudentId, Teacher, TeacherId,
};
use crate::workflows::enrollment::memory::{EnrollmentSnapshot, InMemoryEnrollmentRepository};
use crate::workflows::enrollment::notifications::{
    EnrollmentEvent, EventPublisher, NotificationError,
};
use crate::workflows::enrollment::outcome::{AssignmentOptions, EnrollmentRequest};
use crate::workflows::enrollment::repository::{
    EnrollmentRepository, EnrollmentStore, RepositoryError,
};
use crate::workflows::enrollment::AssignmentEngine;

pub(super) type TestEngine = AssignmentEngine<InMemoryEnrollmentRepository, RecordingPublisher>;

pub(super) const CAMP: &str = "summer-camp";
pub(super) const CLUB: &str = "weekend-club";
pub(super) const UNSCHEDULED: &str = "spring-camp";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 7, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn at(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_opt(9, 0, 0).expect("valid time"))
}

pub(super) fn camp() -> Program {
    Program {
        id: ProgramId::new(CAMP),
        name: "Summer Holiday Code Camp".to_string(),
        program_type: ProgramType::HolidayCamp,
        season: "Summer".to_string(),
        year: 2025,
        batches: 2,
        slots: vec!["09:00-12:00".to_string(), "13:00-16:00".to_string()],
        start_date: Some(date(2025, 7, 5)),
    }
}

pub(super) fn club() -> Program {
    Program {
        id: ProgramId::new(CLUB),
        name: "Saturday Code Club".to_string(),
        program_type: ProgramType::WeekendClub,
        season: "Summer".to_string(),
        year: 2025,
        batches: 1,
        slots: vec!["10:00-12:00".to_string()],
        start_date: Some(date(2025, 6, 14)),
    }
}

fn unscheduled() -> Program {
    Program {
        id: ProgramId::new(UNSCHEDULED),
        name: "Spring Holiday Camp".to_string(),
        program_type: ProgramType::HolidayCamp,
        season: "Spring".to_string(),
        year: 2026,
        batches: 1,
        slots: vec!["09:00-12:00".to_string()],
        start_date: None,
    }
}

pub(super) fn class(id: &str, course: &str, batch: u8, slot: &str, capacity: u8) -> Class {
    Class {
        id: ClassId::new(id),
        program_id: ProgramId::new(CAMP),
        course_id: CourseId::new(course),
        batch,
        slot: slot.to_string(),
        capacity,
        teacher_id: None,
        is_archived: false,
        students: Vec::new(),
    }
}

fn student(id: &str, name: &str, email: Option<&str>) -> Student {
    let mut student = Student::new(StudentId::new(id), name);
    student.email = email.map(str::to_string);
    student
}

/// Camp with three classes, a club, and five students.
///
/// `scratch-b1` seats three and has a teacher, `python-b1` seats one, `scratch-b2` runs batch 2.
/// Ana and Cam are siblings; Cam is a returning student; Ben has no contact details.
pub(super) fn seeded_snapshot() -> EnrollmentSnapshot {
    let mut snapshot = EnrollmentSnapshot::default();

    for program in [camp(), club(), unscheduled()] {
        snapshot.programs.insert(program.id.clone(), program);
    }
    for (id, name) in [("scratch", "Scratch Foundations"), ("python", "Python Quest")] {
        snapshot.courses.insert(
            CourseId::new(id),
            Course {
                id: CourseId::new(id),
                name: name.to_string(),
            },
        );
    }
    snapshot.teachers.insert(
        TeacherId::new("t-ada"),
        Teacher {
            id: TeacherId::new("t-ada"),
            name: "Ada Byron".to_string(),
            email: Some("ada@academy.test".to_string()),
        },
    );

    let mut scratch_b1 = class("scratch-b1", "scratch", 1, "09:00-12:00", 3);
    scratch_b1.teacher_id = Some(TeacherId::new("t-ada"));
    let python_b1 = class("python-b1", "python", 1, "13:00-16:00", 1);
    let mut scratch_b2 = class("scratch-b2", "scratch", 2, "09:00-12:00", 5);
    scratch_b2.teacher_id = Some(TeacherId::new("t-ada"));
    for class in [scratch_b1, python_b1, scratch_b2] {
        snapshot.classes.insert(class.id.clone(), class);
    }

    let mut ana = student("s-ana", "Ana", Some("ana@family.test"));
    ana.parent_email = Some("parent@family.test".to_string());
    ana.sibling_ids = vec![StudentId::new("s-cam")];
    let ben = student("s-ben", "Ben", None);
    let mut cam = student("s-cam", "Cam", Some("cam@family.test"));
    cam.is_returning_student = true;
    cam.sibling_ids = vec![StudentId::new("s-ana")];
    let dia = student("s-dia", "Dia", Some("dia@example.test"));
    let eli = student("s-eli", "Eli", Some("eli@example.test"));
    for student in [ana, ben, cam, dia, eli] {
        snapshot.students.insert(student.id.clone(), student);
    }

    snapshot
}

pub(super) fn build_engine() -> (
    TestEngine,
    InMemoryEnrollmentRepository,
    Arc<RecordingPublisher>,
) {
    build_engine_with(EnrollmentSettings::default())
}

pub(super) fn build_engine_with(
    settings: EnrollmentSettings,
) -> (TestEngine, InMemoryEnrollmentRepository, Arc<RecordingPublisher>) {
    let repository = InMemoryEnrollmentRepository::with_snapshot(seeded_snapshot());
    let events = Arc::new(RecordingPublisher::default());
    let engine = AssignmentEngine::new(Arc::new(repository.clone()), events.clone(), &settings);
    (engine, repository, events)
}

pub(super) fn request(student: &str, program: &str, batch: u8, paid: bool) -> EnrollmentRequest {
    EnrollmentRequest {
        student_id: StudentId::new(student),
        program_id: ProgramId::new(program),
        batch_number: batch,
        payment_confirmed: paid,
        price_type: None,
    }
}

pub(super) fn enroll<R, P>(
    engine: &AssignmentEngine<R, P>,
    student: &str,
    batch: u8,
    paid: bool,
) -> ProgramEnrollment
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    engine
        .enroll_program(request(student, CAMP, batch, paid), now())
        .expect("enrollment succeeds")
}

/// Enroll with confirmed payment and take a seat in `class_id`.
pub(super) fn seat<R, P>(
    engine: &AssignmentEngine<R, P>,
    student: &str,
    class_id: &str,
    batch: u8,
) -> ProgramEnrollment
where
    R: EnrollmentRepository + 'static,
    P: EventPublisher + 'static,
{
    let enrollment = enroll(engine, student, batch, true);
    engine
        .assign_to_class(
            &enrollment.id,
            &ClassId::new(class_id),
            AssignmentOptions::default(),
            now(),
        )
        .expect("assignment succeeds")
        .enrollment
}

pub(super) fn stored_student(repository: &InMemoryEnrollmentRepository, id: &str) -> Student {
    repository
        .snapshot()
        .expect("snapshot")
        .students
        .get(&StudentId::new(id))
        .cloned()
        .expect("student exists")
}

pub(super) fn stored_class(repository: &InMemoryEnrollmentRepository, id: &str) -> Class {
    repository
        .snapshot()
        .expect("snapshot")
        .classes
        .get(&ClassId::new(id))
        .cloned()
        .expect("class exists")
}

/// Apply a raw edit to committed state, bypassing the engine.
pub(super) fn tamper(
    repository: &InMemoryEnrollmentRepository,
    edit: impl FnOnce(&mut dyn EnrollmentStore) -> Result<(), RepositoryError>,
) {
    repository.transaction(edit).expect("tamper commits");
}

#[derive(Default)]
pub(super) struct RecordingPublisher {
    events: Mutex<Vec<EnrollmentEvent>>,
    closed: AtomicBool,
}

impl RecordingPublisher {
    pub(super) fn events(&self) -> Vec<EnrollmentEvent> {
        self.events.lock().expect("publisher mutex poisoned").clone()
    }

    pub(super) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: EnrollmentEvent) -> Result<(), NotificationError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NotificationError::OutboxClosed);
        }
        self.events
            .lock()
            .expect("publisher mutex poisoned")
            .push(event);
        Ok(())
    }
}

type ConcurrentWrite = Box<dyn FnOnce(&InMemoryEnrollmentRepository) + Send>;

/// Wraps the memory repository and fails the next `n` transactions as unavailable.
///
/// It can also commit a write of its own just before a chosen transaction, standing in for
/// another operator working at the same time.
pub(super) struct FlakyRepository {
    inner: InMemoryEnrollmentRepository,
    failures: AtomicUsize,
    transactions: AtomicUsize,
    concurrent: Mutex<Option<(usize, ConcurrentWrite)>>,
}

impl FlakyRepository {
    pub(super) fn new(inner: InMemoryEnrollmentRepository) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(0),
            transactions: AtomicUsize::new(0),
            concurrent: Mutex::new(None),
        }
    }

    pub(super) fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Run `write` against the inner repository before the `skip + 1`-th transaction from now.
    pub(super) fn before_transaction(
        &self,
        skip: usize,
        write: impl FnOnce(&InMemoryEnrollmentRepository) + Send + 'static,
    ) {
        let at = self.transactions.load(Ordering::SeqCst) + skip;
        *self.concurrent.lock().expect("hook mutex poisoned") = Some((at, Box::new(write)));
    }
}

impl EnrollmentRepository for FlakyRepository {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn EnrollmentStore) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let index = self.transactions.fetch_add(1, Ordering::SeqCst);
        let due = {
            let mut slot = self.concurrent.lock().expect("hook mutex poisoned");
            match slot.take() {
                Some((at, write)) if at == index => Some(write),
                other => {
                    *slot = other;
                    None
                }
            }
        };
        if let Some(write) = due {
            write(&self.inner);
        }

        let armed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if armed {
            return Err(E::from(RepositoryError::Unavailable(
                "primary database failing over".to_string(),
            )));
        }
        self.inner.transaction(work)
    }

    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn EnrollmentStore) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        self.inner.read(work)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
