use chrono::{Datelike, NaiveDate};
use class_enrollment::workflows::enrollment::{
    Class, ClassId, Course, CourseId, EnrollmentSnapshot, Program, ProgramId, ProgramType,
    Student, StudentId, Teacher, TeacherId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) const DEMO_CAMP: &str = "summer-camp";
pub(crate) const DEMO_CLUB: &str = "saturday-club";

/// Academy catalogue used by the demo and by `serve` unless seeding is disabled.
///
/// Programs start on `start_date`, so sign-ups on that day are inside every window.
pub(crate) fn demo_snapshot(start_date: NaiveDate) -> EnrollmentSnapshot {
    let mut snapshot = EnrollmentSnapshot::default();

    let programs = [
        Program {
            id: ProgramId::new(DEMO_CAMP),
            name: "Summer Holiday Code Camp".to_string(),
            program_type: ProgramType::HolidayCamp,
            season: "Summer".to_string(),
            year: start_date.year(),
            batches: 2,
            slots: vec!["09:00-12:00".to_string(), "13:00-16:00".to_string()],
            start_date: Some(start_date),
        },
        Program {
            id: ProgramId::new(DEMO_CLUB),
            name: "Saturday Code Club".to_string(),
            program_type: ProgramType::WeekendClub,
            season: "Term 3".to_string(),
            year: start_date.year(),
            batches: 1,
            slots: vec!["10:00-12:00".to_string()],
            start_date: Some(start_date),
        },
    ];
    for program in programs {
        snapshot.programs.insert(program.id.clone(), program);
    }

    for (id, name) in [
        ("scratch", "Scratch Foundations"),
        ("python", "Python Quest"),
        ("web", "Web Makers"),
    ] {
        snapshot.courses.insert(
            CourseId::new(id),
            Course {
                id: CourseId::new(id),
                name: name.to_string(),
            },
        );
    }

    for (id, name, email) in [
        ("t-grace", "Grace Hopper", "grace@academy.test"),
        ("t-alan", "Alan Kay", "alan@academy.test"),
    ] {
        snapshot.teachers.insert(
            TeacherId::new(id),
            Teacher {
                id: TeacherId::new(id),
                name: name.to_string(),
                email: Some(email.to_string()),
            },
        );
    }

    let classes = [
        ("camp-scratch-b1", DEMO_CAMP, "scratch", 1, "09:00-12:00", 3, Some("t-grace")),
        ("camp-python-b1", DEMO_CAMP, "python", 1, "13:00-16:00", 1, Some("t-alan")),
        ("camp-scratch-b2", DEMO_CAMP, "scratch", 2, "09:00-12:00", 12, Some("t-grace")),
        ("club-web-b1", DEMO_CLUB, "web", 1, "10:00-12:00", 8, None),
    ];
    for (id, program, course, batch, slot, capacity, teacher) in classes {
        snapshot.classes.insert(
            ClassId::new(id),
            Class {
                id: ClassId::new(id),
                program_id: ProgramId::new(program),
                course_id: CourseId::new(course),
                batch,
                slot: slot.to_string(),
                capacity,
                teacher_id: teacher.map(TeacherId::new),
                is_archived: false,
                students: Vec::new(),
            },
        );
    }

    let students = [
        (
            "s-maya",
            "Maya",
            Some("maya@family.test"),
            Some("chen@family.test"),
            &["s-leo"][..],
            true,
        ),
        ("s-leo", "Leo", None, Some("chen@family.test"), &["s-maya"][..], false),
        ("s-ravi", "Ravi", Some("ravi@example.test"), None, &[][..], false),
        ("s-zoe", "Zoe", None, None, &[][..], false),
    ];
    for (id, name, email, parent_email, siblings, returning) in students {
        let mut student = Student::new(StudentId::new(id), name);
        student.email = email.map(str::to_string);
        student.parent_email = parent_email.map(str::to_string);
        student.sibling_ids = siblings.iter().map(|id| StudentId::new(*id)).collect();
        student.is_returning_student = returning;
        snapshot.students.insert(student.id.clone(), student);
    }

    snapshot
}
