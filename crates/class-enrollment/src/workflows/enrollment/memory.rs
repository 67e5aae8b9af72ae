use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::domain::{
    Class, ClassId, Course, CourseId, EnrollmentId, HistoryEntryId, PriceType, Program,
    ProgramEnrollment, ProgramId, Student, StudentId, Teacher, TeacherId,
};
use super::repository::{EnrollmentRepository, EnrollmentStore, RepositoryError};

/// Complete persisted state; also the working copy handed to a transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollmentSnapshot {
    pub programs: BTreeMap<ProgramId, Program>,
    pub courses: BTreeMap<CourseId, Course>,
    pub teachers: BTreeMap<TeacherId, Teacher>,
    pub classes: BTreeMap<ClassId, Class>,
    pub students: BTreeMap<StudentId, Student>,
    pub pricing: BTreeMap<PriceType, u32>,
    #[serde(default)]
    pub sequences: IdSequences,
}

/// Last ids handed out; persisted with the snapshot so a restart never reissues one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSequences {
    pub enrollment: u64,
    pub history_entry: u64,
}

impl EnrollmentSnapshot {
    fn history_entry_exists(&self, id: &HistoryEntryId) -> bool {
        self.students
            .values()
            .flat_map(|student| student.course_history.iter())
            .any(|entry| &entry.id == id)
    }
}

impl EnrollmentStore for EnrollmentSnapshot {
    fn program(&self, id: &ProgramId) -> Result<Option<Program>, RepositoryError> {
        Ok(self.programs.get(id).cloned())
    }

    fn put_program(&mut self, program: Program) -> Result<(), RepositoryError> {
        self.programs.insert(program.id.clone(), program);
        Ok(())
    }

    fn course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        Ok(self.courses.get(id).cloned())
    }

    fn put_course(&mut self, course: Course) -> Result<(), RepositoryError> {
        self.courses.insert(course.id.clone(), course);
        Ok(())
    }

    fn teacher(&self, id: &TeacherId) -> Result<Option<Teacher>, RepositoryError> {
        Ok(self.teachers.get(id).cloned())
    }

    fn put_teacher(&mut self, teacher: Teacher) -> Result<(), RepositoryError> {
        self.teachers.insert(teacher.id.clone(), teacher);
        Ok(())
    }

    fn class(&self, id: &ClassId) -> Result<Option<Class>, RepositoryError> {
        Ok(self.classes.get(id).cloned())
    }

    fn classes_for_program(&self, program_id: &ProgramId) -> Result<Vec<Class>, RepositoryError> {
        Ok(self
            .classes
            .values()
            .filter(|class| &class.program_id == program_id)
            .cloned()
            .collect())
    }

    fn put_class(&mut self, class: Class) -> Result<(), RepositoryError> {
        self.classes.insert(class.id.clone(), class);
        Ok(())
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        Ok(self.students.get(id).cloned())
    }

    fn students(&self) -> Result<Vec<Student>, RepositoryError> {
        Ok(self.students.values().cloned().collect())
    }

    fn put_student(&mut self, student: Student) -> Result<(), RepositoryError> {
        self.students.insert(student.id.clone(), student);
        Ok(())
    }

    fn enrollment(&self, id: &EnrollmentId) -> Result<Option<ProgramEnrollment>, RepositoryError> {
        Ok(self
            .students
            .values()
            .find_map(|student| student.enrollment(id))
            .cloned())
    }

    fn find_enrollment(
        &self,
        student_id: &StudentId,
        program_id: &ProgramId,
        batch_number: u8,
    ) -> Result<Option<ProgramEnrollment>, RepositoryError> {
        Ok(self
            .students
            .get(student_id)
            .and_then(|student| student.enrollment_for(program_id, batch_number))
            .cloned())
    }

    fn enrollments_in_class(
        &self,
        class_id: &ClassId,
    ) -> Result<Vec<ProgramEnrollment>, RepositoryError> {
        Ok(self
            .students
            .values()
            .flat_map(|student| student.enrollments.iter())
            .filter(|enrollment| enrollment.class_id() == Some(class_id))
            .cloned()
            .collect())
    }

    fn next_enrollment_id(&mut self) -> Result<EnrollmentId, RepositoryError> {
        loop {
            self.sequences.enrollment += 1;
            let id = EnrollmentId::new(format!("enr-{:06}", self.sequences.enrollment));
            if self.enrollment(&id)?.is_none() {
                return Ok(id);
            }
        }
    }

    fn next_history_entry_id(&mut self) -> Result<HistoryEntryId, RepositoryError> {
        loop {
            self.sequences.history_entry += 1;
            let id = HistoryEntryId::new(format!("hist-{:06}", self.sequences.history_entry));
            if !self.history_entry_exists(&id) {
                return Ok(id);
            }
        }
    }

    fn price_override(&self, price_type: PriceType) -> Result<Option<u32>, RepositoryError> {
        Ok(self.pricing.get(&price_type).copied())
    }

    fn set_price_override(
        &mut self,
        price_type: PriceType,
        amount: Option<u32>,
    ) -> Result<(), RepositoryError> {
        match amount {
            Some(amount) => {
                self.pricing.insert(price_type, amount);
            }
            None => {
                self.pricing.remove(&price_type);
            }
        }
        Ok(())
    }
}

/// Mutex-guarded repository: transactions work on a copy and swap it in on success.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEnrollmentRepository {
    state: Arc<Mutex<EnrollmentSnapshot>>,
}

impl InMemoryEnrollmentRepository {
    pub fn with_snapshot(snapshot: EnrollmentSnapshot) -> Self {
        Self {
            state: Arc::new(Mutex::new(snapshot)),
        }
    }

    pub fn snapshot(&self) -> Result<EnrollmentSnapshot, RepositoryError> {
        let guard = self
            .state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("state mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }
}

impl EnrollmentRepository for InMemoryEnrollmentRepository {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn EnrollmentStore) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("state mutex poisoned".to_string()))?;

        let mut working = guard.clone();
        let value = work(&mut working)?;
        *guard = working;
        Ok(value)
    }

    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn EnrollmentStore) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let guard = self
            .state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("state mutex poisoned".to_string()))?;
        work(&*guard)
    }
}
