use super::domain::{
    Class, ClassId, Course, CourseId, EnrollmentId, HistoryEntryId, PriceType, Program,
    ProgramEnrollment, ProgramId, Student, StudentId, Teacher, TeacherId,
};

/// Transaction-scoped view over persisted enrollment data.
///
/// Every engine transition reads through this handle and commits only when its closure
/// returns `Ok`, so capacity and duplicate checks see the same state the write is based on.
pub trait EnrollmentStore {
    fn program(&self, id: &ProgramId) -> Result<Option<Program>, RepositoryError>;
    fn put_program(&mut self, program: Program) -> Result<(), RepositoryError>;

    fn course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError>;
    fn put_course(&mut self, course: Course) -> Result<(), RepositoryError>;

    fn teacher(&self, id: &TeacherId) -> Result<Option<Teacher>, RepositoryError>;
    fn put_teacher(&mut self, teacher: Teacher) -> Result<(), RepositoryError>;

    fn class(&self, id: &ClassId) -> Result<Option<Class>, RepositoryError>;
    fn classes_for_program(&self, program_id: &ProgramId) -> Result<Vec<Class>, RepositoryError>;
    fn put_class(&mut self, class: Class) -> Result<(), RepositoryError>;

    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError>;
    fn students(&self) -> Result<Vec<Student>, RepositoryError>;
    /// Persists the whole aggregate: enrollments and course history move together.
    fn put_student(&mut self, student: Student) -> Result<(), RepositoryError>;

    fn enrollment(&self, id: &EnrollmentId) -> Result<Option<ProgramEnrollment>, RepositoryError>;
    fn find_enrollment(
        &self,
        student_id: &StudentId,
        program_id: &ProgramId,
        batch_number: u8,
    ) -> Result<Option<ProgramEnrollment>, RepositoryError>;
    /// Enrollments currently holding a seat in the class.
    fn enrollments_in_class(
        &self,
        class_id: &ClassId,
    ) -> Result<Vec<ProgramEnrollment>, RepositoryError>;

    fn count_assigned(&self, class_id: &ClassId) -> Result<usize, RepositoryError> {
        Ok(self.enrollments_in_class(class_id)?.len())
    }

    /// Reserve a fresh enrollment id. Ids already held in the store are never handed out.
    fn next_enrollment_id(&mut self) -> Result<EnrollmentId, RepositoryError>;
    fn next_history_entry_id(&mut self) -> Result<HistoryEntryId, RepositoryError>;

    fn price_override(&self, price_type: PriceType) -> Result<Option<u32>, RepositoryError>;
    fn set_price_override(
        &mut self,
        price_type: PriceType,
        amount: Option<u32>,
    ) -> Result<(), RepositoryError>;
}

/// Storage abstraction owning the transaction boundary.
pub trait EnrollmentRepository: Send + Sync {
    /// Run `work` serialized against other writers; its writes are kept only on `Ok`.
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn EnrollmentStore) -> Result<T, E>,
        E: From<RepositoryError>;

    /// Read-only access to committed state.
    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn EnrollmentStore) -> Result<T, E>,
        E: From<RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
