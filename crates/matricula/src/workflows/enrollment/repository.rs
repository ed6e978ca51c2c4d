//! Storage seam for the portal. Each trait method is one atomic operation
//! against the shared store, the analog of a single transaction. The only
//! compound write, acceptance plus seat increment, lives behind
//! [`EnrollmentRepository::transition_application`] so implementations can
//! make the pair both-or-neither.

use chrono::{NaiveDate, NaiveDateTime};

use super::domain::{
    AcademicCycle, ApplicationId, ApplicationStatus, ApplicationView, ClassGroup, CycleId,
    DocumentId, DocumentRecord, DocumentStatus, DocumentType, DocumentTypeId, EligibilityCheck,
    EnrollmentApplication, EnrollmentStatistics, Grade, GradeId, GroupAvailability, GroupId,
    GroupView, Guardian, GuardianId, RosterEntry, School, SchoolId, SchoolSummary, Sex, Student,
    StudentId, UserId,
};

/// Error enumeration for store failures. Constraint violations surface as
/// their own variants so the service can report each failure distinctly.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Duplicate,
    #[error("record not found")]
    NotFound,
    #[error("group has no remaining seats")]
    GroupFull,
    #[error("group does not belong to the application's school, cycle, and grade")]
    GroupMismatch,
    #[error("cannot move an application from `{from}` to `{to}`")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("data integrity fault: {0}")]
    Corrupted(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Requested status change, with the companion data each target requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    ToPending,
    ToInReview,
    ToAccepted { group_id: GroupId },
    ToRejected { reason: String },
}

impl StatusChange {
    pub fn target(&self) -> ApplicationStatus {
        match self {
            Self::ToPending => ApplicationStatus::Pending,
            Self::ToInReview => ApplicationStatus::InReview,
            Self::ToAccepted { .. } => ApplicationStatus::Accepted,
            Self::ToRejected { .. } => ApplicationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub student_id: StudentId,
    pub school_id: SchoolId,
    pub cycle_id: CycleId,
    pub grade_id: GradeId,
    pub requested_by: UserId,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub school_id: SchoolId,
    pub cycle_id: CycleId,
    pub grade_id: GradeId,
    pub name: String,
    pub capacity: u32,
    pub teacher_user_id: Option<UserId>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub student_id: StudentId,
    pub document_type_id: DocumentTypeId,
    pub submitted_on: NaiveDate,
    pub observations: Option<String>,
    pub file_url: Option<String>,
    pub uploaded_by: UserId,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub curp: String,
    pub birth_date: NaiveDate,
    pub sex: Sex,
    pub address: String,
    pub municipality: String,
    pub state: String,
    pub phone: String,
    pub nationality: String,
    pub prior_school: Option<String>,
    pub created_by: UserId,
}

#[derive(Debug, Clone)]
pub struct NewGuardian {
    pub user_id: UserId,
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub phone: String,
    pub age: Option<u8>,
}

/// Application lifecycle storage.
pub trait EnrollmentRepository: Send + Sync {
    /// Insert a `pendiente` application. Fails with [`StoreError::Duplicate`]
    /// when the student already has an application for the cycle.
    fn insert_application(
        &self,
        application: NewApplication,
        submitted_at: NaiveDateTime,
    ) -> Result<EnrollmentApplication, StoreError>;

    fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<EnrollmentApplication>, StoreError>;

    fn application_view(&self, id: ApplicationId) -> Result<Option<ApplicationView>, StoreError>;

    /// Open applications (`pendiente`, `en_revision`), oldest first.
    fn pending_applications(
        &self,
        school: Option<SchoolId>,
    ) -> Result<Vec<ApplicationView>, StoreError>;

    /// All applications with optional filters, newest first.
    fn applications_overview(
        &self,
        school: Option<SchoolId>,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationView>, StoreError>;

    /// Applications for any student linked to the guardian, newest first.
    fn applications_for_guardian(
        &self,
        guardian: GuardianId,
    ) -> Result<Vec<ApplicationView>, StoreError>;

    /// Apply a status change. Acceptance verifies the group matches the
    /// application's school/cycle/grade and takes one seat in the same
    /// operation as the status write; a full group leaves both untouched.
    fn transition_application(
        &self,
        id: ApplicationId,
        change: StatusChange,
        reviewer: UserId,
        reviewed_at: NaiveDateTime,
    ) -> Result<EnrollmentApplication, StoreError>;

    /// Composite eligibility check evaluated atomically against current
    /// data: required documents validated, school active, no open
    /// application for the student.
    fn check_eligibility(
        &self,
        student: StudentId,
        school: SchoolId,
        cycle: CycleId,
    ) -> Result<EligibilityCheck, StoreError>;

    fn statistics(
        &self,
        cycle: CycleId,
        school: Option<SchoolId>,
    ) -> Result<EnrollmentStatistics, StoreError>;
}

/// Class-group storage backing the capacity ledger.
pub trait GroupRepository: Send + Sync {
    fn insert_group(&self, group: NewGroup) -> Result<ClassGroup, StoreError>;

    fn fetch_group(&self, id: GroupId) -> Result<Option<ClassGroup>, StoreError>;

    /// Groups with a free seat for the school/cycle/grade, ordered by name.
    fn available_groups(
        &self,
        school: SchoolId,
        cycle: CycleId,
        grade: GradeId,
    ) -> Result<Vec<GroupAvailability>, StoreError>;

    fn school_groups(&self, school: SchoolId, cycle: CycleId)
        -> Result<Vec<GroupView>, StoreError>;

    /// Accepted students in the group, ordered by surname.
    fn group_roster(&self, group: GroupId) -> Result<Vec<RosterEntry>, StoreError>;
}

/// Document records per student.
pub trait DocumentRepository: Send + Sync {
    /// Insert or replace the record for (student, type). A replaced record
    /// keeps its identifier and resets to `recibido`.
    fn upsert_document(&self, document: NewDocument) -> Result<DocumentRecord, StoreError>;

    fn student_documents(&self, student: StudentId) -> Result<Vec<DocumentRecord>, StoreError>;

    /// The full document-type catalog, required types first, then by name.
    fn document_types(&self) -> Result<Vec<DocumentType>, StoreError>;

    fn set_document_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
    ) -> Result<DocumentRecord, StoreError>;

    /// Delete a record, scoped to its uploader. Fails with
    /// [`StoreError::NotFound`] when missing or uploaded by someone else.
    fn delete_document(&self, id: DocumentId, uploaded_by: UserId) -> Result<(), StoreError>;
}

/// Students, guardians, and the links between them.
pub trait StudentRepository: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the CURP is taken.
    fn insert_student(&self, student: NewStudent) -> Result<Student, StoreError>;

    fn fetch_student(&self, id: StudentId) -> Result<Option<Student>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the user already has a
    /// guardian profile.
    fn insert_guardian(&self, guardian: NewGuardian) -> Result<Guardian, StoreError>;

    fn guardian_for_user(&self, user: UserId) -> Result<Option<Guardian>, StoreError>;

    fn link_guardian(
        &self,
        student: StudentId,
        guardian: GuardianId,
        is_primary: bool,
        contact_order: i16,
    ) -> Result<(), StoreError>;

    fn students_for_guardian(&self, guardian: GuardianId) -> Result<Vec<Student>, StoreError>;

    fn guardian_owns_student(
        &self,
        guardian: GuardianId,
        student: StudentId,
    ) -> Result<bool, StoreError>;
}

/// Mostly-static catalog reads.
pub trait CatalogRepository: Send + Sync {
    fn active_cycle(&self) -> Result<Option<AcademicCycle>, StoreError>;

    fn grades(&self) -> Result<Vec<Grade>, StoreError>;

    fn fetch_school(&self, id: SchoolId) -> Result<Option<School>, StoreError>;

    /// Active schools with availability derived from accepted applications
    /// in the active cycle, ordered by name.
    fn enrollable_schools(&self) -> Result<Vec<SchoolSummary>, StoreError>;

    fn school_for_director(&self, user: UserId) -> Result<Option<School>, StoreError>;
}

/// The full storage surface the service operates against.
pub trait PortalStore:
    EnrollmentRepository + GroupRepository + DocumentRepository + StudentRepository + CatalogRepository
{
}

impl<T> PortalStore for T where
    T: EnrollmentRepository
        + GroupRepository
        + DocumentRepository
        + StudentRepository
        + CatalogRepository
{
}
