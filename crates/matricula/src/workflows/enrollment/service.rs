use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime, Utc};

use super::authz::{authorize, AccessDenied, Action};
use super::capacity::GroupCapacityPolicy;
use super::documents;
use super::domain::{
    AcademicCycle, ApplicationDetail, ApplicationId, ApplicationStatus, ApplicationView,
    ChecklistEntry, ClassGroup, DocumentId, DocumentRecord, DocumentStatus, DocumentSummary,
    DocumentTypeId,
    EnrollmentApplication, EnrollmentStatistics, Grade, GradeId, GroupAvailability, GroupId,
    GroupView, Guardian, GuardianProfile, Principal, Role, RosterEntry, SchoolId, SchoolSummary,
    Student, StudentId, StudentIntake, UserId,
};
use super::repository::{
    NewApplication, NewDocument, NewGroup, NewGuardian, NewStudent, PortalStore, StatusChange,
    StoreError,
};

/// The enrollment lifecycle engine. Every operation takes the calling
/// principal explicitly and returns a distinct error per failure mode so
/// the presentation layer can render a specific message.
pub struct EnrollmentService<S> {
    store: Arc<S>,
    capacity_policy: GroupCapacityPolicy,
}

/// Error raised by portal operations.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error(transparent)]
    Access(#[from] AccessDenied),
    #[error("no academic cycle is currently active")]
    NoActiveCycle,
    #[error("enrollment for cycle `{cycle}` is closed")]
    EnrollmentClosed { cycle: String },
    #[error("the student already has an application for this cycle")]
    DuplicateApplication,
    #[error("the student is not eligible: {reason}")]
    NotEligible { reason: String },
    #[error("unknown application status `{0}`")]
    UnknownStatus(String),
    #[error("unknown document status `{0}`")]
    UnknownDocumentStatus(String),
    #[error("documents may only be marked `validado` or `rechazado` during review")]
    InvalidDocumentReview,
    #[error("a rejection requires a reason")]
    MissingRejectionReason,
    #[error("an acceptance requires a group assignment")]
    MissingGroup,
    #[error("the group has no remaining seats")]
    GroupFull,
    #[error("the group does not match the application's school, cycle, and grade")]
    GroupMismatch,
    #[error("cannot move an application from `{from}` to `{to}`")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("the group name is required")]
    MissingGroupName,
    #[error("group capacity must be between {min} and {max} seats")]
    CapacityOutOfRange { min: u32, max: u32 },
    #[error("a school must be specified")]
    MissingSchool,
    #[error("the delivery date cannot be in the future")]
    FutureDeliveryDate,
    #[error("the CURP must be exactly 18 characters")]
    InvalidCurp,
    #[error("a student with this CURP is already registered")]
    DuplicateCurp,
    #[error("a guardian profile already exists for this user")]
    DuplicateGuardian,
    #[error("no guardian profile is registered for this user")]
    GuardianProfileMissing,
    #[error("the student is not linked to this guardian")]
    NotGuardianOfStudent,
    #[error("no active school is assigned to this director")]
    SchoolNotAssigned,
    #[error("directors may only act on their own school")]
    OutOfSchoolScope,
    #[error("teachers may only view the roster of their own group")]
    NotGroupTeacher,
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("the operation could not be completed")]
    Store(#[source] StoreError),
}

/// Wrap an unexpected store failure: the detail goes to the log, the
/// caller only sees a generic message.
fn store_failure(error: StoreError) -> EnrollmentError {
    tracing::error!(error = %error, "store operation failed");
    EnrollmentError::Store(error)
}

fn not_found(entity: &'static str) -> EnrollmentError {
    EnrollmentError::NotFound { entity }
}

impl<S> EnrollmentService<S>
where
    S: PortalStore + 'static,
{
    pub fn new(store: Arc<S>, capacity_policy: GroupCapacityPolicy) -> Self {
        Self {
            store,
            capacity_policy,
        }
    }

    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn guardian_of(&self, principal: Principal) -> Result<Guardian, EnrollmentError> {
        self.store
            .guardian_for_user(principal.user_id)
            .map_err(store_failure)?
            .ok_or(EnrollmentError::GuardianProfileMissing)
    }

    fn owned_student(
        &self,
        guardian: &Guardian,
        student: StudentId,
    ) -> Result<Student, EnrollmentError> {
        let owns = self
            .store
            .guardian_owns_student(guardian.guardian_id, student)
            .map_err(store_failure)?;
        if !owns {
            return Err(EnrollmentError::NotGuardianOfStudent);
        }
        self.store
            .fetch_student(student)
            .map_err(store_failure)?
            .ok_or_else(|| not_found("student"))
    }

    fn active_cycle(&self) -> Result<AcademicCycle, EnrollmentError> {
        self.store
            .active_cycle()
            .map_err(store_failure)?
            .ok_or(EnrollmentError::NoActiveCycle)
    }

    /// Directors act within their assigned school; every other reviewer
    /// role is unscoped.
    fn reviewer_scope(&self, principal: Principal) -> Result<Option<SchoolId>, EnrollmentError> {
        if principal.role != Role::Director {
            return Ok(None);
        }
        let school = self
            .store
            .school_for_director(principal.user_id)
            .map_err(store_failure)?
            .ok_or(EnrollmentError::SchoolNotAssigned)?;
        Ok(Some(school.school_id))
    }

    // ----- guardians and students ------------------------------------

    pub fn register_guardian(
        &self,
        principal: Principal,
        profile: GuardianProfile,
    ) -> Result<Guardian, EnrollmentError> {
        authorize(principal, Action::RegisterGuardian)?;

        match self.store.insert_guardian(NewGuardian {
            user_id: principal.user_id,
            first_name: profile.first_name,
            paternal_surname: profile.paternal_surname,
            maternal_surname: profile.maternal_surname,
            phone: profile.phone,
            age: profile.age,
        }) {
            Ok(guardian) => Ok(guardian),
            Err(StoreError::Duplicate) => Err(EnrollmentError::DuplicateGuardian),
            Err(error) => Err(store_failure(error)),
        }
    }

    pub fn register_student(
        &self,
        principal: Principal,
        intake: StudentIntake,
    ) -> Result<Student, EnrollmentError> {
        authorize(principal, Action::RegisterStudent)?;
        let guardian = self.guardian_of(principal)?;

        let curp = intake.curp.trim().to_ascii_uppercase();
        if curp.chars().count() != 18 {
            return Err(EnrollmentError::InvalidCurp);
        }

        let age_years = (self.today() - intake.birth_date).num_days() / 365;
        if !(5..=15).contains(&age_years) {
            tracing::warn!(curp = %curp, age_years, "student age outside the primary range");
        }

        let student = match self.store.insert_student(NewStudent {
            first_name: intake.first_name,
            paternal_surname: intake.paternal_surname,
            maternal_surname: intake.maternal_surname,
            curp,
            birth_date: intake.birth_date,
            sex: intake.sex,
            address: intake.address,
            municipality: intake.municipality,
            state: intake.state,
            phone: intake.phone,
            nationality: intake.nationality,
            prior_school: intake.prior_school,
            created_by: principal.user_id,
        }) {
            Ok(student) => student,
            Err(StoreError::Duplicate) => return Err(EnrollmentError::DuplicateCurp),
            Err(error) => return Err(store_failure(error)),
        };

        self.store
            .link_guardian(student.student_id, guardian.guardian_id, true, 1)
            .map_err(store_failure)?;

        Ok(student)
    }

    pub fn my_students(&self, principal: Principal) -> Result<Vec<Student>, EnrollmentError> {
        authorize(principal, Action::ViewOwnStudents)?;
        let guardian = self.guardian_of(principal)?;
        self.store
            .students_for_guardian(guardian.guardian_id)
            .map_err(store_failure)
    }

    // ----- application lifecycle -------------------------------------

    pub fn submit_application(
        &self,
        principal: Principal,
        student_id: StudentId,
        school_id: SchoolId,
        grade_id: GradeId,
    ) -> Result<EnrollmentApplication, EnrollmentError> {
        authorize(principal, Action::SubmitApplication)?;
        let guardian = self.guardian_of(principal)?;
        self.owned_student(&guardian, student_id)?;

        let cycle = self.active_cycle()?;
        if !cycle.enrollment_open {
            return Err(EnrollmentError::EnrollmentClosed { cycle: cycle.name });
        }

        let eligibility = self
            .store
            .check_eligibility(student_id, school_id, cycle.cycle_id)
            .map_err(store_failure)?;
        if !eligibility.eligible {
            return Err(EnrollmentError::NotEligible {
                reason: eligibility.reason,
            });
        }

        match self.store.insert_application(
            NewApplication {
                student_id,
                school_id,
                cycle_id: cycle.cycle_id,
                grade_id,
                requested_by: principal.user_id,
            },
            self.now(),
        ) {
            Ok(application) => {
                tracing::info!(
                    application_id = application.application_id.0,
                    student_id = student_id.0,
                    school_id = school_id.0,
                    "enrollment application submitted"
                );
                Ok(application)
            }
            Err(StoreError::Duplicate) => Err(EnrollmentError::DuplicateApplication),
            Err(StoreError::NotFound) => Err(not_found("school or grade")),
            Err(error) => Err(store_failure(error)),
        }
    }

    /// Apply a reviewer decision. The raw status token is validated against
    /// the closed status set before anything touches the store.
    pub fn review_application(
        &self,
        principal: Principal,
        application_id: ApplicationId,
        status_token: &str,
        reason: Option<String>,
        group_id: Option<GroupId>,
    ) -> Result<EnrollmentApplication, EnrollmentError> {
        authorize(principal, Action::ReviewApplication)?;

        let target = ApplicationStatus::parse_label(status_token)
            .ok_or_else(|| EnrollmentError::UnknownStatus(status_token.to_string()))?;

        let application = self
            .store
            .fetch_application(application_id)
            .map_err(store_failure)?
            .ok_or_else(|| not_found("application"))?;

        if let Some(scope) = self.reviewer_scope(principal)? {
            if application.school_id != scope {
                return Err(EnrollmentError::OutOfSchoolScope);
            }
        }

        let change = match target {
            ApplicationStatus::Rejected => {
                let reason = reason
                    .map(|reason| reason.trim().to_string())
                    .filter(|reason| !reason.is_empty())
                    .ok_or(EnrollmentError::MissingRejectionReason)?;
                StatusChange::ToRejected { reason }
            }
            ApplicationStatus::Accepted => {
                let group_id = group_id.ok_or(EnrollmentError::MissingGroup)?;
                StatusChange::ToAccepted { group_id }
            }
            ApplicationStatus::InReview => StatusChange::ToInReview,
            ApplicationStatus::Pending => StatusChange::ToPending,
        };

        match self.store.transition_application(
            application_id,
            change,
            principal.user_id,
            self.now(),
        ) {
            Ok(application) => {
                tracing::info!(
                    application_id = application.application_id.0,
                    status = %application.status,
                    "enrollment application reviewed"
                );
                Ok(application)
            }
            Err(StoreError::GroupFull) => Err(EnrollmentError::GroupFull),
            Err(StoreError::GroupMismatch) => Err(EnrollmentError::GroupMismatch),
            Err(StoreError::InvalidTransition { from, to }) => {
                Err(EnrollmentError::InvalidTransition { from, to })
            }
            Err(StoreError::NotFound) => Err(not_found("group")),
            Err(error) => Err(store_failure(error)),
        }
    }

    pub fn pending_applications(
        &self,
        principal: Principal,
        school_id: Option<SchoolId>,
    ) -> Result<Vec<ApplicationView>, EnrollmentError> {
        authorize(principal, Action::ViewReviewQueue)?;
        let school = self.reviewer_scope(principal)?.or(school_id);
        self.store
            .pending_applications(school)
            .map_err(store_failure)
    }

    pub fn applications_overview(
        &self,
        principal: Principal,
        school_id: Option<SchoolId>,
        status_token: Option<&str>,
    ) -> Result<Vec<ApplicationView>, EnrollmentError> {
        authorize(principal, Action::ViewReviewQueue)?;
        let school = self.reviewer_scope(principal)?.or(school_id);
        let status = status_token
            .map(|token| {
                ApplicationStatus::parse_label(token)
                    .ok_or_else(|| EnrollmentError::UnknownStatus(token.to_string()))
            })
            .transpose()?;
        self.store
            .applications_overview(school, status)
            .map_err(store_failure)
    }

    pub fn my_applications(
        &self,
        principal: Principal,
    ) -> Result<Vec<ApplicationView>, EnrollmentError> {
        authorize(principal, Action::ViewOwnApplications)?;
        let guardian = self.guardian_of(principal)?;
        self.store
            .applications_for_guardian(guardian.guardian_id)
            .map_err(store_failure)
    }

    /// Review-screen detail: the joined application plus, while it is still
    /// open, the groups it could be assigned to.
    pub fn application_detail(
        &self,
        principal: Principal,
        application_id: ApplicationId,
    ) -> Result<ApplicationDetail, EnrollmentError> {
        authorize(principal, Action::ReviewApplication)?;

        let view = self
            .store
            .application_view(application_id)
            .map_err(store_failure)?
            .ok_or_else(|| not_found("application"))?;

        if let Some(scope) = self.reviewer_scope(principal)? {
            if view.school_id != scope {
                return Err(EnrollmentError::OutOfSchoolScope);
            }
        }

        let assignable_groups = if view.status.is_open() {
            self.store
                .available_groups(view.school_id, view.cycle_id, view.grade_id)
                .map_err(store_failure)?
        } else {
            Vec::new()
        };

        Ok(ApplicationDetail {
            application: view,
            assignable_groups,
        })
    }

    pub fn statistics(
        &self,
        principal: Principal,
        school_id: Option<SchoolId>,
    ) -> Result<EnrollmentStatistics, EnrollmentError> {
        authorize(principal, Action::ViewStatistics)?;
        let school = self.reviewer_scope(principal)?.or(school_id);
        let cycle = self.active_cycle()?;
        self.store
            .statistics(cycle.cycle_id, school)
            .map_err(store_failure)
    }

    // ----- capacity ledger -------------------------------------------

    pub fn create_group(
        &self,
        principal: Principal,
        school_id: SchoolId,
        grade_id: GradeId,
        name: &str,
        capacity: u32,
        teacher_user_id: Option<UserId>,
    ) -> Result<ClassGroup, EnrollmentError> {
        authorize(principal, Action::ManageGroups)?;

        if let Some(scope) = self.reviewer_scope(principal)? {
            if school_id != scope {
                return Err(EnrollmentError::OutOfSchoolScope);
            }
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(EnrollmentError::MissingGroupName);
        }
        if !self.capacity_policy.allows(capacity) {
            return Err(EnrollmentError::CapacityOutOfRange {
                min: self.capacity_policy.min_seats(),
                max: self.capacity_policy.max_seats(),
            });
        }

        let cycle = self.active_cycle()?;
        self.store
            .fetch_school(school_id)
            .map_err(store_failure)?
            .ok_or_else(|| not_found("school"))?;

        match self.store.insert_group(NewGroup {
            school_id,
            cycle_id: cycle.cycle_id,
            grade_id,
            name: name.to_string(),
            capacity,
            teacher_user_id,
        }) {
            Ok(group) => Ok(group),
            Err(StoreError::NotFound) => Err(not_found("grade")),
            Err(error) => Err(store_failure(error)),
        }
    }

    pub fn available_groups(
        &self,
        principal: Principal,
        school_id: SchoolId,
        grade_id: GradeId,
    ) -> Result<Vec<GroupAvailability>, EnrollmentError> {
        authorize(principal, Action::ViewReviewQueue)?;

        if let Some(scope) = self.reviewer_scope(principal)? {
            if school_id != scope {
                return Err(EnrollmentError::OutOfSchoolScope);
            }
        }

        let cycle = self.active_cycle()?;
        self.store
            .available_groups(school_id, cycle.cycle_id, grade_id)
            .map_err(store_failure)
    }

    pub fn school_groups(
        &self,
        principal: Principal,
        school_id: Option<SchoolId>,
    ) -> Result<Vec<GroupView>, EnrollmentError> {
        authorize(principal, Action::ManageGroups)?;

        let school = self
            .reviewer_scope(principal)?
            .or(school_id)
            .ok_or(EnrollmentError::MissingSchool)?;
        let cycle = self.active_cycle()?;
        self.store
            .school_groups(school, cycle.cycle_id)
            .map_err(store_failure)
    }

    pub fn group_roster(
        &self,
        principal: Principal,
        group_id: GroupId,
    ) -> Result<Vec<RosterEntry>, EnrollmentError> {
        authorize(principal, Action::ViewGroupRoster)?;

        let group = self
            .store
            .fetch_group(group_id)
            .map_err(store_failure)?
            .ok_or_else(|| not_found("group"))?;

        match principal.role {
            Role::Teacher => {
                if group.teacher_user_id != Some(principal.user_id) {
                    return Err(EnrollmentError::NotGroupTeacher);
                }
            }
            Role::Director => {
                if let Some(scope) = self.reviewer_scope(principal)? {
                    if group.school_id != scope {
                        return Err(EnrollmentError::OutOfSchoolScope);
                    }
                }
            }
            _ => {}
        }

        self.store.group_roster(group_id).map_err(store_failure)
    }

    // ----- documents --------------------------------------------------

    pub fn record_document(
        &self,
        principal: Principal,
        student_id: StudentId,
        document_type_id: DocumentTypeId,
        submitted_on: NaiveDate,
        observations: Option<String>,
        file_url: Option<String>,
    ) -> Result<DocumentRecord, EnrollmentError> {
        authorize(principal, Action::RecordDocument)?;
        let guardian = self.guardian_of(principal)?;
        self.owned_student(&guardian, student_id)?;

        if submitted_on > self.today() {
            return Err(EnrollmentError::FutureDeliveryDate);
        }

        let types = self.store.document_types().map_err(store_failure)?;
        types
            .iter()
            .find(|doc_type| doc_type.document_type_id == document_type_id && doc_type.active)
            .ok_or_else(|| not_found("document type"))?;

        self.store
            .upsert_document(NewDocument {
                student_id,
                document_type_id,
                submitted_on,
                observations,
                file_url,
                uploaded_by: principal.user_id,
            })
            .map_err(store_failure)
    }

    pub fn document_checklist(
        &self,
        principal: Principal,
        student_id: StudentId,
    ) -> Result<Vec<ChecklistEntry>, EnrollmentError> {
        authorize(principal, Action::ViewDocuments)?;
        self.ensure_document_access(principal, student_id)?;

        let types = self.store.document_types().map_err(store_failure)?;
        let records = self
            .store
            .student_documents(student_id)
            .map_err(store_failure)?;
        Ok(documents::checklist(&types, &records))
    }

    pub fn document_summary(
        &self,
        principal: Principal,
        student_id: StudentId,
    ) -> Result<DocumentSummary, EnrollmentError> {
        let checklist = self.document_checklist(principal, student_id)?;
        Ok(documents::summary(&checklist))
    }

    pub fn documents_complete(
        &self,
        principal: Principal,
        student_id: StudentId,
    ) -> Result<bool, EnrollmentError> {
        authorize(principal, Action::ViewDocuments)?;
        self.ensure_document_access(principal, student_id)?;

        let types = self.store.document_types().map_err(store_failure)?;
        let records = self
            .store
            .student_documents(student_id)
            .map_err(store_failure)?;
        Ok(documents::is_complete(&types, &records))
    }

    pub fn review_document(
        &self,
        principal: Principal,
        document_id: DocumentId,
        status_token: &str,
    ) -> Result<DocumentRecord, EnrollmentError> {
        authorize(principal, Action::ReviewDocument)?;

        let status = DocumentStatus::parse_label(status_token)
            .ok_or_else(|| EnrollmentError::UnknownDocumentStatus(status_token.to_string()))?;
        if !matches!(status, DocumentStatus::Validated | DocumentStatus::Rejected) {
            return Err(EnrollmentError::InvalidDocumentReview);
        }

        match self.store.set_document_status(document_id, status) {
            Ok(record) => Ok(record),
            Err(StoreError::NotFound) => Err(not_found("document")),
            Err(error) => Err(store_failure(error)),
        }
    }

    pub fn remove_document(
        &self,
        principal: Principal,
        document_id: DocumentId,
    ) -> Result<(), EnrollmentError> {
        authorize(principal, Action::RemoveDocument)?;

        match self.store.delete_document(document_id, principal.user_id) {
            Ok(()) => Ok(()),
            Err(StoreError::NotFound) => Err(not_found("document")),
            Err(error) => Err(store_failure(error)),
        }
    }

    /// Guardians may only look at their own students; reviewer roles see
    /// every registered student.
    fn ensure_document_access(
        &self,
        principal: Principal,
        student_id: StudentId,
    ) -> Result<(), EnrollmentError> {
        if principal.role == Role::Guardian {
            let guardian = self.guardian_of(principal)?;
            self.owned_student(&guardian, student_id)?;
            return Ok(());
        }
        self.store
            .fetch_student(student_id)
            .map_err(store_failure)?
            .ok_or_else(|| not_found("student"))?;
        Ok(())
    }

    // ----- catalog -----------------------------------------------------

    pub fn current_cycle(&self) -> Result<AcademicCycle, EnrollmentError> {
        self.active_cycle()
    }

    pub fn grades(&self) -> Result<Vec<Grade>, EnrollmentError> {
        self.store.grades().map_err(store_failure)
    }

    pub fn enrollable_schools(&self) -> Result<Vec<SchoolSummary>, EnrollmentError> {
        self.store.enrollable_schools().map_err(store_failure)
    }
}
