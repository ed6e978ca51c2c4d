//! In-memory reference store. Every table lives behind one mutex, and each
//! trait call holds the lock for its whole duration, the same
//! one-operation-per-transaction model the portal assumes of a relational
//! backend. The acceptance path mutates the application row and the group
//! counter inside a single critical section, so the pair is both-or-neither.

use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, NaiveDateTime};

use super::capacity::remaining_seats;
use super::documents;
use super::domain::{
    AcademicCycle, ApplicationId, ApplicationStatus, ApplicationView, ClassGroup, CycleId,
    DocumentId, DocumentRecord, DocumentStatus, DocumentType, DocumentTypeId, EligibilityCheck,
    EnrollmentApplication, EnrollmentStatistics, Grade, GradeId, GroupAvailability, GroupId,
    GroupView, Guardian, GuardianId, GuardianLink, RosterEntry, School, SchoolId, SchoolSummary,
    Student, StudentId, UserId,
};
use super::repository::{
    CatalogRepository, DocumentRepository, EnrollmentRepository, GroupRepository, NewApplication,
    NewDocument, NewGroup, NewGuardian, NewStudent, StatusChange, StoreError, StudentRepository,
};

#[derive(Default)]
struct PortalState {
    next_id: i64,
    cycles: Vec<AcademicCycle>,
    grades: Vec<Grade>,
    schools: Vec<School>,
    groups: Vec<ClassGroup>,
    document_types: Vec<DocumentType>,
    documents: Vec<DocumentRecord>,
    students: Vec<Student>,
    guardians: Vec<Guardian>,
    guardian_links: Vec<GuardianLink>,
    applications: Vec<EnrollmentApplication>,
}

impl PortalState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Shared in-memory backend used by the API service, the demo, and tests.
#[derive(Default)]
pub struct MemoryPortal {
    state: Mutex<PortalState>,
}

/// Catalog seed for an academic cycle.
#[derive(Debug, Clone)]
pub struct CycleSeed {
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub active: bool,
    pub enrollment_open: bool,
}

/// Catalog seed for a school facility.
#[derive(Debug, Clone)]
pub struct SchoolSeed {
    pub cct: String,
    pub name: String,
    pub address: String,
    pub municipality: String,
    pub state: String,
    pub shift: String,
    pub total_seats: u32,
    pub phone: Option<String>,
    pub contact_email: Option<String>,
    pub active: bool,
    pub director_user_id: Option<UserId>,
}

/// Catalog seed for a document type.
#[derive(Debug, Clone)]
pub struct DocumentTypeSeed {
    pub code: String,
    pub name: String,
    pub description: String,
    pub required: bool,
    pub active: bool,
}

impl MemoryPortal {
    fn state(&self) -> Result<MutexGuard<'_, PortalState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("portal mutex poisoned".to_string()))
    }

    pub fn add_cycle(&self, seed: CycleSeed) -> AcademicCycle {
        let mut state = self.state.lock().expect("portal mutex poisoned");
        let cycle = AcademicCycle {
            cycle_id: CycleId(state.next_id()),
            name: seed.name,
            starts_on: seed.starts_on,
            ends_on: seed.ends_on,
            active: seed.active,
            enrollment_open: seed.enrollment_open,
        };
        state.cycles.push(cycle.clone());
        cycle
    }

    pub fn add_grade(&self, level: i16, description: &str) -> Grade {
        let mut state = self.state.lock().expect("portal mutex poisoned");
        let grade = Grade {
            grade_id: GradeId(state.next_id()),
            level,
            description: description.to_string(),
        };
        state.grades.push(grade.clone());
        grade
    }

    pub fn add_school(&self, seed: SchoolSeed) -> School {
        let mut state = self.state.lock().expect("portal mutex poisoned");
        let school = School {
            school_id: SchoolId(state.next_id()),
            cct: seed.cct,
            name: seed.name,
            address: seed.address,
            municipality: seed.municipality,
            state: seed.state,
            shift: seed.shift,
            total_seats: seed.total_seats,
            phone: seed.phone,
            contact_email: seed.contact_email,
            active: seed.active,
            director_user_id: seed.director_user_id,
        };
        state.schools.push(school.clone());
        school
    }

    pub fn add_document_type(&self, seed: DocumentTypeSeed) -> DocumentType {
        let mut state = self.state.lock().expect("portal mutex poisoned");
        let doc_type = DocumentType {
            document_type_id: DocumentTypeId(state.next_id()),
            code: seed.code,
            name: seed.name,
            description: seed.description,
            required: seed.required,
            active: seed.active,
        };
        state.document_types.push(doc_type.clone());
        doc_type
    }

    /// Flip the enrollment window of a cycle.
    pub fn set_enrollment_open(&self, cycle: CycleId, open: bool) {
        let mut state = self.state.lock().expect("portal mutex poisoned");
        if let Some(cycle) = state.cycles.iter_mut().find(|c| c.cycle_id == cycle) {
            cycle.enrollment_open = open;
        }
    }

    /// Maintenance hook: overwrite a group's enrolled counter directly,
    /// bypassing the ledger. Reads detect any resulting drift.
    pub fn override_enrolled_count(&self, group: GroupId, enrolled: u32) {
        let mut state = self.state.lock().expect("portal mutex poisoned");
        if let Some(group) = state.groups.iter_mut().find(|g| g.group_id == group) {
            group.enrolled = enrolled;
        }
    }
}

fn missing_reference(record: &str, reference: &str) -> StoreError {
    StoreError::Corrupted(format!("{record} references a missing {reference}"))
}

fn corrupted_group(group: &ClassGroup) -> StoreError {
    StoreError::Corrupted(format!(
        "group `{}` has {} students enrolled against {} seats",
        group.name, group.enrolled, group.capacity
    ))
}

fn build_view(
    state: &PortalState,
    application: &EnrollmentApplication,
) -> Result<ApplicationView, StoreError> {
    let student = state
        .students
        .iter()
        .find(|s| s.student_id == application.student_id)
        .ok_or_else(|| missing_reference("application", "student"))?;
    let school = state
        .schools
        .iter()
        .find(|s| s.school_id == application.school_id)
        .ok_or_else(|| missing_reference("application", "school"))?;
    let cycle = state
        .cycles
        .iter()
        .find(|c| c.cycle_id == application.cycle_id)
        .ok_or_else(|| missing_reference("application", "cycle"))?;
    let grade = state
        .grades
        .iter()
        .find(|g| g.grade_id == application.grade_id)
        .ok_or_else(|| missing_reference("application", "grade"))?;
    let group_name = application
        .group_id
        .and_then(|id| state.groups.iter().find(|g| g.group_id == id))
        .map(|g| g.name.clone());

    Ok(ApplicationView {
        application_id: application.application_id,
        status: application.status,
        submitted_at: application.submitted_at,
        rejection_reason: application.rejection_reason.clone(),
        reviewed_by: application.reviewed_by,
        reviewed_at: application.reviewed_at,
        student_id: student.student_id,
        student_name: student.full_name(),
        curp: student.curp.clone(),
        school_id: school.school_id,
        school_name: school.name.clone(),
        cct: school.cct.clone(),
        cycle_id: cycle.cycle_id,
        cycle_name: cycle.name.clone(),
        grade_id: grade.grade_id,
        grade_label: grade.description.clone(),
        group_name,
    })
}

fn collect_views(
    state: &PortalState,
    applications: Vec<&EnrollmentApplication>,
) -> Result<Vec<ApplicationView>, StoreError> {
    applications
        .into_iter()
        .map(|application| build_view(state, application))
        .collect()
}

impl EnrollmentRepository for MemoryPortal {
    fn insert_application(
        &self,
        application: NewApplication,
        submitted_at: NaiveDateTime,
    ) -> Result<EnrollmentApplication, StoreError> {
        let mut state = self.state()?;

        if !state
            .students
            .iter()
            .any(|s| s.student_id == application.student_id)
            || !state
                .schools
                .iter()
                .any(|s| s.school_id == application.school_id)
            || !state.grades.iter().any(|g| g.grade_id == application.grade_id)
            || !state.cycles.iter().any(|c| c.cycle_id == application.cycle_id)
        {
            return Err(StoreError::NotFound);
        }

        let duplicate = state.applications.iter().any(|existing| {
            existing.student_id == application.student_id
                && existing.cycle_id == application.cycle_id
        });
        if duplicate {
            return Err(StoreError::Duplicate);
        }

        let record = EnrollmentApplication {
            application_id: ApplicationId(state.next_id()),
            student_id: application.student_id,
            school_id: application.school_id,
            cycle_id: application.cycle_id,
            grade_id: application.grade_id,
            group_id: None,
            status: ApplicationStatus::Pending,
            requested_by: application.requested_by,
            submitted_at,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
        };
        state.applications.push(record.clone());
        Ok(record)
    }

    fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<EnrollmentApplication>, StoreError> {
        let state = self.state()?;
        Ok(state
            .applications
            .iter()
            .find(|a| a.application_id == id)
            .cloned())
    }

    fn application_view(&self, id: ApplicationId) -> Result<Option<ApplicationView>, StoreError> {
        let state = self.state()?;
        state
            .applications
            .iter()
            .find(|a| a.application_id == id)
            .map(|application| build_view(&state, application))
            .transpose()
    }

    fn pending_applications(
        &self,
        school: Option<SchoolId>,
    ) -> Result<Vec<ApplicationView>, StoreError> {
        let state = self.state()?;
        let mut open: Vec<&EnrollmentApplication> = state
            .applications
            .iter()
            .filter(|a| a.status.is_open())
            .filter(|a| school.map_or(true, |school| a.school_id == school))
            .collect();
        open.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.application_id.cmp(&b.application_id))
        });
        collect_views(&state, open)
    }

    fn applications_overview(
        &self,
        school: Option<SchoolId>,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationView>, StoreError> {
        let state = self.state()?;
        let mut rows: Vec<&EnrollmentApplication> = state
            .applications
            .iter()
            .filter(|a| school.map_or(true, |school| a.school_id == school))
            .filter(|a| status.map_or(true, |status| a.status == status))
            .collect();
        rows.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.application_id.cmp(&a.application_id))
        });
        collect_views(&state, rows)
    }

    fn applications_for_guardian(
        &self,
        guardian: GuardianId,
    ) -> Result<Vec<ApplicationView>, StoreError> {
        let state = self.state()?;
        let mut rows: Vec<&EnrollmentApplication> = state
            .applications
            .iter()
            .filter(|a| {
                state
                    .guardian_links
                    .iter()
                    .any(|link| link.guardian_id == guardian && link.student_id == a.student_id)
            })
            .collect();
        rows.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.application_id.cmp(&a.application_id))
        });
        collect_views(&state, rows)
    }

    fn transition_application(
        &self,
        id: ApplicationId,
        change: StatusChange,
        reviewer: UserId,
        reviewed_at: NaiveDateTime,
    ) -> Result<EnrollmentApplication, StoreError> {
        let mut state = self.state()?;
        let index = state
            .applications
            .iter()
            .position(|a| a.application_id == id)
            .ok_or(StoreError::NotFound)?;

        let from = state.applications[index].status;
        let to = change.target();
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition { from, to });
        }

        match &change {
            StatusChange::ToAccepted { group_id } => {
                let (school_id, cycle_id, grade_id) = {
                    let application = &state.applications[index];
                    (
                        application.school_id,
                        application.cycle_id,
                        application.grade_id,
                    )
                };

                let group_index = state
                    .groups
                    .iter()
                    .position(|g| g.group_id == *group_id)
                    .ok_or(StoreError::NotFound)?;
                {
                    let group = &state.groups[group_index];
                    if group.school_id != school_id
                        || group.cycle_id != cycle_id
                        || group.grade_id != grade_id
                    {
                        return Err(StoreError::GroupMismatch);
                    }
                    let remaining = remaining_seats(group).ok_or_else(|| corrupted_group(group))?;
                    if remaining == 0 {
                        return Err(StoreError::GroupFull);
                    }
                }

                // Seat and status change under the same lock: both-or-neither.
                state.groups[group_index].enrolled += 1;
                let application = &mut state.applications[index];
                application.status = ApplicationStatus::Accepted;
                application.group_id = Some(*group_id);
                application.reviewed_by = Some(reviewer);
                application.reviewed_at = Some(reviewed_at);
                application.rejection_reason = None;
            }
            StatusChange::ToRejected { reason } => {
                let application = &mut state.applications[index];
                application.status = ApplicationStatus::Rejected;
                application.group_id = None;
                application.reviewed_by = Some(reviewer);
                application.reviewed_at = Some(reviewed_at);
                application.rejection_reason = Some(reason.clone());
            }
            StatusChange::ToPending | StatusChange::ToInReview => {
                let application = &mut state.applications[index];
                application.status = to;
                application.group_id = None;
                application.reviewed_by = Some(reviewer);
                application.reviewed_at = Some(reviewed_at);
                application.rejection_reason = None;
            }
        }

        Ok(state.applications[index].clone())
    }

    fn check_eligibility(
        &self,
        student: StudentId,
        school: SchoolId,
        cycle: CycleId,
    ) -> Result<EligibilityCheck, StoreError> {
        let state = self.state()?;

        if !state.students.iter().any(|s| s.student_id == student) {
            return Ok(EligibilityCheck {
                eligible: false,
                reason: "the student is not registered".to_string(),
            });
        }

        let records: Vec<DocumentRecord> = state
            .documents
            .iter()
            .filter(|d| d.student_id == student)
            .cloned()
            .collect();
        if !documents::is_complete(&state.document_types, &records) {
            return Ok(EligibilityCheck {
                eligible: false,
                reason: "required documents are missing or not yet validated".to_string(),
            });
        }

        let school_active = state
            .schools
            .iter()
            .any(|s| s.school_id == school && s.active);
        if !school_active {
            return Ok(EligibilityCheck {
                eligible: false,
                reason: "the school is not accepting enrollments".to_string(),
            });
        }

        let same_cycle = state
            .applications
            .iter()
            .any(|a| a.student_id == student && a.cycle_id == cycle);
        if same_cycle {
            return Ok(EligibilityCheck {
                eligible: false,
                reason: "the student already has an application for this cycle".to_string(),
            });
        }

        let open_application = state
            .applications
            .iter()
            .any(|a| a.student_id == student && a.status.is_open());
        if open_application {
            return Ok(EligibilityCheck {
                eligible: false,
                reason: "the student already has an open enrollment application".to_string(),
            });
        }

        Ok(EligibilityCheck {
            eligible: true,
            reason: "the student may be enrolled".to_string(),
        })
    }

    fn statistics(
        &self,
        cycle: CycleId,
        school: Option<SchoolId>,
    ) -> Result<EnrollmentStatistics, StoreError> {
        let state = self.state()?;
        let mut stats = EnrollmentStatistics::default();
        for application in state
            .applications
            .iter()
            .filter(|a| a.cycle_id == cycle)
            .filter(|a| school.map_or(true, |school| a.school_id == school))
        {
            match application.status {
                ApplicationStatus::Pending => stats.pending += 1,
                ApplicationStatus::InReview => stats.in_review += 1,
                ApplicationStatus::Accepted => stats.accepted += 1,
                ApplicationStatus::Rejected => stats.rejected += 1,
            }
            stats.total += 1;
        }
        Ok(stats)
    }
}

impl GroupRepository for MemoryPortal {
    fn insert_group(&self, group: NewGroup) -> Result<ClassGroup, StoreError> {
        let mut state = self.state()?;

        if !state.schools.iter().any(|s| s.school_id == group.school_id)
            || !state.grades.iter().any(|g| g.grade_id == group.grade_id)
            || !state.cycles.iter().any(|c| c.cycle_id == group.cycle_id)
        {
            return Err(StoreError::NotFound);
        }

        let record = ClassGroup {
            group_id: GroupId(state.next_id()),
            school_id: group.school_id,
            cycle_id: group.cycle_id,
            grade_id: group.grade_id,
            name: group.name,
            capacity: group.capacity,
            enrolled: 0,
            teacher_user_id: group.teacher_user_id,
        };
        state.groups.push(record.clone());
        Ok(record)
    }

    fn fetch_group(&self, id: GroupId) -> Result<Option<ClassGroup>, StoreError> {
        let state = self.state()?;
        Ok(state.groups.iter().find(|g| g.group_id == id).cloned())
    }

    fn available_groups(
        &self,
        school: SchoolId,
        cycle: CycleId,
        grade: GradeId,
    ) -> Result<Vec<GroupAvailability>, StoreError> {
        let state = self.state()?;
        let mut rows = Vec::new();
        for group in state.groups.iter().filter(|g| {
            g.school_id == school && g.cycle_id == cycle && g.grade_id == grade
        }) {
            let remaining = remaining_seats(group).ok_or_else(|| corrupted_group(group))?;
            if remaining > 0 {
                rows.push(GroupAvailability {
                    group_id: group.group_id,
                    name: group.name.clone(),
                    capacity: group.capacity,
                    enrolled: group.enrolled,
                    remaining,
                });
            }
        }
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    fn school_groups(
        &self,
        school: SchoolId,
        cycle: CycleId,
    ) -> Result<Vec<GroupView>, StoreError> {
        let state = self.state()?;
        let mut rows = Vec::new();
        for group in state
            .groups
            .iter()
            .filter(|g| g.school_id == school && g.cycle_id == cycle)
        {
            let grade = state
                .grades
                .iter()
                .find(|g| g.grade_id == group.grade_id)
                .ok_or_else(|| missing_reference("group", "grade"))?;
            let remaining = remaining_seats(group).ok_or_else(|| corrupted_group(group))?;
            rows.push(GroupView {
                group_id: group.group_id,
                name: group.name.clone(),
                grade_level: grade.level,
                grade_label: grade.description.clone(),
                capacity: group.capacity,
                enrolled: group.enrolled,
                remaining,
                teacher_user_id: group.teacher_user_id,
            });
        }
        rows.sort_by(|a, b| {
            a.grade_level
                .cmp(&b.grade_level)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(rows)
    }

    fn group_roster(&self, group: GroupId) -> Result<Vec<RosterEntry>, StoreError> {
        let state = self.state()?;
        let mut rows = Vec::new();
        for application in state.applications.iter().filter(|a| {
            a.group_id == Some(group) && a.status == ApplicationStatus::Accepted
        }) {
            let student = state
                .students
                .iter()
                .find(|s| s.student_id == application.student_id)
                .ok_or_else(|| missing_reference("application", "student"))?;

            let mut links: Vec<&GuardianLink> = state
                .guardian_links
                .iter()
                .filter(|link| link.student_id == student.student_id)
                .collect();
            links.sort_by(|a, b| {
                b.is_primary
                    .cmp(&a.is_primary)
                    .then_with(|| a.contact_order.cmp(&b.contact_order))
            });
            let guardian = links.first().and_then(|link| {
                state
                    .guardians
                    .iter()
                    .find(|g| g.guardian_id == link.guardian_id)
            });

            rows.push(RosterEntry {
                student_id: student.student_id,
                full_name: student.full_name(),
                curp: student.curp.clone(),
                birth_date: student.birth_date,
                guardian_name: guardian.map(Guardian::full_name),
                guardian_phone: guardian.map(|g| g.phone.clone()),
                submitted_at: application.submitted_at,
            });
        }
        rows.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(rows)
    }
}

impl DocumentRepository for MemoryPortal {
    fn upsert_document(&self, document: NewDocument) -> Result<DocumentRecord, StoreError> {
        let mut state = self.state()?;

        if !state
            .students
            .iter()
            .any(|s| s.student_id == document.student_id)
        {
            return Err(StoreError::NotFound);
        }

        let existing = state.documents.iter_mut().find(|d| {
            d.student_id == document.student_id
                && d.document_type_id == document.document_type_id
        });

        if let Some(record) = existing {
            record.status = DocumentStatus::Received;
            record.submitted_on = document.submitted_on;
            record.observations = document.observations;
            record.file_url = document.file_url;
            record.uploaded_by = document.uploaded_by;
            return Ok(record.clone());
        }

        let record = DocumentRecord {
            document_id: DocumentId(state.next_id()),
            student_id: document.student_id,
            document_type_id: document.document_type_id,
            status: DocumentStatus::Received,
            submitted_on: document.submitted_on,
            file_url: document.file_url,
            observations: document.observations,
            uploaded_by: document.uploaded_by,
        };
        state.documents.push(record.clone());
        Ok(record)
    }

    fn student_documents(&self, student: StudentId) -> Result<Vec<DocumentRecord>, StoreError> {
        let state = self.state()?;
        Ok(state
            .documents
            .iter()
            .filter(|d| d.student_id == student)
            .cloned()
            .collect())
    }

    fn document_types(&self) -> Result<Vec<DocumentType>, StoreError> {
        let state = self.state()?;
        let mut types = state.document_types.clone();
        types.sort_by(|a, b| b.required.cmp(&a.required).then_with(|| a.name.cmp(&b.name)));
        Ok(types)
    }

    fn set_document_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
    ) -> Result<DocumentRecord, StoreError> {
        let mut state = self.state()?;
        let record = state
            .documents
            .iter_mut()
            .find(|d| d.document_id == id)
            .ok_or(StoreError::NotFound)?;
        record.status = status;
        Ok(record.clone())
    }

    fn delete_document(&self, id: DocumentId, uploaded_by: UserId) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let index = state
            .documents
            .iter()
            .position(|d| d.document_id == id && d.uploaded_by == uploaded_by)
            .ok_or(StoreError::NotFound)?;
        state.documents.remove(index);
        Ok(())
    }
}

impl StudentRepository for MemoryPortal {
    fn insert_student(&self, student: NewStudent) -> Result<Student, StoreError> {
        let mut state = self.state()?;

        if state.students.iter().any(|s| s.curp == student.curp) {
            return Err(StoreError::Duplicate);
        }

        let record = Student {
            student_id: StudentId(state.next_id()),
            first_name: student.first_name,
            paternal_surname: student.paternal_surname,
            maternal_surname: student.maternal_surname,
            curp: student.curp,
            birth_date: student.birth_date,
            sex: student.sex,
            address: student.address,
            municipality: student.municipality,
            state: student.state,
            phone: student.phone,
            nationality: student.nationality,
            prior_school: student.prior_school,
            created_by: student.created_by,
        };
        state.students.push(record.clone());
        Ok(record)
    }

    fn fetch_student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        let state = self.state()?;
        Ok(state.students.iter().find(|s| s.student_id == id).cloned())
    }

    fn insert_guardian(&self, guardian: NewGuardian) -> Result<Guardian, StoreError> {
        let mut state = self.state()?;

        if state.guardians.iter().any(|g| g.user_id == guardian.user_id) {
            return Err(StoreError::Duplicate);
        }

        let record = Guardian {
            guardian_id: GuardianId(state.next_id()),
            user_id: guardian.user_id,
            first_name: guardian.first_name,
            paternal_surname: guardian.paternal_surname,
            maternal_surname: guardian.maternal_surname,
            phone: guardian.phone,
            age: guardian.age,
        };
        state.guardians.push(record.clone());
        Ok(record)
    }

    fn guardian_for_user(&self, user: UserId) -> Result<Option<Guardian>, StoreError> {
        let state = self.state()?;
        Ok(state.guardians.iter().find(|g| g.user_id == user).cloned())
    }

    fn link_guardian(
        &self,
        student: StudentId,
        guardian: GuardianId,
        is_primary: bool,
        contact_order: i16,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;

        if !state.students.iter().any(|s| s.student_id == student)
            || !state.guardians.iter().any(|g| g.guardian_id == guardian)
        {
            return Err(StoreError::NotFound);
        }
        let duplicate = state
            .guardian_links
            .iter()
            .any(|link| link.student_id == student && link.guardian_id == guardian);
        if duplicate {
            return Err(StoreError::Duplicate);
        }

        state.guardian_links.push(GuardianLink {
            student_id: student,
            guardian_id: guardian,
            is_primary,
            contact_order,
        });
        Ok(())
    }

    fn students_for_guardian(&self, guardian: GuardianId) -> Result<Vec<Student>, StoreError> {
        let state = self.state()?;
        let mut students: Vec<Student> = state
            .students
            .iter()
            .filter(|s| {
                state
                    .guardian_links
                    .iter()
                    .any(|link| link.guardian_id == guardian && link.student_id == s.student_id)
            })
            .cloned()
            .collect();
        students.sort_by_key(Student::full_name);
        Ok(students)
    }

    fn guardian_owns_student(
        &self,
        guardian: GuardianId,
        student: StudentId,
    ) -> Result<bool, StoreError> {
        let state = self.state()?;
        Ok(state
            .guardian_links
            .iter()
            .any(|link| link.guardian_id == guardian && link.student_id == student))
    }
}

impl CatalogRepository for MemoryPortal {
    fn active_cycle(&self) -> Result<Option<AcademicCycle>, StoreError> {
        let state = self.state()?;
        Ok(state.cycles.iter().find(|c| c.active).cloned())
    }

    fn grades(&self) -> Result<Vec<Grade>, StoreError> {
        let state = self.state()?;
        let mut grades = state.grades.clone();
        grades.sort_by_key(|g| g.level);
        Ok(grades)
    }

    fn fetch_school(&self, id: SchoolId) -> Result<Option<School>, StoreError> {
        let state = self.state()?;
        Ok(state.schools.iter().find(|s| s.school_id == id).cloned())
    }

    fn enrollable_schools(&self) -> Result<Vec<SchoolSummary>, StoreError> {
        let state = self.state()?;
        let active_cycle = state.cycles.iter().find(|c| c.active).map(|c| c.cycle_id);

        let mut rows: Vec<SchoolSummary> = state
            .schools
            .iter()
            .filter(|school| school.active)
            .map(|school| {
                let accepted = active_cycle.map_or(0, |cycle| {
                    state
                        .applications
                        .iter()
                        .filter(|a| {
                            a.school_id == school.school_id
                                && a.cycle_id == cycle
                                && a.status == ApplicationStatus::Accepted
                        })
                        .count() as u32
                });
                SchoolSummary {
                    school_id: school.school_id,
                    cct: school.cct.clone(),
                    name: school.name.clone(),
                    municipality: school.municipality.clone(),
                    shift: school.shift.clone(),
                    total_seats: school.total_seats,
                    available_seats: school.total_seats.saturating_sub(accepted),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    fn school_for_director(&self, user: UserId) -> Result<Option<School>, StoreError> {
        let state = self.state()?;
        Ok(state
            .schools
            .iter()
            .find(|s| s.director_user_id == Some(user) && s.active)
            .cloned())
    }
}
