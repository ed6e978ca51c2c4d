use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier wrappers mirroring the relational serial keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuardianId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchoolId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CycleId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GradeId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentTypeId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub i64);

/// Account roles recognized by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "tutor")]
    Guardian,
    #[serde(rename = "docente")]
    Teacher,
    #[serde(rename = "director")]
    Director,
    #[serde(rename = "sep_admin")]
    SepAdmin,
    #[serde(rename = "super_admin")]
    SuperAdmin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Guardian => "tutor",
            Self::Teacher => "docente",
            Self::Director => "director",
            Self::SepAdmin => "sep_admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Parse a wire token into a role. Unknown tokens are rejected, never coerced.
    pub fn parse_label(raw: &str) -> Option<Self> {
        match raw.trim() {
            "tutor" => Some(Self::Guardian),
            "docente" => Some(Self::Teacher),
            "director" => Some(Self::Director),
            "sep_admin" => Some(Self::SepAdmin),
            "super_admin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The authenticated caller, passed explicitly into every portal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

/// Lifecycle states of an enrollment application. The wire tokens match the
/// store's `enroll_status` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "en_revision")]
    InReview,
    #[serde(rename = "aceptado")]
    Accepted,
    #[serde(rename = "rechazado")]
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pendiente",
            Self::InReview => "en_revision",
            Self::Accepted => "aceptado",
            Self::Rejected => "rechazado",
        }
    }

    pub fn parse_label(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pendiente" => Some(Self::Pending),
            "en_revision" => Some(Self::InReview),
            "aceptado" => Some(Self::Accepted),
            "rechazado" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::InReview)
    }

    /// Transition table. Open statuses may move between each other and into
    /// either terminal status; terminal statuses are locked.
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::InReview | Self::Accepted | Self::Rejected) => true,
            (Self::InReview, Self::Pending | Self::Accepted | Self::Rejected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Delivery states of a document record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "recibido")]
    Received,
    #[serde(rename = "validado")]
    Validated,
    #[serde(rename = "rechazado")]
    Rejected,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pendiente",
            Self::Received => "recibido",
            Self::Validated => "validado",
            Self::Rejected => "rechazado",
        }
    }

    pub fn parse_label(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pendiente" => Some(Self::Pending),
            "recibido" => Some(Self::Received),
            "validado" => Some(Self::Validated),
            "rechazado" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "M")]
    Male,
}

/// A registered student. The CURP is unique system-wide and immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: StudentId,
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

impl Student {
    pub fn full_name(&self) -> String {
        format!(
            "{} {} {}",
            self.first_name, self.paternal_surname, self.maternal_surname
        )
    }
}

/// Guardian profile attached to an identity-store user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guardian {
    pub guardian_id: GuardianId,
    pub user_id: UserId,
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub phone: String,
    pub age: Option<u8>,
}

impl Guardian {
    pub fn full_name(&self) -> String {
        format!(
            "{} {} {}",
            self.first_name, self.paternal_surname, self.maternal_surname
        )
    }
}

/// Link between a student and one of their guardians. `is_primary` is a
/// presentation hint used to pick whom to contact first; it is not unique
/// per student at the store level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianLink {
    pub student_id: StudentId,
    pub guardian_id: GuardianId,
    pub is_primary: bool,
    pub contact_order: i16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicCycle {
    pub cycle_id: CycleId,
    pub name: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub active: bool,
    pub enrollment_open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub grade_id: GradeId,
    pub level: i16,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    pub school_id: SchoolId,
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

/// A class section within one school, cycle, and grade. `enrolled` is
/// maintained by the capacity ledger and must never exceed `capacity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassGroup {
    pub group_id: GroupId,
    pub school_id: SchoolId,
    pub cycle_id: CycleId,
    pub grade_id: GradeId,
    pub name: String,
    pub capacity: u32,
    pub enrolled: u32,
    pub teacher_user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentType {
    pub document_type_id: DocumentTypeId,
    pub code: String,
    pub name: String,
    pub description: String,
    pub required: bool,
    pub active: bool,
}

/// One document on file for a student. At most one record exists per
/// (student, document type); later uploads replace the earlier record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: DocumentId,
    pub student_id: StudentId,
    pub document_type_id: DocumentTypeId,
    pub status: DocumentStatus,
    pub submitted_on: NaiveDate,
    pub file_url: Option<String>,
    pub observations: Option<String>,
    pub uploaded_by: UserId,
}

/// The central record of the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentApplication {
    pub application_id: ApplicationId,
    pub student_id: StudentId,
    pub school_id: SchoolId,
    pub cycle_id: CycleId,
    pub grade_id: GradeId,
    pub group_id: Option<GroupId>,
    pub status: ApplicationStatus,
    pub requested_by: UserId,
    pub submitted_at: NaiveDateTime,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub rejection_reason: Option<String>,
}

/// Outcome of the store-side eligibility check. `reason` names the first
/// failing condition when `eligible` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityCheck {
    pub eligible: bool,
    pub reason: String,
}

/// Per-status counts for the active cycle, optionally scoped to one school.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentStatistics {
    pub pending: u64,
    pub in_review: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub total: u64,
}

/// Joined application row ready for templated display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
    pub submitted_at: NaiveDateTime,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub student_id: StudentId,
    pub student_name: String,
    pub curp: String,
    pub school_id: SchoolId,
    pub school_name: String,
    pub cct: String,
    pub cycle_id: CycleId,
    pub cycle_name: String,
    pub grade_id: GradeId,
    pub grade_label: String,
    pub group_name: Option<String>,
}

/// Application detail for the review screen. Assignable groups are only
/// populated while the application is still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDetail {
    pub application: ApplicationView,
    pub assignable_groups: Vec<GroupAvailability>,
}

/// One row of the document checklist: the catalog entry left-joined with
/// whatever the student has on file. `delivered` means a record exists,
/// regardless of its validation status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistEntry {
    pub document_type_id: DocumentTypeId,
    pub code: String,
    pub name: String,
    pub required: bool,
    pub delivered: bool,
    pub status: Option<DocumentStatus>,
    pub submitted_on: Option<NaiveDate>,
    pub observations: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub delivered: usize,
    pub total: usize,
    pub pending: usize,
    pub percentage: f64,
}

/// A group with at least the seat data needed for assignment decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAvailability {
    pub group_id: GroupId,
    pub name: String,
    pub capacity: u32,
    pub enrolled: u32,
    pub remaining: u32,
}

/// Group listing row for director dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupView {
    pub group_id: GroupId,
    pub name: String,
    pub grade_level: i16,
    pub grade_label: String,
    pub capacity: u32,
    pub enrolled: u32,
    pub remaining: u32,
    pub teacher_user_id: Option<UserId>,
}

/// Accepted student in a group, with the primary guardian's contact data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub student_id: StudentId,
    pub full_name: String,
    pub curp: String,
    pub birth_date: NaiveDate,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub submitted_at: NaiveDateTime,
}

/// School listing row for the enrollment form, with derived availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolSummary {
    pub school_id: SchoolId,
    pub cct: String,
    pub name: String,
    pub municipality: String,
    pub shift: String,
    pub total_seats: u32,
    pub available_seats: u32,
}

/// Guardian-supplied profile used when creating the guardian record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianProfile {
    pub first_name: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub phone: String,
    pub age: Option<u8>,
}

/// Guardian-supplied student registration form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentIntake {
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
}
