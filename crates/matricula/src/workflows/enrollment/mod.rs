//! School-enrollment lifecycle: guardians register students and submit
//! applications; directors and administrators review them, assign class
//! groups, and track document completeness. Capacity accounting and the
//! eligibility gate live behind the store seam so acceptance and the seat
//! increment stay atomic.

pub mod authz;
pub mod capacity;
pub mod documents;
pub mod domain;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use authz::{authorize, AccessDenied, Action};
pub use capacity::GroupCapacityPolicy;
pub use domain::{
    AcademicCycle, ApplicationDetail, ApplicationId, ApplicationStatus, ApplicationView,
    ChecklistEntry, ClassGroup, CycleId, DocumentId, DocumentRecord, DocumentStatus,
    DocumentSummary, DocumentType, DocumentTypeId, EligibilityCheck, EnrollmentApplication,
    EnrollmentStatistics, Grade, GradeId, GroupAvailability, GroupId, GroupView, Guardian,
    GuardianId, GuardianLink, GuardianProfile, Principal, Role, RosterEntry, School, SchoolId,
    SchoolSummary, Sex, Student, StudentId, StudentIntake, UserId,
};
pub use memory::{CycleSeed, DocumentTypeSeed, MemoryPortal, SchoolSeed};
pub use repository::{
    CatalogRepository, DocumentRepository, EnrollmentRepository, GroupRepository, NewApplication,
    NewDocument, NewGroup, NewGuardian, NewStudent, PortalStore, StatusChange, StoreError,
    StudentRepository,
};
pub use router::enrollment_router;
pub use service::{EnrollmentError, EnrollmentService};
