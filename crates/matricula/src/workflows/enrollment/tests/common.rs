use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::enrollment::capacity::GroupCapacityPolicy;
use crate::workflows::enrollment::domain::{
    AcademicCycle, ClassGroup, DocumentType, EnrollmentApplication, Grade, Guardian,
    GuardianProfile, Principal, Role, School, Sex, Student, StudentIntake, UserId,
};
use crate::workflows::enrollment::memory::{
    CycleSeed, DocumentTypeSeed, MemoryPortal, SchoolSeed,
};
use crate::workflows::enrollment::router::enrollment_router;
use crate::workflows::enrollment::service::EnrollmentService;

pub(super) const SEP_ADMIN_USER: UserId = UserId(1);
pub(super) const DIRECTOR_USER: UserId = UserId(10);
pub(super) const OTHER_DIRECTOR_USER: UserId = UserId(11);
pub(super) const TEACHER_USER: UserId = UserId(20);
pub(super) const GUARDIAN_USER: UserId = UserId(100);
pub(super) const OTHER_GUARDIAN_USER: UserId = UserId(101);

pub(super) fn guardian() -> Principal {
    Principal {
        user_id: GUARDIAN_USER,
        role: Role::Guardian,
    }
}

pub(super) fn other_guardian() -> Principal {
    Principal {
        user_id: OTHER_GUARDIAN_USER,
        role: Role::Guardian,
    }
}

pub(super) fn director() -> Principal {
    Principal {
        user_id: DIRECTOR_USER,
        role: Role::Director,
    }
}

pub(super) fn other_director() -> Principal {
    Principal {
        user_id: OTHER_DIRECTOR_USER,
        role: Role::Director,
    }
}

pub(super) fn sep_admin() -> Principal {
    Principal {
        user_id: SEP_ADMIN_USER,
        role: Role::SepAdmin,
    }
}

pub(super) fn teacher() -> Principal {
    Principal {
        user_id: TEACHER_USER,
        role: Role::Teacher,
    }
}

pub(super) struct Fixture {
    pub service: Arc<EnrollmentService<MemoryPortal>>,
    pub store: Arc<MemoryPortal>,
    pub cycle: AcademicCycle,
    pub grades: Vec<Grade>,
    pub schools: Vec<School>,
    pub document_types: Vec<DocumentType>,
}

/// Seeded portal: one open cycle, two grades, three document types (two
/// required), and two active schools with their directors.
pub(super) fn fixture() -> Fixture {
    let store = Arc::new(MemoryPortal::default());

    let cycle = store.add_cycle(CycleSeed {
        name: "2025-2026".to_string(),
        starts_on: date(2025, 8, 25),
        ends_on: date(2026, 7, 10),
        active: true,
        enrollment_open: true,
    });

    let grades = vec![
        store.add_grade(1, "Primero de primaria"),
        store.add_grade(2, "Segundo de primaria"),
    ];

    let document_types = vec![
        store.add_document_type(DocumentTypeSeed {
            code: "acta_nac".to_string(),
            name: "Acta de nacimiento".to_string(),
            description: "Certified birth certificate".to_string(),
            required: true,
            active: true,
        }),
        store.add_document_type(DocumentTypeSeed {
            code: "cartilla_vac".to_string(),
            name: "Cartilla de vacunación".to_string(),
            description: "Vaccination booklet".to_string(),
            required: true,
            active: true,
        }),
        store.add_document_type(DocumentTypeSeed {
            code: "foto".to_string(),
            name: "Fotografía tamaño infantil".to_string(),
            description: "Recent photo".to_string(),
            required: false,
            active: true,
        }),
    ];

    let schools = vec![
        store.add_school(SchoolSeed {
            cct: "21DPR0001A".to_string(),
            name: "Primaria Benito Juárez".to_string(),
            address: "Av. Reforma 12".to_string(),
            municipality: "Puebla".to_string(),
            state: "Puebla".to_string(),
            shift: "matutino".to_string(),
            total_seats: 120,
            phone: Some("2221000001".to_string()),
            contact_email: None,
            active: true,
            director_user_id: Some(DIRECTOR_USER),
        }),
        store.add_school(SchoolSeed {
            cct: "21DPR0002B".to_string(),
            name: "Primaria Ignacio Zaragoza".to_string(),
            address: "Calle 5 de Mayo 40".to_string(),
            municipality: "Cholula".to_string(),
            state: "Puebla".to_string(),
            shift: "vespertino".to_string(),
            total_seats: 90,
            phone: None,
            contact_email: None,
            active: true,
            director_user_id: Some(OTHER_DIRECTOR_USER),
        }),
    ];

    let service = Arc::new(EnrollmentService::new(
        store.clone(),
        GroupCapacityPolicy::default(),
    ));

    Fixture {
        service,
        store,
        cycle,
        grades,
        schools,
        document_types,
    }
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn profile(first_name: &str) -> GuardianProfile {
    GuardianProfile {
        first_name: first_name.to_string(),
        paternal_surname: "Pérez".to_string(),
        maternal_surname: "García".to_string(),
        phone: "2225550101".to_string(),
        age: Some(34),
    }
}

pub(super) fn intake(curp: &str) -> StudentIntake {
    StudentIntake {
        first_name: "Juan".to_string(),
        paternal_surname: "Pérez".to_string(),
        maternal_surname: "García".to_string(),
        curp: curp.to_string(),
        birth_date: date(2018, 3, 14),
        sex: Sex::Male,
        address: "Av. Reforma 12".to_string(),
        municipality: "Puebla".to_string(),
        state: "Puebla".to_string(),
        phone: "2225550101".to_string(),
        nationality: "Mexicana".to_string(),
        prior_school: None,
    }
}

pub(super) const FIRST_CURP: &str = "PEGJ180314HPLRRN09";
pub(super) const SECOND_CURP: &str = "LOMA170202MPLRRS08";

/// Register the guardian profile (user 100) and one student.
pub(super) fn registered_student(fixture: &Fixture) -> (Guardian, Student) {
    let guardian_record = fixture
        .service
        .register_guardian(guardian(), profile("María"))
        .expect("guardian registers");
    let student = fixture
        .service
        .register_student(guardian(), intake(FIRST_CURP))
        .expect("student registers");
    (guardian_record, student)
}

/// Record every required document for the student and validate each one.
pub(super) fn validate_required_documents(fixture: &Fixture, by: Principal, student: &Student) {
    for doc_type in fixture.document_types.iter().filter(|t| t.required) {
        let record = fixture
            .service
            .record_document(
                by,
                student.student_id,
                doc_type.document_type_id,
                date(2025, 9, 1),
                None,
                None,
            )
            .expect("document records");
        fixture
            .service
            .review_document(sep_admin(), record.document_id, "validado")
            .expect("document validates");
    }
}

/// Guardian + student with a complete, validated document file.
pub(super) fn eligible_student(fixture: &Fixture) -> Student {
    let (_, student) = registered_student(fixture);
    validate_required_documents(fixture, guardian(), &student);
    student
}

/// An application sitting in `pendiente` at the first school.
pub(super) fn submitted_application(fixture: &Fixture) -> EnrollmentApplication {
    let student = eligible_student(fixture);
    fixture
        .service
        .submit_application(
            guardian(),
            student.student_id,
            fixture.schools[0].school_id,
            fixture.grades[0].grade_id,
        )
        .expect("application submits")
}

/// A second guardian (user 101) with an eligible student of their own.
pub(super) fn other_eligible_student(fixture: &Fixture) -> Student {
    fixture
        .service
        .register_guardian(other_guardian(), profile("Laura"))
        .expect("guardian registers");
    let student = fixture
        .service
        .register_student(other_guardian(), intake(SECOND_CURP))
        .expect("student registers");
    validate_required_documents(fixture, other_guardian(), &student);
    student
}

/// Group in the first school's first grade, created by its director.
pub(super) fn group_with_capacity(fixture: &Fixture, name: &str, capacity: u32) -> ClassGroup {
    fixture
        .service
        .create_group(
            director(),
            fixture.schools[0].school_id,
            fixture.grades[0].grade_id,
            name,
            capacity,
            Some(TEACHER_USER),
        )
        .expect("group creates")
}

pub(super) fn router(fixture: &Fixture) -> axum::Router {
    enrollment_router(fixture.service.clone())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
