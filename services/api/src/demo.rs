use chrono::NaiveDate;
use clap::Args;
use std::sync::Arc;

use crate::infra::{seed_catalog, DIRECTOR_USER};
use matricula::error::AppError;
use matricula::workflows::enrollment::{
    EnrollmentService, GroupCapacityPolicy, GuardianProfile, MemoryPortal, Principal, Role, Sex,
    StudentIntake, UserId,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Seat capacity for the demo class group
    #[arg(long, default_value_t = 2)]
    pub(crate) group_capacity: u32,
    /// Delivery date recorded for the demo documents (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date, default_value = "2025-09-01")]
    pub(crate) delivery_date: NaiveDate,
}

/// Walk one student through the whole lifecycle on a seeded in-memory
/// portal: registration, document validation, submission, review, and
/// acceptance into a group.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(MemoryPortal::default());
    let catalog = seed_catalog(&store);
    let service = EnrollmentService::new(store, GroupCapacityPolicy::default());

    let guardian = Principal {
        user_id: UserId(100),
        role: Role::Guardian,
    };
    let director = Principal {
        user_id: DIRECTOR_USER,
        role: Role::Director,
    };
    let admin = Principal {
        user_id: UserId(1),
        role: Role::SepAdmin,
    };

    let school = &catalog.schools[0];
    let grade = &catalog.grades[0];

    println!("== Enrollment portal demo ==");
    println!("cycle {} at {} ({})", catalog.cycle.name, school.name, school.cct);

    let guardian_record = service
        .register_guardian(
            guardian,
            GuardianProfile {
                first_name: "María".to_string(),
                paternal_surname: "López".to_string(),
                maternal_surname: "Hernández".to_string(),
                phone: "2225550101".to_string(),
                age: Some(34),
            },
        )?;
    let student = service
        .register_student(
            guardian,
            StudentIntake {
                first_name: "Juan".to_string(),
                paternal_surname: "López".to_string(),
                maternal_surname: "Hernández".to_string(),
                curp: "LOHJ180314HPLPRN07".to_string(),
                birth_date: NaiveDate::from_ymd_opt(2018, 3, 14).expect("valid demo date"),
                sex: Sex::Male,
                address: "Av. Reforma 12".to_string(),
                municipality: "Puebla".to_string(),
                state: "Puebla".to_string(),
                phone: "2225550101".to_string(),
                nationality: "Mexicana".to_string(),
                prior_school: None,
            },
        )?;
    println!(
        "registered {} (CURP {}) under guardian {}",
        student.full_name(),
        student.curp,
        guardian_record.full_name()
    );

    println!("\n-- documents --");
    for doc_type in catalog.document_types.iter().filter(|t| t.required) {
        let record = service
            .record_document(
                guardian,
                student.student_id,
                doc_type.document_type_id,
                args.delivery_date,
                None,
                None,
            )?;
        service
            .review_document(admin, record.document_id, "validado")?;
        println!("  {} validated", doc_type.name);
    }
    let summary = service
        .document_summary(guardian, student.student_id)?;
    println!(
        "  checklist: {}/{} delivered ({}%)",
        summary.delivered, summary.total, summary.percentage
    );

    println!("\n-- application --");
    let application = service
        .submit_application(guardian, student.student_id, school.school_id, grade.grade_id)?;
    println!(
        "  submitted #{} with status `{}`",
        application.application_id.0, application.status
    );

    service
        .review_application(
            director,
            application.application_id,
            "en_revision",
            None,
            None,
        )?;
    println!("  director moved it to `en_revision`");

    let group = service
        .create_group(
            director,
            school.school_id,
            grade.grade_id,
            "1-A",
            args.group_capacity,
            None,
        )?;
    println!(
        "  created group {} with {} seats",
        group.name, group.capacity
    );

    let accepted = service
        .review_application(
            director,
            application.application_id,
            "aceptado",
            None,
            Some(group.group_id),
        )?;
    println!(
        "  accepted into group {} (status `{}`)",
        group.name, accepted.status
    );

    println!("\n-- school snapshot --");
    let statistics = service
        .statistics(director, None)?;
    println!(
        "  pending {} | in review {} | accepted {} | rejected {} | total {}",
        statistics.pending,
        statistics.in_review,
        statistics.accepted,
        statistics.rejected,
        statistics.total
    );
    let roster = service
        .group_roster(director, group.group_id)?;
    for entry in roster {
        println!(
            "  {} (guardian: {})",
            entry.full_name,
            entry.guardian_name.unwrap_or_else(|| "unknown".to_string())
        );
    }

    Ok(())
}
