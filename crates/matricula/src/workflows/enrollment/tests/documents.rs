use chrono::{Duration, Local};

use super::common::*;
use crate::workflows::enrollment::documents::{checklist, is_complete, summary};
use crate::workflows::enrollment::domain::{
    DocumentId, DocumentRecord, DocumentStatus, DocumentType, DocumentTypeId, StudentId, UserId,
};
use crate::workflows::enrollment::service::EnrollmentError;

fn doc_type(id: i64, name: &str, required: bool, active: bool) -> DocumentType {
    DocumentType {
        document_type_id: DocumentTypeId(id),
        code: name.to_ascii_lowercase().replace(' ', "_"),
        name: name.to_string(),
        description: String::new(),
        required,
        active,
    }
}

fn record(id: i64, type_id: i64, status: DocumentStatus) -> DocumentRecord {
    DocumentRecord {
        document_id: DocumentId(id),
        student_id: StudentId(1),
        document_type_id: DocumentTypeId(type_id),
        status,
        submitted_on: date(2025, 9, 1),
        file_url: None,
        observations: None,
        uploaded_by: UserId(100),
    }
}

#[test]
fn checklist_left_joins_catalog_against_records() {
    let types = vec![
        doc_type(1, "Acta de nacimiento", true, true),
        doc_type(2, "Cartilla de vacunación", true, true),
        doc_type(3, "Fotografía", false, true),
        doc_type(4, "Constancia anterior", false, false),
    ];
    let records = vec![record(10, 2, DocumentStatus::Received)];

    let entries = checklist(&types, &records);

    // Inactive types never appear; required types sort first.
    assert_eq!(entries.len(), 3);
    assert!(entries[0].required && entries[1].required);
    assert_eq!(entries[2].name, "Fotografía");

    let delivered: Vec<bool> = entries.iter().map(|entry| entry.delivered).collect();
    assert_eq!(delivered, vec![false, true, false]);
    assert_eq!(entries[1].status, Some(DocumentStatus::Received));
}

#[test]
fn summary_rounds_percentage_to_two_decimals() {
    let types = vec![
        doc_type(1, "A", true, true),
        doc_type(2, "B", true, true),
        doc_type(3, "C", true, true),
        doc_type(4, "D", true, true),
    ];
    let records = vec![
        record(10, 1, DocumentStatus::Received),
        record(11, 2, DocumentStatus::Validated),
        record(12, 3, DocumentStatus::Pending),
    ];

    let totals = summary(&checklist(&types, &records));
    assert_eq!(totals.delivered, 3);
    assert_eq!(totals.total, 4);
    assert_eq!(totals.pending, 1);
    assert_eq!(totals.percentage, 75.0);

    let thirds = summary(&checklist(&types[..3], &records[..1]));
    assert_eq!(thirds.percentage, 33.33);
}

#[test]
fn summary_of_empty_catalog_is_zero_percent() {
    let totals = summary(&checklist(&[], &[]));
    assert_eq!(totals.total, 0);
    assert_eq!(totals.percentage, 0.0);
}

#[test]
fn delivery_and_completeness_are_different_notions() {
    let types = vec![doc_type(1, "Acta de nacimiento", true, true)];
    let received = vec![record(10, 1, DocumentStatus::Received)];

    // Delivered the moment a record exists...
    assert!(checklist(&types, &received)[0].delivered);
    // ...but not complete until the record is validated.
    assert!(!is_complete(&types, &received));

    let validated = vec![record(10, 1, DocumentStatus::Validated)];
    assert!(is_complete(&types, &validated));
}

#[test]
fn completeness_requirement_counts_only_active_types() {
    // A required-but-inactive type does not raise the bar, yet a validated
    // record against it still counts toward the total.
    let types = vec![
        doc_type(1, "Acta de nacimiento", true, true),
        doc_type(2, "Constancia anterior", true, false),
    ];
    let records = vec![record(10, 1, DocumentStatus::Validated)];
    assert!(is_complete(&types, &records));
}

#[test]
fn recording_a_future_delivery_date_fails() {
    let fixture = fixture();
    let (_, student) = registered_student(&fixture);

    let tomorrow = Local::now().date_naive() + Duration::days(1);
    let error = fixture
        .service
        .record_document(
            guardian(),
            student.student_id,
            fixture.document_types[0].document_type_id,
            tomorrow,
            None,
            None,
        )
        .expect_err("future dates are rejected");
    assert!(matches!(error, EnrollmentError::FutureDeliveryDate));
}

#[test]
fn later_uploads_replace_the_earlier_record() {
    let fixture = fixture();
    let (_, student) = registered_student(&fixture);
    let doc_type_id = fixture.document_types[0].document_type_id;

    let first = fixture
        .service
        .record_document(guardian(), student.student_id, doc_type_id, date(2025, 9, 1), None, None)
        .expect("first upload");
    fixture
        .service
        .review_document(sep_admin(), first.document_id, "validado")
        .expect("first upload validates");

    let second = fixture
        .service
        .record_document(
            guardian(),
            student.student_id,
            doc_type_id,
            date(2025, 9, 5),
            Some("replacement copy".to_string()),
            None,
        )
        .expect("second upload");

    // Same row, refreshed content, validation reset.
    assert_eq!(second.document_id, first.document_id);
    assert_eq!(second.status, DocumentStatus::Received);
    assert_eq!(second.submitted_on, date(2025, 9, 5));

    let entries = fixture
        .service
        .document_checklist(guardian(), student.student_id)
        .expect("checklist reads");
    let matching: Vec<_> = entries
        .iter()
        .filter(|entry| entry.document_type_id == doc_type_id)
        .collect();
    assert_eq!(matching.len(), 1);
}

#[test]
fn guardians_cannot_touch_other_students_documents() {
    let fixture = fixture();
    let (_, student) = registered_student(&fixture);
    fixture
        .service
        .register_guardian(other_guardian(), profile("Laura"))
        .expect("guardian registers");

    let error = fixture
        .service
        .record_document(
            other_guardian(),
            student.student_id,
            fixture.document_types[0].document_type_id,
            date(2025, 9, 1),
            None,
            None,
        )
        .expect_err("not their student");
    assert!(matches!(error, EnrollmentError::NotGuardianOfStudent));

    let error = fixture
        .service
        .document_checklist(other_guardian(), student.student_id)
        .expect_err("checklist is scoped too");
    assert!(matches!(error, EnrollmentError::NotGuardianOfStudent));
}

#[test]
fn only_the_uploader_can_remove_a_document() {
    let fixture = fixture();
    let (_, student) = registered_student(&fixture);
    let record = fixture
        .service
        .record_document(
            guardian(),
            student.student_id,
            fixture.document_types[0].document_type_id,
            date(2025, 9, 1),
            None,
            None,
        )
        .expect("document records");

    fixture
        .service
        .register_guardian(other_guardian(), profile("Laura"))
        .expect("guardian registers");
    let error = fixture
        .service
        .remove_document(other_guardian(), record.document_id)
        .expect_err("someone else's upload");
    assert!(matches!(error, EnrollmentError::NotFound { .. }));

    fixture
        .service
        .remove_document(guardian(), record.document_id)
        .expect("uploader removes");
}

#[test]
fn document_review_accepts_only_terminal_document_states() {
    let fixture = fixture();
    let (_, student) = registered_student(&fixture);
    let record = fixture
        .service
        .record_document(
            guardian(),
            student.student_id,
            fixture.document_types[0].document_type_id,
            date(2025, 9, 1),
            None,
            None,
        )
        .expect("document records");

    let error = fixture
        .service
        .review_document(sep_admin(), record.document_id, "recibido")
        .expect_err("review cannot move back to received");
    assert!(matches!(error, EnrollmentError::InvalidDocumentReview));

    let error = fixture
        .service
        .review_document(sep_admin(), record.document_id, "aprobado")
        .expect_err("unknown token");
    assert!(matches!(error, EnrollmentError::UnknownDocumentStatus(_)));

    let validated = fixture
        .service
        .review_document(sep_admin(), record.document_id, "validado")
        .expect("validation applies");
    assert_eq!(validated.status, DocumentStatus::Validated);
}
