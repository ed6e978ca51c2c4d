use std::sync::Arc;

use super::common::*;
use crate::workflows::enrollment::capacity::GroupCapacityPolicy;
use crate::workflows::enrollment::domain::{ApplicationId, ApplicationStatus};
use crate::workflows::enrollment::memory::MemoryPortal;
use crate::workflows::enrollment::repository::{
    EnrollmentRepository, GroupRepository, NewApplication, StoreError,
};
use crate::workflows::enrollment::service::{EnrollmentError, EnrollmentService};

#[test]
fn submission_requires_an_active_cycle() {
    let store = Arc::new(MemoryPortal::default());
    let service = EnrollmentService::new(store, GroupCapacityPolicy::default());

    let error = service
        .register_guardian(guardian(), profile("María"))
        .and_then(|_| service.register_student(guardian(), intake(FIRST_CURP)))
        .and_then(|student| {
            service.submit_application(
                guardian(),
                student.student_id,
                crate::workflows::enrollment::domain::SchoolId(999),
                crate::workflows::enrollment::domain::GradeId(999),
            )
        })
        .expect_err("no cycle is seeded");
    assert!(matches!(error, EnrollmentError::NoActiveCycle));
}

#[test]
fn submission_fails_while_the_window_is_closed() {
    let fixture = fixture();
    let student = eligible_student(&fixture);
    fixture
        .store
        .set_enrollment_open(fixture.cycle.cycle_id, false);

    let error = fixture
        .service
        .submit_application(
            guardian(),
            student.student_id,
            fixture.schools[0].school_id,
            fixture.grades[0].grade_id,
        )
        .expect_err("window is closed");
    assert!(matches!(error, EnrollmentError::EnrollmentClosed { .. }));

    // Nothing was inserted.
    let rows = fixture
        .service
        .applications_overview(sep_admin(), None, None)
        .expect("overview reads");
    assert!(rows.is_empty());
}

#[test]
fn submission_is_gated_on_validated_documents() {
    let fixture = fixture();
    let (_, student) = registered_student(&fixture);

    let error = fixture
        .service
        .submit_application(
            guardian(),
            student.student_id,
            fixture.schools[0].school_id,
            fixture.grades[0].grade_id,
        )
        .expect_err("documents are not validated yet");
    match error {
        EnrollmentError::NotEligible { reason } => {
            assert!(reason.contains("documents"), "unexpected reason: {reason}")
        }
        other => panic!("expected eligibility failure, got {other:?}"),
    }
}

#[test]
fn a_second_application_for_the_same_cycle_is_rejected() {
    let fixture = fixture();
    let application = submitted_application(&fixture);

    // The eligibility gate reports the duplicate before the insert runs.
    let error = fixture
        .service
        .submit_application(
            guardian(),
            application.student_id,
            fixture.schools[1].school_id,
            fixture.grades[0].grade_id,
        )
        .expect_err("one application per cycle");
    assert!(matches!(error, EnrollmentError::NotEligible { .. }));

    // The store uniqueness backstop holds even if the gate is bypassed.
    let duplicate = fixture.store.insert_application(
        NewApplication {
            student_id: application.student_id,
            school_id: fixture.schools[1].school_id,
            cycle_id: fixture.cycle.cycle_id,
            grade_id: fixture.grades[0].grade_id,
            requested_by: GUARDIAN_USER,
        },
        application.submitted_at,
    );
    assert!(matches!(duplicate, Err(StoreError::Duplicate)));
}

#[test]
fn rejection_requires_a_reason() {
    let fixture = fixture();
    let application = submitted_application(&fixture);

    for reason in [None, Some("   ".to_string())] {
        let error = fixture
            .service
            .review_application(
                director(),
                application.application_id,
                "rechazado",
                reason,
                None,
            )
            .expect_err("a rejection without a reason");
        assert!(matches!(error, EnrollmentError::MissingRejectionReason));
    }
}

#[test]
fn acceptance_requires_a_group() {
    let fixture = fixture();
    let application = submitted_application(&fixture);

    let error = fixture
        .service
        .review_application(
            director(),
            application.application_id,
            "aceptado",
            None,
            None,
        )
        .expect_err("acceptance without a group");
    assert!(matches!(error, EnrollmentError::MissingGroup));
}

#[test]
fn unknown_status_tokens_are_rejected_outright() {
    let fixture = fixture();
    let application = submitted_application(&fixture);

    let error = fixture
        .service
        .review_application(
            director(),
            application.application_id,
            "aprobado",
            None,
            None,
        )
        .expect_err("not part of the closed status set");
    assert!(matches!(error, EnrollmentError::UnknownStatus(_)));
}

#[test]
fn acceptance_takes_a_seat_atomically() {
    let fixture = fixture();
    let application = submitted_application(&fixture);
    let group = group_with_capacity(&fixture, "1-A", 2);

    let accepted = fixture
        .service
        .review_application(
            director(),
            application.application_id,
            "aceptado",
            None,
            Some(group.group_id),
        )
        .expect("acceptance applies");

    assert_eq!(accepted.status, ApplicationStatus::Accepted);
    assert_eq!(accepted.group_id, Some(group.group_id));
    assert_eq!(accepted.reviewed_by, Some(DIRECTOR_USER));

    let stored = fixture
        .store
        .fetch_group(group.group_id)
        .expect("group reads")
        .expect("group exists");
    assert_eq!(stored.enrolled, 1);
}

#[test]
fn acceptance_into_a_full_group_changes_nothing() {
    let fixture = fixture();
    let application = submitted_application(&fixture);
    let group = group_with_capacity(&fixture, "1-A", 1);

    fixture
        .service
        .review_application(
            director(),
            application.application_id,
            "aceptado",
            None,
            Some(group.group_id),
        )
        .expect("first seat");

    let second_student = other_eligible_student(&fixture);
    let second = fixture
        .service
        .submit_application(
            other_guardian(),
            second_student.student_id,
            fixture.schools[0].school_id,
            fixture.grades[0].grade_id,
        )
        .expect("second application submits");

    let error = fixture
        .service
        .review_application(
            director(),
            second.application_id,
            "aceptado",
            None,
            Some(group.group_id),
        )
        .expect_err("no seats left");
    assert!(matches!(error, EnrollmentError::GroupFull));

    // Neither the ledger nor the application moved.
    let stored = fixture
        .store
        .fetch_group(group.group_id)
        .expect("group reads")
        .expect("group exists");
    assert_eq!(stored.enrolled, 1);

    let untouched = fixture
        .store
        .fetch_application(second.application_id)
        .expect("application reads")
        .expect("application exists");
    assert_eq!(untouched.status, ApplicationStatus::Pending);
    assert_eq!(untouched.group_id, None);
}

#[test]
fn the_group_must_match_school_cycle_and_grade() {
    let fixture = fixture();
    let application = submitted_application(&fixture);
    let mismatched = fixture
        .service
        .create_group(
            director(),
            fixture.schools[0].school_id,
            fixture.grades[1].grade_id,
            "2-A",
            20,
            None,
        )
        .expect("group creates");

    let error = fixture
        .service
        .review_application(
            director(),
            application.application_id,
            "aceptado",
            None,
            Some(mismatched.group_id),
        )
        .expect_err("wrong grade");
    assert!(matches!(error, EnrollmentError::GroupMismatch));
}

#[test]
fn terminal_statuses_are_locked() {
    let fixture = fixture();
    let application = submitted_application(&fixture);
    let group = group_with_capacity(&fixture, "1-A", 2);

    fixture
        .service
        .review_application(
            director(),
            application.application_id,
            "aceptado",
            None,
            Some(group.group_id),
        )
        .expect("acceptance applies");

    let error = fixture
        .service
        .review_application(
            director(),
            application.application_id,
            "pendiente",
            None,
            None,
        )
        .expect_err("accepted applications stay accepted");
    assert!(matches!(
        error,
        EnrollmentError::InvalidTransition {
            from: ApplicationStatus::Accepted,
            to: ApplicationStatus::Pending,
        }
    ));
}

#[test]
fn reviewing_a_missing_application_is_not_found() {
    let fixture = fixture();
    let error = fixture
        .service
        .review_application(director(), ApplicationId(9999), "en_revision", None, None)
        .expect_err("nothing to review");
    assert!(matches!(error, EnrollmentError::NotFound { .. }));
}

#[test]
fn directors_only_review_their_own_school() {
    let fixture = fixture();
    let application = submitted_application(&fixture);

    let error = fixture
        .service
        .review_application(
            other_director(),
            application.application_id,
            "en_revision",
            None,
            None,
        )
        .expect_err("wrong school");
    assert!(matches!(error, EnrollmentError::OutOfSchoolScope));

    fixture
        .service
        .review_application(
            director(),
            application.application_id,
            "en_revision",
            None,
            None,
        )
        .expect("own school reviews fine");
}

#[test]
fn pending_queue_is_scoped_and_oldest_first() {
    let fixture = fixture();
    let first = submitted_application(&fixture);

    let second_student = other_eligible_student(&fixture);
    let second = fixture
        .service
        .submit_application(
            other_guardian(),
            second_student.student_id,
            fixture.schools[1].school_id,
            fixture.grades[0].grade_id,
        )
        .expect("second application submits");

    let all = fixture
        .service
        .pending_applications(sep_admin(), None)
        .expect("admin sees everything");
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].application_id, first.application_id);
    assert_eq!(all[1].application_id, second.application_id);

    let scoped = fixture
        .service
        .pending_applications(director(), None)
        .expect("director queue reads");
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].school_id, fixture.schools[0].school_id);

    // A director asking for another school still gets their own queue.
    let forced = fixture
        .service
        .pending_applications(director(), Some(fixture.schools[1].school_id))
        .expect("director queue reads");
    assert_eq!(forced.len(), 1);
    assert_eq!(forced[0].school_id, fixture.schools[0].school_id);
}

#[test]
fn statistics_count_per_status_for_the_active_cycle() {
    let fixture = fixture();
    let application = submitted_application(&fixture);
    let group = group_with_capacity(&fixture, "1-A", 2);
    fixture
        .service
        .review_application(
            director(),
            application.application_id,
            "aceptado",
            None,
            Some(group.group_id),
        )
        .expect("acceptance applies");

    let second_student = other_eligible_student(&fixture);
    fixture
        .service
        .submit_application(
            other_guardian(),
            second_student.student_id,
            fixture.schools[1].school_id,
            fixture.grades[0].grade_id,
        )
        .expect("second application submits");

    let overall = fixture
        .service
        .statistics(sep_admin(), None)
        .expect("statistics read");
    assert_eq!(overall.accepted, 1);
    assert_eq!(overall.pending, 1);
    assert_eq!(overall.total, 2);

    let scoped = fixture
        .service
        .statistics(sep_admin(), Some(fixture.schools[0].school_id))
        .expect("statistics read");
    assert_eq!(scoped.total, 1);
    assert_eq!(scoped.accepted, 1);
}

#[test]
fn application_detail_lists_assignable_groups_only_while_open() {
    let fixture = fixture();
    let application = submitted_application(&fixture);
    let group = group_with_capacity(&fixture, "1-A", 2);

    let open_detail = fixture
        .service
        .application_detail(director(), application.application_id)
        .expect("detail reads");
    assert_eq!(open_detail.assignable_groups.len(), 1);

    fixture
        .service
        .review_application(
            director(),
            application.application_id,
            "aceptado",
            None,
            Some(group.group_id),
        )
        .expect("acceptance applies");

    let closed_detail = fixture
        .service
        .application_detail(director(), application.application_id)
        .expect("detail reads");
    assert!(closed_detail.assignable_groups.is_empty());
    assert_eq!(closed_detail.application.group_name, Some("1-A".to_string()));
}

#[test]
fn student_registration_validates_the_curp() {
    let fixture = fixture();
    fixture
        .service
        .register_guardian(guardian(), profile("María"))
        .expect("guardian registers");

    let error = fixture
        .service
        .register_student(guardian(), intake("SHORT"))
        .expect_err("curp must be 18 chars");
    assert!(matches!(error, EnrollmentError::InvalidCurp));

    fixture
        .service
        .register_student(guardian(), intake(FIRST_CURP))
        .expect("student registers");
    let error = fixture
        .service
        .register_student(guardian(), intake(&FIRST_CURP.to_ascii_lowercase()))
        .expect_err("curp is unique after normalization");
    assert!(matches!(error, EnrollmentError::DuplicateCurp));
}

#[test]
fn operations_require_a_guardian_profile() {
    let fixture = fixture();
    let error = fixture
        .service
        .register_student(guardian(), intake(FIRST_CURP))
        .expect_err("no profile yet");
    assert!(matches!(error, EnrollmentError::GuardianProfileMissing));
}

#[test]
fn guardians_see_their_own_applications_newest_first() {
    let fixture = fixture();
    let application = submitted_application(&fixture);

    let mine = fixture
        .service
        .my_applications(guardian())
        .expect("own applications read");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].application_id, application.application_id);

    other_eligible_student(&fixture);
    let theirs = fixture
        .service
        .my_applications(other_guardian())
        .expect("own applications read");
    assert!(theirs.is_empty());
}
