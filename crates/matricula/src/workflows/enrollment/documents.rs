//! Document completeness tracking.
//!
//! Two notions of progress coexist on purpose: the checklist counts a
//! document as *delivered* as soon as any record exists, while eligibility
//! only counts documents whose status reached `validado`. A guardian sees
//! their upload immediately; the enrollment gate waits for review.

use super::domain::{ChecklistEntry, DocumentRecord, DocumentStatus, DocumentSummary, DocumentType};

/// Left-join of the active document-type catalog against a student's
/// records, required types first, then by name.
pub fn checklist(types: &[DocumentType], records: &[DocumentRecord]) -> Vec<ChecklistEntry> {
    let mut entries: Vec<ChecklistEntry> = types
        .iter()
        .filter(|doc_type| doc_type.active)
        .map(|doc_type| {
            let record = records
                .iter()
                .find(|record| record.document_type_id == doc_type.document_type_id);
            ChecklistEntry {
                document_type_id: doc_type.document_type_id,
                code: doc_type.code.clone(),
                name: doc_type.name.clone(),
                required: doc_type.required,
                delivered: record.is_some(),
                status: record.map(|record| record.status),
                submitted_on: record.map(|record| record.submitted_on),
                observations: record.and_then(|record| record.observations.clone()),
            }
        })
        .collect();

    entries.sort_by(|a, b| b.required.cmp(&a.required).then_with(|| a.name.cmp(&b.name)));
    entries
}

/// Delivered-vs-total counts over a checklist, percentage rounded to two
/// decimals. An empty catalog yields 0%, not a division fault.
pub fn summary(entries: &[ChecklistEntry]) -> DocumentSummary {
    let delivered = entries.iter().filter(|entry| entry.delivered).count();
    let total = entries.len();
    let percentage = if total == 0 {
        0.0
    } else {
        (delivered as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
    };

    DocumentSummary {
        delivered,
        total,
        pending: total - delivered,
        percentage,
    }
}

/// Whether every required document has been validated. The validated side
/// counts records for any required type; the requirement side counts only
/// types that are both required and active.
pub fn is_complete(types: &[DocumentType], records: &[DocumentRecord]) -> bool {
    let required = types
        .iter()
        .filter(|doc_type| doc_type.required && doc_type.active)
        .count();

    let validated = records
        .iter()
        .filter(|record| {
            record.status == DocumentStatus::Validated
                && types.iter().any(|doc_type| {
                    doc_type.document_type_id == record.document_type_id && doc_type.required
                })
        })
        .count();

    validated >= required
}
