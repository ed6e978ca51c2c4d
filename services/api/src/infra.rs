use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use matricula::workflows::enrollment::{
    AcademicCycle, CycleSeed, DocumentType, DocumentTypeSeed, Grade, MemoryPortal, School,
    SchoolSeed, UserId,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// What the demo catalog seeds resolve to, so the demo and the server can
/// refer to concrete records.
pub(crate) struct SeededCatalog {
    pub(crate) cycle: AcademicCycle,
    pub(crate) grades: Vec<Grade>,
    pub(crate) schools: Vec<School>,
    pub(crate) document_types: Vec<DocumentType>,
}

pub(crate) const DIRECTOR_USER: UserId = UserId(10);
pub(crate) const OTHER_DIRECTOR_USER: UserId = UserId(11);

/// Seed the in-memory portal with the catalog a fresh deployment needs:
/// an open cycle, the six primary grades, the standard document set, and
/// two schools with assigned directors.
pub(crate) fn seed_catalog(store: &MemoryPortal) -> SeededCatalog {
    let cycle = store.add_cycle(CycleSeed {
        name: "2025-2026".to_string(),
        starts_on: date(2025, 8, 25),
        ends_on: date(2026, 7, 10),
        active: true,
        enrollment_open: true,
    });

    let grade_names = [
        "Primero de primaria",
        "Segundo de primaria",
        "Tercero de primaria",
        "Cuarto de primaria",
        "Quinto de primaria",
        "Sexto de primaria",
    ];
    let grades = grade_names
        .iter()
        .enumerate()
        .map(|(index, name)| store.add_grade(index as i16 + 1, name))
        .collect();

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
            code: "ine_tutor".to_string(),
            name: "Identificación del tutor".to_string(),
            description: "Guardian identification".to_string(),
            required: true,
            active: true,
        }),
        store.add_document_type(DocumentTypeSeed {
            code: "comprobante_dom".to_string(),
            name: "Comprobante de domicilio".to_string(),
            description: "Recent proof of address".to_string(),
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
            contact_email: Some("direccion@benitojuarez.edu.mx".to_string()),
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

    SeededCatalog {
        cycle,
        grades,
        schools,
        document_types,
    }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid seed date")
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
