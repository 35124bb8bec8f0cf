// src/extract/sections.rs

use tracing::{debug, trace};

use super::normalize::parse_value;
use super::types::{Section, SectionedTariffRecord};

/// Section headings, tested top to bottom; the first hit wins.
/// Keywords are lowercase and matched as substrings of the lowercased line.
pub static SECTION_KEYWORDS: &[(Section, &[&str])] = &[
    (Section::CargoFijo, &["cargo fijo"]),
    (
        Section::Variables,
        &["variable", "consumo", "tarifa por m3", "m³"],
    ),
    (
        Section::Riles,
        &["riles", "residuos industriales líquidos"],
    ),
    (
        Section::OtrosCobros,
        &["otros cobros", "cobros adicionales"],
    ),
    (Section::Corte, &["corte", "suspensión del servicio"]),
    (
        Section::Reposicion,
        &["reposición", "reconexion", "reconexión"],
    ),
    (
        Section::AportesFinanciamientoReembolsable,
        &["aporte", "financiamiento", "reembolsable"],
    ),
    (
        Section::RevisionProyectos,
        &["revisión de proyectos", "proyectos sanitarios"],
    ),
    (
        Section::VerificacionMedidores,
        &["verificación de medidores", "medidores"],
    ),
];

/// Section whose keyword appears in `line`, if any.
pub fn detect_section(line: &str) -> Option<Section> {
    let lower = line.to_lowercase();
    SECTION_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(section, _)| *section)
}

/// Split on the first `:`, or failing that the first `-`.
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    line.split_once(':').or_else(|| line.split_once('-'))
}

/// Line-mode extraction.
///
/// Walks the lines keeping a current section (starting at
/// `informacion_general`). Heading lines only move the pointer; other lines
/// with a `:` or `-` separator are stored as `key → value` under the current
/// section, later keys overwriting earlier ones.
pub fn extract_from_lines<I, S>(lines: I) -> SectionedTariffRecord
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut record = SectionedTariffRecord::new();
    let mut current = Section::InformacionGeneral;

    for line in lines {
        let line = line.as_ref();

        if let Some(section) = detect_section(line) {
            trace!(section = section.as_str(), line, "section heading");
            current = section;
            continue;
        }

        let Some((key, value)) = split_key_value(line) else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        record.insert(current, key, parse_value(value));
    }

    debug!(keys = record.len(), "line-mode extraction done");
    record
}
