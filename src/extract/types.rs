// src/extract/types.rs

use indexmap::IndexMap;
use serde::{de::Deserializer, Deserialize, Serialize, Serializer};

/// A table row: ordered cell values as recovered from the document.
pub type Row = Vec<String>;

/// Named sections of a tariff decree, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    InformacionGeneral,
    CargoFijo,
    Variables,
    Riles,
    OtrosCobros,
    Corte,
    Reposicion,
    AportesFinanciamientoReembolsable,
    RevisionProyectos,
    VerificacionMedidores,
}

impl Section {
    pub const ALL: [Section; 10] = [
        Section::InformacionGeneral,
        Section::CargoFijo,
        Section::Variables,
        Section::Riles,
        Section::OtrosCobros,
        Section::Corte,
        Section::Reposicion,
        Section::AportesFinanciamientoReembolsable,
        Section::RevisionProyectos,
        Section::VerificacionMedidores,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::InformacionGeneral => "informacion_general",
            Section::CargoFijo => "cargo_fijo",
            Section::Variables => "variables",
            Section::Riles => "riles",
            Section::OtrosCobros => "otros_cobros",
            Section::Corte => "corte",
            Section::Reposicion => "reposicion",
            Section::AportesFinanciamientoReembolsable => "aportes_financiamiento_reembolsable",
            Section::RevisionProyectos => "revision_proyectos",
            Section::VerificacionMedidores => "verificacion_medidores",
        }
    }
}

/// A value pulled from a `key: value` line.
///
/// Serialized untagged: dates and text as JSON strings, numbers as JSON numbers.
/// On the way back in, strings shaped like `DD/MM/YYYY` become `Date`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    /// Canonical `DD/MM/YYYY`.
    Date(String),
    Number(f64),
    Text(String),
}

impl ParsedValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParsedValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl Serialize for ParsedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParsedValue::Date(s) | ParsedValue::Text(s) => serializer.serialize_str(s),
            ParsedValue::Number(n) => serializer.serialize_f64(*n),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireValue {
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for ParsedValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match WireValue::deserialize(deserializer)? {
            WireValue::Number(n) => ParsedValue::Number(n),
            WireValue::Text(s) if is_canonical_date(&s) => ParsedValue::Date(s),
            WireValue::Text(s) => ParsedValue::Text(s),
        })
    }
}

fn is_canonical_date(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[2] == b'/'
        && b[5] == b'/'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 2 || i == 5 || c.is_ascii_digit())
}

/// Line-mode output: every section, in fixed order, each holding its
/// `key → value` pairs in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionedTariffRecord {
    sections: IndexMap<Section, IndexMap<String, ParsedValue>>,
}

impl Default for SectionedTariffRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionedTariffRecord {
    pub fn new() -> Self {
        let sections = Section::ALL
            .iter()
            .map(|s| (*s, IndexMap::new()))
            .collect();
        Self { sections }
    }

    /// Store `key → value` under `section`; an existing key is overwritten in place.
    pub fn insert(&mut self, section: Section, key: impl Into<String>, value: ParsedValue) {
        self.sections
            .entry(section)
            .or_default()
            .insert(key.into(), value);
    }

    pub fn section(&self, section: Section) -> Option<&IndexMap<String, ParsedValue>> {
        self.sections.get(&section)
    }

    pub fn get(&self, section: Section, key: &str) -> Option<&ParsedValue> {
        self.sections.get(&section).and_then(|m| m.get(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Section, &IndexMap<String, ParsedValue>)> {
        self.sections.iter().map(|(s, m)| (*s, m))
    }

    /// Total number of stored keys across all sections.
    pub fn len(&self) -> usize {
        self.sections.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One pricing bracket row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub tramo: String,
    pub valor: String,
}

/// Table-mode output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TariffRecord {
    pub cargo_fijo: Option<String>,
    pub variables: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tramos: Vec<Bracket>,
    pub source_pdf: String,
}

impl TariffRecord {
    /// True when nothing at all was extracted.
    pub fn is_empty(&self) -> bool {
        self.cargo_fijo.is_none() && self.variables.is_empty() && self.tramos.is_empty()
    }
}

/// Layout hint detected from the first rows of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    /// A `Tramo | Valor` header followed by bracket rows.
    Tabular,
    /// Free-standing lines pairing a volume unit with a price.
    Block,
    Unknown,
}

/// The amount chosen by the scoring heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCandidate {
    /// Normalized amount, e.g. `"1.250"`.
    pub value: String,
    /// Token as it appeared in the document.
    pub raw: String,
    /// Zero-based index of the source line.
    pub line: usize,
    pub score: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_lists_every_section_in_order() {
        let rec = SectionedTariffRecord::new();
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.starts_with(r#"{"informacion_general":{},"cargo_fijo":{}"#));
        assert!(json.ends_with(r#""verificacion_medidores":{}}"#));
        assert!(rec.is_empty());
    }

    #[test]
    fn parsed_values_serialize_untagged_and_round_trip() {
        let mut rec = SectionedTariffRecord::new();
        rec.insert(Section::CargoFijo, "Cargo", ParsedValue::Number(1.25));
        rec.insert(
            Section::InformacionGeneral,
            "Vigencia",
            ParsedValue::Date("01/07/2024".into()),
        );
        rec.insert(
            Section::InformacionGeneral,
            "Empresa",
            ParsedValue::Text("Aguas del Altiplano".into()),
        );

        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["cargo_fijo"]["Cargo"], serde_json::json!(1.25));
        assert_eq!(json["informacion_general"]["Vigencia"], "01/07/2024");

        let back: SectionedTariffRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn empty_tramos_are_omitted() {
        let rec = TariffRecord {
            source_pdf: "https://example.org/a.pdf".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("tramos").is_none());
        assert_eq!(json["cargo_fijo"], serde_json::Value::Null);
        assert!(rec.is_empty());
    }
}
