// src/pdf.rs

use once_cell::sync::Lazy;
use regex::Regex;
use std::{fs, path::Path};
use tracing::{debug, instrument};

use crate::error::DocumentError;
use crate::extract::Row;

/// Runs of 2+ spaces or any tab separate table cells in extracted text.
static CELL_GAP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" {2,}|\t+").expect("cell gap pattern should compile"));

/// Text recovered from one document, as lines and as cell rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentText {
    pub lines: Vec<String>,
    /// One row per line; lines without wide gaps become single-cell rows.
    pub rows: Vec<Row>,
}

impl DocumentText {
    pub fn from_text(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut rows = Vec::new();

        for raw in text.lines() {
            let cleaned = raw.replace(['\u{0}', '\u{FEFF}'], "");
            let line = cleaned.trim();
            if line.is_empty() {
                continue;
            }
            let cells: Row = CELL_GAP_RE
                .split(line)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            rows.push(cells);
            lines.push(collapse_spaces(line));
        }

        Self { lines, rows }
    }

    /// True when at least one row was split into several cells.
    pub fn has_table_structure(&self) -> bool {
        self.rows.iter().any(|r| r.len() > 1)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn collapse_spaces(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode PDF bytes into text; `label` names the document in errors.
pub fn document_from_bytes(bytes: &[u8], label: &str) -> Result<DocumentText, DocumentError> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| DocumentError::Decode {
        label: label.to_string(),
        reason: e.to_string(),
    })?;
    Ok(DocumentText::from_text(&text))
}

/// Read and decode a PDF from disk.
#[instrument(level = "debug", fields(path = %path.display()))]
pub fn read_document(path: &Path) -> Result<DocumentText, DocumentError> {
    let bytes = fs::read(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = document_from_bytes(&bytes, &path.display().to_string())?;
    debug!(
        lines = doc.lines.len(),
        table = doc.has_table_structure(),
        "decoded document"
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn text_is_split_into_lines_and_cells() {
        let doc = DocumentText::from_text(
            "\u{FEFF}Tarifa  vigente\n\n   Cargo fijo    $1.250\nConsumo\tm3\t$450\n   \n",
        );
        assert_eq!(
            doc.lines,
            vec!["Tarifa vigente", "Cargo fijo $1.250", "Consumo m3 $450"]
        );
        assert_eq!(doc.rows[0], vec!["Tarifa", "vigente"]);
        assert_eq!(doc.rows[1], vec!["Cargo fijo", "$1.250"]);
        assert_eq!(doc.rows[2], vec!["Consumo", "m3", "$450"]);
        assert!(doc.has_table_structure());
    }

    #[test]
    fn single_spaced_text_has_no_table() {
        let doc = DocumentText::from_text("Empresa: Aguas Andinas\nVigencia: 2024");
        assert!(!doc.has_table_structure());
        assert_eq!(doc.rows.len(), 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let tmp = tempdir().unwrap();
        let err = read_document(&tmp.path().join("no_existe.pdf")).unwrap_err();
        assert!(err.is_io());
        assert!(err.to_string().contains("no_existe.pdf"));
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("roto.pdf");
        fs::write(&path, b"esto no es un pdf").unwrap();
        let err = read_document(&path).unwrap_err();
        assert!(!err.is_io());
        assert!(matches!(err, DocumentError::Decode { .. }));
    }
}
