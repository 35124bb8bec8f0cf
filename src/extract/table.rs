// src/extract/table.rs

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::normalize::clean_amount;
use super::types::{Bracket, Row, Structure, TariffRecord};

/// Only this many leading rows are inspected for layout hints.
const STRUCTURE_SCAN_ROWS: usize = 50;

pub(crate) const VOLUME_TOKENS: &[&str] = &["m3", "m³"];
pub(crate) const CURRENCY_MARKER: &str = "$";

/// Wrap plain text lines as single-cell rows.
pub fn rows_from_lines<I, S>(lines: I) -> Vec<Row>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|l| vec![l.as_ref().to_string()])
        .collect()
}

/// Non-empty cells joined by a single space.
fn row_text(row: &[String]) -> String {
    row.iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_volume_unit(text: &str) -> bool {
    VOLUME_TOKENS.iter().any(|t| text.contains(t))
}

fn is_bracket_header(text: &str) -> bool {
    text.contains("Tramo") && text.contains("Valor")
}

fn is_block_line(text: &str) -> bool {
    has_volume_unit(text) && text.contains(CURRENCY_MARKER)
}

/// Everything but the last token is the bracket, the last token its price.
fn bracket_from(text: &str) -> Option<Bracket> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    let (valor, tramo) = parts.split_last()?;
    if tramo.is_empty() {
        return None;
    }
    Some(Bracket {
        tramo: tramo.join(" "),
        valor: valor.to_string(),
    })
}

/// Look for a `Tramo`/`Valor` header or an inline `m3 … $` line near the top.
pub fn detect_structure(rows: &[Row]) -> Structure {
    for row in rows.iter().take(STRUCTURE_SCAN_ROWS) {
        let text = row_text(row);
        if is_bracket_header(&text) {
            return Structure::Tabular;
        }
        if is_block_line(&text) {
            return Structure::Block;
        }
    }
    Structure::Unknown
}

/// Bracket rows for the detected layout; `Unknown` yields nothing.
pub fn parse_brackets(rows: &[Row], structure: Structure) -> Vec<Bracket> {
    match structure {
        Structure::Tabular => {
            let mut capture = false;
            let mut out = Vec::new();
            for row in rows {
                let text = row_text(row);
                if is_bracket_header(&text) {
                    capture = true;
                    continue;
                }
                if capture && text.contains(CURRENCY_MARKER) {
                    out.extend(bracket_from(&text));
                }
            }
            out
        }
        Structure::Block => rows
            .iter()
            .map(|r| row_text(r))
            .filter(|t| is_block_line(t))
            .filter_map(|t| bracket_from(&t))
            .collect(),
        Structure::Unknown => Vec::new(),
    }
}

/// Fixed charge: the token right after `fijo` in any row mentioning "cargo fijo".
/// The last accepted value in the document wins.
pub fn find_cargo_fijo(rows: &[Row]) -> Option<String> {
    let mut found = None;

    for row in rows {
        if !row_text(row).to_lowercase().contains("cargo fijo") {
            continue;
        }
        // the phrase may be split over cells; then scan the whole row
        let start = row
            .iter()
            .position(|c| c.to_lowercase().contains("cargo fijo"))
            .unwrap_or(0);
        let tokens: Vec<&str> = row[start..]
            .iter()
            .flat_map(|c| c.split_whitespace())
            .collect();

        for (i, token) in tokens.iter().enumerate() {
            if !token.to_lowercase().contains("fijo") {
                continue;
            }
            if let Some(value) = tokens.get(i + 1).and_then(|next| clean_amount(next)) {
                trace!(value = %value, "cargo fijo candidate");
                found = Some(value);
            }
        }
    }

    found
}

/// Variable rates from rows mentioning "variables".
///
/// A cell like `Consumo m3 $450` yields its own name and value. A cell that
/// holds only a name waits for the next cell holding only a value. The label
/// word itself is never a name.
pub fn find_variables(rows: &[Row]) -> IndexMap<String, String> {
    let mut out = IndexMap::new();

    for row in rows {
        if !row_text(row).to_lowercase().contains("variables") {
            continue;
        }

        let mut pending_name: Option<String> = None;
        for cell in row {
            let mut tokens: Vec<&str> = cell.split_whitespace().collect();
            let is_label = cell.to_lowercase().contains("variables");
            if is_label {
                // only what follows the label word can be a rate
                let after = tokens
                    .iter()
                    .position(|t| t.to_lowercase().contains("variables"))
                    .map_or(0, |i| i + 1);
                tokens.drain(..after);
            }
            let Some((last, head)) = tokens.split_last() else {
                continue;
            };
            let value = clean_amount(last);

            match (value, head.is_empty()) {
                (Some(value), false) => {
                    out.insert(head.join(" "), value);
                    pending_name = None;
                }
                _ if is_label => continue,
                (Some(value), true) => {
                    if let Some(name) = pending_name.take() {
                        out.insert(name, value);
                    }
                }
                (None, _) => {
                    pending_name = Some(tokens.join(" "));
                }
            }
        }
    }

    out
}

/// Table-mode extraction over cell grids (or lines wrapped by [`rows_from_lines`]).
///
/// Brackets depend on the detected layout; the fixed charge and variable rates
/// are searched for regardless of it.
pub fn extract_from_table(rows: &[Row], source_pdf: &str) -> TariffRecord {
    let structure = detect_structure(rows);
    let tramos = parse_brackets(rows, structure);
    let cargo_fijo = find_cargo_fijo(rows);
    let variables = find_variables(rows);

    debug!(
        ?structure,
        tramos = tramos.len(),
        variables = variables.len(),
        cargo_fijo = cargo_fijo.is_some(),
        "table-mode extraction done"
    );

    TariffRecord {
        cargo_fijo,
        variables,
        tramos,
        source_pdf: source_pdf.to_string(),
    }
}
