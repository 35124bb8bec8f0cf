// src/extract/mod.rs

//! Tariff extraction from already-decoded document text.
//!
//! Two entry points: [`extract_from_lines`] for free text split into lines,
//! and [`extract_from_table`] for cell grids. [`select_rate`] picks one
//! headline amount out of noisy text. None of these fail: a line or row that
//! does not fit is skipped, and a document with nothing recognisable yields
//! an empty record.

pub mod normalize;
pub mod score;
pub mod sections;
pub mod table;
pub mod types;

pub use normalize::{normalize_amount, parse_value};
pub use score::select_rate;
pub use sections::extract_from_lines;
pub use table::{extract_from_table, rows_from_lines};
pub use types::{
    Bracket, ParsedValue, RateCandidate, Row, Section, SectionedTariffRecord, Structure,
    TariffRecord,
};
