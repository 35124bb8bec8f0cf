// src/extract/normalize.rs

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use super::types::ParsedValue;

/// Order matters: `$` goes first so `C$LP` collapses in a single pass.
const CURRENCY_MARKERS: &[&str] = &["$", "CLP"];

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d*\.\d+|\d+").expect("number pattern should compile"));

static NUMERIC_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4})\b").expect("date pattern should compile")
});

static LONG_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:\s+de)?\s+(\p{L}+)\.?(?:\s+del?)?\s+(\d{4})\b")
        .expect("long date pattern should compile")
});

static MONTHS: &[(&str, u32)] = &[
    ("enero", 1),
    ("ene", 1),
    ("january", 1),
    ("jan", 1),
    ("febrero", 2),
    ("feb", 2),
    ("february", 2),
    ("marzo", 3),
    ("mar", 3),
    ("march", 3),
    ("abril", 4),
    ("abr", 4),
    ("april", 4),
    ("apr", 4),
    ("mayo", 5),
    ("may", 5),
    ("junio", 6),
    ("jun", 6),
    ("june", 6),
    ("julio", 7),
    ("jul", 7),
    ("july", 7),
    ("agosto", 8),
    ("ago", 8),
    ("august", 8),
    ("aug", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("sep", 9),
    ("sept", 9),
    ("september", 9),
    ("octubre", 10),
    ("oct", 10),
    ("october", 10),
    ("noviembre", 11),
    ("nov", 11),
    ("november", 11),
    ("diciembre", 12),
    ("dic", 12),
    ("december", 12),
    ("dec", 12),
];

/// Comma → period, currency markers removed, outer whitespace trimmed.
/// Applying it twice gives the same result as applying it once.
pub fn normalize_amount(raw: &str) -> String {
    let mut s = raw.replace(',', ".");
    loop {
        let before = s.len();
        for marker in CURRENCY_MARKERS {
            s = s.replace(marker, "");
        }
        if s.len() == before {
            break;
        }
    }
    s.trim().to_string()
}

/// Digits with at most one `.` separator, after normalization.
pub fn is_amount(normalized: &str) -> bool {
    !normalized.is_empty()
        && normalized.chars().any(|c| c.is_ascii_digit())
        && normalized.chars().all(|c| c.is_ascii_digit() || c == '.')
        && normalized.matches('.').count() <= 1
}

/// Normalize a raw token and return it only if it is a valid amount.
pub fn clean_amount(raw: &str) -> Option<String> {
    let cleaned = normalize_amount(raw);
    is_amount(&cleaned).then_some(cleaned)
}

/// Find a day-first date anywhere in `text` and render it as `DD/MM/YYYY`.
pub fn parse_date(text: &str) -> Option<String> {
    for caps in NUMERIC_DATE_RE.captures_iter(text) {
        let day = caps[1].parse().ok();
        let month = caps[2].parse().ok();
        let year = caps[3].parse().ok();
        if let (Some(d), Some(m), Some(y)) = (day, month, year) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                return Some(date.format("%d/%m/%Y").to_string());
            }
        }
    }

    for caps in LONG_DATE_RE.captures_iter(text) {
        let name = caps[2].to_lowercase();
        let Some(month) = MONTHS.iter().find(|(n, _)| *n == name).map(|(_, m)| *m) else {
            continue;
        };
        let (Ok(day), Ok(year)) = (caps[1].parse::<u32>(), caps[3].parse::<i32>()) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date.format("%d/%m/%Y").to_string());
        }
    }

    None
}

/// First integer-or-decimal run in an already normalized string.
pub fn parse_number(normalized: &str) -> Option<f64> {
    NUMBER_RE
        .find(normalized)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Date, then number, then the trimmed raw text. Never fails.
pub fn parse_value(raw: &str) -> ParsedValue {
    if let Some(date) = parse_date(raw) {
        return ParsedValue::Date(date);
    }
    let normalized = normalize_amount(raw);
    match parse_number(&normalized) {
        Some(n) => ParsedValue::Number(n),
        None => ParsedValue::Text(raw.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        for raw in [
            "$1.250",
            " 1,25 CLP ",
            "C$LP 450",
            "$ 12.345,6",
            "CCLPLP9",
            "sin valor",
            "",
        ] {
            let once = normalize_amount(raw);
            assert_eq!(normalize_amount(&once), once, "input {:?}", raw);
        }
    }

    #[test]
    fn normalize_strips_currency_and_decimal_comma() {
        assert_eq!(normalize_amount("$1.250"), "1.250");
        assert_eq!(normalize_amount(" 450,75 CLP"), "450.75");
        assert_eq!(normalize_amount("$ 300"), "300");
    }

    #[test]
    fn amount_allows_a_single_separator() {
        assert!(is_amount("450"));
        assert!(is_amount("1.250"));
        assert!(!is_amount("1.250.000"));
        assert!(!is_amount("m3"));
        assert!(!is_amount("."));
        assert!(!is_amount(""));
        assert_eq!(clean_amount("$1,5"), Some("1.5".to_string()));
        assert_eq!(clean_amount("mensual"), None);
    }

    #[test]
    fn dates_are_day_first() {
        assert_eq!(parse_date("01/07/2024").as_deref(), Some("01/07/2024"));
        assert_eq!(parse_date("vigente desde 5-3-2023").as_deref(), Some("05/03/2023"));
        assert_eq!(
            parse_date("12 de marzo de 2024").as_deref(),
            Some("12/03/2024")
        );
        assert_eq!(parse_date("1 Septiembre 2022").as_deref(), Some("01/09/2022"));
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("1.250"), None);
        assert_eq!(parse_date("15 m3 2024"), None);
    }

    #[test]
    fn parse_value_falls_back_to_text() {
        assert_eq!(parse_value(" $1.250 "), ParsedValue::Number(1.25));
        assert_eq!(parse_value("450,5 $/m3"), ParsedValue::Number(450.5));
        assert_eq!(
            parse_value("1 de julio de 2024"),
            ParsedValue::Date("01/07/2024".into())
        );
        assert_eq!(
            parse_value("  Aguas Andinas S.A. "),
            ParsedValue::Text("Aguas Andinas S.A.".into())
        );
    }
}
