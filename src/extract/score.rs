// src/extract/score.rs

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::normalize::normalize_amount;
use super::table::{CURRENCY_MARKER, VOLUME_TOKENS};
use super::types::RateCandidate;

static AMOUNT_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s?\d[\d.,]*").expect("amount token pattern should compile"));

static CUBIC_METER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"metros?\s+c[uú]bicos?").expect("cubic meter pattern should compile")
});

const VOLUME_WEIGHT: u32 = 5;
const CUBIC_METER_WEIGHT: u32 = 5;

/// Plain substring cues and their weights.
const KEYWORD_WEIGHTS: &[(&str, u32)] = &[("consumo", 3), ("tarifa", 3), ("valor", 2)];
const CURRENCY_WEIGHT: u32 = 2;

/// How strongly a line looks like it carries the per-m³ tariff.
pub fn score_line(line: &str) -> u32 {
    let lower = line.to_lowercase();
    let mut score = 0;

    if VOLUME_TOKENS.iter().any(|t| lower.contains(t)) {
        score += VOLUME_WEIGHT;
    }
    if CUBIC_METER_RE.is_match(&lower) {
        score += CUBIC_METER_WEIGHT;
    }
    for (keyword, weight) in KEYWORD_WEIGHTS {
        if lower.contains(keyword) {
            score += weight;
        }
    }
    if lower.contains(CURRENCY_MARKER) {
        score += CURRENCY_WEIGHT;
    }

    score
}

/// Pick the single most tariff-like amount among all `$` tokens in `lines`.
///
/// Every amount token on a line shares that line's score. The first candidate
/// with the highest score wins. `None` means no amount token was found at all.
pub fn select_rate<I, S>(lines: I) -> Option<RateCandidate>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut best: Option<RateCandidate> = None;

    for (idx, line) in lines.into_iter().enumerate() {
        let line = line.as_ref();
        let mut tokens = AMOUNT_TOKEN_RE.find_iter(line).peekable();
        if tokens.peek().is_none() {
            continue;
        }
        let score = score_line(line);

        for m in tokens {
            let raw = m.as_str().trim_end_matches(['.', ',']);
            let candidate = RateCandidate {
                value: normalize_amount(raw),
                raw: raw.to_string(),
                line: idx,
                score,
            };
            if best.as_ref().map_or(true, |b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }
    }

    match &best {
        Some(b) => debug!(value = %b.value, score = b.score, line = b.line, "selected rate"),
        None => debug!("no amount token found"),
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_add_up() {
        assert_eq!(score_line("Tarifa vigente $500"), 5);
        assert_eq!(score_line("Consumo m3 $700"), 10);
        assert_eq!(score_line("Valor por metro cúbico de consumo: $812"), 2 + 5 + 3 + 2);
        assert_eq!(score_line("sin pistas"), 0);
    }

    #[test]
    fn highest_score_wins() {
        let best = select_rate(["Tarifa vigente $500", "Consumo m3 $700"]).unwrap();
        assert_eq!(best.value, "700");
        assert_eq!(best.line, 1);
        assert_eq!(best.score, 10);
    }

    #[test]
    fn ties_keep_the_first_candidate() {
        let best = select_rate(["Tarifa $1.250 o $1.300", "Tarifa $999"]).unwrap();
        assert_eq!(best.raw, "$1.250");
        assert_eq!(best.value, "1.250");
        assert_eq!(best.line, 0);
    }

    #[test]
    fn trailing_punctuation_is_dropped() {
        let best = select_rate(["El consumo se cobra a $ 450,5."]).unwrap();
        assert_eq!(best.raw, "$ 450,5");
        assert_eq!(best.value, "450.5");
    }

    #[test]
    fn no_amount_is_not_found() {
        assert!(select_rate(["Tarifa por m3", "sin precios"]).is_none());
        assert!(select_rate(Vec::<&str>::new()).is_none());
    }
}
