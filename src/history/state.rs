// src/history/state.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the listing page looked like on the last successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// URL actually fetched; differs from `configured_url` after discovery.
    pub tarifas_url: String,
    /// `Config::tarifas_url` in effect when this was written.
    #[serde(default)]
    pub configured_url: String,
    pub last_checked: DateTime<Utc>,
    pub last_modified: Option<String>,
    pub hash: String,
    pub pdf_count: usize,
}

impl PageMeta {
    /// Same `Last-Modified` header and same body hash.
    pub fn matches(&self, last_modified: Option<&str>, hash: &str) -> bool {
        self.last_modified.as_deref() == last_modified && self.hash == hash
    }

    /// URL to fetch next: the stored one while the configured URL is unchanged,
    /// otherwise the newly configured one.
    pub fn listing_url<'a>(meta: Option<&'a PageMeta>, configured: &'a str) -> &'a str {
        match meta {
            Some(m) if m.configured_url == configured => &m.tarifas_url,
            _ => configured,
        }
    }
}

/// PDF URL → SHA-256 of its last downloaded content.
pub type DocumentHashes = BTreeMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_needs_either_header_or_hash_to_differ() {
        let meta = PageMeta {
            tarifas_url: "https://www.siss.gob.cl/586/w3-propertyvalue-6385.html".into(),
            configured_url: "https://www.siss.gob.cl/586/w3-propertyvalue-6385.html".into(),
            last_checked: Utc::now(),
            last_modified: Some("Mon, 01 Jul 2024 10:00:00 GMT".into()),
            hash: "aa".into(),
            pdf_count: 3,
        };
        assert!(meta.matches(Some("Mon, 01 Jul 2024 10:00:00 GMT"), "aa"));
        assert!(!meta.matches(Some("Mon, 01 Jul 2024 10:00:00 GMT"), "bb"));
        assert!(!meta.matches(None, "aa"));
    }

    #[test]
    fn configured_url_wins_once_it_changes() {
        let meta = PageMeta {
            tarifas_url: "https://www.siss.gob.cl/586/w3-article-9.html".into(),
            configured_url: "https://www.siss.gob.cl/586/w3-propertyvalue-6385.html".into(),
            last_checked: Utc::now(),
            last_modified: None,
            hash: "aa".into(),
            pdf_count: 0,
        };
        // discovered URL is kept while the config still says the same thing
        assert_eq!(
            PageMeta::listing_url(Some(&meta), "https://www.siss.gob.cl/586/w3-propertyvalue-6385.html"),
            "https://www.siss.gob.cl/586/w3-article-9.html"
        );
        assert_eq!(
            PageMeta::listing_url(Some(&meta), "http://localhost:8080/tarifas.html"),
            "http://localhost:8080/tarifas.html"
        );
        assert_eq!(PageMeta::listing_url(None, "http://x/t.html"), "http://x/t.html");

        // state written before `configured_url` existed
        let old: PageMeta = serde_json::from_value(serde_json::json!({
            "tarifas_url": "http://old/t.html",
            "last_checked": "2024-07-01T10:00:00Z",
            "last_modified": null,
            "hash": "aa",
            "pdf_count": 1
        }))
        .unwrap();
        assert_eq!(PageMeta::listing_url(Some(&old), "http://new/t.html"), "http://new/t.html");
    }
}
