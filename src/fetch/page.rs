// src/fetch/page.rs

use anyhow::{Context, Result};
use reqwest::{header::LAST_MODIFIED, Client, StatusCode};
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{sha256_hex, with_retry, RetryPolicy};

const SECTOR_LINK_TEXT: &str = "Información del Sector Sanitario";
const TARIFAS_LINK_TEXT: &str = "Tarifas Vigentes";

/// One fetch of an HTML page.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: Url,
    pub last_modified: Option<String>,
    /// SHA-256 of the raw response body.
    pub hash: String,
    pub body: String,
}

#[derive(Debug)]
pub enum PageStatus {
    Found(PageSnapshot),
    NotFound,
}

async fn get_core(client: &Client, url: &Url) -> Result<PageStatus> {
    debug!(%url, "GET");
    let resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?;

    if resp.status() == StatusCode::NOT_FOUND {
        warn!(%url, "404 Not Found");
        return Ok(PageStatus::NotFound);
    }

    let resp = resp
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?;
    let last_modified = resp
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = resp
        .bytes()
        .await
        .with_context(|| format!("Reading body from {}", url))?;

    Ok(PageStatus::Found(PageSnapshot {
        url: url.clone(),
        last_modified,
        hash: sha256_hex(&bytes),
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }))
}

/// Fetch `url`, retrying transient failures. A 404 is reported, not retried.
#[instrument(level = "info", skip(client, url, policy), fields(url = %url))]
pub async fn fetch_snapshot(client: &Client, url: &Url, policy: RetryPolicy) -> Result<PageStatus> {
    with_retry(policy, url.as_str(), move || get_core(client, url)).await
}

async fn fetch_body(client: &Client, url: &Url, policy: RetryPolicy) -> Result<String> {
    match fetch_snapshot(client, url, policy).await? {
        PageStatus::Found(snap) => Ok(snap.body),
        PageStatus::NotFound => anyhow::bail!("{} returned 404", url),
    }
}

/// First `<a href>` whose text contains `needle`, resolved against `base`.
pub fn find_link_by_text(html: &str, base: &Url, needle: &str) -> Option<Url> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("a[href]").expect("link selector should parse");
    doc.select(&sel)
        .filter(|a| a.text().collect::<String>().contains(needle))
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| base.join(href).ok())
}

/// Re-locate the tariff listing from the site root when the known URL is gone:
/// home page → "Información del Sector Sanitario" → "Tarifas Vigentes".
#[instrument(level = "info", skip(client, base, policy), fields(base = %base))]
pub async fn discover_tarifas_url(client: &Client, base: &Url, policy: RetryPolicy) -> Result<Url> {
    let home = fetch_body(client, base, policy)
        .await
        .context("fetching home page")?;
    let sector_url = find_link_by_text(&home, base, SECTOR_LINK_TEXT)
        .with_context(|| format!("no '{}' link on {}", SECTOR_LINK_TEXT, base))?;
    info!(url = %sector_url, "found sector page");

    let sector = fetch_body(client, &sector_url, policy)
        .await
        .context("fetching sector page")?;
    let tarifas_url = find_link_by_text(&sector, &sector_url, TARIFAS_LINK_TEXT)
        .with_context(|| format!("no '{}' link on {}", TARIFAS_LINK_TEXT, sector_url))?;
    info!(url = %tarifas_url, "discovered tariff listing");
    Ok(tarifas_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_lookup_matches_text_and_resolves_relative_href() {
        let html = r#"
            <html><body>
              <a href="/535/w3-channel.html">Inicio</a>
              <a href="/586/w3-propertyvalue-6385.html"><span>Tarifas Vigentes</span> 2024</a>
            </body></html>"#;
        let base = Url::parse("https://www.siss.gob.cl/586/w3-channel.html").unwrap();
        let found = find_link_by_text(html, &base, "Tarifas Vigentes").unwrap();
        assert_eq!(
            found.as_str(),
            "https://www.siss.gob.cl/586/w3-propertyvalue-6385.html"
        );
        assert!(find_link_by_text(html, &base, "Información del Sector Sanitario").is_none());
    }
}
