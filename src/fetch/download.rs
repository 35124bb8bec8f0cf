// src/fetch/download.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

use super::{sha256_hex, with_retry, RetryPolicy};

/// Result of fetching one PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub url: String,
    pub path: PathBuf,
    pub hash: String,
    /// False when the content hash matched the previous download and the file is still on disk.
    pub changed: bool,
}

/// Local file name for a PDF URL: its last path segment.
pub fn file_name_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("download.pdf")
        .to_string()
}

async fn get_bytes(client: &Client, url: &Url) -> Result<Vec<u8>> {
    let resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?;
    Ok(resp
        .bytes()
        .await
        .with_context(|| format!("Reading body from {}", url))?
        .to_vec())
}

/// Download `url_str` into `dest_dir`, rewriting the file only when its
/// SHA-256 differs from `known_hash` (or the file is missing).
#[instrument(level = "info", skip(client, dest_dir, known_hash, policy))]
pub async fn download_pdf(
    client: &Client,
    url_str: &str,
    dest_dir: impl AsRef<Path>,
    known_hash: Option<&str>,
    policy: RetryPolicy,
) -> Result<Download> {
    let dest_dir = dest_dir.as_ref();
    let url = Url::parse(url_str).with_context(|| format!("parsing PDF URL {}", url_str))?;
    let dest_path = dest_dir.join(file_name_for(&url));

    let target = &url;
    let bytes = with_retry(policy, url.as_str(), move || get_bytes(client, target)).await?;
    let hash = sha256_hex(&bytes);
    let changed = known_hash != Some(hash.as_str()) || !dest_path.exists();

    if changed {
        fs::create_dir_all(dest_dir)
            .await
            .with_context(|| format!("creating {}", dest_dir.display()))?;
        fs::write(&dest_path, &bytes)
            .await
            .with_context(|| format!("writing {}", dest_path.display()))?;
        info!(path = %dest_path.display(), bytes = bytes.len(), "saved PDF");
    } else {
        debug!(path = %dest_path.display(), "PDF unchanged");
    }

    Ok(Download {
        url: url_str.to_string(),
        path: dest_path,
        hash,
        changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_last_segment() {
        let url = Url::parse("https://www.siss.gob.cl/586/articles-100_recurso_1.pdf?v=3").unwrap();
        assert_eq!(file_name_for(&url), "articles-100_recurso_1.pdf");

        let dir = Url::parse("https://www.siss.gob.cl/586/").unwrap();
        assert_eq!(file_name_for(&dir), "download.pdf");
    }
}
