// src/pipeline.rs

use anyhow::{Context, Result};
use chrono::Utc;
use glob::glob;
use reqwest::Client;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{error, info, instrument, warn};
use url::Url;

use crate::catalog::{LinkCatalog, TariffCatalog, TariffEntry};
use crate::config::Config;
use crate::error::DocumentError;
use crate::extract::{extract_from_lines, extract_from_table, rows_from_lines, select_rate};
use crate::fetch::{
    self, download,
    page::{self, PageSnapshot, PageStatus},
    RetryPolicy,
};
use crate::history::{DocumentHashes, PageMeta, Store, PAGE_META, PDF_HASHES, PDF_LINKS, TARIFFS};
use crate::pdf::{self, DocumentText};

/// Counts for one refresh.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub page_changed: bool,
    pub links: usize,
    pub downloaded: usize,
    pub parsed: usize,
    pub failed: usize,
}

/// Build a catalog leaf from decoded text. Pure; never fails.
///
/// Table mode reads the recovered cells when the text has column gaps, and
/// otherwise falls back to one single-cell row per line.
pub fn entry_from_document(doc: &DocumentText, source_pdf: &str) -> TariffEntry {
    let table_layout = doc.has_table_structure();
    let sections = extract_from_lines(&doc.lines);
    let record = if table_layout {
        extract_from_table(&doc.rows, source_pdf)
    } else {
        extract_from_table(&rows_from_lines(&doc.lines), source_pdf)
    };
    let headline_rate = select_rate(&doc.lines);

    if record.is_empty() && sections.is_empty() {
        warn!(source_pdf, "no tariff data recognised");
    }

    TariffEntry {
        source_pdf: source_pdf.to_string(),
        record,
        sections,
        headline_rate,
        table_layout,
        extracted_at: Utc::now(),
    }
}

/// Read one PDF from disk and extract it.
pub fn extract_file(path: &Path, source_pdf: &str) -> Result<TariffEntry, DocumentError> {
    let doc = pdf::read_document(path)?;
    Ok(entry_from_document(&doc, source_pdf))
}

/// Run [`extract_file`] on the blocking pool.
pub async fn extract_file_blocking(path: PathBuf, source_pdf: String) -> Result<TariffEntry> {
    let label = path.display().to_string();
    let entry = tokio::task::spawn_blocking(move || extract_file(&path, &source_pdf))
        .await
        .with_context(|| format!("extraction task for {} aborted", label))??;
    Ok(entry)
}

/// Scrape → download → parse, with state kept in a [`Store`].
pub struct Pipeline<S: Store> {
    client: Client,
    config: Config,
    store: S,
}

impl<S: Store> Pipeline<S> {
    pub fn new(config: Config, store: S) -> Result<Self> {
        let client = fetch::build_client(&config)?;
        Ok(Self {
            client,
            config,
            store,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn retry(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config)
    }

    /// Fetch the listing page, falling back to link discovery on 404.
    /// Returns `None` when neither `Last-Modified` nor the body hash changed,
    /// unless `force` is set.
    #[instrument(level = "info", skip(self))]
    pub async fn check_page(&self, force: bool) -> Result<Option<PageSnapshot>> {
        let meta: Option<PageMeta> = self.store.load(PAGE_META)?;
        let current = PageMeta::listing_url(meta.as_ref(), &self.config.tarifas_url);
        let url = Url::parse(current).with_context(|| format!("parsing listing URL {}", current))?;

        let snapshot = match page::fetch_snapshot(&self.client, &url, self.retry()).await? {
            PageStatus::Found(snap) => snap,
            PageStatus::NotFound => {
                warn!(%url, "listing page gone, running discovery");
                let base = Url::parse(&self.config.base_url)
                    .with_context(|| format!("parsing base URL {}", self.config.base_url))?;
                let found = page::discover_tarifas_url(&self.client, &base, self.retry()).await?;
                match page::fetch_snapshot(&self.client, &found, self.retry()).await? {
                    PageStatus::Found(snap) => snap,
                    PageStatus::NotFound => anyhow::bail!("discovered listing {} is also 404", found),
                }
            }
        };

        if !force {
            if let Some(prev) = &meta {
                if prev.tarifas_url == snapshot.url.as_str()
                    && prev.matches(snapshot.last_modified.as_deref(), &snapshot.hash)
                {
                    info!("no changes detected on listing page");
                    return Ok(None);
                }
            }
        }

        info!(hash = %snapshot.hash, "listing page changed");
        Ok(Some(snapshot))
    }

    /// Check the page and, if it changed, store and return the fresh link catalog.
    /// Page metadata is not advanced here; see [`Pipeline::run_once`].
    ///
    /// A page with no PDF links at all is an error and leaves stored state alone.
    pub async fn scrape(&self, force: bool) -> Result<Option<(PageSnapshot, LinkCatalog)>> {
        let Some(snapshot) = self.check_page(force).await? else {
            return Ok(None);
        };
        let entries = fetch::links::parse_pdf_links(&snapshot.body, &snapshot.url);
        if entries.is_empty() {
            anyhow::bail!(
                "no PDF links found on {}; keeping previous catalog",
                snapshot.url
            );
        }
        let links: LinkCatalog = entries.into_iter().collect();
        self.store.save(PDF_LINKS, &links)?;
        info!(links = links.len(), "stored link catalog");
        Ok(Some((snapshot, links)))
    }

    /// One full refresh. A failing PDF is logged and counted, never fatal.
    #[instrument(level = "info", skip(self))]
    pub async fn run_once(&self, force: bool) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::default();

        let Some((snapshot, links)) = self.scrape(force).await? else {
            return Ok(summary);
        };
        summary.page_changed = true;
        summary.links = links.len();

        let mut hashes: DocumentHashes = self.store.load(PDF_HASHES)?.unwrap_or_default();
        let mut tariffs: TariffCatalog = self.store.load(TARIFFS)?.unwrap_or_default();

        // several localities may share one PDF
        let mut by_url: BTreeMap<String, Vec<(String, String, String)>> = BTreeMap::new();
        for link in links.links() {
            by_url
                .entry(link.pdf_url)
                .or_default()
                .push((link.region, link.company, link.locality));
        }

        let pdf_dir = self.config.pdf_dir();
        for (url, owners) in &by_url {
            let dl = match download::download_pdf(
                &self.client,
                url,
                &pdf_dir,
                hashes.get(url).map(String::as_str),
                self.retry(),
            )
            .await
            {
                Ok(dl) => dl,
                Err(e) => {
                    error!(%url, error = %e, "download failed");
                    summary.failed += 1;
                    continue;
                }
            };
            if dl.changed {
                summary.downloaded += 1;
            }

            let stale = owners.iter().any(|(r, c, l)| {
                tariffs
                    .lookup(r, c, l)
                    .map_or(true, |e| e.source_pdf != *url)
            });
            if !dl.changed && !stale {
                hashes.insert(url.clone(), dl.hash);
                continue;
            }

            match extract_file_blocking(dl.path.clone(), url.clone()).await {
                Ok(entry) => {
                    for (r, c, l) in owners {
                        tariffs.insert(r.clone(), c.clone(), l.clone(), entry.clone());
                    }
                    hashes.insert(url.clone(), dl.hash);
                    summary.parsed += 1;
                }
                Err(e) => {
                    error!(%url, path = %dl.path.display(), error = %e, "extraction failed");
                    summary.failed += 1;
                }
            }
        }

        // drop localities and PDFs that vanished from the listing
        tariffs.retain(|r, c, l, _| links.get(r, c, l).is_some());
        hashes.retain(|url, _| by_url.contains_key(url));

        self.store.save(PDF_HASHES, &hashes)?;
        self.store.save(TARIFFS, &tariffs)?;
        self.store.save(
            PAGE_META,
            &PageMeta {
                tarifas_url: snapshot.url.to_string(),
                configured_url: self.config.tarifas_url.clone(),
                last_checked: Utc::now(),
                last_modified: snapshot.last_modified.clone(),
                hash: snapshot.hash.clone(),
                pdf_count: by_url.len(),
            },
        )?;

        info!(
            links = summary.links,
            downloaded = summary.downloaded,
            parsed = summary.parsed,
            failed = summary.failed,
            elapsed = ?start.elapsed(),
            "refresh done"
        );
        Ok(summary)
    }

    /// Refresh every `period` until Ctrl-C. Failed refreshes are logged and retried next tick.
    pub async fn watch(&self, period: Duration) -> Result<()> {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period = ?period, "watching listing page");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once(false).await {
                        error!(error = ?e, "refresh failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested");
                    return Ok(());
                }
            }
        }
    }

    /// Latest tariff for a locality from the stored catalog.
    pub fn lookup(&self, region: &str, company: &str, locality: &str) -> Result<Option<TariffEntry>> {
        let tariffs: TariffCatalog = self.store.load(TARIFFS)?.unwrap_or_default();
        Ok(tariffs.lookup(region, company, locality).cloned())
    }
}

/// Counts for a local re-parse.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    pub parsed: usize,
    pub failed: usize,
}

/// Every `*.pdf` directly under `dir`, sorted.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.pdf", dir.display());
    let mut paths: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("invalid glob pattern {}", pattern))?
        .filter_map(|entry| match entry {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "cannot read glob entry");
                None
            }
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Parse local PDFs and write `<stem>.json` for each into `out_dir`.
/// The source URL of a local file is its `file://` path.
pub async fn parse_local(paths: &[PathBuf], out_dir: &Path) -> Result<ParseSummary> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let mut summary = ParseSummary::default();

    for path in paths {
        let source = fs::canonicalize(path)
            .ok()
            .and_then(|abs| Url::from_file_path(abs).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| path.display().to_string());

        let entry = match extract_file_blocking(path.clone(), source).await {
            Ok(entry) => entry,
            Err(e) => {
                error!(path = %path.display(), error = %e, "extraction failed");
                summary.failed += 1;
                continue;
            }
        };

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let out = out_dir.join(format!("{}.json", stem));
        let json = serde_json::to_vec_pretty(&entry)?;
        fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
        info!(path = %out.display(), "saved");
        summary.parsed += 1;
    }

    Ok(summary)
}
