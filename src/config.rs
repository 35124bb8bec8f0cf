// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_BASE_URL: &str = "https://www.siss.gob.cl";
pub const DEFAULT_TARIFAS_URL: &str = "https://www.siss.gob.cl/586/w3-propertyvalue-6385.html";

/// Runtime settings. Every field has a default, so an empty YAML file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site root, used for relative links and the fallback page discovery.
    pub base_url: String,
    /// Listing page holding the per-locality tariff PDF links.
    pub tarifas_url: String,
    /// Root for downloaded PDFs and JSON state.
    pub data_dir: PathBuf,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub update_interval_days: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            tarifas_url: DEFAULT_TARIFAS_URL.to_string(),
            data_dir: PathBuf::from("data"),
            user_agent: concat!(
                "Mozilla/5.0 (compatible; siss-tariffs/",
                env!("CARGO_PKG_VERSION"),
                ")"
            )
            .to_string(),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 1_000,
            update_interval_days: 7,
        }
    }
}

impl Config {
    /// Defaults, then the YAML file (if given), then `SISS_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                Self::from_yaml(&text).with_context(|| format!("parsing config {}", p.display()))?
            }
            None => Self::default(),
        };
        cfg.apply_env(|k| env::var(k).ok());
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("SISS_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SISS_TARIFAS_URL") {
            self.tarifas_url = v;
        }
        if let Some(v) = lookup("SISS_BASE_URL") {
            self.base_url = v;
        }
    }

    pub fn pdf_dir(&self) -> PathBuf {
        self.data_dir.join("pdfs")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_days * 24 * 60 * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = Config::from_yaml("data_dir: /var/lib/siss\nmax_retries: 5\n").unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/siss"));
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.tarifas_url, DEFAULT_TARIFAS_URL);
        assert_eq!(cfg.pdf_dir(), PathBuf::from("/var/lib/siss/pdfs"));
        assert_eq!(cfg.interval(), Duration::from_secs(7 * 86_400));
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
    }

    #[test]
    fn env_overrides_file_values() {
        let vars: HashMap<&str, &str> = [
            ("SISS_DATA_DIR", "/tmp/siss"),
            ("SISS_TARIFAS_URL", "https://example.org/tarifas.html"),
        ]
        .into_iter()
        .collect();
        let mut cfg = Config::default();
        cfg.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/siss"));
        assert_eq!(cfg.tarifas_url, "https://example.org/tarifas.html");
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(Config::from_yaml("max_retries: muchos").is_err());
    }
}
