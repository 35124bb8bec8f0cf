// src/fetch/mod.rs

use anyhow::{Context, Result};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tracing::{error, warn};

use crate::config::Config;

pub mod download;
pub mod links;
pub mod page;

/// Bounded retries with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_retries: cfg.max_retries,
            delay: cfg.retry_backoff(),
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Run `op` until it succeeds or the retry budget is spent.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempts < policy.max_retries => {
                attempts += 1;
                warn!(what, attempt = attempts, delay_ms = policy.delay.as_millis() as u64, error = %e, "retrying");
                sleep(policy.delay).await;
            }
            Err(e) => {
                error!(what, error = %e, "exhausted retries");
                return Err(e);
            }
        }
    }
}

/// HTTP client carrying the configured user agent and timeout.
pub fn build_client(cfg: &Config) -> Result<Client> {
    Client::builder()
        .user_agent(cfg.user_agent.clone())
        .timeout(cfg.request_timeout())
        .build()
        .context("building HTTP client")
}

/// Lowercase hex SHA-256.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn hash_is_stable_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn retry_stops_after_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            delay: Duration::from_millis(1),
        };
        let counter = &calls;
        let out = with_retry(policy, "flaky", move || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                anyhow::bail!("transient {}", n);
            }
            Ok(n)
        })
        .await
        .unwrap();
        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            delay: Duration::from_millis(1),
        };
        let counter = &calls;
        let res: Result<()> = with_retry(policy, "down", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("still down"))
        })
        .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
