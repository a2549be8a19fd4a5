//! Link verifier
//!
//! Probes discovered links for reachability with a bounded, global pool of
//! probe slots and a per-probe timeout. A probe never fails: errors and
//! timeouts become the `{status_code: 0, reachable: false}` verdict.

use crate::config::Config;
use crate::crawler::fetcher::build_http_client;
use crate::CrawlError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use url::Url;

/// Outcome of probing one link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Response status, 0 when no response was received
    pub status_code: u16,
    pub reachable: bool,
}

impl Verdict {
    /// Verdict for a completed probe: statuses of 400 and above are unreachable
    pub fn from_status(status_code: u16) -> Self {
        Self {
            status_code,
            reachable: status_code < 400,
        }
    }

    /// Verdict for a probe that errored or timed out
    pub fn failed() -> Self {
        Self {
            status_code: 0,
            reachable: false,
        }
    }
}

/// Sends one reachability probe
#[async_trait]
pub trait LinkProber: Send + Sync {
    async fn probe(&self, url: &Url) -> Verdict;
}

/// Prober issuing HEAD requests
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LinkProber for HttpProber {
    async fn probe(&self, url: &Url) -> Verdict {
        match self.client.head(url.clone()).send().await {
            Ok(response) => Verdict::from_status(response.status().as_u16()),
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", url, e);
                Verdict::failed()
            }
        }
    }
}

/// A held probe slot, released on drop
#[derive(Debug)]
pub struct ProbeSlot {
    _permit: OwnedSemaphorePermit,
}

/// Bounded pool of link probes, shared by every job of an orchestrator
#[derive(Clone)]
pub struct LinkVerifier {
    prober: Arc<dyn LinkProber>,
    slots: Arc<Semaphore>,
    probe_timeout: Duration,
}

impl LinkVerifier {
    /// Creates a verifier
    ///
    /// # Arguments
    ///
    /// * `prober` - Sends the actual probes
    /// * `pool_size` - Probes allowed in flight at once (at least 1)
    /// * `probe_timeout` - Budget for a single probe
    pub fn new(prober: Arc<dyn LinkProber>, pool_size: usize, probe_timeout: Duration) -> Self {
        Self {
            prober,
            slots: Arc::new(Semaphore::new(pool_size.max(1))),
            probe_timeout,
        }
    }

    /// Builds an HTTP-backed verifier from configuration
    pub fn from_config(config: &Config) -> Result<Self, CrawlError> {
        let client = build_http_client(&config.user_agent, config.crawler.probe_timeout())?;
        Ok(Self::new(
            Arc::new(HttpProber::new(client)),
            config.crawler.probe_pool_size as usize,
            config.crawler.probe_timeout(),
        ))
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Waits for a free probe slot
    ///
    /// Returns `None` when `deadline` passes first.
    pub async fn acquire_slot(&self, deadline: Option<Instant>) -> Option<ProbeSlot> {
        let slots = Arc::clone(&self.slots);
        let permit = match deadline {
            Some(deadline) if Instant::now() >= deadline => return None,
            Some(deadline) => tokio::time::timeout_at(deadline, slots.acquire_owned())
                .await
                .ok()?
                .ok()?,
            None => slots.acquire_owned().await.ok()?,
        };
        Some(ProbeSlot { _permit: permit })
    }

    /// Probes `url` while holding `slot`, bounded by the probe timeout
    pub async fn probe(&self, slot: ProbeSlot, url: &Url) -> Verdict {
        let verdict = match tokio::time::timeout(self.probe_timeout, self.prober.probe(url)).await
        {
            Ok(verdict) => verdict,
            Err(_) => {
                tracing::debug!("Probe of {} timed out after {:?}", url, self.probe_timeout);
                Verdict::failed()
            }
        };
        drop(slot);
        verdict
    }

    /// Acquires a slot and probes `url`
    ///
    /// Returns `None` only when no slot could be obtained before `deadline`.
    pub async fn verify(&self, url: &Url, deadline: Option<Instant>) -> Option<Verdict> {
        let slot = self.acquire_slot(deadline).await?;
        Some(self.probe(slot, url).await)
    }
}
