//! Per-host politeness throttle for page fetches
//!
//! Every page fetch passes through [`HostThrottle::acquire`], which:
//! - caps the number of simultaneous fetches against one host
//! - waits a random delay before releasing the caller to send its request
//!
//! Hosts without outstanding fetches are dropped from the table whenever a
//! new host is added, so its size follows the hosts currently being fetched.
//!
//! Link verification probes do not go through the throttle.

use crate::config::CrawlerConfig;
use crate::state::HostState;
use crate::CrawlError;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;

/// A held fetch slot for one host, released on drop
#[derive(Debug)]
pub struct HostPermit {
    host: String,
    _permit: OwnedSemaphorePermit,
}

impl HostPermit {
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// Throttles page fetches per target host
#[derive(Debug)]
pub struct HostThrottle {
    hosts: Mutex<HashMap<String, HostState>>,
    parallelism: usize,
    max_random_delay: Duration,
}

impl HostThrottle {
    /// Creates a throttle
    ///
    /// # Arguments
    ///
    /// * `parallelism` - Simultaneous fetches allowed per host
    /// * `max_random_delay` - Upper bound of the delay waited before each fetch
    pub fn new(parallelism: usize, max_random_delay: Duration) -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            parallelism: parallelism.max(1),
            max_random_delay,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.host_parallelism as usize, config.max_random_delay())
    }

    /// Waits for a fetch slot on `host`, then for the politeness delay
    ///
    /// The returned permit must be held for the duration of the request.
    pub async fn acquire(&self, host: &str) -> Result<HostPermit, CrawlError> {
        let slots = {
            let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
            if !hosts.contains_key(host) {
                let before = hosts.len();
                hosts.retain(|_, state| !state.is_idle());
                if hosts.len() < before {
                    tracing::trace!("Dropped {} idle hosts from throttle", before - hosts.len());
                }
            }
            hosts
                .entry(host.to_string())
                .or_insert_with(|| HostState::new(self.parallelism))
                .slots()
        };

        let permit = slots
            .acquire_owned()
            .await
            .map_err(|_| CrawlError::Task(format!("fetch slots for {} closed", host)))?;

        let delay = self.random_delay();
        if !delay.is_zero() {
            tracing::trace!("Waiting {:?} before fetching from {}", delay, host);
            tokio::time::sleep(delay).await;
        }

        {
            let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(state) = hosts.get_mut(host) {
                state.record_request();
            }
        }

        Ok(HostPermit {
            host: host.to_string(),
            _permit: permit,
        })
    }

    /// Number of fetches started against `host` since it was last idle-pruned
    pub fn request_count(&self, host: &str) -> u32 {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts.get(host).map(|s| s.request_count).unwrap_or(0)
    }

    /// Number of hosts currently tracked
    pub fn tracked_hosts(&self) -> usize {
        self.hosts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Free fetch slots for `host`, or `None` if it is not tracked
    pub fn available_slots(&self, host: &str) -> Option<usize> {
        let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts.get(host).map(HostState::available_slots)
    }

    fn random_delay(&self) -> Duration {
        let max_ms = self.max_random_delay.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}
