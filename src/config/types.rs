use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the SEO crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub store: StoreConfig,
}

/// Crawler behavior configuration
///
/// Every field has a default so a config file only needs to name what it
/// changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of link probes that may run at once across all jobs
    #[serde(default = "default_probe_pool_size")]
    pub probe_pool_size: u32,

    /// Timeout for a single link probe (seconds)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Timeout for the page fetch (seconds)
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    /// Maximum simultaneous page fetches per host
    #[serde(default = "default_host_parallelism")]
    pub host_parallelism: u32,

    /// Upper bound of the randomized delay before each page fetch (milliseconds)
    #[serde(default = "default_max_random_delay_ms")]
    pub max_random_delay_ms: u64,

    /// How many times the job id lookup is attempted before the job fails
    #[serde(default = "default_lookup_attempts")]
    pub lookup_attempts: u32,

    /// Fixed delay between job id lookups (milliseconds)
    #[serde(default = "default_lookup_backoff_ms")]
    pub lookup_backoff_ms: u64,

    /// Wait for every dispatched probe before persisting the final summary
    #[serde(default = "default_await_verification")]
    pub await_verification: bool,

    /// Overall cap on how long a job keeps dispatching probes (seconds, 0 disables it)
    #[serde(default = "default_verification_deadline_secs")]
    pub verification_deadline_secs: Option<u64>,
}

impl CrawlerConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn max_random_delay(&self) -> Duration {
        Duration::from_millis(self.max_random_delay_ms)
    }

    pub fn lookup_backoff(&self) -> Duration {
        Duration::from_millis(self.lookup_backoff_ms)
    }

    pub fn verification_deadline(&self) -> Option<Duration> {
        self.verification_deadline_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            probe_pool_size: default_probe_pool_size(),
            probe_timeout_secs: default_probe_timeout_secs(),
            page_timeout_secs: default_page_timeout_secs(),
            host_parallelism: default_host_parallelism(),
            max_random_delay_ms: default_max_random_delay_ms(),
            lookup_attempts: default_lookup_attempts(),
            lookup_backoff_ms: default_lookup_backoff_ms(),
            await_verification: default_await_verification(),
            verification_deadline_secs: default_verification_deadline_secs(),
        }
    }
}

fn default_probe_pool_size() -> u32 {
    16
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_page_timeout_secs() -> u64 {
    30
}

fn default_host_parallelism() -> u32 {
    2
}

fn default_max_random_delay_ms() -> u64 {
    5000
}

fn default_lookup_attempts() -> u32 {
    5
}

fn default_lookup_backoff_ms() -> u64 {
    200
}

fn default_await_verification() -> bool {
    true
}

fn default_verification_deadline_secs() -> Option<u64> {
    Some(300)
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}
