//! SEO crawler main entry point
//!
//! This is the command-line interface for the single-page SEO crawler.

use anyhow::{bail, Context};
use clap::Parser;
use seo_crawler::config::{load_config_with_hash, Config};
use seo_crawler::output::{load_report, print_report, write_markdown_report};
use seo_crawler::storage::OwnerId;
use seo_crawler::{JobStatus, Orchestrator, SqliteStore, Store};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

/// SEO crawler: fetches pages and verifies their links
///
/// Each URL becomes one crawl job. The page is fetched once, its doctype,
/// title, headings, links and login forms are extracted, and every link is
/// probed for reachability. Results are stored in SQLite.
#[derive(Parser, Debug)]
#[command(name = "seo-crawler")]
#[command(version = "1.0.0")]
#[command(about = "Single-page SEO crawler with link verification", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Pages to crawl
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Owner the jobs are recorded under
    #[arg(long, default_value_t = 1)]
    owner: OwnerId,

    /// Also write a markdown report to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and URLs without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let urls = validate_urls(&cli.urls)?;

    if cli.dry_run {
        handle_dry_run(&config, &urls);
        return Ok(());
    }

    handle_crawl(config, &config_hash, cli.owner, urls, cli.report.as_deref()).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("seo_crawler=info,warn"),
            1 => EnvFilter::new("seo_crawler=debug,info"),
            2 => EnvFilter::new("seo_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Parses every URL, rejecting non-http(s) ones and dropping duplicates
fn validate_urls(raw: &[String]) -> anyhow::Result<Vec<String>> {
    let mut urls: Vec<String> = Vec::with_capacity(raw.len());
    for candidate in raw {
        let url = Url::parse(candidate).with_context(|| format!("Invalid URL: {}", candidate))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            bail!("Unsupported URL (expected http or https): {}", candidate);
        }
        let url = url.to_string();
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    Ok(urls)
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config, urls: &[String]) {
    println!("=== SEO Crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Probe pool size: {}", config.crawler.probe_pool_size);
    println!("  Probe timeout: {}s", config.crawler.probe_timeout_secs);
    println!("  Page timeout: {}s", config.crawler.page_timeout_secs);
    println!("  Fetches per host: {}", config.crawler.host_parallelism);
    println!("  Max random delay: {}ms", config.crawler.max_random_delay_ms);
    println!(
        "  Job lookup: {} attempts, {}ms apart",
        config.crawler.lookup_attempts, config.crawler.lookup_backoff_ms
    );
    println!(
        "  Await verification: {}",
        config.crawler.await_verification
    );
    match config.crawler.verification_deadline() {
        Some(deadline) => println!("  Verification deadline: {}s", deadline.as_secs()),
        None => println!("  Verification deadline: none"),
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nStore:");
    println!("  Database: {}", config.store.database_path);

    println!("\nURLs ({}):", urls.len());
    for url in urls {
        println!("  - {}", url);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    owner: OwnerId,
    urls: Vec<String>,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    let store = SqliteStore::new(Path::new(&config.store.database_path))
        .with_context(|| format!("Failed to open database {}", config.store.database_path))?;
    let store: Arc<dyn Store> = Arc::new(store);
    let orchestrator = Orchestrator::from_config(&config, Arc::clone(&store))?;

    let mut handles = Vec::with_capacity(urls.len());
    for url in &urls {
        store.create_job(owner, url).await?;
        handles.push(orchestrator.submit(owner, url.clone()));
    }
    tracing::info!("Submitted {} jobs for owner {}", handles.len(), owner);

    let interrupt = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let stopped = interrupt.stop_all();
            tracing::warn!("Interrupted, stopping {} jobs", stopped);
        }
    });

    let mut reports = Vec::with_capacity(handles.len());
    let mut failed = 0;
    for handle in handles {
        let outcome = handle.wait().await?;
        if outcome.status != JobStatus::Done {
            failed += 1;
        }

        match outcome.job_id {
            Some(job_id) => reports.push(load_report(store.as_ref(), job_id).await?),
            None => println!(
                "=== {} ===\n  Status: {}\n  Error: {}\n",
                outcome.url,
                outcome.status,
                outcome.error.as_deref().unwrap_or("unknown")
            ),
        }
    }

    for report in &reports {
        print_report(report);
    }

    if let Some(path) = report_path {
        write_markdown_report(&reports, Some(config_hash), path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("✓ Report written to: {}", path.display());
    }

    if failed > 0 {
        bail!("{} of {} jobs did not complete", failed, urls.len());
    }
    Ok(())
}
